use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Presigned POST target issued by the converter's `/presign` endpoint.
///
/// `form_fields` keeps the issuer's order: some storage signature schemes verify the
/// policy against the field sequence, so the upload must replay them exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresignedUploadGrant {
    #[serde(rename = "url")]
    pub target_url: String,
    #[serde(rename = "fields", default, with = "ordered_fields")]
    pub form_fields: Vec<(String, String)>,
    #[serde(rename = "key")]
    pub object_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(rename = "maxMb", default, skip_serializing_if = "Option::is_none")]
    pub max_mb: Option<f64>,
    #[serde(rename = "expiresIn", default, skip_serializing_if = "Option::is_none")]
    pub expires_in_seconds: Option<u64>,
    /// Local receipt time; expiry is measured from here.
    #[serde(skip, default = "Utc::now")]
    pub issued_at: DateTime<Utc>,
}

impl PresignedUploadGrant {
    pub fn max_size_bytes(&self) -> Option<u64> {
        self.max_mb
            .filter(|mb| *mb > 0.0)
            .map(|mb| (mb * 1024.0 * 1024.0) as u64)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_in_seconds
            .map(|secs| self.issued_at + Duration::seconds(secs as i64))
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|at| now >= at)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.form_fields.iter().map(|(k, _)| k.as_str())
    }
}

/// (De)serializes a JSON object as an ordered list of pairs.
mod ordered_fields {
    use std::fmt;

    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};

    #[allow(clippy::ptr_arg)]
    pub fn serialize<S>(fields: &Vec<(String, String)>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(fields.len()))?;
        for (key, value) in fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct FieldsVisitor;

        impl<'de> Visitor<'de> for FieldsVisitor {
            type Value = Vec<(String, String)>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object of form fields")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut fields = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, value)) = access.next_entry::<String, serde_json::Value>()? {
                    let value = match value {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    };
                    fields.push((key, value));
                }
                Ok(fields)
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E> {
                Ok(Vec::new())
            }
        }

        deserializer.deserialize_any(FieldsVisitor)
    }
}
