use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;

/// Rhino file version the converter writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
pub enum TargetVersion {
    #[serde(rename = "2")]
    Rhino2,
    #[serde(rename = "3")]
    Rhino3,
    #[serde(rename = "4")]
    Rhino4,
    #[serde(rename = "5")]
    Rhino5,
    #[serde(rename = "6")]
    Rhino6,
    #[default]
    #[serde(rename = "7")]
    Rhino7,
}

impl TargetVersion {
    pub const ALL: [TargetVersion; 6] = [
        TargetVersion::Rhino2,
        TargetVersion::Rhino3,
        TargetVersion::Rhino4,
        TargetVersion::Rhino5,
        TargetVersion::Rhino6,
        TargetVersion::Rhino7,
    ];

    /// Wire value of the `targetVersion` form field.
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetVersion::Rhino2 => "2",
            TargetVersion::Rhino3 => "3",
            TargetVersion::Rhino4 => "4",
            TargetVersion::Rhino5 => "5",
            TargetVersion::Rhino6 => "6",
            TargetVersion::Rhino7 => "7",
        }
    }
}

impl fmt::Display for TargetVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts `"6"`, `"rhino 6"`, `"Rhino6"`.
impl FromStr for TargetVersion {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace("rhino", "");
        TargetVersion::ALL
            .into_iter()
            .find(|v| v.as_str() == normalized.trim())
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "Unsupported target version '{}'. Expected one of: 2, 3, 4, 5, 6, 7",
                    s.trim()
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_prefixed_forms() {
        assert_eq!("6".parse::<TargetVersion>().unwrap(), TargetVersion::Rhino6);
        assert_eq!(
            "Rhino 5".parse::<TargetVersion>().unwrap(),
            TargetVersion::Rhino5
        );
        assert_eq!(
            " rhino2 ".parse::<TargetVersion>().unwrap(),
            TargetVersion::Rhino2
        );
    }

    #[test]
    fn rejects_unknown_versions() {
        let err = "8".parse::<TargetVersion>().unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!("".parse::<TargetVersion>().is_err());
    }

    #[test]
    fn serializes_as_wire_value() {
        assert_eq!(
            serde_json::to_string(&TargetVersion::Rhino6).unwrap(),
            "\"6\""
        );
        assert_eq!(TargetVersion::default(), TargetVersion::Rhino7);
    }
}
