use std::fmt;
use std::path::Path;

use bytes::Bytes;

use super::target_version::TargetVersion;

/// Converted file returned by the converter.
#[derive(Clone)]
pub struct ConversionOutput {
    pub bytes: Bytes,
    /// Filename from the `Content-Disposition` response header.
    pub filename: Option<String>,
    pub content_type: Option<String>,
}

impl fmt::Debug for ConversionOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionOutput")
            .field("len", &self.bytes.len())
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .finish()
    }
}

impl ConversionOutput {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// `<stem>_v<target>.3dm`, the name used when the server does not suggest one.
pub fn default_output_filename(original: &str, target: TargetVersion) -> String {
    let stem = Path::new(original)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("converted");
    format!("{}_v{}.3dm", stem, target)
}

/// Extract the filename from a `Content-Disposition` header value.
///
/// Prefers the RFC 5987 `filename*=UTF-8''...` form over plain `filename=`. Directory
/// components are stripped so the result is always a bare file name.
pub fn parse_content_disposition_filename(value: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;

    for param in value.split(';').map(str::trim) {
        let Some((name, raw)) = param.split_once('=') else {
            continue;
        };
        match name.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                let raw = raw.trim();
                let encoded = match raw.split_once("''") {
                    Some((_charset, rest)) => rest,
                    None => raw,
                };
                extended = urlencoding::decode(encoded.trim_matches('"'))
                    .ok()
                    .map(|name| name.into_owned());
            }
            "filename" => {
                plain = Some(raw.trim().trim_matches('"').to_string());
            }
            _ => {}
        }
    }

    extended
        .or(plain)
        .map(|name| {
            name.rsplit(['/', '\\'])
                .next()
                .unwrap_or_default()
                .to_string()
        })
        .filter(|name| !name.is_empty() && name != "." && name != "..")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_name_uses_stem_and_target() {
        assert_eq!(
            default_output_filename("bridge.3dm", TargetVersion::Rhino6),
            "bridge_v6.3dm"
        );
        assert_eq!(
            default_output_filename("", TargetVersion::Rhino5),
            "converted_v5.3dm"
        );
    }

    #[test]
    fn parses_plain_filename() {
        assert_eq!(
            parse_content_disposition_filename("attachment; filename=\"bridge_v6.3dm\""),
            Some("bridge_v6.3dm".to_string())
        );
        assert_eq!(
            parse_content_disposition_filename("attachment; filename=plain.3dm"),
            Some("plain.3dm".to_string())
        );
    }

    #[test]
    fn prefers_extended_filename() {
        let header = "attachment; filename=\"fallback.3dm\"; filename*=UTF-8''br%C3%BCcke_v6.3dm";
        assert_eq!(
            parse_content_disposition_filename(header),
            Some("brücke_v6.3dm".to_string())
        );
    }

    #[test]
    fn strips_directories_and_rejects_empty() {
        assert_eq!(
            parse_content_disposition_filename("attachment; filename=\"../../etc/x.3dm\""),
            Some("x.3dm".to_string())
        );
        assert_eq!(parse_content_disposition_filename("attachment"), None);
        assert_eq!(parse_content_disposition_filename("attachment; filename=\"\""), None);
    }
}
