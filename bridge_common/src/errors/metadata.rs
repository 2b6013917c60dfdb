//! Presentation-layer attachments for [`Error`](super::Error).

use http::StatusCode;
use serde::Serialize;

/// Standard reason phrase for an HTTP status code, `""` if unknown.
pub fn status_text(code: u16) -> &'static str {
    StatusCode::from_u16(code)
        .ok()
        .and_then(|status| status.canonical_reason())
        .unwrap_or("")
}

/// HTTP response status attached to an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HttpMetadata {
    code: u16,
    status_text: String,
}

impl HttpMetadata {
    /// Build from a numeric code; the text is derived.
    pub fn new(code: u16) -> Self {
        Self {
            code,
            status_text: status_text(code).to_string(),
        }
    }

    /// Numeric status code.
    pub fn code(&self) -> u16 {
        self.code
    }

    /// Reason phrase for the code.
    pub fn status_text(&self) -> &str {
        &self.status_text
    }
}

/// Optional attachment carried by an error.
///
/// Each shape is its own optional field, so "never set" stays distinct from
/// an explicit zero value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    http: Option<HttpMetadata>,
}

impl Metadata {
    /// Set the HTTP status, replacing any previous one.
    pub fn set_http(&mut self, code: u16) -> &mut Self {
        self.http = Some(HttpMetadata::new(code));
        self
    }

    /// HTTP attachment, if set.
    pub fn http(&self) -> Option<&HttpMetadata> {
        self.http.as_ref()
    }

    /// HTTP code, `0` when unset.
    pub fn http_code(&self) -> u16 {
        self.http.as_ref().map_or(0, HttpMetadata::code)
    }

    /// HTTP reason phrase, `""` when unset.
    pub fn http_status(&self) -> &str {
        self.http.as_ref().map_or("", HttpMetadata::status_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_metadata_reads_zero_state() {
        let meta = Metadata::default();
        assert_eq!(meta.http_code(), 0);
        assert_eq!(meta.http_status(), "");
        assert!(meta.http().is_none());
    }

    #[test]
    fn test_set_http_known_codes() {
        let mut meta = Metadata::default();
        meta.set_http(404);
        assert_eq!(meta.http_code(), 404);
        assert_eq!(meta.http_status(), "Not Found");

        meta.set_http(500);
        assert_eq!(meta.http_code(), 500);
        assert_eq!(meta.http_status(), "Internal Server Error");
    }

    #[test]
    fn test_unknown_code_has_empty_text() {
        let mut meta = Metadata::default();
        meta.set_http(599);
        assert_eq!(meta.http_code(), 599);
        assert_eq!(meta.http_status(), "");

        meta.set_http(0);
        assert!(meta.http().is_some());
        assert_eq!(meta.http_code(), 0);
        assert_eq!(meta.http_status(), "");
    }

    #[test]
    fn test_serializes_only_set_shapes() {
        let mut meta = Metadata::default();
        assert_eq!(serde_json::to_string(&meta).unwrap(), "{}");

        meta.set_http(409);
        assert_eq!(
            serde_json::to_string(&meta).unwrap(),
            r#"{"http":{"code":409,"status_text":"Conflict"}}"#
        );
    }
}
