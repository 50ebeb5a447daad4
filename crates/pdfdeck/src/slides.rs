use serde::{Deserialize, Serialize};

use crate::error::UploadError;

/// One rendered page of the source PDF plus its extracted text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slide {
    /// 1-based page number in the source document.
    pub page: u32,
    /// Rendered page bitmap, base64 encoded (PNG from the conversion service).
    pub image_base64: String,
    /// Extracted text, may be empty.
    #[serde(default)]
    pub text: String,
}

impl Slide {
    /// Decode the base64 payload into raw image bytes.
    pub fn image_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.decode(self.image_base64.trim())
    }

    /// First non-empty line of the extracted text, used in menus and summaries.
    pub fn headline(&self) -> Option<&str> {
        self.text.lines().map(str::trim).find(|l| !l.is_empty())
    }
}

/// Response body of the conversion service's `/parse-pdf` endpoint, forwarded
/// verbatim by `/api/upload`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversionResponse {
    pub success: bool,

    #[serde(rename = "totalSlides", default, skip_serializing_if = "Option::is_none")]
    pub total_slides: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slides: Option<Vec<Slide>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConversionResponse {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Read a raw service body. Error bodies that do not follow the
    /// `{success, error}` shape (a framework's `{"detail": ...}` on a
    /// rejected upload) become failures carrying that detail.
    pub fn from_raw(raw: serde_json::Value) -> Result<Self, UploadError> {
        match serde_json::from_value::<Self>(raw.clone()) {
            Ok(response) => Ok(response),
            Err(e) => match raw.get("detail") {
                Some(serde_json::Value::String(detail)) => Ok(Self::failure(detail.clone())),
                Some(detail) => Ok(Self::failure(detail.to_string())),
                None => Err(UploadError::Transport(format!(
                    "Invalid response from conversion service: {e}"
                ))),
            },
        }
    }

    /// Interpret the response: `success: false` becomes a backend error
    /// carrying the service's message.
    pub fn into_slides(self) -> Result<Vec<Slide>, UploadError> {
        if !self.success {
            let message = self
                .error
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| "Upload failed".to_string());
            return Err(UploadError::Backend(message));
        }
        Ok(self.slides.unwrap_or_default())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NarrateRequest {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NarrateResponse {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narration: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<serde_json::Value>,
}

impl NarrateResponse {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_service_response() {
        let json = r#"{
            "success": true,
            "totalSlides": 2,
            "slides": [
                {"page": 1, "image_base64": "aGVsbG8=", "text": "Intro\nmore"},
                {"page": 2, "image_base64": "d29ybGQ=", "text": ""}
            ]
        }"#;
        let response: ConversionResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.total_slides, Some(2));
        let slides = response.into_slides().unwrap();
        assert_eq!(slides.len(), 2);
        assert_eq!(slides[0].page, 1);
        assert_eq!(slides[0].image_bytes().unwrap(), b"hello");
        assert_eq!(slides[0].headline(), Some("Intro"));
        assert_eq!(slides[1].headline(), None);
    }

    #[test]
    fn test_failure_carries_message() {
        let response: ConversionResponse =
            serde_json::from_str(r#"{"success": false, "error": "bad file"}"#).unwrap();
        match response.into_slides() {
            Err(UploadError::Backend(msg)) => assert_eq!(msg, "bad file"),
            other => panic!("expected backend error, got {other:?}"),
        }
    }

    #[test]
    fn test_from_raw_detail_body_is_failure() {
        let raw = serde_json::json!({"detail": "File must be a PDF"});
        let response = ConversionResponse::from_raw(raw).unwrap();
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("File must be a PDF"));

        let raw = serde_json::json!({
            "detail": [{"loc": ["body", "file"], "msg": "field required"}]
        });
        let response = ConversionResponse::from_raw(raw).unwrap();
        assert!(response.error.unwrap().contains("field required"));
    }

    #[test]
    fn test_from_raw_unknown_shape_is_transport_error() {
        let raw = serde_json::json!(["not", "an", "object"]);
        assert!(matches!(
            ConversionResponse::from_raw(raw),
            Err(UploadError::Transport(_))
        ));
    }

    #[test]
    fn test_from_raw_ignores_extra_fields() {
        let raw = serde_json::json!({
            "success": true,
            "warnings": ["low dpi"],
            "slides": [{"page": 1, "image_base64": "AA==", "text": "t", "ocr_confidence": 0.9}]
        });
        let slides = ConversionResponse::from_raw(raw).unwrap().into_slides().unwrap();
        assert_eq!(slides.len(), 1);
        assert_eq!(slides[0].text, "t");
    }

    #[test]
    fn test_failure_without_message() {
        let response = ConversionResponse {
            success: false,
            ..ConversionResponse::default()
        };
        match response.into_slides() {
            Err(UploadError::Backend(msg)) => assert_eq!(msg, "Upload failed"),
            other => panic!("expected backend error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_text_defaults_to_empty() {
        let slide: Slide = serde_json::from_str(r#"{"page": 3, "image_base64": ""}"#).unwrap();
        assert_eq!(slide.text, "");
    }

    #[test]
    fn test_failure_serializes_without_empty_fields() {
        let value = serde_json::to_value(ConversionResponse::failure("No PDF uploaded")).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"success": false, "error": "No PDF uploaded"})
        );
    }
}
