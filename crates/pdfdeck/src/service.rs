//! HTTP client for the PDF conversion service (`POST /parse-pdf`).

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::UploadError;
use crate::upload::{Converter, SelectedFile};

/// Multipart field the conversion service expects the PDF under.
const FILE_FIELD: &str = "file";
const BOUNDARY: &str = "----pdfdeck-form-boundary-7d2c1f9a";

/// Rendered pages come back base64-encoded in one JSON document, so the
/// response can be far larger than the upload.
const MAX_RESPONSE_BYTES: u64 = 512 * 1024 * 1024;

pub struct ConversionClient {
    base_url: String,
    timeout_secs: u64,
    agent: ureq::Agent,
}

impl ConversionClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(timeout_secs)))
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_secs,
            agent,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/parse-pdf", self.base_url)
    }

    fn map_error(&self, e: ureq::Error) -> UploadError {
        match e {
            ureq::Error::Timeout(_) => UploadError::Timeout {
                secs: self.timeout_secs,
            },
            other => UploadError::Transport(format!(
                "Could not reach conversion service at {}: {other}",
                self.base_url
            )),
        }
    }
}

impl Converter for ConversionClient {
    fn parse_pdf_raw(&self, file: &SelectedFile) -> Result<serde_json::Value, UploadError> {
        let url = self.endpoint();
        let body = encode_multipart(BOUNDARY, FILE_FIELD, &file.name, &file.bytes);
        debug!(%url, bytes = body.len(), "posting PDF to conversion service");

        let mut response = self
            .agent
            .post(&url)
            .header(
                "Content-Type",
                &format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .send(&body[..])
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        let parsed: Result<serde_json::Value, _> = response
            .body_mut()
            .with_config()
            .limit(MAX_RESPONSE_BYTES)
            .read_json();

        match parsed {
            Ok(body) => Ok(body),
            Err(ureq::Error::Timeout(_)) => Err(UploadError::Timeout {
                secs: self.timeout_secs,
            }),
            Err(e) if status.is_success() => Err(UploadError::Transport(format!(
                "Invalid response from conversion service: {e}"
            ))),
            Err(e) => {
                warn!(
                    status = status.as_u16(),
                    "non-JSON error from conversion service: {e}"
                );
                Ok(serde_json::json!({
                    "success": false,
                    "error": format!("conversion service returned HTTP {}", status.as_u16()),
                }))
            }
        }
    }
}

/// Build a `multipart/form-data` body holding a single file part.
pub(crate) fn encode_multipart(
    boundary: &str,
    field: &str,
    file_name: &str,
    bytes: &[u8],
) -> Vec<u8> {
    let file_name = file_name.replace(['"', '\r', '\n'], "_");
    let mut body = Vec::with_capacity(bytes.len() + 256);
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/pdf\r\n\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}
