//! Proxy routes: `POST /api/upload` forwards to the conversion service and
//! `POST /api/narrate` asks the LLM for a slide narration.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use tracing::{debug, error, info};

use crate::error::UploadError;
use crate::narration::Narrator;
use crate::slides::{NarrateRequest, NarrateResponse};
use crate::upload::{Converter, SelectedFile};

/// Multipart field the upload route reads the PDF from.
const UPLOAD_FIELD: &str = "pdf";

#[derive(Clone)]
pub struct AppState {
    pub converter: Arc<dyn Converter>,
    pub narrator: Arc<dyn Narrator>,
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/api/upload", post(upload))
        .route("/api/narrate", post(narrate))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

pub async fn serve(
    addr: SocketAddr,
    state: AppState,
    max_upload_bytes: usize,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state, max_upload_bytes)).await?;
    Ok(())
}

async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> (StatusCode, Json<Value>) {
    let mut file = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some(UPLOAD_FIELD) {
                    continue;
                }
                let name = field.file_name().unwrap_or("upload.pdf").to_string();
                match field.bytes().await {
                    Ok(bytes) => {
                        file = Some(SelectedFile {
                            name,
                            bytes: bytes.to_vec(),
                        });
                    }
                    Err(e) => return bad_form(e.body_text()),
                }
                break;
            }
            Ok(None) => break,
            Err(e) => return bad_form(e.body_text()),
        }
    }
    forward_upload(state, file).await
}

fn bad_form(reason: String) -> (StatusCode, Json<Value>) {
    debug!("rejecting upload form: {reason}");
    (StatusCode::BAD_REQUEST, failure_body(reason))
}

fn failure_body(message: impl Into<String>) -> Json<Value> {
    Json(json!({ "success": false, "error": message.into() }))
}

/// Forward an uploaded file and relay the service's JSON untouched.
pub async fn forward_upload(
    state: AppState,
    file: Option<SelectedFile>,
) -> (StatusCode, Json<Value>) {
    let Some(file) = file else {
        return (StatusCode::BAD_REQUEST, failure_body("No PDF uploaded"));
    };

    info!(file = %file.name, bytes = file.bytes.len(), "forwarding upload");
    let converter = state.converter.clone();
    let result = tokio::task::spawn_blocking(move || converter.parse_pdf_raw(&file)).await;

    match result {
        Ok(Ok(body)) => (StatusCode::OK, Json(body)),
        Ok(Err(e)) => {
            error!("upload API error: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                failure_body(upload_failure_message(&e)),
            )
        }
        Err(e) => {
            error!("upload worker panicked: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, failure_body("Upload failed"))
        }
    }
}

fn upload_failure_message(e: &UploadError) -> String {
    let message = e.to_string();
    if message.is_empty() {
        "Upload failed".to_string()
    } else {
        message
    }
}

pub async fn narrate(
    State(state): State<AppState>,
    body: Result<Json<NarrateRequest>, JsonRejection>,
) -> Json<NarrateResponse> {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => return Json(NarrateResponse::failure(rejection.body_text())),
    };

    let Some(text) = request.text.filter(|t| !t.trim().is_empty()) else {
        debug!("narrate called without text");
        return Json(NarrateResponse::failure("No text provided"));
    };

    let narrator = state.narrator.clone();
    let result = tokio::task::spawn_blocking(move || narrator.narrate(&text)).await;

    match result {
        Ok(Ok(narration)) => Json(NarrateResponse {
            success: true,
            narration: Some(narration.text),
            error: None,
            debug: Some(json!({ "raw": narration.raw })),
        }),
        Ok(Err(e)) => {
            error!("narrate API error: {e}");
            Json(NarrateResponse::failure(e.to_string()))
        }
        Err(e) => {
            error!("narration worker panicked: {e}");
            Json(NarrateResponse::failure("Server error"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NarrationError;
    use crate::narration::Narration;
    use crate::service::encode_multipart;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeConverter {
        response: Result<Value, String>,
    }

    impl Converter for FakeConverter {
        fn parse_pdf_raw(&self, file: &SelectedFile) -> Result<Value, UploadError> {
            assert_eq!(file.name, "deck.pdf");
            assert_eq!(file.bytes, b"%PDF-1.5");
            self.response.clone().map_err(UploadError::Transport)
        }
    }

    #[derive(Default)]
    struct CountingNarrator {
        calls: AtomicUsize,
        fail: bool,
    }

    impl Narrator for CountingNarrator {
        fn narrate(&self, text: &str) -> Result<Narration, NarrationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(NarrationError::Api("overloaded".into()));
            }
            Ok(Narration {
                text: format!("Narrated {text}"),
                raw: json!({"id": "msg_1"}),
            })
        }
    }

    fn state(response: Result<Value, String>, narrator: Arc<CountingNarrator>) -> AppState {
        AppState {
            converter: Arc::new(FakeConverter { response }),
            narrator,
        }
    }

    fn ok_state() -> AppState {
        state(Ok(json!({"success": true, "slides": []})), Arc::default())
    }

    fn pdf() -> Option<SelectedFile> {
        Some(SelectedFile {
            name: "deck.pdf".into(),
            bytes: b"%PDF-1.5".to_vec(),
        })
    }

    /// Serve the router on an ephemeral port for the rest of the test.
    async fn spawn_router(state: AppState) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state, 1024 * 1024)).await.unwrap();
        });
        addr
    }

    /// POST a one-file multipart form and return the status and JSON body.
    async fn post_form(addr: SocketAddr, field: &'static str) -> (u16, Value) {
        tokio::task::spawn_blocking(move || {
            let boundary = "test-boundary-42";
            let body = encode_multipart(boundary, field, "deck.pdf", b"%PDF-1.5");
            let agent: ureq::Agent = ureq::Agent::config_builder()
                .http_status_as_error(false)
                .build()
                .into();
            let mut response = agent
                .post(&format!("http://{addr}/api/upload"))
                .header(
                    "Content-Type",
                    &format!("multipart/form-data; boundary={boundary}"),
                )
                .send(&body[..])
                .unwrap();
            let status = response.status().as_u16();
            (status, response.body_mut().read_json().unwrap())
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_upload_without_file() {
        let (status, Json(body)) = forward_upload(ok_state(), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"success": false, "error": "No PDF uploaded"}));
    }

    #[tokio::test]
    async fn test_upload_relays_service_body_verbatim() {
        let service = json!({
            "success": true,
            "totalSlides": 1,
            "warnings": ["low dpi"],
            "slides": [{"page": 1, "image_base64": "AA==", "text": "t", "ocr_confidence": 0.9}]
        });
        let st = state(Ok(service.clone()), Arc::default());
        let (status, Json(body)) = forward_upload(st, pdf()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, service);
    }

    #[tokio::test]
    async fn test_upload_relays_backend_failure() {
        let service = json!({"detail": "File must be a PDF"});
        let st = state(Ok(service.clone()), Arc::default());
        let (status, Json(body)) = forward_upload(st, pdf()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, service);
    }

    #[tokio::test]
    async fn test_upload_transport_failure() {
        let st = state(Err("connection refused".into()), Arc::default());
        let (status, Json(body)) = forward_upload(st, pdf()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "connection refused");
    }

    #[tokio::test]
    async fn test_upload_route_reads_pdf_field() {
        let addr = spawn_router(ok_state()).await;
        let (status, body) = post_form(addr, "pdf").await;
        assert_eq!(status, 200);
        assert_eq!(body, json!({"success": true, "slides": []}));
    }

    #[tokio::test]
    async fn test_upload_route_without_pdf_field() {
        let addr = spawn_router(ok_state()).await;
        let (status, body) = post_form(addr, "document").await;
        assert_eq!(status, 400);
        assert_eq!(body["error"], "No PDF uploaded");
    }

    #[tokio::test]
    async fn test_narrate_without_text_skips_llm() {
        let narrator = Arc::new(CountingNarrator::default());
        let st = state(Ok(json!({})), narrator.clone());

        let Json(body) = narrate(State(st.clone()), Ok(Json(NarrateRequest { text: None }))).await;
        assert_eq!(body, NarrateResponse::failure("No text provided"));

        let request = NarrateRequest {
            text: Some("   ".into()),
        };
        let Json(body) = narrate(State(st), Ok(Json(request))).await;
        assert_eq!(body.error.as_deref(), Some("No text provided"));
        assert_eq!(narrator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_narrate_success() {
        let narrator = Arc::new(CountingNarrator::default());
        let st = state(Ok(json!({})), narrator.clone());
        let request = NarrateRequest {
            text: Some("Revenue grew".into()),
        };
        let Json(body) = narrate(State(st), Ok(Json(request))).await;
        assert!(body.success);
        assert_eq!(body.narration.as_deref(), Some("Narrated Revenue grew"));
        assert_eq!(body.debug.unwrap()["raw"]["id"], "msg_1");
        assert_eq!(narrator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_narrate_failure() {
        let narrator = Arc::new(CountingNarrator {
            fail: true,
            ..CountingNarrator::default()
        });
        let st = state(Ok(json!({})), narrator);
        let request = NarrateRequest {
            text: Some("x".into()),
        };
        let Json(body) = narrate(State(st), Ok(Json(request))).await;
        assert!(!body.success);
        assert_eq!(
            body.error.as_deref(),
            Some("Narration API error: overloaded")
        );
    }
}
