//! Short spoken-style explanations of a slide, generated by an LLM.

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::NarrationError;

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Shown in place of a narration whenever one cannot be produced.
pub const FALLBACK_NARRATION: &str = "Narration unavailable for this slide.";

/// A generated narration plus the raw API response for debugging.
#[derive(Debug, Clone)]
pub struct Narration {
    pub text: String,
    pub raw: serde_json::Value,
}

pub trait Narrator: Send + Sync {
    fn narrate(&self, text: &str) -> Result<Narration, NarrationError>;
}

pub fn prompt_for(text: &str) -> String {
    format!("Explain this slide in 3\u{2013}5 sentences:\n\n{text}")
}

/// Narrate `text`, replacing any failure with [`FALLBACK_NARRATION`].
pub fn narrate_or_fallback(narrator: &dyn Narrator, text: &str) -> String {
    match narrator.narrate(text) {
        Ok(narration) => narration.text,
        Err(e) => {
            warn!("narration unavailable: {e}");
            FALLBACK_NARRATION.to_string()
        }
    }
}

/// Anthropic Messages API client.
pub struct ClaudeNarrator {
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    agent: ureq::Agent,
}

impl ClaudeNarrator {
    pub fn new(api_key: Option<String>, model: &str, max_tokens: u32) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(REQUEST_TIMEOUT))
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            api_key,
            model: model.to_string(),
            max_tokens,
            agent,
        }
    }

    fn request_body(&self, text: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": [{
                "role": "user",
                "content": prompt_for(text)
            }]
        })
    }
}

impl Narrator for ClaudeNarrator {
    fn narrate(&self, text: &str) -> Result<Narration, NarrationError> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(NarrationError::MissingApiKey)?;

        debug!(model = %self.model, chars = text.len(), "requesting narration");
        let mut response = self
            .agent
            .post(MESSAGES_URL)
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .header("Content-Type", "application/json")
            .send_json(self.request_body(text))
            .map_err(|e| NarrationError::Transport(e.to_string()))?;

        let status = response.status();
        let raw: serde_json::Value = response
            .body_mut()
            .read_json()
            .map_err(|e| NarrationError::Transport(e.to_string()))?;

        if !status.is_success() {
            let message = raw["error"]["message"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            return Err(NarrationError::Api(message));
        }

        let text = first_text_block(&raw).ok_or(NarrationError::EmptyResponse)?;
        Ok(Narration { text, raw })
    }
}

/// Pull the first `text` content block out of a Messages API response.
fn first_text_block(raw: &serde_json::Value) -> Option<String> {
    raw["content"]
        .as_array()?
        .iter()
        .find(|block| block["type"] == "text")
        .and_then(|block| block["text"].as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingNarrator;

    impl Narrator for FailingNarrator {
        fn narrate(&self, _text: &str) -> Result<Narration, NarrationError> {
            Err(NarrationError::Transport("offline".into()))
        }
    }

    struct EchoNarrator;

    impl Narrator for EchoNarrator {
        fn narrate(&self, text: &str) -> Result<Narration, NarrationError> {
            Ok(Narration {
                text: format!("About: {text}"),
                raw: serde_json::Value::Null,
            })
        }
    }

    #[test]
    fn test_prompt_template() {
        assert_eq!(
            prompt_for("Q3 revenue"),
            "Explain this slide in 3\u{2013}5 sentences:\n\nQ3 revenue"
        );
    }

    #[test]
    fn test_failure_becomes_fallback() {
        assert_eq!(
            narrate_or_fallback(&FailingNarrator, "anything"),
            FALLBACK_NARRATION
        );
    }

    #[test]
    fn test_success_passes_through() {
        assert_eq!(narrate_or_fallback(&EchoNarrator, "x"), "About: x");
    }

    #[test]
    fn test_missing_key_fails_without_request() {
        let narrator = ClaudeNarrator::new(None, "claude-sonnet-4-5", 300);
        assert!(matches!(
            narrator.narrate("text"),
            Err(NarrationError::MissingApiKey)
        ));
        let narrator = ClaudeNarrator::new(Some(String::new()), "claude-sonnet-4-5", 300);
        assert!(matches!(
            narrator.narrate("text"),
            Err(NarrationError::MissingApiKey)
        ));
    }

    #[test]
    fn test_request_body() {
        let narrator = ClaudeNarrator::new(Some("k".into()), "claude-sonnet-4-5", 300);
        let body = narrator.request_body("hello");
        assert_eq!(body["model"], "claude-sonnet-4-5");
        assert_eq!(body["max_tokens"], 300);
        assert_eq!(body["messages"][0]["role"], "user");
        assert!(
            body["messages"][0]["content"]
                .as_str()
                .unwrap()
                .ends_with("hello")
        );
    }

    #[test]
    fn test_first_text_block() {
        let raw = serde_json::json!({
            "content": [
                {"type": "tool_use", "id": "x"},
                {"type": "text", "text": "  This slide shows growth.  "}
            ]
        });
        assert_eq!(
            first_text_block(&raw).as_deref(),
            Some("This slide shows growth.")
        );
        assert_eq!(first_text_block(&serde_json::json!({"content": []})), None);
        assert_eq!(first_text_block(&serde_json::json!({})), None);
    }
}
