use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lines of recent history handed to the routing classifier.
pub const ROUTER_HISTORY_LINES: usize = 6;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RouterDecision {
    #[serde(default)]
    pub agent: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("language model call timed out after {seconds}s")]
    Timeout { seconds: u64 },
    #[error("language model transport failure: {0}")]
    Transport(String),
    #[error("language model returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("language model returned no text")]
    EmptyResponse,
    #[error("could not decode language model output: {0}")]
    Decode(String),
}

/// The only capability the orchestration core needs from a generative model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// One-shot classification of which specialist should own a new conversation.
    async fn route_agent(
        &self,
        trace_id: &str,
        message: &str,
        recent_history: &[String],
    ) -> Result<RouterDecision, LlmError>;

    /// Raw text completion; specialists expect a JSON action plan back.
    async fn generate_text(
        &self,
        trace_id: &str,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, LlmError>;
}

/// Unwraps a reply the model wrapped in a markdown code fence (```json ... ```).
/// Text without a fence is returned trimmed.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(after_open) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    let body = match after_open.find('\n') {
        Some(newline) => &after_open[newline + 1..],
        None => after_open,
    };
    match body.rfind("```") {
        Some(close) => body[..close].trim(),
        None => body.trim(),
    }
}
