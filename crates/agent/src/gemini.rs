use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use switchboard_core::config::LlmConfig;
use switchboard_core::DEFAULT_AGENT;
use tracing::debug;

use crate::llm::{
    strip_code_fence, LanguageModel, LlmError, RouterDecision, ROUTER_HISTORY_LINES,
};

const ROUTER_SYSTEM_PROMPT: &str = "Você é o roteador de atendimento do Jota.\n\
Responda SOMENTE com um JSON no formato {\"agent\": \"<id>\", \"confidence\": 0.0, \"reason\": \"...\"}.\n\n\
Especialistas disponíveis:\n\
- atendimento_geral: dúvidas gerais e saudações\n\
- open_finance: conexão com outros bancos e compartilhamento de dados\n\
- golpe_med: golpe, Pix fraudulento, conta invadida, devolução via MED\n\
- criacao_conta: abertura de conta, selfie, documentos, CPF/CNPJ";

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Google Gemini `generateContent` client.
pub struct GeminiClient {
    http: Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    router_model: String,
    timeout: Duration,
    route_timeout: Duration,
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("router_model", &self.router_model)
            .field("timeout", &self.timeout)
            .field("route_timeout", &self.route_timeout)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    pub fn new(api_key: SecretString, config: &LlmConfig) -> Result<Self, LlmError> {
        let http =
            Client::builder().build().map_err(|error| LlmError::Transport(redacted(error)))?;

        Ok(Self {
            http,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            router_model: config.router_model.clone().unwrap_or_else(|| config.model.clone()),
            timeout: Duration::from_secs(config.timeout_secs),
            route_timeout: Duration::from_secs(config.route_timeout_secs),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    async fn generate(&self, model: &str, body: Value) -> Result<String, LlmError> {
        let response = self
            .http
            .post(self.endpoint(model))
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|error| LlmError::Transport(redacted(error)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { status: status.as_u16(), body });
        }

        let payload: GenerateContentResponse =
            response.json().await.map_err(|error| LlmError::Decode(redacted(error)))?;
        extract_text(payload)
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn route_agent(
        &self,
        trace_id: &str,
        message: &str,
        recent_history: &[String],
    ) -> Result<RouterDecision, LlmError> {
        let prompt = router_user_prompt(trace_id, message, recent_history);
        let body = request_body(ROUTER_SYSTEM_PROMPT, &prompt);
        let raw = with_timeout(self.route_timeout, self.generate(&self.router_model, body)).await?;
        debug!(event_name = "llm.router_raw_output", trace_id = %trace_id, raw = %raw);

        parse_router_decision(&raw)
    }

    async fn generate_text(
        &self,
        trace_id: &str,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, LlmError> {
        debug!(event_name = "llm.generate_text", trace_id = %trace_id, model = %self.model);
        let body = request_body(system_prompt, user_prompt);
        with_timeout(self.timeout, self.generate(&self.model, body)).await
    }
}

async fn with_timeout<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, LlmError>>,
) -> Result<T, LlmError> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(LlmError::Timeout { seconds: limit.as_secs() }),
    }
}

/// reqwest errors render the request URL; keep it out of anything that gets logged.
fn redacted(error: reqwest::Error) -> String {
    error.without_url().to_string()
}

fn request_body(system_prompt: &str, user_prompt: &str) -> Value {
    json!({
        "systemInstruction": { "parts": [{ "text": system_prompt }] },
        "contents": [{ "role": "user", "parts": [{ "text": user_prompt }] }],
        "generationConfig": { "responseMimeType": "application/json" },
    })
}

fn router_user_prompt(trace_id: &str, message: &str, recent_history: &[String]) -> String {
    let mut prompt = format!("trace_id: {trace_id}\n\nHistórico recente:\n");
    for line in recent_history.iter().take(ROUTER_HISTORY_LINES) {
        prompt.push_str("- ");
        prompt.push_str(line);
        prompt.push('\n');
    }
    prompt.push_str("\nMensagem atual:\n");
    prompt.push_str(message);
    prompt.push('\n');
    prompt
}

fn parse_router_decision(raw: &str) -> Result<RouterDecision, LlmError> {
    let mut decision: RouterDecision = serde_json::from_str(strip_code_fence(raw))
        .map_err(|error| LlmError::Decode(format!("router decision: {error}")))?;
    decision.agent = decision.agent.trim().to_string();
    if decision.agent.is_empty() {
        decision.agent = DEFAULT_AGENT.to_string();
    }
    Ok(decision)
}

fn extract_text(payload: GenerateContentResponse) -> Result<String, LlmError> {
    let text = payload
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content.parts.into_iter().filter_map(|part| part.text).collect::<Vec<_>>().join("")
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    Ok(text)
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use secrecy::SecretString;
    use switchboard_core::config::AppConfig;

    use super::{
        extract_text, parse_router_decision, request_body, router_user_prompt, with_timeout,
        GeminiClient, GenerateContentResponse,
    };
    use crate::llm::{LanguageModel, LlmError};

    #[test]
    fn request_body_carries_system_instruction_and_json_mime_type() {
        let body = request_body("sistema", "usuario");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "sistema");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "usuario");
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
    }

    #[test]
    fn router_prompt_keeps_at_most_six_history_lines() {
        let history = (0..10).map(|i| format!("linha {i}")).collect::<Vec<_>>();
        let prompt = router_user_prompt("trace-1", "fui vítima de golpe", &history);

        assert!(prompt.contains("trace_id: trace-1"));
        assert!(prompt.contains("- linha 5"));
        assert!(!prompt.contains("- linha 6"));
        assert!(prompt.ends_with("fui vítima de golpe\n"));
    }

    #[test]
    fn router_decision_defaults_empty_agent_to_intake() {
        let decision = parse_router_decision("```json\n{\"agent\": \"  \"}\n```").expect("parse");
        assert_eq!(decision.agent, "atendimento_geral");

        let decision = parse_router_decision("{\"agent\":\"golpe_med\",\"confidence\":0.9}")
            .expect("parse");
        assert_eq!(decision.agent, "golpe_med");

        assert!(matches!(parse_router_decision("golpe_med"), Err(LlmError::Decode(_))));
    }

    #[test]
    fn response_text_joins_parts_of_first_candidate() {
        let payload: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"action\":"},{"text":"\"reply\"}"}]}}]}"#,
        )
        .expect("payload");
        assert_eq!(extract_text(payload).expect("text"), "{\"action\":\"reply\"}");
    }

    #[test]
    fn missing_candidates_is_an_empty_response() {
        let payload: GenerateContentResponse = serde_json::from_str("{}").expect("payload");
        assert!(matches!(extract_text(payload), Err(LlmError::EmptyResponse)));
    }

    #[tokio::test]
    async fn slow_calls_time_out() {
        let result = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, LlmError>("late".to_string())
        })
        .await;
        assert!(matches!(result, Err(LlmError::Timeout { .. })));
    }

    #[tokio::test]
    async fn transport_errors_never_contain_the_key() {
        let mut config = AppConfig::default();
        config.llm.base_url = "http://127.0.0.1:1".to_string();
        config.llm.timeout_secs = 5;
        let key = SecretString::from("SUPER-SECRET-KEY".to_string());
        let client = GeminiClient::new(key, &config.llm).expect("client");

        let error = client
            .generate_text("trace-1", "sistema", "usuario")
            .await
            .expect_err("nothing listens on port 1");

        assert!(!error.to_string().contains("SUPER-SECRET-KEY"));
        assert!(!format!("{error:?}").contains("SUPER-SECRET-KEY"));
    }

    #[test]
    fn debug_output_never_contains_the_key() {
        let config = AppConfig::default();
        let key = SecretString::from("super-secret-key".to_string());
        let client = GeminiClient::new(key, &config.llm).expect("client");

        let debug = format!("{client:?}");
        assert!(!debug.contains("super-secret-key"));
        assert!(client.endpoint(client.model()).ends_with(":generateContent"));
    }
}
