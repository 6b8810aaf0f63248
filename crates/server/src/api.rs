//! HTTP surface.
//!
//! - `POST /messages` run one customer turn
//! - `GET  /metrics`  operational counters
//! - `GET  /health`   liveness

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use switchboard_agent::runtime::AgentRuntime;
use switchboard_core::domain::message::TurnRequest;
use switchboard_core::errors::InterfaceError;
use switchboard_core::knowledge::Citation;
use switchboard_core::metrics::MetricsSnapshot;
use tracing::{info_span, warn, Instrument};

use crate::health::health;
use crate::trace::{trace_id_from, TRACE_HEADER};

const INVALID_JSON_MESSAGE: &str = "invalid request body";

#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<AgentRuntime>,
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    #[serde(default)]
    pub conversation_id: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub reply: String,
    pub action: String,
    pub agent: String,
    pub history_count: usize,
    pub trace_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub citations: Vec<Citation>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/messages", post(post_message))
        .route("/metrics", get(get_metrics))
        .route("/health", get(health))
        .with_state(state)
}

async fn post_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<MessageRequest>, JsonRejection>,
) -> Response {
    let trace_id = trace_id_from(&headers);

    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            warn!(
                event_name = "api.messages.bad_json",
                trace_id = %trace_id,
                error = %rejection.body_text(),
                "rejected malformed request body"
            );
            return with_trace(
                &trace_id,
                StatusCode::BAD_REQUEST,
                ErrorResponse { error: INVALID_JSON_MESSAGE.to_string() },
            );
        }
    };

    let request = match TurnRequest::new(body.conversation_id, body.message) {
        Ok(request) => request,
        Err(error) => {
            let interface = error.into_interface(trace_id.clone());
            warn!(
                event_name = "api.messages.invalid_request",
                trace_id = %trace_id,
                error = %interface,
                "rejected request with missing fields"
            );
            return interface_error(&interface);
        }
    };

    let span = info_span!(
        "turn",
        trace_id = %trace_id,
        conversation_id = %request.conversation_id
    );
    let outcome = state.runtime.handle_turn(&trace_id, &request).instrument(span).await;

    with_trace(
        &trace_id,
        StatusCode::OK,
        MessageResponse {
            reply: outcome.reply,
            action: outcome.action,
            agent: outcome.agent,
            history_count: outcome.history_count,
            trace_id: trace_id.clone(),
            citations: outcome.citations,
        },
    )
}

async fn get_metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.runtime.metrics().snapshot())
}

fn interface_error(error: &InterfaceError) -> Response {
    let status = match error {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
    };
    with_trace(
        error.correlation_id(),
        status,
        ErrorResponse { error: error.user_message().to_string() },
    )
}

fn with_trace<T: Serialize>(trace_id: &str, status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    if let Ok(value) = HeaderValue::from_str(trace_id) {
        response.headers_mut().insert(HeaderName::from_static(TRACE_HEADER), value);
    }
    response
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use axum::Router;
    use serde_json::Value;
    use switchboard_agent::llm::{LanguageModel, LlmError, RouterDecision};
    use switchboard_agent::runtime::{AgentRuntime, RuntimeSettings};
    use switchboard_agent::SpecialistRegistry;
    use switchboard_core::{ConversationStore, KnowledgeRetriever, Metrics};
    use tower::ServiceExt;

    use super::{router, AppState};

    struct AskingModel;

    #[async_trait]
    impl LanguageModel for AskingModel {
        async fn route_agent(
            &self,
            _trace_id: &str,
            _message: &str,
            _recent_history: &[String],
        ) -> Result<RouterDecision, LlmError> {
            Err(LlmError::EmptyResponse)
        }

        async fn generate_text(
            &self,
            _trace_id: &str,
            _system_prompt: &str,
            _user_prompt: &str,
        ) -> Result<String, LlmError> {
            Ok(r#"{"action":"ask","message":"Entendi.","next_question":"Qual banco?"}"#.to_string())
        }
    }

    fn app() -> (Router, Arc<ConversationStore>) {
        let store = Arc::new(ConversationStore::default());
        let retriever = KnowledgeRetriever::from_text(
            "knowledge.md",
            "# Open Finance\nConecte bancos pelo navegador.\n",
        );
        let runtime = AgentRuntime::new(
            Arc::clone(&store),
            Arc::new(Metrics::new()),
            SpecialistRegistry::builtin(),
            RuntimeSettings::default(),
        )
        .with_model(Arc::new(AskingModel))
        .with_retriever(Arc::new(retriever));

        (router(AppState { runtime: Arc::new(runtime) }), store)
    }

    fn post(body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/messages")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn message_round_trip_echoes_trace_id() {
        let (app, store) = app();
        let mut request = post(r#"{"conversation_id":"c-1","message":"quero conectar o banco"}"#);
        request.headers_mut().insert("x-trace-id", "trace-abc".parse().expect("header"));

        let response = app.oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-trace-id"], "trace-abc");
        let body = json_body(response).await;
        assert_eq!(body["trace_id"], "trace-abc");
        assert_eq!(body["action"], "ask");
        assert_eq!(body["agent"], "atendimento_geral");
        assert_eq!(body["history_count"], 2);
        assert_eq!(body["reply"], "Entendi.\n\nQual banco?");
        assert_eq!(body["citations"][0]["title"], "Open Finance");
        assert_eq!(store.len("c-1"), 2);
    }

    #[tokio::test]
    async fn citations_are_omitted_when_nothing_matches() {
        let (app, _) = app();
        let response =
            app.oneshot(post(r#"{"conversation_id":"c-2","message":"bom dia"}"#)).await.expect("ok");

        assert_eq!(response.status(), StatusCode::OK);
        let trace = response.headers()["x-trace-id"].to_str().expect("ascii").to_string();
        assert_eq!(trace.len(), 32);
        let body = json_body(response).await;
        assert!(body.get("citations").is_none());
    }

    #[tokio::test]
    async fn missing_fields_are_rejected_without_touching_state() {
        let (app, store) = app();

        for payload in [r#"{"message":"oi"}"#, r#"{"conversation_id":"c-3","message":"   "}"#] {
            let response = app.clone().oneshot(post(payload)).await.expect("response");
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body = json_body(response).await;
            assert_eq!(body["error"], "conversation_id and message are required");
        }

        assert_eq!(store.conversation_count(), 0);
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        let (app, _) = app();
        let response = app.oneshot(post("{not json")).await.expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().contains_key("x-trace-id"));
        let body = json_body(response).await;
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn metrics_and_health_endpoints() {
        let (app, _) = app();
        app.clone()
            .oneshot(post(r#"{"conversation_id":"c-4","message":"oi"}"#))
            .await
            .expect("turn");

        let metrics = app
            .clone()
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).expect("request"))
            .await
            .expect("metrics");
        assert_eq!(metrics.status(), StatusCode::OK);
        let body = json_body(metrics).await;
        assert_eq!(body["total_requests"], 1);
        assert_eq!(body["requests_by_agent"]["atendimento_geral"], 1);

        let health = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
            .await
            .expect("health");
        assert_eq!(health.status(), StatusCode::OK);
        let bytes = to_bytes(health.into_body(), usize::MAX).await.expect("body");
        assert_eq!(&bytes[..], b"ok");
    }
}
