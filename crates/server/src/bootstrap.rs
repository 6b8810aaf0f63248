use std::sync::Arc;

use switchboard_agent::gemini::GeminiClient;
use switchboard_agent::guardrails::TransferPolicy;
use switchboard_agent::llm::LlmError;
use switchboard_agent::registry::SpecialistRegistry;
use switchboard_agent::routing::IntakeRouter;
use switchboard_agent::runtime::{AgentRuntime, RuntimeSettings};
use switchboard_core::config::{AppConfig, ConfigError, LoadOptions};
use switchboard_core::knowledge::KnowledgeRetriever;
use switchboard_core::{ConversationStore, Metrics};
use thiserror::Error;
use tracing::{info, warn};

use crate::api::AppState;

pub struct Application {
    pub config: AppConfig,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("language model client could not be built: {0}")]
    Model(#[source] LlmError),
    #[error("default agent `{agent}` is not a registered specialist (known: {known})")]
    UnknownDefaultAgent { agent: String, known: String },
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        trace_id = "bootstrap",
        "starting application bootstrap"
    );

    let store = Arc::new(ConversationStore::new(config.conversation.history_depth));
    let metrics = Arc::new(Metrics::new());
    let settings = RuntimeSettings::from_config(&config.orchestration, &config.knowledge);

    let registry = SpecialistRegistry::builtin();
    if !registry.contains(&config.orchestration.default_agent) {
        return Err(BootstrapError::UnknownDefaultAgent {
            agent: config.orchestration.default_agent.clone(),
            known: registry.names().collect::<Vec<_>>().join(", "),
        });
    }

    let mut runtime = AgentRuntime::new(store, metrics, registry, settings)
        .with_router(IntakeRouter::new(
            config.orchestration.routing,
            config.orchestration.default_agent.clone(),
        ))
        .with_transfer_policy(TransferPolicy::new(
            config.orchestration.transfer_policy,
            config.orchestration.default_agent.clone(),
        ));

    match KnowledgeRetriever::from_path(&config.knowledge.path) {
        Ok(retriever) => {
            info!(
                event_name = "system.bootstrap.knowledge_loaded",
                trace_id = "bootstrap",
                source = %retriever.source(),
                sections = retriever.chunks().len(),
                "knowledge base loaded"
            );
            runtime = runtime.with_retriever(Arc::new(retriever));
        }
        Err(error) => {
            warn!(
                event_name = "system.bootstrap.knowledge_unavailable",
                trace_id = "bootstrap",
                error = %error,
                "continuing without a knowledge base"
            );
        }
    }

    match config.llm.api_key.clone() {
        Some(api_key) if config.llm.is_usable() => {
            let client = GeminiClient::new(api_key, &config.llm).map_err(BootstrapError::Model)?;
            info!(
                event_name = "system.bootstrap.model_ready",
                trace_id = "bootstrap",
                model = %client.model(),
                "language model client configured"
            );
            runtime = runtime.with_model(Arc::new(client));
        }
        _ => {
            warn!(
                event_name = "system.bootstrap.model_disabled",
                trace_id = "bootstrap",
                "no usable language model configured, every turn will get the greeting fallback"
            );
        }
    }

    info!(
        event_name = "system.bootstrap.ready",
        trace_id = "bootstrap",
        routing = ?config.orchestration.routing,
        transfer_policy = ?config.orchestration.transfer_policy,
        max_iterations = config.orchestration.max_iterations,
        "application bootstrap complete"
    );

    Ok(Application { config, state: AppState { runtime: Arc::new(runtime) } })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use switchboard_core::config::{AppConfig, LlmProvider, LoadOptions};
    use switchboard_core::domain::message::TurnRequest;

    use super::{bootstrap, bootstrap_with_config, BootstrapError};

    fn offline_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.llm.provider = LlmProvider::Disabled;
        config.llm.api_key = None;
        config
    }

    #[tokio::test]
    async fn missing_knowledge_file_and_model_are_not_fatal() {
        let mut config = offline_config();
        config.knowledge.path = "does/not/exist.md".into();

        let app = bootstrap_with_config(config).await.expect("bootstrap");
        let runtime = &app.state.runtime;
        assert!(!runtime.has_model());

        let request = TurnRequest::new("c-1", "oi").expect("valid request");
        let outcome = runtime.handle_turn("trace-1", &request).await;
        assert_eq!(outcome.reply, switchboard_agent::runtime::GREETING_FALLBACK);
        assert_eq!(outcome.history_count, 2);
        assert!(outcome.citations.is_empty());
    }

    #[tokio::test]
    async fn knowledge_file_feeds_citations() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "# Pix\nO Pix funciona 24 horas por dia.").expect("write kb");

        let mut config = offline_config();
        config.knowledge.path = file.path().to_path_buf();
        config.conversation.history_depth = 4;

        let app = bootstrap_with_config(config).await.expect("bootstrap");
        let runtime = &app.state.runtime;

        let request = TurnRequest::new("c-2", "como funciona o pix?").expect("valid request");
        let outcome = runtime.handle_turn("trace-2", &request).await;
        assert_eq!(outcome.citations.len(), 1);
        assert_eq!(outcome.citations[0].title, "Pix");

        for _ in 0..3 {
            runtime.handle_turn("trace-2", &request).await;
        }
        assert_eq!(runtime.store().len("c-2"), 4);
    }

    #[tokio::test]
    async fn unregistered_default_agent_fails_fast() {
        let mut config = offline_config();
        config.orchestration.default_agent = "suporte_cartao".to_string();

        let result = bootstrap_with_config(config).await;

        match result {
            Err(BootstrapError::UnknownDefaultAgent { agent, known }) => {
                assert_eq!(agent, "suporte_cartao");
                assert!(known.contains("atendimento_geral"));
            }
            Err(other) => panic!("unexpected bootstrap error: {other}"),
            Ok(_) => panic!("bootstrap should reject an unregistered default agent"),
        }
    }

    #[tokio::test]
    async fn required_config_file_must_exist() {
        let result = bootstrap(LoadOptions {
            config_path: Some("does/not/exist/switchboard.toml".into()),
            require_file: true,
            ..LoadOptions::default()
        })
        .await;

        assert!(matches!(result, Err(BootstrapError::Config(_))));
    }

    #[tokio::test]
    async fn usable_llm_section_builds_a_client() {
        let mut config = AppConfig::default();
        config.llm.provider = LlmProvider::Gemini;
        config.llm.api_key = Some(String::from("test-key").into());
        config.knowledge.path = "does/not/exist.md".into();

        let app = bootstrap_with_config(config).await.expect("bootstrap");
        assert!(app.state.runtime.has_model());
    }
}
