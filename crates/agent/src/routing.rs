use switchboard_core::config::RoutingMode;
use switchboard_core::domain::message::ChatMessage;
use tracing::{info, warn};

use crate::llm::{LanguageModel, ROUTER_HISTORY_LINES};
use crate::personas::{ATENDIMENTO_GERAL, CRIACAO_CONTA, GOLPE_MED, OPEN_FINANCE};
use crate::registry::SpecialistRegistry;

const FRAUD_TERMS: &[&str] = &["golpe", "fraude", "pix", "invad", "hack"];
const BANK_LINK_TERMS: &[&str] = &[
    "open finance",
    "conectar",
    "vincular",
    "itau",
    "itaú",
    "nubank",
    "inter",
    "bradesco",
    "santander",
];
const ACCOUNT_OPENING_TERMS: &[&str] =
    &["abrir conta", "criar conta", "cadastro", "selfie", "documento", "cpf", "cnpj"];

/// Where a freshly routed conversation's specialist came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteSource {
    Intake,
    Keyword,
    Model,
    ModelFallback,
}

impl RouteSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Intake => "intake",
            Self::Keyword => "keyword",
            Self::Model => "model",
            Self::ModelFallback => "model_fallback",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route {
    pub agent: String,
    pub source: RouteSource,
}

/// Deterministic first-match keyword heuristic over the lower-cased message.
pub fn keyword_route(message: &str) -> &'static str {
    let normalized = message.to_lowercase();
    let mentions = |terms: &[&str]| terms.iter().any(|term| normalized.contains(term));

    if mentions(FRAUD_TERMS) {
        GOLPE_MED
    } else if mentions(BANK_LINK_TERMS) {
        OPEN_FINANCE
    } else if mentions(ACCOUNT_OPENING_TERMS) {
        CRIACAO_CONTA
    } else {
        ATENDIMENTO_GERAL
    }
}

/// Picks the first specialist for a conversation that has none yet.
#[derive(Clone, Debug)]
pub struct IntakeRouter {
    mode: RoutingMode,
    default_agent: String,
}

impl IntakeRouter {
    pub fn new(mode: RoutingMode, default_agent: impl Into<String>) -> Self {
        Self { mode, default_agent: default_agent.into() }
    }

    pub async fn route(
        &self,
        model: Option<&dyn LanguageModel>,
        registry: &SpecialistRegistry,
        trace_id: &str,
        message: &str,
        history: &[ChatMessage],
    ) -> Route {
        match self.mode {
            RoutingMode::Intake => {
                Route { agent: self.default_agent.clone(), source: RouteSource::Intake }
            }
            RoutingMode::Keyword => self.by_keyword(RouteSource::Keyword, message),
            RoutingMode::Model => match model {
                Some(model) => self.by_model(model, registry, trace_id, message, history).await,
                None => self.by_keyword(RouteSource::ModelFallback, message),
            },
        }
    }

    async fn by_model(
        &self,
        model: &dyn LanguageModel,
        registry: &SpecialistRegistry,
        trace_id: &str,
        message: &str,
        history: &[ChatMessage],
    ) -> Route {
        let recent = recent_history_lines(history);
        match model.route_agent(trace_id, message, &recent).await {
            Ok(decision) if registry.contains(&decision.agent) => {
                info!(
                    event_name = "orchestrator.routed_by_model",
                    trace_id = %trace_id,
                    agent = %decision.agent,
                    confidence = decision.confidence,
                    reason = %decision.reason,
                    "model routing decision accepted"
                );
                Route { agent: decision.agent, source: RouteSource::Model }
            }
            Ok(decision) => {
                warn!(
                    event_name = "orchestrator.router_unknown_agent",
                    trace_id = %trace_id,
                    agent = %decision.agent,
                    "model routed to an unregistered specialist, using keyword heuristic"
                );
                self.by_keyword(RouteSource::ModelFallback, message)
            }
            Err(error) => {
                warn!(
                    event_name = "orchestrator.router_error",
                    trace_id = %trace_id,
                    error = %error,
                    "model routing failed, using keyword heuristic"
                );
                self.by_keyword(RouteSource::ModelFallback, message)
            }
        }
    }

    fn by_keyword(&self, source: RouteSource, message: &str) -> Route {
        let agent = keyword_route(message);
        // the heuristic's catch-all is the configured intake specialist
        let agent =
            if agent == ATENDIMENTO_GERAL { self.default_agent.clone() } else { agent.to_string() };
        Route { agent, source }
    }
}

/// The last few history entries rendered as `role: text` lines, oldest first.
fn recent_history_lines(history: &[ChatMessage]) -> Vec<String> {
    let start = history.len().saturating_sub(ROUTER_HISTORY_LINES);
    history[start..]
        .iter()
        .map(|message| format!("{}: {}", message.role.as_str(), message.text))
        .collect()
}
