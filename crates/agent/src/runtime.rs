use std::sync::Arc;

use serde::Serialize;
use switchboard_core::config::{KnowledgeConfig, OrchestrationConfig, RoutingMode, TransferMode};
use switchboard_core::domain::message::{ChatMessage, TurnRequest};
use switchboard_core::domain::plan::{ActionPlan, PlanAction};
use switchboard_core::knowledge::{render_context, Citation, KnowledgeRetriever};
use switchboard_core::{ConversationStore, Metrics, DEFAULT_AGENT};
use tracing::{info, warn};

use crate::guardrails::{TransferDecision, TransferPolicy, TransferRequest};
use crate::llm::LanguageModel;
use crate::registry::SpecialistRegistry;
use crate::routing::IntakeRouter;
use crate::specialist::SpecialistError;

pub const GREETING_FALLBACK: &str = "Olá! Eu sou a Aline do Jota. Como posso te ajudar hoje?";
pub const APOLOGY_FALLBACK: &str =
    "Desculpe, tive um problema técnico momentâneo. Pode repetir, por favor?";
pub const GENERIC_PROMPT: &str = "Como posso te ajudar com isso?";
pub const GENERIC_ACK: &str = "Certo! Posso te ajudar em mais alguma coisa?";
pub const ESCALATION_APOLOGY: &str = "Sinto muito pelo transtorno.";
pub const HUMAN_HANDOFF_NOTICE: &str = "Vou transferir seu atendimento para um especialista \
     humano, que já vai receber todo o histórico desta conversa.";
pub const EXTERNAL_ACTION_ACK: &str = "Certo, vou verificar isso para você.";
pub const SECURITY_PROTOCOL_NOTICE: &str =
    "Por segurança, ativei nosso protocolo de verificação e retorno em seguida.";

/// Why a turn ended on a fixed reply instead of a specialist's plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    ModelUnavailable,
    UnknownSpecialist,
    SpecialistFailed,
    MalformedPlan,
    HandoffCapExceeded,
    TransferRejected,
}

impl FallbackReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ModelUnavailable => "model_unavailable",
            Self::UnknownSpecialist => "unknown_specialist",
            Self::SpecialistFailed => "specialist_failed",
            Self::MalformedPlan => "malformed_plan",
            Self::HandoffCapExceeded => "handoff_cap_exceeded",
            Self::TransferRejected => "transfer_rejected",
        }
    }

    fn reply(self) -> &'static str {
        match self {
            Self::SpecialistFailed | Self::MalformedPlan => APOLOGY_FALLBACK,
            _ => GREETING_FALLBACK,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TurnOutcome {
    pub reply: String,
    pub action: String,
    pub agent: String,
    pub history_count: usize,
    pub citations: Vec<Citation>,
    pub handoffs: usize,
    pub fallback: Option<FallbackReason>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub max_iterations: usize,
    pub top_k: usize,
    pub citation_limit: usize,
    pub default_agent: String,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            top_k: 3,
            citation_limit: 2,
            default_agent: DEFAULT_AGENT.to_string(),
        }
    }
}

impl RuntimeSettings {
    pub fn from_config(orchestration: &OrchestrationConfig, knowledge: &KnowledgeConfig) -> Self {
        Self {
            max_iterations: orchestration.max_iterations,
            top_k: knowledge.top_k,
            citation_limit: knowledge.citation_limit,
            default_agent: orchestration.default_agent.clone(),
        }
    }
}

struct Resolution {
    reply: String,
    action: PlanAction,
    fallback: Option<FallbackReason>,
}

impl Resolution {
    fn fallback(reason: FallbackReason) -> Self {
        let reply = reason.reply().to_string();
        Self { reply, action: PlanAction::Reply, fallback: Some(reason) }
    }
}

/// Runs one customer turn through routing, the bounded handoff loop and reply rendering.
pub struct AgentRuntime {
    store: Arc<ConversationStore>,
    metrics: Arc<Metrics>,
    registry: SpecialistRegistry,
    model: Option<Arc<dyn LanguageModel>>,
    retriever: Option<Arc<KnowledgeRetriever>>,
    router: IntakeRouter,
    transfer_policy: TransferPolicy,
    settings: RuntimeSettings,
}

impl AgentRuntime {
    pub fn new(
        store: Arc<ConversationStore>,
        metrics: Arc<Metrics>,
        registry: SpecialistRegistry,
        settings: RuntimeSettings,
    ) -> Self {
        let router = IntakeRouter::new(RoutingMode::Intake, settings.default_agent.clone());
        let transfer_policy =
            TransferPolicy::new(TransferMode::FallbackToDefault, settings.default_agent.clone());
        Self {
            store,
            metrics,
            registry,
            model: None,
            retriever: None,
            router,
            transfer_policy,
            settings,
        }
    }

    pub fn with_model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_retriever(mut self, retriever: Arc<KnowledgeRetriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn with_router(mut self, router: IntakeRouter) -> Self {
        self.router = router;
        self
    }

    pub fn with_transfer_policy(mut self, transfer_policy: TransferPolicy) -> Self {
        self.transfer_policy = transfer_policy;
        self
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    pub async fn handle_turn(&self, trace_id: &str, request: &TurnRequest) -> TurnOutcome {
        let conversation_id = request.conversation_id.as_str();
        let message = request.message.as_str();

        self.store.add(conversation_id, ChatMessage::user(message));
        info!(
            event_name = "orchestrator.turn_received",
            trace_id = %trace_id,
            conversation_id = %conversation_id,
            message_chars = message.chars().count(),
            "customer turn received"
        );

        let mut agent = self.resolve_agent(trace_id, conversation_id, message).await;
        let (knowledge_context, citations) = self.retrieve(trace_id, conversation_id, message);

        let mut handoffs = 0;
        let mut resolution = None;

        for _ in 0..self.settings.max_iterations.max(1) {
            let Some(model) = self.model.as_deref() else {
                resolution = Some(Resolution::fallback(FallbackReason::ModelUnavailable));
                break;
            };
            let Some(specialist) = self.registry.get(&agent) else {
                warn!(
                    event_name = "orchestrator.unknown_specialist",
                    trace_id = %trace_id,
                    conversation_id = %conversation_id,
                    agent = %agent,
                    "no specialist registered under this name"
                );
                resolution = Some(Resolution::fallback(FallbackReason::UnknownSpecialist));
                break;
            };

            let history = self.store.get(conversation_id);
            let plan = match specialist
                .run(model, trace_id, &history, message, &knowledge_context)
                .await
            {
                Ok(plan) => plan,
                Err(SpecialistError::MalformedPlan { raw, reason }) => {
                    warn!(
                        event_name = "orchestrator.malformed_plan",
                        trace_id = %trace_id,
                        conversation_id = %conversation_id,
                        agent = %agent,
                        reason = %reason,
                        raw = %raw,
                        "specialist output could not be parsed as an action plan"
                    );
                    resolution = Some(Resolution::fallback(FallbackReason::MalformedPlan));
                    break;
                }
                Err(SpecialistError::Model(error)) => {
                    warn!(
                        event_name = "orchestrator.specialist_error",
                        trace_id = %trace_id,
                        conversation_id = %conversation_id,
                        agent = %agent,
                        error = %error,
                        "specialist call failed"
                    );
                    resolution = Some(Resolution::fallback(FallbackReason::SpecialistFailed));
                    break;
                }
            };

            if !plan.action.is_transfer() {
                resolution = Some(self.render(trace_id, conversation_id, &agent, plan));
                break;
            }

            let target = plan.requested_target().unwrap_or(self.settings.default_agent.as_str());
            let allowed_targets = specialist.transfer_targets();
            let decision = self.transfer_policy.evaluate(&TransferRequest {
                from: &agent,
                target,
                allowed_targets: &allowed_targets,
                target_registered: self.registry.contains(target),
            });

            let next = match &decision {
                TransferDecision::Allow { target } => target.clone(),
                TransferDecision::Degrade { target: fallback, reason_code } => {
                    warn!(
                        event_name = "orchestrator.transfer_degraded",
                        trace_id = %trace_id,
                        conversation_id = %conversation_id,
                        from = %agent,
                        requested = %target,
                        to = %fallback,
                        reason_code = %reason_code,
                        "transfer target replaced by the default specialist"
                    );
                    fallback.clone()
                }
                TransferDecision::Deny { reason_code } => {
                    warn!(
                        event_name = "orchestrator.transfer_rejected",
                        trace_id = %trace_id,
                        conversation_id = %conversation_id,
                        from = %agent,
                        requested = %target,
                        reason_code = %reason_code,
                        "transfer rejected by policy"
                    );
                    resolution = Some(Resolution::fallback(FallbackReason::TransferRejected));
                    break;
                }
            };

            self.metrics.inc_handoff();
            handoffs += 1;
            info!(
                event_name = "orchestrator.silent_handoff",
                trace_id = %trace_id,
                conversation_id = %conversation_id,
                from = %agent,
                to = %next,
                reason = %plan.handoff_reason,
                "specialist handed the conversation over"
            );
            self.store.set_agent(conversation_id, next.clone());
            agent = next;
        }

        let resolution = resolution.unwrap_or_else(|| {
            warn!(
                event_name = "orchestrator.handoff_cap_exceeded",
                trace_id = %trace_id,
                conversation_id = %conversation_id,
                agent = %agent,
                max_iterations = self.settings.max_iterations,
                "handoff loop exhausted without a terminal action"
            );
            Resolution::fallback(FallbackReason::HandoffCapExceeded)
        });

        self.store.add(conversation_id, ChatMessage::assistant(resolution.reply.clone()));
        let history_count = self.store.len(conversation_id);

        if resolution.action == PlanAction::Escalate {
            self.metrics.inc_escalate();
            warn!(
                event_name = "orchestrator.human_intervention_required",
                trace_id = %trace_id,
                conversation_id = %conversation_id,
                agent = %agent,
                history_count,
                "conversation escalated to a human"
            );
        }

        self.metrics.inc_request(&agent);
        info!(
            event_name = "orchestrator.replied",
            trace_id = %trace_id,
            conversation_id = %conversation_id,
            agent = %agent,
            action = %resolution.action,
            handoffs,
            fallback = resolution.fallback.map(FallbackReason::as_str).unwrap_or("none"),
            "turn completed"
        );

        TurnOutcome {
            reply: resolution.reply,
            action: resolution.action.as_str().to_string(),
            agent,
            history_count,
            citations,
            handoffs,
            fallback: resolution.fallback,
        }
    }

    async fn resolve_agent(&self, trace_id: &str, conversation_id: &str, message: &str) -> String {
        if let Some(agent) = self.store.get_agent(conversation_id) {
            return agent;
        }

        let history = self.store.get(conversation_id);
        let route = self
            .router
            .route(self.model.as_deref(), &self.registry, trace_id, message, &history)
            .await;
        self.store.set_agent(conversation_id, route.agent.clone());
        info!(
            event_name = "orchestrator.routed",
            trace_id = %trace_id,
            conversation_id = %conversation_id,
            agent = %route.agent,
            source = route.source.as_str(),
            "conversation assigned to a specialist"
        );
        route.agent
    }

    fn retrieve(
        &self,
        trace_id: &str,
        conversation_id: &str,
        message: &str,
    ) -> (String, Vec<Citation>) {
        let Some(retriever) = self.retriever.as_deref() else {
            return (String::new(), Vec::new());
        };

        let hits = retriever.search(message, self.settings.top_k);
        let cited = &hits[..hits.len().min(self.settings.citation_limit)];
        info!(
            event_name = "orchestrator.knowledge_retrieved",
            trace_id = %trace_id,
            conversation_id = %conversation_id,
            hits = hits.len(),
            "knowledge context prepared"
        );
        (render_context(&hits), retriever.citations(cited))
    }

    fn render(
        &self,
        trace_id: &str,
        conversation_id: &str,
        agent: &str,
        plan: ActionPlan,
    ) -> Resolution {
        if plan.action == PlanAction::CallApi {
            info!(
                event_name = "orchestrator.external_action_requested",
                trace_id = %trace_id,
                conversation_id = %conversation_id,
                agent = %agent,
                reason = %plan.handoff_reason,
                "specialist requested an external action"
            );
        }

        Resolution { reply: render_reply(&plan), action: plan.action, fallback: None }
    }
}

/// Customer-facing text for a terminal plan.
pub fn render_reply(plan: &ActionPlan) -> String {
    let message = plan.message.trim();
    match plan.action {
        PlanAction::Ask | PlanAction::CollectData => {
            let parts = [message, plan.next_question.trim()]
                .into_iter()
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>();
            if parts.is_empty() {
                GENERIC_PROMPT.to_string()
            } else {
                parts.join("\n\n")
            }
        }
        PlanAction::Escalate => {
            let opening = if message.is_empty() {
                ESCALATION_APOLOGY.to_string()
            } else {
                format!("{ESCALATION_APOLOGY} {message}")
            };
            format!("{opening}\n\n{HUMAN_HANDOFF_NOTICE}")
        }
        PlanAction::CallApi => {
            let opening = if message.is_empty() { EXTERNAL_ACTION_ACK } else { message };
            format!("{opening}\n\n{SECURITY_PROTOCOL_NOTICE}")
        }
        _ if message.is_empty() => GENERIC_ACK.to_string(),
        _ => message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use switchboard_core::domain::plan::{ActionPlan, PlanAction};

    use super::{
        render_reply, FallbackReason, RuntimeSettings, APOLOGY_FALLBACK, ESCALATION_APOLOGY,
        GENERIC_ACK, GENERIC_PROMPT, GREETING_FALLBACK, HUMAN_HANDOFF_NOTICE,
        SECURITY_PROTOCOL_NOTICE,
    };

    #[test]
    fn ask_joins_message_and_question() {
        let plan = ActionPlan::new(PlanAction::Ask, "Sinto muito pelo ocorrido.")
            .with_next_question("Qual foi o valor?");
        assert_eq!(render_reply(&plan), "Sinto muito pelo ocorrido.\n\nQual foi o valor?");

        let only_question =
            ActionPlan::new(PlanAction::CollectData, "").with_next_question("Qual o seu CPF?");
        assert_eq!(render_reply(&only_question), "Qual o seu CPF?");

        assert_eq!(render_reply(&ActionPlan::new(PlanAction::Ask, "  ")), GENERIC_PROMPT);
    }

    #[test]
    fn escalate_starts_with_apology_and_ends_with_handoff_notice() {
        let plan = ActionPlan::new(PlanAction::Escalate, "Sua conta foi bloqueada.");
        let reply = render_reply(&plan);
        assert!(reply.starts_with(ESCALATION_APOLOGY));
        assert!(reply.contains("Sua conta foi bloqueada."));
        assert!(reply.ends_with(HUMAN_HANDOFF_NOTICE));
    }

    #[test]
    fn call_api_appends_security_notice() {
        let reply = render_reply(&ActionPlan::new(PlanAction::CallApi, ""));
        assert!(reply.ends_with(SECURITY_PROTOCOL_NOTICE));
        assert!(!reply.starts_with('\n'));
    }

    #[test]
    fn other_actions_use_message_or_ack() {
        assert_eq!(render_reply(&ActionPlan::new(PlanAction::Reply, "Oi!")), "Oi!");
        assert_eq!(render_reply(&ActionPlan::new(PlanAction::End, "")), GENERIC_ACK);
        let unknown = ActionPlan::new(PlanAction::Other("dance".to_string()), "ok");
        assert_eq!(render_reply(&unknown), "ok");
    }

    #[test]
    fn fallback_replies_split_between_apology_and_greeting() {
        assert_eq!(FallbackReason::SpecialistFailed.reply(), APOLOGY_FALLBACK);
        assert_eq!(FallbackReason::MalformedPlan.reply(), APOLOGY_FALLBACK);
        assert_eq!(FallbackReason::HandoffCapExceeded.reply(), GREETING_FALLBACK);
        assert_eq!(FallbackReason::ModelUnavailable.reply(), GREETING_FALLBACK);
        assert_eq!(FallbackReason::TransferRejected.as_str(), "transfer_rejected");
    }

    #[test]
    fn default_settings() {
        let settings = RuntimeSettings::default();
        assert_eq!(settings.max_iterations, 3);
        assert_eq!(settings.default_agent, "atendimento_geral");
    }
}
