use async_trait::async_trait;
use switchboard_core::domain::message::{ChatMessage, Role};
use switchboard_core::domain::plan::ActionPlan;
use thiserror::Error;

use crate::llm::{strip_code_fence, LanguageModel, LlmError};
use crate::personas::Persona;

const MISSING_CONTEXT: &str = "(sem contexto disponível)";

#[derive(Debug, Error)]
pub enum SpecialistError {
    #[error(transparent)]
    Model(#[from] LlmError),
    #[error("model output is not a valid action plan: {reason}")]
    MalformedPlan { raw: String, reason: String },
}

/// One domain expert. Stateless between invocations: everything it needs for a
/// turn arrives through `run`.
#[async_trait]
pub trait Specialist: Send + Sync {
    fn id(&self) -> &str;

    /// Specialist identifiers this one may name in `change_agent`.
    fn transfer_targets(&self) -> Vec<String>;

    async fn run(
        &self,
        model: &dyn LanguageModel,
        trace_id: &str,
        history: &[ChatMessage],
        user_message: &str,
        knowledge_context: &str,
    ) -> Result<ActionPlan, SpecialistError>;
}

/// Drives any [`Persona`] through the language model.
#[derive(Clone, Copy, Debug)]
pub struct PromptSpecialist {
    persona: &'static Persona,
}

impl PromptSpecialist {
    pub fn new(persona: &'static Persona) -> Self {
        Self { persona }
    }

    pub fn system_prompt(&self, knowledge_context: &str) -> String {
        let persona = self.persona;
        let mut prompt = format!(
            "{}\nIdentificador técnico: \"{}\".\n\nMISSÃO:\n{}\n\nREGRAS:\n",
            persona.identity, persona.id, persona.mission
        );
        for rule in persona.rules {
            prompt.push_str(&format!("- {rule}\n"));
        }

        prompt.push_str(
            "\nTRANSFERÊNCIA (campo change_agent, use exatamente um destes nomes):\n",
        );
        for route in persona.transfers {
            prompt.push_str(&format!("- \"{}\": {}\n", route.target, route.when));
        }

        let targets = persona.transfer_targets().collect::<Vec<_>>().join(" | ");
        prompt.push_str(&format!(
            "\nRESPONDA EXCLUSIVAMENTE COM JSON VÁLIDO:\n{{\n  \"action\": \"{}\",\n  \
             \"message\": \"texto curto e empático para o cliente\",\n  \
             \"next_question\": \"próxima pergunta do fluxo, se houver\",\n  \
             \"change_agent\": \"{targets} | null\",\n  \
             \"handoff_reason\": \"motivo da troca ou escalação\",\n  \
             \"confidence\": 0.0\n}}\n",
            persona.actions.join(" | ")
        ));

        let context = knowledge_context.trim();
        let context = if context.is_empty() { MISSING_CONTEXT } else { context };
        prompt.push_str(&format!("\nBase de conhecimento:\n{context}\n"));
        prompt
    }
}

#[async_trait]
impl Specialist for PromptSpecialist {
    fn id(&self) -> &str {
        self.persona.id
    }

    fn transfer_targets(&self) -> Vec<String> {
        self.persona.transfer_targets().map(str::to_string).collect()
    }

    async fn run(
        &self,
        model: &dyn LanguageModel,
        trace_id: &str,
        history: &[ChatMessage],
        user_message: &str,
        knowledge_context: &str,
    ) -> Result<ActionPlan, SpecialistError> {
        let system = self.system_prompt(knowledge_context);
        let user = user_prompt(history, user_message);
        let raw = model.generate_text(trace_id, &system, &user).await?;

        parse_plan(&raw)
    }
}

pub fn user_prompt(history: &[ChatMessage], user_message: &str) -> String {
    let mut prompt = String::from("Histórico da conversa:\n");
    for message in history {
        let speaker = match message.role {
            Role::User => "Cliente",
            Role::Assistant => "Você (Aline)",
        };
        prompt.push_str(&format!("{speaker}: {}\n", message.text));
    }
    prompt.push_str(&format!(
        "\nMensagem atual do cliente:\n\"{user_message}\"\n\nGere o plano de ação em JSON:"
    ));
    prompt
}

/// Parses model output into a plan. Never fills in a plan the model did not produce.
pub fn parse_plan(raw: &str) -> Result<ActionPlan, SpecialistError> {
    let body = strip_code_fence(raw);
    if !body.starts_with('{') {
        return Err(SpecialistError::MalformedPlan {
            raw: raw.to_string(),
            reason: "expected a JSON object".to_string(),
        });
    }

    serde_json::from_str(body).map_err(|error| SpecialistError::MalformedPlan {
        raw: raw.to_string(),
        reason: error.to_string(),
    })
}
