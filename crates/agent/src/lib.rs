//! Multi-agent orchestration for the Jota customer front door.
//!
//! A turn flows through:
//! 1. **Routing** (`routing`) - pick the first specialist of a new conversation
//! 2. **Specialists** (`specialist`, `personas`, `registry`) - prompt the model, parse an `ActionPlan`
//! 3. **Transfer guardrails** (`guardrails`) - validate `change_agent` targets
//! 4. **Runtime** (`runtime`) - the bounded handoff loop and reply rendering
//!
//! The language model sits behind the `LanguageModel` trait (`llm`); `gemini`
//! is the production implementation. Specialists never hold state between
//! turns: conversation history and the sticky assignment live in
//! `switchboard_core::ConversationStore`.

pub mod gemini;
pub mod guardrails;
pub mod llm;
pub mod personas;
pub mod registry;
pub mod routing;
pub mod runtime;
pub mod specialist;

pub use gemini::GeminiClient;
pub use guardrails::{TransferDecision, TransferPolicy};
pub use llm::{LanguageModel, LlmError, RouterDecision};
pub use registry::SpecialistRegistry;
pub use routing::IntakeRouter;
pub use runtime::{AgentRuntime, FallbackReason, RuntimeSettings, TurnOutcome};
pub use specialist::{PromptSpecialist, Specialist, SpecialistError};
