pub mod config;
pub mod conversation;
pub mod domain;
pub mod errors;
pub mod knowledge;
pub mod metrics;

pub use config::{AppConfig, ConfigError, RoutingMode, TransferMode, DEFAULT_AGENT};
pub use conversation::ConversationStore;
pub use domain::message::{ChatMessage, Role, TurnRequest};
pub use domain::plan::{ActionPlan, PlanAction};
pub use errors::{DomainError, InterfaceError};
pub use knowledge::{Citation, KnowledgeChunk, KnowledgeError, KnowledgeRetriever};
pub use metrics::{Metrics, MetricsSnapshot};
