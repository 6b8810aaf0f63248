//! The decision contract every specialist returns for a turn.
//!
//! The wire shape mirrors what the language model is prompted to emit:
//!
//! ```json
//! {"action": "ask", "message": "...", "next_question": "...",
//!  "change_agent": "golpe_med", "handoff_reason": "...", "confidence": 0.9}
//! ```

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PlanAction {
    #[default]
    Reply,
    Ask,
    CollectData,
    ChangeAgent,
    Escalate,
    CallApi,
    End,
    /// Any action string outside the known vocabulary, kept verbatim.
    Other(String),
}

impl PlanAction {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Reply => "reply",
            Self::Ask => "ask",
            Self::CollectData => "collect_data",
            Self::ChangeAgent => "change_agent",
            Self::Escalate => "escalate",
            Self::CallApi => "call_api",
            Self::End => "end",
            Self::Other(raw) => raw,
        }
    }

    pub fn is_transfer(&self) -> bool {
        matches!(self, Self::ChangeAgent)
    }
}

impl From<String> for PlanAction {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "reply" => Self::Reply,
            "ask" => Self::Ask,
            "collect_data" => Self::CollectData,
            "change_agent" => Self::ChangeAgent,
            "escalate" => Self::Escalate,
            "call_api" => Self::CallApi,
            "end" => Self::End,
            _ => Self::Other(value),
        }
    }
}

impl From<PlanAction> for String {
    fn from(value: PlanAction) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for PlanAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionPlan {
    #[serde(default, deserialize_with = "nullable")]
    pub action: PlanAction,
    #[serde(default, deserialize_with = "nullable")]
    pub message: String,
    #[serde(default, deserialize_with = "nullable")]
    pub next_question: String,
    #[serde(rename = "change_agent", default, deserialize_with = "nullable")]
    pub change_agent_target: String,
    #[serde(default, deserialize_with = "nullable")]
    pub handoff_reason: String,
    #[serde(default, deserialize_with = "confidence")]
    pub confidence: f64,
}

impl ActionPlan {
    pub fn new(action: PlanAction, message: impl Into<String>) -> Self {
        Self { action, message: message.into(), ..Self::default() }
    }

    pub fn transfer(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            action: PlanAction::ChangeAgent,
            change_agent_target: target.into(),
            handoff_reason: reason.into(),
            ..Self::default()
        }
    }

    pub fn with_next_question(mut self, question: impl Into<String>) -> Self {
        self.next_question = question.into();
        self
    }

    /// The transfer target with the literal `"null"` read as absent.
    pub fn requested_target(&self) -> Option<&str> {
        let target = self.change_agent_target.trim();
        if target.is_empty() || target.eq_ignore_ascii_case("null") {
            None
        } else {
            Some(target)
        }
    }
}

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn confidence<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?.unwrap_or_default();
    Ok(if raw.is_nan() { 0.0 } else { raw.clamp(0.0, 1.0) })
}
