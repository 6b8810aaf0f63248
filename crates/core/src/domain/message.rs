use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self { role, text: text.into(), timestamp: Utc::now() }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }
}

/// A validated inbound turn: both fields are present and non-blank.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnRequest {
    pub conversation_id: String,
    pub message: String,
}

impl TurnRequest {
    pub fn new(
        conversation_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let conversation_id = conversation_id.into();
        let message = message.into();

        if conversation_id.trim().is_empty() {
            return Err(DomainError::MissingField("conversation_id"));
        }
        if message.trim().is_empty() {
            return Err(DomainError::MissingField("message"));
        }

        Ok(Self { conversation_id, message })
    }
}
