use switchboard_core::config::TransferMode;
use switchboard_core::DEFAULT_AGENT;

/// A `change_agent` request after the empty/"null" target has been resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferRequest<'a> {
    pub from: &'a str,
    pub target: &'a str,
    pub allowed_targets: &'a [String],
    pub target_registered: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransferDecision {
    Allow { target: String },
    Degrade { target: String, reason_code: &'static str },
    Deny { reason_code: &'static str },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferPolicy {
    pub mode: TransferMode,
    pub default_agent: String,
}

impl Default for TransferPolicy {
    fn default() -> Self {
        Self { mode: TransferMode::FallbackToDefault, default_agent: DEFAULT_AGENT.to_string() }
    }
}

impl TransferPolicy {
    pub fn new(mode: TransferMode, default_agent: impl Into<String>) -> Self {
        Self { mode, default_agent: default_agent.into() }
    }

    pub fn evaluate(&self, request: &TransferRequest<'_>) -> TransferDecision {
        if self.mode == TransferMode::Permissive {
            return TransferDecision::Allow { target: request.target.to_string() };
        }

        let Some(reason_code) = self.violation(request) else {
            return TransferDecision::Allow { target: request.target.to_string() };
        };

        match self.mode {
            TransferMode::Strict => TransferDecision::Deny { reason_code },
            _ => TransferDecision::Degrade { target: self.default_agent.clone(), reason_code },
        }
    }

    fn violation(&self, request: &TransferRequest<'_>) -> Option<&'static str> {
        if !request.target_registered {
            return Some("transfer_target_unregistered");
        }
        // the intake specialist is always a legal landing spot
        if request.target == self.default_agent && request.target != request.from {
            return None;
        }
        if !request.allowed_targets.iter().any(|allowed| allowed == request.target) {
            return Some("transfer_target_outside_vocabulary");
        }
        None
    }
}
