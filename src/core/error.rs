use thiserror::Error;

use crate::core::types::{BlockPos, EntityId};

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Resolution failure: {0}")]
    Resolution(String),

    #[error("Validation failure: {0}")]
    Validation(String),

    #[error("Target lost: {0}")]
    TargetLost(String),

    #[error("Target not found: {0}")]
    TargetNotFound(String),

    #[error("Action timed out after {ticks} ticks: {action}")]
    ActionTimeout { action: String, ticks: u64 },

    #[error("Unreachable position: {0}")]
    Unreachable(BlockPos),

    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    #[error("Already active: {0}")]
    AlreadyActive(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Action failed: {0}")]
    ActionFailed(String),

    #[error("Unexpected fault: {0}")]
    Unexpected(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl AgentError {
    /// Whether a controller may absorb this error and keep running.
    ///
    /// Anything not listed here terminates the task with a failed outcome.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AgentError::Resolution(_)
                | AgentError::Validation(_)
                | AgentError::TargetLost(_)
                | AgentError::ActionTimeout { .. }
                | AgentError::Unreachable(_)
                | AgentError::EntityNotFound(_)
                | AgentError::ActionFailed(_)
        )
    }
}

impl AgentError {
    /// Text fit for chat: the bare payload for agent-authored messages
    pub fn user_message(&self) -> String {
        match self {
            AgentError::TargetLost(msg)
            | AgentError::TargetNotFound(msg)
            | AgentError::AlreadyActive(msg)
            | AgentError::ActionFailed(msg)
            | AgentError::Validation(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(AgentError::ActionTimeout {
            action: "travel".into(),
            ticks: 200
        }
        .is_recoverable());
        assert!(AgentError::Unreachable(BlockPos::new(0, 0, 0)).is_recoverable());
        assert!(!AgentError::Unexpected("boom".into()).is_recoverable());
        assert!(!AgentError::Configuration("missing".into()).is_recoverable());
    }

    #[test]
    fn test_user_message_strips_prefix() {
        let err = AgentError::AlreadyActive("I'm already in combat!".into());
        assert_eq!(err.user_message(), "I'm already in combat!");
        let err = AgentError::Configuration("no action".into());
        assert_eq!(err.user_message(), "Configuration error: no action");
    }

    #[test]
    fn test_timeout_message() {
        let err = AgentError::ActionTimeout {
            action: "travel to (1, 2, 3)".into(),
            ticks: 200,
        };
        assert_eq!(
            err.to_string(),
            "Action timed out after 200 ticks: travel to (1, 2, 3)"
        );
    }
}
