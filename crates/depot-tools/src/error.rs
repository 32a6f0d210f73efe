use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of a single capability invocation.
///
/// These are conversation-visible: the orchestrator wraps them into a
/// tool-result message so the next reasoning step can react, rather than
/// aborting the turn.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ToolError {
    #[error("Unknown capability: {0}")]
    UnknownCapability(String),

    #[error("Invalid parameters for {capability}: {message}")]
    InvalidParams { capability: String, message: String },

    #[error("{capability} failed: {message}")]
    Execution { capability: String, message: String },

    #[error("Unexpected error: {0}")]
    Internal(String),
}

impl ToolError {
    pub fn execution<C: Into<String>, M: Into<String>>(capability: C, message: M) -> Self {
        ToolError::Execution {
            capability: capability.into(),
            message: message.into(),
        }
    }

    pub fn invalid_params<C: Into<String>, M: Into<String>>(capability: C, message: M) -> Self {
        ToolError::InvalidParams {
            capability: capability.into(),
            message: message.into(),
        }
    }
}
