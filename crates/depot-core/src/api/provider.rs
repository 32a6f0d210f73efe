use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::app::conversation::Message;
use depot_tools::{ToolCall, ToolSchema};

/// One reasoning step's output: reply text and/or requested capability calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Decision {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

impl Decision {
    /// A plain reply that ends the turn.
    pub fn reply(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn with_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: content.into(),
            tool_calls,
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// The external reasoning capability, seen from the core.
///
/// Implementations must not invent arguments: malformed capability-call
/// payloads are surfaced as `ApiError::MalformedToolCall` and fail the turn.
#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn decide(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
    ) -> Result<Decision, ApiError>;
}
