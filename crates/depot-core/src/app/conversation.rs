//! Message types for conversation representation.
//!
//! A thread's history is an append-only sequence of `Message`s. Tool-result
//! messages must reference a capability call that appears earlier in the same
//! thread; `validate_thread` checks that invariant.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use depot_tools::{ToolCall, ToolResult};
use strum_macros::Display;

/// Role in the conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Copy, Display)]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub timestamp: u64,
    pub id: String,
    pub data: MessageData,
}

/// A message in the conversation, with role-specific content
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum MessageData {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        tool_call_id: String,
        result: ToolResult,
    },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_data(MessageData::System {
            content: content.into(),
        })
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_data(MessageData::User {
            content: content.into(),
        })
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self::with_data(MessageData::Assistant {
            content: content.into(),
            tool_calls,
        })
    }

    pub fn tool(tool_call_id: impl Into<String>, result: ToolResult) -> Self {
        Self::with_data(MessageData::Tool {
            tool_call_id: tool_call_id.into(),
            result,
        })
    }

    fn with_data(data: MessageData) -> Self {
        let timestamp = Self::current_timestamp();
        let prefix = match &data {
            MessageData::System { .. } => "sys",
            MessageData::User { .. } => "usr",
            MessageData::Assistant { .. } => "ast",
            MessageData::Tool { .. } => "tool",
        };
        Self {
            timestamp,
            id: Self::generate_id(prefix),
            data,
        }
    }

    pub fn role(&self) -> Role {
        match &self.data {
            MessageData::System { .. } => Role::System,
            MessageData::User { .. } => Role::User,
            MessageData::Assistant { .. } => Role::Assistant,
            MessageData::Tool { .. } => Role::Tool,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Helper to get current timestamp
    pub fn current_timestamp() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }

    /// Helper to generate unique IDs
    pub fn generate_id(prefix: &str) -> String {
        format!("{}_{}", prefix, uuid::Uuid::now_v7())
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        match &self.data {
            MessageData::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    /// Extract text content from the message
    pub fn extract_text(&self) -> String {
        match &self.data {
            MessageData::System { content }
            | MessageData::User { content }
            | MessageData::Assistant { content, .. } => content.clone(),
            MessageData::Tool { result, .. } => result.llm_format(),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ThreadValidationError {
    #[error("tool result {message_id} references unknown call id {tool_call_id}")]
    DanglingToolResult {
        message_id: String,
        tool_call_id: String,
    },
}

/// Check that every tool-result message references a capability call that
/// appears on an earlier assistant message in the same thread.
pub fn validate_thread(messages: &[Message]) -> Result<(), ThreadValidationError> {
    let mut seen_call_ids = std::collections::HashSet::new();
    for message in messages {
        match &message.data {
            MessageData::Assistant { tool_calls, .. } => {
                for call in tool_calls {
                    seen_call_ids.insert(call.id.as_str());
                }
            }
            MessageData::Tool { tool_call_id, .. } => {
                if !seen_call_ids.contains(tool_call_id.as_str()) {
                    return Err(ThreadValidationError::DanglingToolResult {
                        message_id: message.id.clone(),
                        tool_call_id: tool_call_id.clone(),
                    });
                }
            }
            _ => {}
        }
    }
    Ok(())
}
