//! Durable per-thread conversation state.
//!
//! A thread's state is loaded at the start of a turn, mutated only by the
//! orchestrator, and saved back exactly once at the end of the turn. A save
//! that returns `Ok` is durable: a later load observes that state or a newer
//! one.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app::consequence::RiskLevel;
use crate::app::conversation::Message;

mod memory;
mod sqlite;

pub use memory::InMemoryCheckpointStore;
pub use sqlite::SqliteCheckpointStore;

/// Opaque stable conversation identifier supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(String);

impl ThreadId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ThreadId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Full mutable state of one conversation thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadState {
    pub thread_id: ThreadId,
    /// Append-only; grows monotonically across turns.
    pub messages: Vec<Message>,
    /// Caller-supplied UI/domain context, passed through unchanged.
    pub context_tag: String,
    /// Entity targeted by the most recently proposed dangerous call.
    pub target_entity_id: Option<String>,
    pub consequence_risk: Option<RiskLevel>,
    pub consequence_message: Option<String>,
    /// True exactly while the thread is suspended on a yes/no for
    /// `target_entity_id`.
    pub awaiting_confirmation: bool,
}

impl ThreadState {
    pub fn new(thread_id: ThreadId) -> Self {
        Self {
            thread_id,
            messages: Vec::new(),
            context_tag: String::new(),
            target_entity_id: None,
            consequence_risk: None,
            consequence_message: None,
            awaiting_confirmation: false,
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Text of the most recent assistant message, used as the turn reply.
    pub fn last_assistant_text(&self) -> Option<String> {
        self.messages.iter().rev().find_map(|m| match &m.data {
            crate::app::conversation::MessageData::Assistant { content, .. } => {
                Some(content.clone())
            }
            _ => None,
        })
    }
}

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Database error: {message}")]
    Database { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Connection error: {message}")]
    Connection { message: String },

    #[error("Migration error: {message}")]
    Migration { message: String },

    #[error("In-memory store lock poisoned: {message}")]
    LockPoisoned { message: String },
}

impl CheckpointError {
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn migration(message: impl Into<String>) -> Self {
        Self::Migration {
            message: message.into(),
        }
    }

    pub fn lock_poisoned(message: impl Into<String>) -> Self {
        Self::LockPoisoned {
            message: message.into(),
        }
    }
}

/// Thread-keyed persistence of orchestration state between turns.
///
/// Writes for a single thread are serialized by the caller (the orchestrator
/// holds a per-thread lock for the whole turn); the store only guarantees
/// that a completed `save` is observed by later `load`s.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load(&self, thread_id: &ThreadId) -> Result<Option<ThreadState>, CheckpointError>;

    async fn save(&self, state: &ThreadState) -> Result<(), CheckpointError>;
}
