use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use super::{CheckpointError, CheckpointStore, ThreadId, ThreadState};

/// In-memory `CheckpointStore` for tests and ephemeral runs.
pub struct InMemoryCheckpointStore {
    threads: RwLock<HashMap<ThreadId, ThreadState>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self {
            threads: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryCheckpointStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn load(&self, thread_id: &ThreadId) -> Result<Option<ThreadState>, CheckpointError> {
        let threads = self
            .threads
            .read()
            .map_err(|_| CheckpointError::lock_poisoned("threads"))?;
        Ok(threads.get(thread_id).cloned())
    }

    async fn save(&self, state: &ThreadState) -> Result<(), CheckpointError> {
        let mut threads = self
            .threads
            .write()
            .map_err(|_| CheckpointError::lock_poisoned("threads"))?;
        threads.insert(state.thread_id.clone(), state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::conversation::Message;

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let store = InMemoryCheckpointStore::new();
        let mut state = ThreadState::new(ThreadId::from("t1"));
        state.push(Message::user("hello"));

        store.save(&state).await.unwrap();
        let loaded = store.load(&ThreadId::from("t1")).await.unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 1);
        assert!(store.load(&ThreadId::from("t2")).await.unwrap().is_none());
    }
}
