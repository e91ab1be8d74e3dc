//! In-memory checkpoint store (non-persistent)

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{sort_summaries, Checkpoint, CheckpointStore, CheckpointSummary};
use crate::error::StoreError;

/// Keeps checkpoints in process memory. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCheckpointStore {
    checkpoints: Arc<RwLock<HashMap<String, Checkpoint>>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        let id = checkpoint.conversation_id().to_string();
        debug!(conversation_id = %id, sequence = checkpoint.sequence, "Saved checkpoint in memory");
        self.checkpoints.write().await.insert(id, checkpoint.clone());
        Ok(())
    }

    async fn load(&self, conversation_id: &str) -> Result<Checkpoint, StoreError> {
        self.checkpoints
            .read()
            .await
            .get(conversation_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(conversation_id.to_string()))
    }

    async fn list(&self) -> Result<Vec<CheckpointSummary>, StoreError> {
        let mut summaries: Vec<CheckpointSummary> = self
            .checkpoints
            .read()
            .await
            .values()
            .map(Checkpoint::summary)
            .collect();
        sort_summaries(&mut summaries);
        Ok(summaries)
    }

    async fn delete(&self, conversation_id: &str) -> Result<(), StoreError> {
        self.checkpoints
            .write()
            .await
            .remove(conversation_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(conversation_id.to_string()))
    }

    fn is_persistent(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ConversationState, Message};

    fn checkpoint(id: &str, text: &str) -> Checkpoint {
        let mut state = ConversationState::new(id);
        state.push(Message::user(text)).unwrap();
        Checkpoint::new(ConversationState::new(id)).next(state)
    }

    #[tokio::test]
    async fn test_load_after_save_returns_saved_state() {
        let store = InMemoryCheckpointStore::new();
        let saved = checkpoint("c1", "hello");

        store.save(&saved).await.unwrap();
        assert_eq!(store.load("c1").await.unwrap(), saved);
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let store = InMemoryCheckpointStore::new();
        store.save(&checkpoint("c1", "first")).await.unwrap();
        let second = checkpoint("c1", "second");
        store.save(&second).await.unwrap();

        let loaded = store.load("c1").await.unwrap();
        assert_eq!(loaded.state.messages()[0].content, "second");
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_and_delete() {
        let store = InMemoryCheckpointStore::new();
        assert!(matches!(store.load("nope").await, Err(StoreError::NotFound(_))));

        store.save(&checkpoint("c1", "hi")).await.unwrap();
        store.delete("c1").await.unwrap();
        assert!(matches!(store.load("c1").await, Err(StoreError::NotFound(_))));
        assert!(matches!(store.delete("c1").await, Err(StoreError::NotFound(_))));
        assert!(!store.is_persistent());
    }

    #[tokio::test]
    async fn test_clones_share_storage() {
        let store = InMemoryCheckpointStore::new();
        let other = store.clone();
        store.save(&checkpoint("c1", "hi")).await.unwrap();
        assert!(other.load("c1").await.is_ok());
    }
}
