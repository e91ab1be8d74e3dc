//! Checkpoint persistence for conversation state
//!
//! A checkpoint is the full conversation log plus a monotonic sequence
//! number, keyed by conversation id. Stores overwrite on save
//! (last writer wins) and must be durable before `save` returns.

mod file;
mod memory;

pub use file::FileCheckpointStore;
pub use memory::InMemoryCheckpointStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::message::ConversationState;

/// Snapshot of a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Incremented on every save; 0 means never saved
    pub sequence: u64,
    pub updated_at: DateTime<Utc>,
    pub state: ConversationState,
}

impl Checkpoint {
    /// Unsaved checkpoint for a conversation that has no history yet
    pub fn new(state: ConversationState) -> Self {
        Self {
            sequence: 0,
            updated_at: Utc::now(),
            state,
        }
    }

    pub fn conversation_id(&self) -> &str {
        self.state.conversation_id()
    }

    /// The checkpoint that follows this one with `state` as its content
    pub fn next(&self, state: ConversationState) -> Self {
        Self {
            sequence: self.sequence + 1,
            updated_at: Utc::now(),
            state,
        }
    }

    pub fn summary(&self) -> CheckpointSummary {
        CheckpointSummary {
            conversation_id: self.conversation_id().to_string(),
            sequence: self.sequence,
            updated_at: self.updated_at,
            message_count: self.state.len(),
            suspended: self.state.is_suspended(),
        }
    }

    /// Reject checkpoints whose log breaks the ordering invariants
    pub(crate) fn verify(&self, expected_id: &str) -> Result<(), StoreError> {
        let corrupt = |reason: String| StoreError::Corrupt {
            conversation_id: expected_id.to_string(),
            reason,
        };

        if self.conversation_id() != expected_id {
            return Err(corrupt(format!(
                "stored under '{}' but belongs to '{}'",
                expected_id,
                self.conversation_id()
            )));
        }
        self.state.validate().map_err(|e| corrupt(e.to_string()))
    }
}

/// Lightweight description of a stored conversation for listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointSummary {
    pub conversation_id: String,
    pub sequence: u64,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
    pub suspended: bool,
}

/// Durable storage of checkpoints keyed by conversation id
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Overwrite the checkpoint for its conversation. Durable on return.
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), StoreError>;

    /// Latest checkpoint, or [`StoreError::NotFound`]
    async fn load(&self, conversation_id: &str) -> Result<Checkpoint, StoreError>;

    /// All stored conversations, most recently updated first
    async fn list(&self) -> Result<Vec<CheckpointSummary>, StoreError>;

    /// Remove a conversation. Only for external retention policies.
    async fn delete(&self, conversation_id: &str) -> Result<(), StoreError>;

    /// Whether checkpoints survive a process restart
    fn is_persistent(&self) -> bool;
}

fn sort_summaries(summaries: &mut [CheckpointSummary]) {
    summaries.sort_by(|a, b| {
        b.updated_at
            .cmp(&a.updated_at)
            .then_with(|| a.conversation_id.cmp(&b.conversation_id))
    });
}
