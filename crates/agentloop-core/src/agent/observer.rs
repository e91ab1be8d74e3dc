//! Run observer hooks

use super::state::RunState;
use crate::message::{Message, SuspensionRequest};

/// Receives notifications while a conversation is driven.
///
/// Called after the corresponding checkpoint has been written.
pub trait RunObserver: Send + Sync {
    fn on_transition(&self, _conversation_id: &str, _from: RunState, _to: RunState) {}

    /// An agent message produced by the decision step
    fn on_decision(&self, _conversation_id: &str, _message: &Message) {}

    /// A tool message appended by the execution step or by a resume
    fn on_tool_message(&self, _conversation_id: &str, _message: &Message) {}

    fn on_suspended(&self, _conversation_id: &str, _request: &SuspensionRequest) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {}
