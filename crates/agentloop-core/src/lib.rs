//! agentloop-core: resumable decide/execute agent loop
//!
//! Provides:
//! - Append-only conversation log (messages, action requests, correlation ids)
//! - Tool registry with a human-input tool that can suspend a run
//! - Decision and execution steps, plus the router between them
//! - Checkpoint stores (in-memory and durable JSON files)
//! - The run controller that drives a conversation to an answer or a suspension
//!
//! ```text
//!            ┌──────────── run(id, msg) / resume(id, answer)
//!            ▼
//!   ┌─────────────────┐  load / save   ┌──────────────────┐
//!   │  RunController  │◄──────────────►│ CheckpointStore  │
//!   └────────┬────────┘                └──────────────────┘
//!            │
//!   Deciding ─► Routing ─┬─► Executing ─► Deciding ...
//!      │                 │       │
//!      ▼                 ▼       └─► Suspended (hard stop)
//!  ReasoningOracle    Terminal
//! ```

pub mod agent;
pub mod checkpoint;
pub mod error;
pub mod message;
pub mod tools;

pub use agent::{
    route, Decision, DecisionStep, ExecutionOutcome, ExecutionStep, FinalAnswer,
    NoopObserver, ReasoningOracle, Route, RunConfig, RunController, RunObserver, RunOutcome,
    RunState,
};
pub use checkpoint::{
    Checkpoint, CheckpointStore, CheckpointSummary, FileCheckpointStore, InMemoryCheckpointStore,
};
pub use error::{DecisionError, LogError, RunError, StoreError};
pub use message::{ActionRequest, ConversationState, Message, Role, Suspension, SuspensionRequest};
pub use tools::registry::ToolRegistry;
pub use tools::{
    HumanInputTool, ParameterProperty, ParameterSchema, Tool, ToolContext, ToolDescriptor,
    ToolKind, ToolOutcome, ToolResult,
};
