//! Agent loop: decision step, router, execution step and the run controller
//!
//! The controller is an explicit state machine over [`RunState`]. Every step
//! that mutates the log is checkpointed before the next transition.

mod controller;
mod decision;
mod execution;
mod observer;
mod router;
mod state;

pub use controller::{FinalAnswer, RunController, RunOutcome};
pub use decision::{Decision, DecisionStep, ReasoningOracle};
pub use execution::{ExecutionOutcome, ExecutionStep};
pub use observer::{NoopObserver, RunObserver};
pub use router::{route, Route};
pub use state::{FailureTracker, RunConfig, RunState};
