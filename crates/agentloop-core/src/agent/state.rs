//! Run states, run configuration and failure tracking

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// States of the run controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    Init,
    Deciding,
    Routing,
    Executing,
    Suspended,
    Terminal,
}

impl RunState {
    /// Whether the transition `self -> next` is part of the state machine
    pub fn can_transition_to(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Init, Deciding)
                | (Init, Executing)
                | (Deciding, Routing)
                | (Routing, Executing)
                | (Routing, Terminal)
                | (Executing, Deciding)
                | (Executing, Suspended)
                | (Suspended, Deciding)
        )
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunState::Init => "init",
            RunState::Deciding => "deciding",
            RunState::Routing => "routing",
            RunState::Executing => "executing",
            RunState::Suspended => "suspended",
            RunState::Terminal => "terminal",
        };
        f.write_str(name)
    }
}

/// Configuration for the run controller
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Maximum decision steps per invocation
    pub max_steps: usize,
    /// Tool output longer than this is truncated before it enters the log
    pub max_output_len: usize,
    /// Identical failing tool calls tolerated in a row before aborting
    pub max_consecutive_failures: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_steps: 25,
            max_output_len: 50_000,
            max_consecutive_failures: 3,
        }
    }
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_steps(mut self, max: usize) -> Self {
        self.max_steps = max;
        self
    }

    pub fn with_max_output_len(mut self, len: usize) -> Self {
        self.max_output_len = len;
        self
    }

    pub fn with_max_consecutive_failures(mut self, max: usize) -> Self {
        self.max_consecutive_failures = max;
        self
    }
}

/// Tracks consecutive failures of identical tool calls to detect loops
#[derive(Debug, Default)]
pub struct FailureTracker {
    /// Tool call signature to consecutive failure count
    failures: HashMap<String, usize>,
    max_consecutive: usize,
}

impl FailureTracker {
    pub fn new(max_consecutive: usize) -> Self {
        Self {
            failures: HashMap::new(),
            max_consecutive,
        }
    }

    /// Signature of a tool call (name + arguments hash)
    pub fn signature(tool: &str, args: &serde_json::Value) -> String {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        args.to_string().hash(&mut hasher);
        format!("{}:{:x}", tool, hasher.finish())
    }

    pub fn record_success(&mut self, signature: &str) {
        self.failures.remove(signature);
    }

    /// Record a failure. Returns the abort reason once the limit is hit.
    pub fn record_failure(&mut self, signature: &str, error: &str) -> Option<String> {
        let count = self.failures.entry(signature.to_string()).or_insert(0);
        *count += 1;

        if self.max_consecutive > 0 && *count >= self.max_consecutive {
            Some(format!(
                "Tool call failed {} consecutive times with error: {}",
                count, error
            ))
        } else {
            None
        }
    }

    pub fn failure_count(&self, signature: &str) -> usize {
        self.failures.get(signature).copied().unwrap_or(0)
    }
}
