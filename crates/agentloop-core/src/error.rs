//! Error taxonomy for the agent loop
//!
//! Tool faults never show up here: they are recorded in the log as
//! error-marked tool messages so the next decision can re-plan.
//! Decision and persistence failures abort the current invocation.

use std::path::PathBuf;

use thiserror::Error;

/// Failure of the decision step. The log is left untouched.
#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("reasoning oracle unavailable: {0}")]
    OracleUnavailable(String),

    #[error("malformed plan: {0}")]
    MalformedPlan(String),

    #[error("plan requests unknown tool '{tool}' (request {request_id})")]
    UnknownTool { tool: String, request_id: String },

    #[error("plan reuses action request id '{0}'")]
    DuplicateRequestId(String),

    #[error("final answer has empty content")]
    EmptyAnswer,
}

/// A message that would break the log's ordering invariants.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LogError {
    #[error("tool message has no correlation id")]
    MissingCorrelation,

    #[error("tool message correlates to unknown action request '{0}'")]
    UnknownCorrelation(String),

    #[error("{0} message cannot carry action requests")]
    RequestsOnNonAgent(&'static str),
}

/// Failure of a checkpoint store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no checkpoint for conversation '{0}'")]
    NotFound(String),

    #[error("checkpoint I/O failed at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("checkpoint serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("checkpoint for conversation '{conversation_id}' is corrupt: {reason}")]
    Corrupt {
        conversation_id: String,
        reason: String,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failure of a whole run invocation.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Decision(#[from] DecisionError),

    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),

    #[error("log invariant violated: {0}")]
    Log(#[from] LogError),

    #[error("unknown conversation '{0}'")]
    UnknownConversation(String),

    #[error("conversation '{0}' is not waiting for human input")]
    NotSuspended(String),

    #[error("conversation '{0}' is waiting for human input; deliver an answer first")]
    AwaitingInput(String),

    #[error("conversation '{0}' has an unexecuted plan; recover it before sending new input")]
    PendingActions(String),

    #[error("conversation '{0}' is already being driven by another invocation")]
    Busy(String),

    #[error("conversation '{conversation_id}' reached the limit of {limit} decision steps")]
    StepLimit {
        conversation_id: String,
        limit: usize,
    },

    #[error("conversation '{conversation_id}' aborted: {reason}")]
    RepeatedToolFailure {
        conversation_id: String,
        reason: String,
    },
}

impl RunError {
    /// Whether retrying the same call later can succeed without intervention
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RunError::Decision(DecisionError::OracleUnavailable(_))
                | RunError::Persistence(StoreError::Io { .. })
                | RunError::Busy(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_error_converts_into_run_error() {
        let err: RunError = DecisionError::EmptyAnswer.into();
        assert!(matches!(err, RunError::Decision(DecisionError::EmptyAnswer)));
        assert_eq!(err.to_string(), "final answer has empty content");
    }

    #[test]
    fn test_retryable_classification() {
        let io = StoreError::io("/tmp/x.json", std::io::Error::other("disk full"));
        assert!(RunError::Persistence(io).is_retryable());
        assert!(RunError::Busy("c1".into()).is_retryable());
        assert!(!RunError::NotSuspended("c1".into()).is_retryable());
        assert!(!RunError::Decision(DecisionError::EmptyAnswer).is_retryable());
    }

    #[test]
    fn test_store_error_display_includes_path() {
        let err = StoreError::io(
            "/var/lib/agentloop/c1.json",
            std::io::Error::other("read-only file system"),
        );
        let text = err.to_string();
        assert!(text.contains("/var/lib/agentloop/c1.json"));
        assert!(text.contains("read-only"));
    }
}
