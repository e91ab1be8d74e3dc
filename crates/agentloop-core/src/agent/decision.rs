//! Decision step: asks the reasoning oracle for the next agent message

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::error::DecisionError;
use crate::message::{ActionRequest, ConversationState, Message};
use crate::tools::registry::ToolRegistry;
use crate::tools::ToolDescriptor;

/// What the oracle wants to do next
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub content: String,
    pub action_requests: Vec<ActionRequest>,
}

impl Decision {
    /// A final answer
    pub fn answer(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            action_requests: Vec::new(),
        }
    }

    /// One or more tool calls, with optional accompanying text
    pub fn act(content: impl Into<String>, action_requests: Vec<ActionRequest>) -> Self {
        Self {
            content: content.into(),
            action_requests,
        }
    }
}

/// External collaborator that chooses actions.
///
/// Returning an error whose root is a [`DecisionError`] keeps that
/// classification; any other error counts as the oracle being unavailable.
#[async_trait]
pub trait ReasoningOracle: Send + Sync {
    async fn decide(&self, messages: &[Message], tools: &[ToolDescriptor]) -> Result<Decision>;
}

/// Produces exactly one validated agent message per call
pub struct DecisionStep {
    oracle: Arc<dyn ReasoningOracle>,
    registry: Arc<ToolRegistry>,
    descriptors: Vec<ToolDescriptor>,
}

impl DecisionStep {
    pub fn new(oracle: Arc<dyn ReasoningOracle>, registry: Arc<ToolRegistry>) -> Self {
        let descriptors = registry.descriptors();
        Self {
            oracle,
            registry,
            descriptors,
        }
    }

    /// Ask the oracle for the next message. Does not touch `state`.
    #[instrument(skip_all, fields(conversation_id = %state.conversation_id(), messages = state.len()))]
    pub async fn decide(&self, state: &ConversationState) -> Result<Message, DecisionError> {
        debug!("Consulting reasoning oracle");
        let decision = self
            .oracle
            .decide(state.messages(), &self.descriptors)
            .await
            .map_err(|e| match e.downcast::<DecisionError>() {
                Ok(classified) => classified,
                Err(e) => DecisionError::OracleUnavailable(format!("{:#}", e)),
            })
            .inspect_err(|e| warn!(error = %e, "Decision step failed"))?;

        let message = self.validate(decision, state)?;
        if message.action_requests.is_empty() {
            info!(answer_len = message.content.len(), "Oracle answered directly");
        } else {
            info!(
                tools = ?message.action_requests.iter().map(|r| r.tool.as_str()).collect::<Vec<_>>(),
                "Oracle requested actions"
            );
        }
        Ok(message)
    }

    fn validate(
        &self,
        decision: Decision,
        state: &ConversationState,
    ) -> Result<Message, DecisionError> {
        let Decision {
            content,
            action_requests,
        } = decision;

        if action_requests.is_empty() {
            if content.trim().is_empty() {
                return Err(DecisionError::EmptyAnswer);
            }
            return Ok(Message::agent(content, Vec::new()));
        }

        let mut seen = HashSet::new();
        let mut validated = Vec::with_capacity(action_requests.len());
        for mut request in action_requests {
            if request.id.trim().is_empty() {
                request.id = uuid::Uuid::new_v4().to_string();
            }
            // Ids correlate results across the whole log, not just this batch
            if state.has_request_id(&request.id) || !seen.insert(request.id.clone()) {
                return Err(DecisionError::DuplicateRequestId(request.id));
            }
            if !self.registry.contains(&request.tool) {
                return Err(DecisionError::UnknownTool {
                    tool: request.tool,
                    request_id: request.id,
                });
            }
            if request.arguments.is_null() {
                request.arguments = Value::Object(Default::default());
            }
            if !request.arguments.is_object() {
                return Err(DecisionError::MalformedPlan(format!(
                    "arguments for '{}' must be an object, got {}",
                    request.tool, request.arguments
                )));
            }
            validated.push(request);
        }

        Ok(Message::agent(content, validated))
    }
}
