//! Conversation log: messages, action requests and the persisted state

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::LogError;

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Agent => "agent",
            Role::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tool invocation planned by the decision step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    /// Unique within the agent message that carries it
    pub id: String,
    /// Name of a tool in the registry
    pub tool: String,
    /// Argument mapping (JSON object)
    #[serde(default)]
    pub arguments: Value,
}

impl ActionRequest {
    pub fn new(id: impl Into<String>, tool: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            tool: tool.into(),
            arguments,
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// A single entry in the conversation log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Only present on agent messages
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub action_requests: Vec<ActionRequest>,
    /// Only present on tool messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Set on tool messages that report a failed action
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_error: bool,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            action_requests: Vec::new(),
            correlation_id: None,
            is_error: false,
        }
    }

    /// Agent message; a final answer when `action_requests` is empty
    pub fn agent(content: impl Into<String>, action_requests: Vec<ActionRequest>) -> Self {
        Self {
            role: Role::Agent,
            content: content.into(),
            action_requests,
            correlation_id: None,
            is_error: false,
        }
    }

    pub fn tool_result(correlation_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            action_requests: Vec::new(),
            correlation_id: Some(correlation_id.into()),
            is_error: false,
        }
    }

    pub fn tool_error(correlation_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::tool_result(correlation_id, content)
        }
    }

    pub fn has_action_requests(&self) -> bool {
        self.role == Role::Agent && !self.action_requests.is_empty()
    }

    /// Agent message without action requests
    pub fn is_final_answer(&self) -> bool {
        self.role == Role::Agent && self.action_requests.is_empty()
    }
}

/// Control signal raised by the human-input tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspensionRequest {
    pub payload: Value,
}

impl SuspensionRequest {
    pub fn question(question: impl Into<String>) -> Self {
        Self {
            payload: serde_json::json!({ "question": question.into() }),
        }
    }

    pub fn question_text(&self) -> Option<&str> {
        self.payload.get("question").and_then(|v| v.as_str())
    }
}

/// A suspension waiting for its answer, kept in the checkpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suspension {
    /// Action request the answer will be correlated with
    pub request_id: String,
    pub tool: String,
    pub request: SuspensionRequest,
}

/// The unit of persistence: one conversation's ordered log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    conversation_id: String,
    messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    suspended: Option<Suspension>,
}

impl ConversationState {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            messages: Vec::new(),
            suspended: None,
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Append a message, rejecting anything that breaks the log invariants
    pub fn push(&mut self, message: Message) -> Result<(), LogError> {
        check_message(&message, |id| self.has_request_id(id))?;
        self.messages.push(message);
        Ok(())
    }

    pub fn suspension(&self) -> Option<&Suspension> {
        self.suspended.as_ref()
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.is_some()
    }

    pub fn suspend(&mut self, suspension: Suspension) {
        self.suspended = Some(suspension);
    }

    pub fn take_suspension(&mut self) -> Option<Suspension> {
        self.suspended.take()
    }

    /// Content of the final answer, if the log ends with one
    pub fn final_answer(&self) -> Option<&str> {
        self.last_message()
            .filter(|m| m.is_final_answer())
            .map(|m| m.content.as_str())
    }

    /// Check the whole log, e.g. after loading it from storage
    pub fn validate(&self) -> Result<(), LogError> {
        let mut seen: HashSet<&str> = HashSet::new();
        for message in &self.messages {
            check_message(message, |id| seen.contains(id))?;
            for request in &message.action_requests {
                seen.insert(request.id.as_str());
            }
        }

        if let Some(ref suspension) = self.suspended {
            if !seen.contains(suspension.request_id.as_str()) {
                return Err(LogError::UnknownCorrelation(suspension.request_id.clone()));
            }
        }

        Ok(())
    }

    /// Whether any agent message in the log carries a request with this id
    pub fn has_request_id(&self, id: &str) -> bool {
        self.messages
            .iter()
            .filter(|m| m.role == Role::Agent)
            .flat_map(|m| m.action_requests.iter())
            .any(|r| r.id == id)
    }
}

fn check_message(message: &Message, known: impl Fn(&str) -> bool) -> Result<(), LogError> {
    if message.role != Role::Agent && !message.action_requests.is_empty() {
        return Err(LogError::RequestsOnNonAgent(message.role.as_str()));
    }

    if message.role == Role::Tool {
        let id = message
            .correlation_id
            .as_deref()
            .ok_or(LogError::MissingCorrelation)?;
        if !known(id) {
            return Err(LogError::UnknownCorrelation(id.to_string()));
        }
    }

    Ok(())
}
