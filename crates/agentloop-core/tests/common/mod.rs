//! Shared fixtures for the end-to-end tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use agentloop_core::{
    ActionRequest, Checkpoint, CheckpointStore, CheckpointSummary, Decision,
    HumanInputTool, InMemoryCheckpointStore, Message, ParameterProperty, ParameterSchema,
    ReasoningOracle, StoreError, Tool, ToolContext, ToolDescriptor, ToolOutcome,
    ToolRegistry, ToolResult,
};
use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

/// Oracle that replays queued decisions and records what it was shown
#[derive(Default)]
pub struct ScriptedOracle {
    script: Mutex<VecDeque<Decision>>,
    seen: Mutex<Vec<Vec<Message>>>,
    offline: AtomicBool,
}

impl ScriptedOracle {
    pub fn new(script: impl IntoIterator<Item = Decision>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            ..Default::default()
        })
    }

    pub fn push(&self, decision: Decision) {
        self.script.lock().unwrap().push_back(decision);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Message logs passed to each `decide` call, oldest first
    pub fn seen(&self) -> Vec<Vec<Message>> {
        self.seen.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl ReasoningOracle for ScriptedOracle {
    async fn decide(&self, messages: &[Message], _tools: &[ToolDescriptor]) -> Result<Decision> {
        if self.offline.load(Ordering::SeqCst) {
            bail!("connection refused");
        }
        self.seen.lock().unwrap().push(messages.to_vec());
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(decision) => Ok(decision),
            None => bail!("script exhausted"),
        }
    }
}

pub struct WeatherStub;

#[async_trait]
impl Tool for WeatherStub {
    fn name(&self) -> &str {
        "get_weather"
    }

    fn description(&self) -> &str {
        "Get current weather for a city"
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::new().with_required("city", ParameterProperty::string("City name"))
    }

    async fn invoke(&self, args: &Value, _ctx: &ToolContext) -> Result<ToolOutcome> {
        let city = args["city"].as_str().unwrap_or_default();
        Ok(ToolResult::success(format!("{}: Sunny, 72°F", city)).into())
    }
}

/// Records every recipient it was asked to email. Clones share the record.
#[derive(Clone, Default)]
pub struct EmailStub {
    pub sent: Arc<Mutex<Vec<String>>>,
}

impl EmailStub {
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Tool for EmailStub {
    fn name(&self) -> &str {
        "send_email"
    }

    fn description(&self) -> &str {
        "Send an email"
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .with_required("recipient", ParameterProperty::string("Address"))
            .with_required("subject", ParameterProperty::string("Subject"))
            .with_required("body", ParameterProperty::string("Body"))
    }

    async fn invoke(&self, args: &Value, _ctx: &ToolContext) -> Result<ToolOutcome> {
        let recipient = args["recipient"].as_str().unwrap_or_default().to_string();
        self.sent.lock().unwrap().push(recipient.clone());
        Ok(ToolResult::success(format!("Email sent to {}", recipient)).into())
    }
}

/// Fails every call, counting attempts
#[derive(Clone, Default)]
pub struct FlakyStub {
    pub calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Tool for FlakyStub {
    fn name(&self) -> &str {
        "flaky"
    }

    fn description(&self) -> &str {
        "Always times out"
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::new()
    }

    async fn invoke(&self, _args: &Value, _ctx: &ToolContext) -> Result<ToolOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        bail!("upstream timed out")
    }
}

/// In-memory store whose writes can be switched off
#[derive(Default)]
pub struct FailingStore {
    inner: InMemoryCheckpointStore,
    fail_saves: AtomicBool,
    limited: AtomicBool,
    budget: AtomicUsize,
}

impl FailingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail every save, or clear any failure mode
    pub fn set_failing(&self, failing: bool) {
        self.fail_saves.store(failing, Ordering::SeqCst);
        self.limited.store(false, Ordering::SeqCst);
    }

    /// Let the next `saves` writes through, then fail
    pub fn fail_after(&self, saves: usize) {
        self.budget.store(saves, Ordering::SeqCst);
        self.limited.store(true, Ordering::SeqCst);
    }

    fn refuses_write(&self) -> bool {
        if self.fail_saves.load(Ordering::SeqCst) {
            return true;
        }
        self.limited.load(Ordering::SeqCst)
            && self
                .budget
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_err()
    }
}

#[async_trait]
impl CheckpointStore for FailingStore {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        if self.refuses_write() {
            return Err(StoreError::Io {
                path: "/unavailable".into(),
                source: std::io::Error::other("store offline"),
            });
        }
        self.inner.save(checkpoint).await
    }

    async fn load(&self, conversation_id: &str) -> Result<Checkpoint, StoreError> {
        self.inner.load(conversation_id).await
    }

    async fn list(&self) -> Result<Vec<CheckpointSummary>, StoreError> {
        self.inner.list().await
    }

    async fn delete(&self, conversation_id: &str) -> Result<(), StoreError> {
        self.inner.delete(conversation_id).await
    }

    fn is_persistent(&self) -> bool {
        false
    }
}

pub fn registry(email: &EmailStub) -> ToolRegistry {
    ToolRegistry::new()
        .with(WeatherStub)
        .with(email.clone())
        .with(HumanInputTool::new())
}

pub fn weather(id: &str, city: &str) -> ActionRequest {
    ActionRequest::new(id, "get_weather", json!({ "city": city }))
}

pub fn email(id: &str, recipient: &str) -> ActionRequest {
    ActionRequest::new(
        id,
        "send_email",
        json!({ "recipient": recipient, "subject": "Update", "body": "Report attached" }),
    )
}

pub fn ask(id: &str, question: &str) -> ActionRequest {
    ActionRequest::new(id, "ask_human", json!({ "question": question }))
}
