//! Human-input tool: the one tool kind that suspends a run

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use super::{ParameterProperty, ParameterSchema, Tool, ToolContext, ToolKind, ToolOutcome};
use crate::message::SuspensionRequest;

/// Asks a human a question. The run stops until the answer is delivered
/// through `RunController::resume`.
pub struct HumanInputTool {
    name: String,
}

impl HumanInputTool {
    pub const DEFAULT_NAME: &'static str = "ask_human";

    pub fn new() -> Self {
        Self {
            name: Self::DEFAULT_NAME.to_string(),
        }
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for HumanInputTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for HumanInputTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Ask a human for input when you need clarification or confirmation"
    }

    fn kind(&self) -> ToolKind {
        ToolKind::HumanInput
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .with_required("question", ParameterProperty::string("Question to ask the human"))
    }

    async fn invoke(&self, args: &Value, _ctx: &ToolContext) -> Result<ToolOutcome> {
        let question = args
            .get("question")
            .and_then(|v| v.as_str())
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("Missing required parameter: question"))?;

        Ok(ToolOutcome::Suspend(SuspensionRequest::question(question)))
    }
}
