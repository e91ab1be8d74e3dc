//! Tool framework for the execution step
//!
//! Tools are opaque collaborators: a name, a parameter schema and an
//! invocation that either completes or asks the run to suspend.

mod human;
pub mod registry;

pub use human::HumanInputTool;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::message::SuspensionRequest;

/// Kind of tool, deciding whether it may suspend a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Always completes (successfully or not)
    Standard,
    /// May raise a suspension request to wait for a human
    HumanInput,
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolKind::Standard => write!(f, "standard"),
            ToolKind::HumanInput => write!(f, "human_input"),
        }
    }
}

/// Result of tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the tool executed successfully
    pub success: bool,
    /// Output from the tool
    pub output: String,
    /// Error message if failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
        }
    }

    /// String form recorded in the tool message
    pub fn to_content(&self) -> String {
        if self.success {
            return self.output.clone();
        }

        let error = self.error.as_deref().unwrap_or("unknown error");
        if self.output.is_empty() {
            format!("Tool error: {}", error)
        } else {
            format!("Tool error: {}\n{}", error, self.output)
        }
    }
}

/// What a tool invocation produced
#[derive(Debug, Clone)]
pub enum ToolOutcome {
    Completed(ToolResult),
    Suspend(SuspensionRequest),
}

impl From<ToolResult> for ToolOutcome {
    fn from(result: ToolResult) -> Self {
        ToolOutcome::Completed(result)
    }
}

/// Context provided to tools during execution
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Conversation the action belongs to
    pub conversation_id: String,
    /// Id of the action request being executed
    pub request_id: String,
}

impl ToolContext {
    pub fn new(conversation_id: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            request_id: request_id.into(),
        }
    }
}

/// Schema for a tool parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterProperty {
    /// Parameter type (string, number, boolean, array, object)
    #[serde(rename = "type")]
    pub param_type: String,
    pub description: String,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

impl ParameterProperty {
    fn typed(param_type: &str, description: impl Into<String>) -> Self {
        Self {
            param_type: param_type.to_string(),
            description: description.into(),
            enum_values: None,
        }
    }

    pub fn string(description: impl Into<String>) -> Self {
        Self::typed("string", description)
    }

    pub fn with_enum(mut self, values: Vec<String>) -> Self {
        self.enum_values = Some(values);
        self
    }
}

/// JSON-schema style description of a tool's arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Always "object"
    #[serde(rename = "type")]
    pub schema_type: String,
    pub properties: HashMap<String, ParameterProperty>,
    #[serde(default)]
    pub required: Vec<String>,
}

impl ParameterSchema {
    pub fn new() -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: HashMap::new(),
            required: Vec::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, prop: ParameterProperty) -> Self {
        self.properties.insert(name.into(), prop);
        self
    }

    pub fn with_required(mut self, name: impl Into<String>, prop: ParameterProperty) -> Self {
        let name = name.into();
        self.properties.insert(name.clone(), prop);
        self.required.push(name);
        self
    }

    /// Names of required parameters missing from `args`
    pub fn missing_required<'a>(&'a self, args: &Value) -> Vec<&'a str> {
        self.required
            .iter()
            .filter(|name| args.get(name.as_str()).map_or(true, Value::is_null))
            .map(String::as_str)
            .collect()
    }
}

impl Default for ParameterSchema {
    fn default() -> Self {
        Self::new()
    }
}

/// Capability descriptor handed to the reasoning oracle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub kind: ToolKind,
    pub parameters: ParameterSchema,
}

/// The Tool trait that all tools must implement
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn kind(&self) -> ToolKind {
        ToolKind::Standard
    }

    fn parameters_schema(&self) -> ParameterSchema;

    /// Run the tool. `Err` is a tool fault and is reported back to the log.
    async fn invoke(&self, args: &Value, ctx: &ToolContext) -> Result<ToolOutcome>;

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            kind: self.kind(),
            parameters: self.parameters_schema(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_result_content() {
        assert_eq!(ToolResult::success("Sunny").to_content(), "Sunny");
        assert_eq!(
            ToolResult::error("city not found").to_content(),
            "Tool error: city not found"
        );

        let partial = ToolResult {
            success: false,
            output: "partial output".into(),
            error: Some("timeout".into()),
        };
        assert_eq!(partial.to_content(), "Tool error: timeout\npartial output");
    }

    #[test]
    fn test_missing_required() {
        let schema = ParameterSchema::new()
            .with_required("city", ParameterProperty::string("City name"))
            .with_property("units", ParameterProperty::string("Units"));

        assert!(schema.missing_required(&json!({"city": "Paris"})).is_empty());
        assert_eq!(schema.missing_required(&json!({"units": "c"})), vec!["city"]);
        assert_eq!(schema.missing_required(&json!({"city": null})), vec!["city"]);
    }

    #[test]
    fn test_schema_serializes_as_json_schema() {
        let schema = ParameterSchema::new().with_required(
            "unit",
            ParameterProperty::string("Unit").with_enum(vec!["c".into(), "f".into()]),
        );
        let value = serde_json::to_value(&schema).unwrap();
        assert_eq!(value["type"], "object");
        assert_eq!(value["required"], json!(["unit"]));
        assert_eq!(value["properties"]["unit"]["enum"], json!(["c", "f"]));
    }
}
