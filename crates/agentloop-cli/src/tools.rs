//! Demo tools: canned weather lookup and a pretend mailer

use agentloop_core::{
    HumanInputTool, ParameterProperty, ParameterSchema, Tool, ToolContext, ToolOutcome,
    ToolRegistry, ToolResult,
};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// Looks up weather from a fixed table
pub struct WeatherTool;

impl WeatherTool {
    pub fn lookup(city: &str) -> &'static str {
        match city.trim().to_lowercase().as_str() {
            "san francisco" => "☀️ Sunny, 72°F",
            "new york" => "🌧️ Rainy, 58°F",
            "london" => "☁️ Cloudy, 55°F",
            _ => "🤷 Weather data not available",
        }
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "get_weather"
    }

    fn description(&self) -> &str {
        "Get the current weather for a city"
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::new().with_required("city", ParameterProperty::string("City name"))
    }

    async fn invoke(&self, args: &Value, _ctx: &ToolContext) -> Result<ToolOutcome> {
        let city = args
            .get("city")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("city must be a string"))?;

        Ok(ToolResult::success(Self::lookup(city)).into())
    }
}

/// Pretends to send an email
pub struct EmailTool;

#[async_trait]
impl Tool for EmailTool {
    fn name(&self) -> &str {
        "send_email"
    }

    fn description(&self) -> &str {
        "Send an email to a recipient"
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .with_required("recipient", ParameterProperty::string("Email address"))
            .with_required("subject", ParameterProperty::string("Subject line"))
    }

    async fn invoke(&self, args: &Value, ctx: &ToolContext) -> Result<ToolOutcome> {
        let recipient = args
            .get("recipient")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        if !recipient.contains('@') {
            return Ok(ToolResult::error(format!("Invalid recipient: '{}'", recipient)).into());
        }

        let subject = args.get("subject").and_then(|v| v.as_str()).unwrap_or_default();
        debug!(conversation_id = %ctx.conversation_id, recipient, subject, "Sending email");
        Ok(ToolResult::success(format!("Email sent to {}", recipient)).into())
    }
}

/// `get_weather`, `send_email` and `ask_human`
pub fn demo_registry() -> ToolRegistry {
    ToolRegistry::new()
        .with(WeatherTool)
        .with(EmailTool)
        .with(HumanInputTool::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> ToolContext {
        ToolContext::new("c1", "r1")
    }

    async fn run(tool: &dyn Tool, args: Value) -> ToolResult {
        match tool.invoke(&args, &ctx()).await.unwrap() {
            ToolOutcome::Completed(result) => result,
            ToolOutcome::Suspend(_) => panic!("demo tools never suspend"),
        }
    }

    #[tokio::test]
    async fn test_weather_lookup() {
        let result = run(&WeatherTool, json!({"city": "London"})).await;
        assert!(result.success);
        assert_eq!(result.output, "☁️ Cloudy, 55°F");

        assert_eq!(WeatherTool::lookup("  NEW YORK "), "🌧️ Rainy, 58°F");
        assert_eq!(WeatherTool::lookup("Paris"), "🤷 Weather data not available");
    }

    #[tokio::test]
    async fn test_email_validates_recipient() {
        let sent = run(&EmailTool, json!({"recipient": "boss@company.com", "subject": "Hi"})).await;
        assert_eq!(sent.output, "Email sent to boss@company.com");

        let rejected = run(&EmailTool, json!({"recipient": "nobody", "subject": "Hi"})).await;
        assert!(!rejected.success);
        assert_eq!(rejected.error.as_deref(), Some("Invalid recipient: 'nobody'"));
    }

    #[test]
    fn test_demo_registry_contents() {
        let registry = demo_registry();
        assert_eq!(registry.list_names(), vec!["ask_human", "get_weather", "send_email"]);
    }
}
