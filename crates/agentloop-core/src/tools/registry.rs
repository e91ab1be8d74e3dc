//! Tool registry: name to capability mapping, read-only once a run starts

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use super::{Tool, ToolDescriptor};

/// Registry of available tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_arc(Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            warn!(tool = %name, "Replaced previously registered tool");
        }
    }

    /// Builder-style registration
    pub fn with<T: Tool + 'static>(mut self, tool: T) -> Self {
        self.register(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered tool names, sorted
    pub fn list_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Capability descriptors for the reasoning oracle, sorted by name
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        let mut descriptors: Vec<ToolDescriptor> =
            self.tools.values().map(|t| t.descriptor()).collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.list_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{HumanInputTool, ParameterSchema, ToolContext, ToolOutcome, ToolResult};
    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::Value;

    struct MockTool(&'static str);

    #[async_trait]
    impl Tool for MockTool {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "A mock tool for testing"
        }

        fn parameters_schema(&self) -> ParameterSchema {
            ParameterSchema::new()
        }

        async fn invoke(&self, _args: &Value, _ctx: &ToolContext) -> Result<ToolOutcome> {
            Ok(ToolResult::success("mock output").into())
        }
    }

    #[test]
    fn test_registry_register_and_get() {
        let mut registry = ToolRegistry::new();
        registry.register(MockTool("mock"));

        assert_eq!(registry.len(), 1);
        assert!(registry.get("mock").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert!(registry.contains("mock"));
    }

    #[test]
    fn test_registry_names_sorted() {
        let registry = ToolRegistry::new()
            .with(MockTool("zeta"))
            .with(MockTool("alpha"))
            .with(HumanInputTool::new());

        assert_eq!(registry.list_names(), vec!["alpha", "ask_human", "zeta"]);
        let names: Vec<String> = registry.descriptors().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["alpha", "ask_human", "zeta"]);
    }

    #[test]
    fn test_registry_replaces_same_name() {
        let registry = ToolRegistry::new().with(MockTool("mock")).with(MockTool("mock"));
        assert_eq!(registry.len(), 1);
    }
}
