//! Tool registry for managing available tools

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{Result, ToolError};
use crate::tool::{Tool, ToolOutput, ToolSchema};

/// Registry for managing available tools.
///
/// Tools are registered before the registry is shared (usually behind an
/// `Arc`), so lookups during a turn need no locking.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    /// Create a new empty tool registry
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. A tool with the same name replaces the previous one.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    /// Register a tool from Arc
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Result<Arc<dyn Tool>> {
        self.tools
            .get(name)
            .cloned()
            .ok_or_else(|| ToolError::NotFound(name.to_string()))
    }

    /// Check if tool exists
    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// List all tool names, sorted
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Get schemas for all registered tools, ordered by name
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self.tools.values().map(|t| t.schema()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Execute a tool by name
    pub async fn execute(&self, name: &str, input: Value) -> Result<ToolOutput> {
        let tool = self.get(name)?;
        tool.execute(input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::FnTool;
    use serde_json::json;

    #[test]
    fn test_tool_registry_empty() {
        let registry = ToolRegistry::new();
        assert!(!registry.has("unknown"));
        assert!(registry.is_empty());
        assert_eq!(registry.list().len(), 0);
        assert_eq!(registry.schemas().len(), 0);
    }

    #[tokio::test]
    async fn test_execute_not_found() {
        let registry = ToolRegistry::new();
        let result = registry.execute("missing", json!({})).await;
        assert!(matches!(result, Err(ToolError::NotFound(name)) if name == "missing"));
    }

    #[test]
    fn test_get_missing_reports_name() {
        let registry = ToolRegistry::new();
        let err = registry.get("ghost").err().map(|e| e.to_string());
        assert_eq!(err.as_deref(), Some("Tool 'ghost' not found"));
    }

    #[test]
    fn test_schemas_sorted_by_name() {
        let mut registry = ToolRegistry::new();
        registry.register(FnTool::from_fn("zeta", "last", |_| Ok(json!(null))));
        registry.register(FnTool::from_fn("alpha", "first", |_| Ok(json!(null))));

        let names: Vec<String> = registry.schemas().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert_eq!(registry.list(), vec!["alpha", "zeta"]);
    }

    #[tokio::test]
    async fn test_register_replaces_same_name() {
        let mut registry = ToolRegistry::new();
        registry.register(FnTool::from_fn("echo", "v1", |_| Ok(json!("one"))));
        registry.register(FnTool::from_fn("echo", "v2", |_| Ok(json!("two"))));

        assert_eq!(registry.list().len(), 1);
        let output = registry.execute("echo", json!({})).await.unwrap();
        assert_eq!(output.result, json!("two"));
    }
}
