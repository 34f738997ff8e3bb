use crate::types::{ToolDefinition, ToolError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> Value;
    async fn execute(&self, args: Value) -> Result<Value, ToolError>;

    /// Reflection tools record reasoning only; they are scheduled apart from
    /// other tool calls and excluded from compressed findings.
    fn is_reflection(&self) -> bool {
        false
    }
}

/// Interface the researcher loop uses to call tools.
///
/// Implementations must tolerate concurrent invocations. Failures are returned
/// to the caller, never retried here.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn invoke(&self, name: &str, args: Value) -> Result<Value, ToolError>;
    fn definitions(&self) -> Vec<ToolDefinition>;
    fn is_reflection(&self, name: &str) -> bool;
}

#[derive(Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Create a registry with the research tools (web search, page fetch, think)
    pub fn with_default_tools() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(crate::tools::search::SearchTool::new()));
        registry.register(Arc::new(crate::tools::search::FetchPageTool::new()));
        registry.register(Arc::new(crate::tools::think::ThinkTool));
        registry
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get_tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect()
    }

    pub async fn execute(&self, name: &str, args: Value) -> Result<Value, ToolError> {
        match self.tools.get(name) {
            Some(tool) => tool.execute(args).await,
            None => Err(ToolError::NotFound(name.to_string())),
        }
    }

    /// Get a list of all registered tool names
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Check if a tool is registered
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }
}

#[async_trait]
impl ToolInvoker for ToolRegistry {
    async fn invoke(&self, name: &str, args: Value) -> Result<Value, ToolError> {
        self.execute(name, args).await
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        self.get_tool_definitions()
    }

    fn is_reflection(&self, name: &str) -> bool {
        self.tools
            .get(name)
            .map(|tool| tool.is_reflection())
            .unwrap_or(false)
    }
}
