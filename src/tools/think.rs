//! Reflection ("think") tool
//!
//! Lets an agent record a short strategic reflection between search batches.
//! The reflection is logged and echoed back; it carries no research content.

use crate::tools::registry::Tool;
use crate::types::ToolError;
use async_trait::async_trait;
use serde_json::{json, Value};

pub const THINK_TOOL_NAME: &str = "think";

pub struct ThinkTool;

/// Record a reflection outside the tool-calling loop (used by the supervisor).
pub fn record_reflection(agent: &str, reflection: &str) -> String {
    tracing::info!(agent, reflection, "Reflection recorded");
    format!("Reflection recorded: {}", reflection)
}

#[async_trait]
impl Tool for ThinkTool {
    fn name(&self) -> &str {
        THINK_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Record a short reflection on the results so far: what was found, what is missing, \
         and whether to search more or stop. Never call together with other tools."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "reflection": {
                    "type": "string",
                    "description": "Your reflection on research progress and next steps"
                }
            },
            "required": ["reflection"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let reflection = args
            .get("reflection")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'reflection' parameter".to_string()))?;

        Ok(json!({ "recorded": record_reflection("researcher", reflection) }))
    }

    fn is_reflection(&self) -> bool {
        true
    }
}
