//! Tool registry for model tool-calling.

mod search;

pub use search::CourseSearchTool;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::errors::ApiError;

/// A tool the model can invoke during generation.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Anthropic tool definition (name, description, input_schema).
    fn definition(&self) -> Value;

    async fn execute(&self, args: &Value) -> Result<String, ApiError>;

    /// Sources gathered during the most recent execution, for the UI.
    fn last_sources(&self) -> Vec<String> {
        Vec::new()
    }

    fn reset_sources(&self) {}
}

#[derive(Default)]
pub struct ToolManager {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_tool(&mut self, tool: Arc<dyn Tool>) -> Result<(), ApiError> {
        let definition = tool.definition();
        let name = definition["name"]
            .as_str()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                ApiError::BadRequest("Tool must have a 'name' in its definition".to_string())
            })?;
        self.tools.insert(name.to_string(), tool);
        Ok(())
    }

    pub fn get_tool_definitions(&self) -> Vec<Value> {
        self.tools.values().map(|tool| tool.definition()).collect()
    }

    /// Dispatches a tool call by name. An unknown tool is reported to the
    /// model as text rather than failing the request.
    pub async fn execute_tool(&self, name: &str, args: &Value) -> Result<String, ApiError> {
        match self.tools.get(name) {
            Some(tool) => tool.execute(args).await,
            None => Ok(format!("Tool '{}' not found", name)),
        }
    }

    /// Sources from the first tool that has any.
    pub fn get_last_sources(&self) -> Vec<String> {
        for tool in self.tools.values() {
            let sources = tool.last_sources();
            if !sources.is_empty() {
                return sources;
            }
        }
        Vec::new()
    }

    pub fn reset_sources(&self) {
        for tool in self.tools.values() {
            tool.reset_sources();
        }
    }
}
