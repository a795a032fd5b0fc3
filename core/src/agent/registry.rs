use crate::error::{AgentError, Result};
use crate::traits::{Tool, ToolResult, ToolSpec};
use std::sync::{Arc, Mutex};

pub struct ToolRegistry {
    tools: Mutex<Vec<Arc<dyn Tool>>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Mutex::new(Vec::new()),
        }
    }

    pub fn register(&self, tool: Arc<dyn Tool>) {
        let mut tools = self.tools.lock().unwrap();
        tools.push(tool);
    }

    pub fn get_specs(&self) -> Vec<ToolSpec> {
        let tools = self.tools.lock().unwrap();
        tools.iter().map(|t| t.spec()).collect()
    }

    /// Dispatches one call. An unknown name is a protocol violation:
    /// it means the oracle and this registry disagree on the declared
    /// tool set, which no retry can fix. Known tools are total and
    /// report their own failures inside the returned payload.
    pub async fn execute(&self, name: &str, args: serde_json::Value) -> Result<ToolResult> {
        let tool = {
            let tools = self.tools.lock().unwrap();
            tools.iter().find(|t| t.name() == name).cloned()
        };

        match tool {
            Some(tool) => Ok(tool.execute(args).await),
            None => Err(AgentError::ProtocolViolation(format!(
                "oracle requested unknown tool '{}'",
                name
            ))),
        }
    }
}
