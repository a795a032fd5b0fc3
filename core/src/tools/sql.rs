use crate::store::TableStore;
use crate::tools::{extract_string_arg, render_table};
use crate::traits::{Tool, ToolResult};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

const MAX_RESULT_ROWS: usize = 100;

/// Runs arbitrary SQL against the store. Failing queries come back as
/// an error payload the oracle can read and correct, never as a crash
/// of the surrounding loop.
pub struct ExecuteSqlTool {
    store: Arc<TableStore>,
}

impl ExecuteSqlTool {
    pub fn new(store: Arc<TableStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for ExecuteSqlTool {
    fn name(&self) -> &str {
        "execute_sql_query"
    }

    fn description(&self) -> &str {
        "Execute a SQL query on the database and return results."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "SQL query to execute"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> ToolResult {
        let Some(query) = extract_string_arg(&args, "query") else {
            return ToolResult::error("Error executing query: missing 'query' parameter");
        };

        debug!(%query, "executing sql");
        match self.store.query(&query) {
            Ok(result) if result.rows.is_empty() => {
                ToolResult::success("Query returned no results.")
            }
            Ok(result) => ToolResult::success(render_table(&result, MAX_RESULT_ROWS)),
            Err(e) => {
                warn!(%query, error = %e, "query failed");
                ToolResult::error(format!("Error executing query: {}", e))
            }
        }
    }
}
