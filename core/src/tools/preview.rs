use crate::store::TableStore;
use crate::tools::{extract_string_arg, extract_usize_arg_opt, render_table};
use crate::traits::{Tool, ToolResult};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

const DEFAULT_PREVIEW_ROWS: usize = 5;

pub struct PreviewTableTool {
    store: Arc<TableStore>,
}

impl PreviewTableTool {
    pub fn new(store: Arc<TableStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for PreviewTableTool {
    fn name(&self) -> &str {
        "preview_table"
    }

    fn description(&self) -> &str {
        "Preview the first few rows of a table."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "table_name": {
                    "type": "string",
                    "description": "Name of the table to preview"
                },
                "num_rows": {
                    "type": "integer",
                    "description": "Number of rows to show (default: 5)"
                }
            },
            "required": ["table_name"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> ToolResult {
        let Some(table_name) = extract_string_arg(&args, "table_name") else {
            return ToolResult::error("Error previewing table: missing 'table_name' parameter");
        };
        let num_rows = extract_usize_arg_opt(&args, "num_rows", DEFAULT_PREVIEW_ROWS);

        debug!(table = %table_name, rows = num_rows, "previewing table");
        match self.store.preview(&table_name, num_rows) {
            Ok(result) if result.rows.is_empty() => {
                ToolResult::success(format!("Table '{}' is empty.", table_name))
            }
            Ok(result) => ToolResult::success(render_table(&result, num_rows)),
            Err(e) => ToolResult::error(format!("Error previewing table: {}", e)),
        }
    }
}
