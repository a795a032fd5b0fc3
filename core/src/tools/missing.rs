use crate::store::TableStore;
use crate::traits::{Tool, ToolResult};
use async_trait::async_trait;
use serde_json::json;
use std::fmt::Write;
use std::sync::Arc;

pub struct MissingValuesTool {
    store: Arc<TableStore>,
}

impl MissingValuesTool {
    pub fn new(store: Arc<TableStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for MissingValuesTool {
    fn name(&self) -> &str {
        "check_missing_values"
    }

    fn description(&self) -> &str {
        "Check for missing values (NULL or empty) across all tables."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _args: serde_json::Value) -> ToolResult {
        let report = match self.store.missing_value_counts() {
            Ok(report) => report,
            Err(e) => return ToolResult::error(format!("Error checking missing values: {}", e)),
        };

        let mut out = String::from("Missing Values Report:\n\n");
        let mut any = false;
        for (table, missing) in &report {
            if missing.is_empty() {
                continue;
            }
            any = true;
            let _ = writeln!(out, "Table: {}", table);
            for (column, count) in missing {
                let _ = writeln!(out, "  - {}: {} missing values", column, count);
            }
            out.push('\n');
        }

        if !any {
            out.push_str("No missing values found in any table.");
        }

        ToolResult::success(out.trim_end().to_string())
    }
}
