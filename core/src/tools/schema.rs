use crate::store::TableStore;
use crate::traits::{Tool, ToolResult};
use async_trait::async_trait;
use serde_json::json;
use std::fmt::Write;
use std::sync::Arc;
use tracing::debug;

pub struct DatabaseSchemaTool {
    store: Arc<TableStore>,
}

impl DatabaseSchemaTool {
    pub fn new(store: Arc<TableStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for DatabaseSchemaTool {
    fn name(&self) -> &str {
        "get_database_schema"
    }

    fn description(&self) -> &str {
        "Get the schema of all available database tables including column names and types. \
         Use this first to understand what data is available."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _args: serde_json::Value) -> ToolResult {
        let schema = self.store.schema();
        debug!(tables = schema.len(), "rendering database schema");

        if schema.is_empty() {
            return ToolResult::success("No tables have been ingested yet.");
        }

        let mut out = String::from("Available Tables:\n\n");
        for (name, info) in &schema {
            let _ = writeln!(out, "Table: {}", name);
            let _ = writeln!(out, "  Rows: {}", info.row_count);
            let _ = writeln!(out, "  Columns:");
            for column in &info.columns {
                let _ = writeln!(out, "    - {} ({})", column.name, column.decl_type);
            }
            out.push('\n');
        }

        ToolResult::success(out.trim_end().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Cell;
    use serde_json::json;

    #[tokio::test]
    async fn lists_every_table_with_column_counts() {
        let store = Arc::new(TableStore::new().unwrap());
        store
            .ingest(
                "sales",
                &["id".into(), "country".into()],
                vec![vec![Cell::Int(1), Cell::Text("fr".into())]],
            )
            .unwrap();
        store
            .ingest("empty", &["only".into()], vec![])
            .unwrap();

        let result = DatabaseSchemaTool::new(store).execute(json!({})).await;
        assert!(result.success);
        assert!(result.output.contains("Table: sales"));
        assert!(result.output.contains("Rows: 1"));
        assert!(result.output.contains("- id (INTEGER)"));
        assert!(result.output.contains("- country (TEXT)"));
        assert!(result.output.contains("Table: empty"));
    }

    #[tokio::test]
    async fn reports_when_nothing_is_ingested() {
        let store = Arc::new(TableStore::new().unwrap());
        let result = DatabaseSchemaTool::new(store).execute(json!({})).await;
        assert!(result.output.contains("No tables"));
    }
}
