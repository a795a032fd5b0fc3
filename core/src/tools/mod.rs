use crate::store::{Cell, QueryResult};
use serde_json::Value;
use std::fmt::Write;

pub mod missing;
pub mod preview;
pub mod schema;
pub mod sql;

pub use missing::MissingValuesTool;
pub use preview::PreviewTableTool;
pub use schema::DatabaseSchemaTool;
pub use sql::ExecuteSqlTool;

pub fn extract_string_arg(args: &Value, key: &str) -> Option<String> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

pub fn extract_usize_arg_opt(args: &Value, key: &str, default: usize) -> usize {
    args.get(key)
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .unwrap_or(default)
}

/// Column-aligned text rendering of a result set, capped at `max_rows`.
/// The oracle only consumes text, so this is the wire format for data.
pub fn render_table(result: &QueryResult, max_rows: usize) -> String {
    let shown = result.rows.len().min(max_rows);
    let cells: Vec<Vec<String>> = result.rows[..shown]
        .iter()
        .map(|row| row.iter().map(render_cell).collect())
        .collect();

    let mut widths: Vec<usize> = result.columns.iter().map(|c| c.len()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() && cell.len() > widths[i] {
                widths[i] = cell.len();
            }
        }
    }

    let mut out = String::new();
    let header: Vec<String> = result
        .columns
        .iter()
        .zip(&widths)
        .map(|(c, w)| format!("{:<width$}", c, width = w))
        .collect();
    let _ = writeln!(out, "{}", header.join("  ").trim_end());

    for row in &cells {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<width$}", c, width = w))
            .collect();
        let _ = writeln!(out, "{}", line.join("  ").trim_end());
    }

    if result.rows.len() > shown {
        let _ = writeln!(out, "... ({} more rows not shown)", result.rows.len() - shown);
    }

    out.trim_end().to_string()
}

fn render_cell(cell: &Cell) -> String {
    match cell {
        Cell::Null => "NULL".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn render_table_aligns_and_truncates() {
        let result = QueryResult {
            columns: vec!["country".into(), "revenue".into()],
            rows: vec![
                vec![Cell::Text("germany".into()), Cell::Float(120.5)],
                vec![Cell::Text("fr".into()), Cell::Int(3)],
                vec![Cell::Null, Cell::Int(9)],
            ],
        };
        let text = render_table(&result, 2);
        assert!(text.starts_with("country  revenue"));
        assert!(text.contains("germany  120.5"));
        assert!(text.contains("(1 more rows not shown)"));
        assert!(!text.contains("NULL"));
    }

    #[test]
    fn arg_helpers_read_json_values() {
        let args = json!({"query": "SELECT 1", "num_rows": 7});
        assert_eq!(extract_string_arg(&args, "query").unwrap(), "SELECT 1");
        assert_eq!(extract_usize_arg_opt(&args, "num_rows", 5), 7);
        assert_eq!(extract_usize_arg_opt(&args, "missing", 5), 5);
        assert!(extract_string_arg(&args, "missing").is_none());
    }
}
