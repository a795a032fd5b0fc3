use crate::error::{AgentError, Result};
use crate::store::{Cell, TableStore};
use calamine::{Data, Reader, open_workbook_auto};
use std::path::Path;
use tracing::{debug, info};

/// Sheet names that carry bookkeeping rather than data.
const SKIPPED_SHEETS: &[&str] = &["metadata", "info"];

/// Loads every data sheet of a workbook into the store, one table per
/// sheet, named `{file_stem}_{sheet_name}` (sanitized, lowercase).
/// Re-ingesting the same file replaces the same tables wholesale.
pub fn ingest_workbook(store: &TableStore, path: &Path) -> Result<Vec<String>> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("workbook");

    let mut workbook = open_workbook_auto(path)
        .map_err(|e| AgentError::Ingestion(format!("{}: {}", path.display(), e)))?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    let mut created = Vec::new();
    for sheet_name in sheet_names {
        if SKIPPED_SHEETS.contains(&sheet_name.to_lowercase().as_str()) {
            debug!(sheet = %sheet_name, "skipping non-data sheet");
            continue;
        }

        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| AgentError::Ingestion(format!("sheet '{}': {}", sheet_name, e)))?;

        let mut rows_iter = range.rows();
        let Some(header) = rows_iter.next() else {
            debug!(sheet = %sheet_name, "skipping empty sheet");
            continue;
        };

        let columns = header_columns(header);
        let rows: Vec<Vec<Cell>> = rows_iter
            .map(|row| {
                let mut cells: Vec<Cell> = row.iter().map(convert_cell).collect();
                cells.resize(columns.len(), Cell::Null);
                cells
            })
            .collect();

        let table_name = format!("{}_{}", sanitize_name(stem), sanitize_name(&sheet_name));
        store.ingest(&table_name, &columns, rows)?;
        info!(
            sheet = %sheet_name,
            table = %table_name,
            columns = columns.len(),
            "loaded sheet"
        );
        created.push(table_name);
    }

    Ok(created)
}

/// Lowercase, alphanumeric and underscore only. Deterministic, so the
/// same file always produces the same table names.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

fn header_columns(header: &[Data]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::with_capacity(header.len());
    for (i, cell) in header.iter().enumerate() {
        let mut name = match cell {
            Data::Empty => String::new(),
            other => other.to_string().trim().to_string(),
        };
        if name.is_empty() {
            name = format!("column_{}", i + 1);
        }
        // SQLite rejects duplicate column names within one table.
        let mut candidate = name.clone();
        let mut suffix = 2;
        while columns.contains(&candidate) {
            candidate = format!("{}_{}", name, suffix);
            suffix += 1;
        }
        columns.push(candidate);
    }
    columns
}

fn convert_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Null,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Int(i) => Cell::Int(*i),
        Data::Float(f) => Cell::Float(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(d) => Cell::Text(d.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => Cell::Float(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(_) => Cell::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;
    use std::path::PathBuf;

    fn write_fixture(dir: &Path) -> PathBuf {
        let mut workbook = Workbook::new();

        let sheet = workbook.add_worksheet();
        sheet.set_name("Sales 2023").unwrap();
        sheet.write_string(0, 0, "order_id").unwrap();
        sheet.write_string(0, 1, "country").unwrap();
        sheet.write_string(0, 2, "revenue").unwrap();
        for i in 0..3u32 {
            sheet.write_number(i + 1, 0, (i + 1) as f64).unwrap();
            sheet.write_string(i + 1, 1, "germany").unwrap();
            sheet.write_number(i + 1, 2, 100.0 + i as f64).unwrap();
        }

        let extra = workbook.add_worksheet();
        extra.set_name("Returns").unwrap();
        extra.write_string(0, 0, "order_id").unwrap();
        extra.write_number(1, 0, 1.0).unwrap();

        let meta = workbook.add_worksheet();
        meta.set_name("Metadata").unwrap();
        meta.write_string(0, 0, "generated by test").unwrap();

        let path = dir.join("Q4 Report.xlsx");
        workbook.save(&path).unwrap();
        path
    }

    #[test]
    fn sanitize_is_lowercase_alnum_underscore() {
        assert_eq!(sanitize_name("Q4 Report.2023"), "q4_report_2023");
        assert_eq!(sanitize_name("Sales 2023"), "sales_2023");
        assert_eq!(sanitize_name("already_clean"), "already_clean");
    }

    #[test]
    fn header_columns_fill_blanks_and_dedupe() {
        let header = vec![
            Data::String("amount".into()),
            Data::Empty,
            Data::String("amount".into()),
        ];
        assert_eq!(
            header_columns(&header),
            vec!["amount", "column_2", "amount_2"]
        );
    }

    #[test]
    fn workbook_ingestion_skips_metadata_and_counts_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path());
        let store = TableStore::new().unwrap();

        let tables = ingest_workbook(&store, &path).unwrap();
        assert_eq!(
            tables,
            vec!["q4_report_sales_2023".to_string(), "q4_report_returns".to_string()]
        );

        let schema = store.schema();
        assert_eq!(schema["q4_report_sales_2023"].row_count, 3);
        assert_eq!(schema["q4_report_sales_2023"].columns.len(), 3);
        assert_eq!(schema["q4_report_returns"].row_count, 1);
        assert!(!schema.contains_key("q4_report_metadata"));
    }

    #[test]
    fn reingesting_same_file_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path());
        let store = TableStore::new().unwrap();

        let first = ingest_workbook(&store, &path).unwrap();
        let second = ingest_workbook(&store, &path).unwrap();
        assert_eq!(first, second);

        // No duplicate rows after replacement.
        let result = store
            .query("SELECT COUNT(*) FROM q4_report_sales_2023")
            .unwrap();
        assert_eq!(result.rows[0][0], Cell::Int(3));
    }

    #[test]
    fn unreadable_file_is_an_ingestion_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not_a_workbook.xlsx");
        std::fs::write(&path, b"plainly not a spreadsheet").unwrap();

        let store = TableStore::new().unwrap();
        let err = ingest_workbook(&store, &path).unwrap_err();
        assert!(matches!(err, AgentError::Ingestion(_)));
    }
}
