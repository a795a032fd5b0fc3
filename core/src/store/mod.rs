use crate::error::{AgentError, Result};
use rusqlite::Connection;
use rusqlite::types::ValueRef;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;

/// Scalar value held in a table cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    fn to_sql_value(&self) -> rusqlite::types::Value {
        match self {
            Cell::Null => rusqlite::types::Value::Null,
            Cell::Bool(b) => rusqlite::types::Value::Integer(i64::from(*b)),
            Cell::Int(i) => rusqlite::types::Value::Integer(*i),
            Cell::Float(f) => rusqlite::types::Value::Real(*f),
            Cell::Text(s) => rusqlite::types::Value::Text(s.clone()),
        }
    }

    fn from_value_ref(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Cell::Null,
            ValueRef::Integer(i) => Cell::Int(i),
            ValueRef::Real(f) => Cell::Float(f),
            ValueRef::Text(t) => Cell::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Cell::Text(format!("<blob {} bytes>", b.len())),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Bool(b) => write!(f, "{}", b),
            Cell::Int(i) => write!(f, "{}", i),
            Cell::Float(v) => write!(f, "{}", v),
            Cell::Text(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ColumnInfo {
    pub name: String,
    pub decl_type: String,
}

/// Read-only view of one table: derived at ingest time and cached, so
/// schema lookups never scan rows. Replaced wholesale with its table.
#[derive(Debug, Clone)]
pub struct TableSchema {
    pub columns: Vec<ColumnInfo>,
    pub row_count: usize,
}

#[derive(Debug, Clone)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

/// In-memory relational store shared by all in-flight questions. The
/// connection mutex serializes ingestion and queries, so a reader can
/// never observe a half-replaced table.
pub struct TableStore {
    conn: Mutex<Connection>,
    catalog: Mutex<BTreeMap<String, TableSchema>>,
}

impl TableStore {
    pub fn new() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AgentError::Query(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
            catalog: Mutex::new(BTreeMap::new()),
        })
    }

    /// Replaces any existing table of this name atomically: drop,
    /// create, and all inserts run inside a single transaction.
    pub fn ingest(&self, name: &str, columns: &[String], rows: Vec<Vec<Cell>>) -> Result<()> {
        let types: Vec<&'static str> = (0..columns.len())
            .map(|i| column_affinity(rows.iter().filter_map(|r| r.get(i))))
            .collect();

        let mut conn = self.conn.lock().unwrap();
        let tx = conn
            .transaction()
            .map_err(|e| AgentError::Ingestion(e.to_string()))?;

        tx.execute(&format!("DROP TABLE IF EXISTS {}", quote_ident(name)), [])
            .map_err(|e| AgentError::Ingestion(e.to_string()))?;

        let column_defs: Vec<String> = columns
            .iter()
            .zip(&types)
            .map(|(c, t)| format!("{} {}", quote_ident(c), t))
            .collect();
        tx.execute(
            &format!(
                "CREATE TABLE {} ({})",
                quote_ident(name),
                column_defs.join(", ")
            ),
            [],
        )
        .map_err(|e| AgentError::Ingestion(e.to_string()))?;

        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
        let insert = format!(
            "INSERT INTO {} VALUES ({})",
            quote_ident(name),
            placeholders.join(", ")
        );

        let row_count = rows.len();
        {
            let mut stmt = tx
                .prepare(&insert)
                .map_err(|e| AgentError::Ingestion(e.to_string()))?;
            for row in rows {
                let mut values: Vec<rusqlite::types::Value> =
                    row.iter().map(Cell::to_sql_value).collect();
                values.resize(columns.len(), rusqlite::types::Value::Null);
                stmt.execute(rusqlite::params_from_iter(values))
                    .map_err(|e| AgentError::Ingestion(e.to_string()))?;
            }
        }

        tx.commit()
            .map_err(|e| AgentError::Ingestion(e.to_string()))?;

        let schema = TableSchema {
            columns: columns
                .iter()
                .zip(&types)
                .map(|(c, t)| ColumnInfo {
                    name: c.clone(),
                    decl_type: (*t).to_string(),
                })
                .collect(),
            row_count,
        };
        self.catalog
            .lock()
            .unwrap()
            .insert(name.to_string(), schema);

        Ok(())
    }

    pub fn schema(&self) -> BTreeMap<String, TableSchema> {
        self.catalog.lock().unwrap().clone()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.catalog.lock().unwrap().keys().cloned().collect()
    }

    /// Runs arbitrary SQL against the ingested tables. The engine's
    /// diagnostic is preserved verbatim; it is shown to end users.
    pub fn query(&self, sql: &str) -> Result<QueryResult> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| AgentError::Query(e.to_string()))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

        let mut rows = Vec::new();
        let mut result_rows = stmt
            .query([])
            .map_err(|e| AgentError::Query(e.to_string()))?;
        while let Some(row) = result_rows
            .next()
            .map_err(|e| AgentError::Query(e.to_string()))?
        {
            let mut cells = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                let value = row
                    .get_ref(i)
                    .map_err(|e| AgentError::Query(e.to_string()))?;
                cells.push(Cell::from_value_ref(value));
            }
            rows.push(cells);
        }

        Ok(QueryResult { columns, rows })
    }

    /// First `limit` rows in ingestion order.
    pub fn preview(&self, name: &str, limit: usize) -> Result<QueryResult> {
        if !self.catalog.lock().unwrap().contains_key(name) {
            return Err(AgentError::TableNotFound(name.to_string()));
        }
        self.query(&format!(
            "SELECT * FROM {} LIMIT {}",
            quote_ident(name),
            limit
        ))
    }

    /// Per table, per column: how many cells are NULL or empty text.
    pub fn missing_value_counts(&self) -> Result<Vec<(String, Vec<(String, u64)>)>> {
        let schema = self.schema();
        let mut report = Vec::new();

        for (table, info) in &schema {
            let mut missing = Vec::new();
            for column in &info.columns {
                let sql = format!(
                    "SELECT COUNT(*) FROM {} WHERE {col} IS NULL OR TRIM(CAST({col} AS TEXT)) = ''",
                    quote_ident(table),
                    col = quote_ident(&column.name)
                );
                let result = self.query(&sql)?;
                let count = match result.rows.first().and_then(|r| r.first()) {
                    Some(Cell::Int(n)) => *n as u64,
                    _ => 0,
                };
                if count > 0 {
                    missing.push((column.name.clone(), count));
                }
            }
            report.push((table.clone(), missing));
        }

        Ok(report)
    }
}

/// Double-quote an identifier so table and column names with special
/// characters stay usable in generated SQL.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn column_affinity<'a>(cells: impl Iterator<Item = &'a Cell>) -> &'static str {
    let mut saw_bool = false;
    let mut saw_int = false;
    let mut saw_float = false;

    for cell in cells {
        match cell {
            Cell::Null => {}
            Cell::Bool(_) => saw_bool = true,
            Cell::Int(_) => saw_int = true,
            Cell::Float(_) => saw_float = true,
            Cell::Text(_) => return "TEXT",
        }
    }

    if saw_float {
        "REAL"
    } else if saw_int {
        "INTEGER"
    } else if saw_bool {
        "BOOLEAN"
    } else {
        "TEXT"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_rows() -> Vec<Vec<Cell>> {
        vec![
            vec![
                Cell::Int(1),
                Cell::Text("germany".into()),
                Cell::Float(120.5),
            ],
            vec![Cell::Int(2), Cell::Text("france".into()), Cell::Float(80.0)],
            vec![Cell::Int(3), Cell::Null, Cell::Float(42.25)],
        ]
    }

    fn columns() -> Vec<String> {
        vec!["order_id".into(), "country".into(), "revenue".into()]
    }

    #[test]
    fn ingest_creates_queryable_table() {
        let store = TableStore::new().unwrap();
        store.ingest("sales", &columns(), sample_rows()).unwrap();

        let result = store.query("SELECT COUNT(*) FROM sales").unwrap();
        assert_eq!(result.rows[0][0], Cell::Int(3));
    }

    #[test]
    fn reingest_replaces_table_wholesale() {
        let store = TableStore::new().unwrap();
        store.ingest("sales", &columns(), sample_rows()).unwrap();
        store
            .ingest(
                "sales",
                &columns(),
                vec![vec![Cell::Int(9), Cell::Text("spain".into()), Cell::Float(1.0)]],
            )
            .unwrap();

        let result = store.query("SELECT COUNT(*) FROM sales").unwrap();
        assert_eq!(result.rows[0][0], Cell::Int(1));
        assert_eq!(store.schema()["sales"].row_count, 1);
    }

    #[test]
    fn schema_reports_columns_and_affinities() {
        let store = TableStore::new().unwrap();
        store.ingest("sales", &columns(), sample_rows()).unwrap();

        let schema = store.schema();
        let info = &schema["sales"];
        assert_eq!(info.row_count, 3);
        assert_eq!(info.columns.len(), 3);
        assert_eq!(info.columns[0].decl_type, "INTEGER");
        assert_eq!(info.columns[1].decl_type, "TEXT");
        assert_eq!(info.columns[2].decl_type, "REAL");
    }

    #[test]
    fn query_error_carries_engine_diagnostic() {
        let store = TableStore::new().unwrap();
        let err = store.query("SELECT * FROM nowhere").unwrap_err();
        match err {
            AgentError::Query(msg) => assert!(msg.contains("nowhere"), "got: {}", msg),
            other => panic!("expected Query error, got {:?}", other),
        }
    }

    #[test]
    fn preview_unknown_table_is_not_found() {
        let store = TableStore::new().unwrap();
        let err = store.preview("ghost", 5).unwrap_err();
        assert!(matches!(err, AgentError::TableNotFound(name) if name == "ghost"));
    }

    #[test]
    fn preview_respects_ingestion_order_and_limit() {
        let store = TableStore::new().unwrap();
        store.ingest("sales", &columns(), sample_rows()).unwrap();

        let result = store.preview("sales", 2).unwrap();
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[0][0], Cell::Int(1));
        assert_eq!(result.rows[1][0], Cell::Int(2));
    }

    #[test]
    fn missing_counts_flag_null_and_empty_cells() {
        let store = TableStore::new().unwrap();
        store.ingest("sales", &columns(), sample_rows()).unwrap();

        let report = store.missing_value_counts().unwrap();
        let (table, missing) = &report[0];
        assert_eq!(table, "sales");
        assert_eq!(missing.as_slice(), &[("country".to_string(), 1)]);
    }

    #[test]
    fn quoted_identifiers_survive_special_characters() {
        let store = TableStore::new().unwrap();
        store
            .ingest(
                "odd name",
                &["first col".into()],
                vec![vec![Cell::Int(7)]],
            )
            .unwrap();

        let result = store
            .query("SELECT \"first col\" FROM \"odd name\"")
            .unwrap();
        assert_eq!(result.rows[0][0], Cell::Int(7));
    }
}
