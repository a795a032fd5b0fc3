use crate::agent::{AgentLoop, OracleAdapter, RunOutcome, ToolRegistry};
use crate::error::Result;
use crate::ingest::ingest_workbook;
use crate::store::{QueryResult, TableStore};
use crate::tools::{DatabaseSchemaTool, ExecuteSqlTool, MissingValuesTool, PreviewTableTool};
use crate::trace::{NoopTraceSink, TraceSink};
use crate::traits::Provider;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Front door for callers: one table store, one provider, one trace
/// sink, wired explicitly at startup and handed to whoever needs them.
/// Each question gets its own registry, adapter, and loop, so run
/// state is never shared between in-flight questions; only the store
/// is, and it serializes internally.
pub struct Workbench {
    store: Arc<TableStore>,
    provider: Arc<dyn Provider>,
    sink: Arc<dyn TraceSink>,
    max_iterations: usize,
    oracle_timeout: Duration,
}

impl Workbench {
    pub fn new(store: Arc<TableStore>, provider: Arc<dyn Provider>) -> Self {
        Self {
            store,
            provider,
            sink: Arc::new(NoopTraceSink),
            max_iterations: 25,
            oracle_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_oracle_timeout(mut self, timeout: Duration) -> Self {
        self.oracle_timeout = timeout;
        self
    }

    pub fn store(&self) -> Arc<TableStore> {
        self.store.clone()
    }

    /// Loads every data sheet of the file as a table; returns the
    /// created table names.
    pub fn ingest_spreadsheet(&self, path: &Path) -> Result<Vec<String>> {
        ingest_workbook(&self.store, path)
    }

    pub async fn answer_question(&self, question: &str) -> Result<RunOutcome> {
        self.build_loop().process(question).await
    }

    /// Direct SQL, bypassing the agent loop entirely.
    pub fn run_sql(&self, sql: &str) -> Result<QueryResult> {
        self.store.query(sql)
    }

    /// Explicit session boundary for callers. Every question already
    /// gets fresh per-question machinery, so there is nothing to tear
    /// down; ingested tables survive.
    pub fn reset(&self) {
        debug!("workbench reset: per-question machinery is rebuilt on next call");
    }

    fn build_loop(&self) -> AgentLoop {
        let registry = Arc::new(ToolRegistry::new());
        registry.register(Arc::new(DatabaseSchemaTool::new(self.store.clone())));
        registry.register(Arc::new(ExecuteSqlTool::new(self.store.clone())));
        registry.register(Arc::new(PreviewTableTool::new(self.store.clone())));
        registry.register(Arc::new(MissingValuesTool::new(self.store.clone())));

        let oracle =
            OracleAdapter::new(self.provider.clone()).with_timeout(self.oracle_timeout);
        AgentLoop::new(oracle, registry, self.sink.clone())
            .with_max_iterations(self.max_iterations)
    }
}
