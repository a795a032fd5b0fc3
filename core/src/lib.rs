pub mod agent;
pub mod config;
pub mod error;
pub mod ingest;
pub mod providers;
pub mod store;
pub mod tools;
pub mod trace;
pub mod traits;
pub mod workbench;

pub use agent::{AgentLoop, OracleAdapter, OracleReply, RunOutcome, ToolRegistry};
pub use error::{AgentError, Result};
pub use ingest::ingest_workbook;
pub use providers::{MistralProvider, OpenAiProvider, create_provider};
pub use store::{Cell, QueryResult, TableSchema, TableStore};
pub use trace::{LogTraceSink, NoopTraceSink, TraceSink};
pub use traits::{ChatMessage, ChatRequest, ChatResponse, Provider, Tool, ToolCall, ToolResult, ToolSpec};
pub use workbench::Workbench;
