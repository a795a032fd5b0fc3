pub mod loop_;
pub mod oracle;
pub mod registry;

pub use loop_::{AgentLoop, RunOutcome};
pub use oracle::{OracleAdapter, OracleReply};
pub use registry::ToolRegistry;
