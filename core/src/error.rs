use thiserror::Error;

/// Everything that can go wrong between a spreadsheet landing on disk
/// and an answer coming back. Query and ingestion variants carry the
/// engine's diagnostic verbatim; it is shown to end users.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("{0}")]
    Ingestion(String),

    #[error("{0}")]
    Query(String),

    #[error("table '{0}' does not exist")]
    TableNotFound(String),

    /// The model broke the tool-calling contract: unknown tool name,
    /// unparseable arguments, or a reply with neither text nor calls.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("model did not respond within {secs} seconds")]
    OracleTimeout { secs: u64 },

    #[error("model unavailable: {0}")]
    OracleUnavailable(String),

    /// The loop hit its iteration bound without a final answer. The
    /// SQL issued so far rides along so callers can still show it.
    #[error("no answer after {iterations} iterations")]
    LoopExceeded {
        iterations: usize,
        sql_queries: Vec<String>,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_errors_render_the_diagnostic_verbatim() {
        let err = AgentError::Query("no such table: sales_2025".to_string());
        assert_eq!(err.to_string(), "no such table: sales_2025");
    }

    #[test]
    fn loop_exceeded_keeps_the_partial_trace() {
        let err = AgentError::LoopExceeded {
            iterations: 25,
            sql_queries: vec!["SELECT 1".to_string()],
        };
        assert_eq!(err.to_string(), "no answer after 25 iterations");
        match err {
            AgentError::LoopExceeded { sql_queries, .. } => {
                assert_eq!(sql_queries, vec!["SELECT 1".to_string()]);
            }
            _ => unreachable!(),
        }
    }
}
