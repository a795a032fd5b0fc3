use crate::error::{AgentError, Result};
use crate::traits::{ChatMessage, ChatRequest, Provider, ToolCall, ToolSpec};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_ORACLE_TIMEOUT: Duration = Duration::from_secs(120);

/// Fixed instruction prepended to every conversation. The SQL
/// guidelines materially change generated query correctness, so they
/// are part of the adapter contract rather than caller-supplied text.
const ANALYST_SYSTEM_PROMPT: &str = "\
You are a helpful data analyst assistant. You have access to a database containing spreadsheet data.

Your job is to:
1. First, use get_database_schema to understand what tables and columns are available
2. Use execute_sql_query to run SQL queries to answer questions
3. Use check_missing_values when asked about data quality
4. Provide clear, accurate answers based on the data

IMPORTANT SQL GUIDELINES:
- Always use LOWER() for case-insensitive text comparisons (e.g., WHERE LOWER(column) = 'value')
- Double-quote table and column names that contain spaces or special characters
- When asked for a whole-table aggregate, do not GROUP BY a dimension unless the question explicitly asks for a per-dimension breakdown

Always explain your reasoning and show the data that supports your answer.";

/// What the oracle decided this turn. Providers embed tool-call
/// payloads in provider-specific places; the loop only ever sees this
/// union. No tool-call payload on the raw reply means `Answer`.
#[derive(Debug, Clone)]
pub enum OracleReply {
    Answer(String),
    ToolRequest { text: String, calls: Vec<ToolCall> },
}

pub struct OracleAdapter {
    provider: Arc<dyn Provider>,
    timeout: Duration,
}

impl OracleAdapter {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            timeout: DEFAULT_ORACLE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    pub async fn invoke(
        &self,
        conversation: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<OracleReply> {
        let mut messages = Vec::with_capacity(conversation.len() + 1);
        messages.push(ChatMessage::system(ANALYST_SYSTEM_PROMPT));
        messages.extend_from_slice(conversation);

        let request = ChatRequest {
            messages: &messages,
            tools: if tools.is_empty() { None } else { Some(tools) },
        };

        let response = tokio::time::timeout(self.timeout, self.provider.chat(request))
            .await
            .map_err(|_| AgentError::OracleTimeout {
                secs: self.timeout.as_secs(),
            })??;

        if response.has_tool_calls() {
            Ok(OracleReply::ToolRequest {
                text: response.text_or_empty().to_string(),
                calls: response.tool_calls,
            })
        } else {
            match response.text {
                Some(text) => Ok(OracleReply::Answer(text)),
                None => Err(AgentError::ProtocolViolation(
                    "oracle reply carried neither text nor tool calls".to_string(),
                )),
            }
        }
    }
}
