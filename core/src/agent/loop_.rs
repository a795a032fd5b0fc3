use crate::agent::oracle::{OracleAdapter, OracleReply};
use crate::agent::registry::ToolRegistry;
use crate::error::{AgentError, Result};
use crate::trace::TraceSink;
use crate::traits::{ChatMessage, ToolCall};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

const DEFAULT_MAX_ITERATIONS: usize = 25;

/// Result of one fully resolved question: the narrated answer plus
/// every SQL statement attempted along the way, as provenance.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub answer: String,
    pub sql_queries: Vec<String>,
    pub model: String,
}

enum LoopState {
    AwaitingOracle,
    ExecutingTools(Vec<ToolCall>),
    Done(String),
}

/// The agent control loop: alternates between the oracle and local
/// tool execution until the oracle produces a final answer or the
/// iteration bound trips. All run state lives in this call frame; one
/// loop value can serve many questions but never two concurrently
/// interleaved through the same frame.
pub struct AgentLoop {
    oracle: OracleAdapter,
    registry: Arc<ToolRegistry>,
    sink: Arc<dyn TraceSink>,
    max_iterations: usize,
}

impl AgentLoop {
    pub fn new(
        oracle: OracleAdapter,
        registry: Arc<ToolRegistry>,
        sink: Arc<dyn TraceSink>,
    ) -> Self {
        Self {
            oracle,
            registry,
            sink,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub async fn process(&self, question: &str) -> Result<RunOutcome> {
        let run_id = Uuid::new_v4();
        self.sink.run_started(run_id, question);

        match self.run(run_id, question).await {
            Ok(outcome) => {
                self.sink
                    .run_finished(run_id, true, &outcome.answer, outcome.sql_queries.len());
                Ok(outcome)
            }
            Err(e) => {
                let query_count = match &e {
                    AgentError::LoopExceeded { sql_queries, .. } => sql_queries.len(),
                    _ => 0,
                };
                self.sink
                    .run_finished(run_id, false, &e.to_string(), query_count);
                Err(e)
            }
        }
    }

    async fn run(&self, run_id: Uuid, question: &str) -> Result<RunOutcome> {
        let tool_specs = self.registry.get_specs();
        let mut messages = vec![ChatMessage::user(question)];
        let mut sql_queries: Vec<String> = Vec::new();
        let mut iterations = 0;
        let mut state = LoopState::AwaitingOracle;

        let answer = loop {
            state = match state {
                LoopState::AwaitingOracle => {
                    if iterations == self.max_iterations {
                        return Err(AgentError::LoopExceeded {
                            iterations,
                            sql_queries,
                        });
                    }
                    iterations += 1;

                    let reply = self.oracle.invoke(&messages, &tool_specs).await?;
                    match reply {
                        OracleReply::Answer(text) => {
                            self.sink.oracle_called(run_id, iterations, &text);
                            messages.push(ChatMessage::assistant(text.clone()));
                            LoopState::Done(text)
                        }
                        OracleReply::ToolRequest { text, calls } if calls.is_empty() => {
                            // Degenerate reply: nominally a tool request
                            // with nothing to run. Stop instead of
                            // spinning on it forever.
                            warn!(iteration = iterations, "oracle requested tools but listed none");
                            self.sink.oracle_called(run_id, iterations, &text);
                            messages.push(ChatMessage::assistant(text.clone()));
                            LoopState::Done(text)
                        }
                        OracleReply::ToolRequest { text, calls } => {
                            let names: Vec<&str> =
                                calls.iter().map(|c| c.name.as_str()).collect();
                            self.sink.oracle_called(
                                run_id,
                                iterations,
                                &format!("tool request: {}", names.join(", ")),
                            );
                            messages.push(ChatMessage::assistant_with_tool_calls(
                                text,
                                calls.clone(),
                            ));
                            LoopState::ExecutingTools(calls)
                        }
                    }
                }
                LoopState::ExecutingTools(calls) => {
                    // Strictly in the order the oracle listed them.
                    for call in calls {
                        let args: serde_json::Value = serde_json::from_str(&call.arguments)
                            .map_err(|e| {
                                AgentError::ProtocolViolation(format!(
                                    "unparseable arguments for tool '{}': {}",
                                    call.name, e
                                ))
                            })?;

                        // Captured before dispatch so the trace keeps
                        // queries whose execution later fails.
                        if call.name == "execute_sql_query"
                            && let Some(query) = args.get("query").and_then(|v| v.as_str())
                        {
                            sql_queries.push(query.to_string());
                        }

                        let result = self.registry.execute(&call.name, args).await?;
                        self.sink
                            .tool_called(run_id, &call.name, &call.arguments, result.render());
                        messages.push(ChatMessage::tool_result(
                            call.id,
                            result.render().to_string(),
                        ));
                    }
                    LoopState::AwaitingOracle
                }
                LoopState::Done(answer) => break answer,
            };
        };

        Ok(RunOutcome {
            answer,
            sql_queries,
            model: self.oracle.model().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::store::{Cell, TableStore};
    use crate::tools::{DatabaseSchemaTool, ExecuteSqlTool};
    use crate::trace::NoopTraceSink;
    use crate::traits::{ChatRequest, ChatResponse, Provider, Tool, ToolResult};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Returns a scripted sequence of replies, then repeats the last.
    struct ScriptedProvider {
        script: Mutex<Vec<ChatResponse>>,
        repeat_last: Option<ChatResponse>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<ChatResponse>) -> Self {
            Self {
                script: Mutex::new(script),
                repeat_last: None,
            }
        }

        fn repeating(reply: ChatResponse) -> Self {
            Self {
                script: Mutex::new(vec![]),
                repeat_last: Some(reply),
            }
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        async fn chat(&self, _request: ChatRequest<'_>) -> Result<ChatResponse> {
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                Ok(self.repeat_last.clone().expect("script exhausted"))
            } else {
                Ok(script.remove(0))
            }
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }

    fn sql_call(id: &str, query: &str) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            name: "execute_sql_query".to_string(),
            arguments: json!({ "query": query }).to_string(),
        }
    }

    fn tool_request(calls: Vec<ToolCall>) -> ChatResponse {
        ChatResponse {
            text: None,
            tool_calls: calls,
        }
    }

    fn answer(text: &str) -> ChatResponse {
        ChatResponse {
            text: Some(text.to_string()),
            tool_calls: vec![],
        }
    }

    fn sales_store() -> Arc<TableStore> {
        let store = Arc::new(TableStore::new().unwrap());
        store
            .ingest(
                "sales",
                &["country".into(), "revenue".into()],
                vec![
                    vec![Cell::Text("germany".into()), Cell::Float(100.0)],
                    vec![Cell::Text("france".into()), Cell::Float(60.0)],
                ],
            )
            .unwrap();
        store
    }

    fn make_loop(provider: ScriptedProvider, store: Arc<TableStore>) -> AgentLoop {
        let registry = Arc::new(ToolRegistry::new());
        registry.register(Arc::new(DatabaseSchemaTool::new(store.clone())));
        registry.register(Arc::new(ExecuteSqlTool::new(store)));
        AgentLoop::new(
            OracleAdapter::new(Arc::new(provider)),
            registry,
            Arc::new(NoopTraceSink),
        )
    }

    #[tokio::test]
    async fn immediate_answer_ends_the_run() {
        let agent = make_loop(
            ScriptedProvider::new(vec![answer("the total is 160")]),
            sales_store(),
        );

        let outcome = agent.process("total revenue?").await.unwrap();
        assert_eq!(outcome.answer, "the total is 160");
        assert!(outcome.sql_queries.is_empty());
        assert_eq!(outcome.model, "scripted");
    }

    #[tokio::test]
    async fn tool_round_trip_collects_sql_trace() {
        let agent = make_loop(
            ScriptedProvider::new(vec![
                tool_request(vec![sql_call("call_1", "SELECT SUM(revenue) FROM sales")]),
                answer("160 total"),
            ]),
            sales_store(),
        );

        let outcome = agent.process("total revenue?").await.unwrap();
        assert_eq!(outcome.answer, "160 total");
        assert_eq!(
            outcome.sql_queries,
            vec!["SELECT SUM(revenue) FROM sales".to_string()]
        );
    }

    #[tokio::test]
    async fn trace_order_matches_call_order_within_a_turn() {
        let agent = make_loop(
            ScriptedProvider::new(vec![
                tool_request(vec![
                    sql_call("call_1", "SELECT 1"),
                    sql_call("call_2", "SELECT 2"),
                ]),
                answer("done"),
            ]),
            sales_store(),
        );

        let outcome = agent.process("q").await.unwrap();
        assert_eq!(
            outcome.sql_queries,
            vec!["SELECT 1".to_string(), "SELECT 2".to_string()]
        );
    }

    #[tokio::test]
    async fn invalid_sql_is_recovered_and_the_run_still_finishes() {
        let agent = make_loop(
            ScriptedProvider::new(vec![
                tool_request(vec![sql_call("call_1", "SELEC broken FROM nowhere")]),
                answer("sorry, that query was invalid"),
            ]),
            sales_store(),
        );

        let outcome = agent.process("q").await.unwrap();
        // The failed attempt is still traced.
        assert_eq!(
            outcome.sql_queries,
            vec!["SELEC broken FROM nowhere".to_string()]
        );
        assert_eq!(outcome.answer, "sorry, that query was invalid");
    }

    #[tokio::test]
    async fn loop_bound_trips_at_exactly_the_configured_iteration() {
        struct CountingProvider {
            calls: Arc<Mutex<usize>>,
        }

        #[async_trait]
        impl Provider for CountingProvider {
            async fn chat(&self, _request: ChatRequest<'_>) -> Result<ChatResponse> {
                *self.calls.lock().unwrap() += 1;
                Ok(ChatResponse {
                    text: None,
                    tool_calls: vec![ToolCall {
                        id: "call_x".into(),
                        name: "get_database_schema".into(),
                        arguments: "{}".into(),
                    }],
                })
            }

            fn model(&self) -> &str {
                "counting"
            }
        }

        let calls = Arc::new(Mutex::new(0));
        let registry = Arc::new(ToolRegistry::new());
        registry.register(Arc::new(DatabaseSchemaTool::new(sales_store())));
        let agent = AgentLoop::new(
            OracleAdapter::new(Arc::new(CountingProvider {
                calls: calls.clone(),
            })),
            registry,
            Arc::new(NoopTraceSink),
        )
        .with_max_iterations(4);

        let err = agent.process("q").await.unwrap_err();
        assert!(matches!(err, AgentError::LoopExceeded { iterations: 4, .. }));
        // Exactly the bound: not one oracle call fewer or more.
        assert_eq!(*calls.lock().unwrap(), 4);
    }

    #[tokio::test]
    async fn loop_exceeded_carries_partial_sql_trace() {
        let agent = make_loop(
            ScriptedProvider::repeating(tool_request(vec![sql_call(
                "call_1",
                "SELECT COUNT(*) FROM sales",
            )])),
            sales_store(),
        );
        let agent = agent.with_max_iterations(3);

        let err = agent.process("q").await.unwrap_err();
        match err {
            AgentError::LoopExceeded { sql_queries, .. } => {
                assert_eq!(sql_queries.len(), 3);
            }
            other => panic!("expected LoopExceeded, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn unknown_tool_name_is_fatal() {
        let agent = make_loop(
            ScriptedProvider::new(vec![tool_request(vec![ToolCall {
                id: "call_1".into(),
                name: "drop_all_tables".into(),
                arguments: "{}".into(),
            }])]),
            sales_store(),
        );

        let err = agent.process("q").await.unwrap_err();
        assert!(matches!(err, AgentError::ProtocolViolation(_)));
    }

    #[tokio::test]
    async fn malformed_tool_arguments_are_fatal() {
        let agent = make_loop(
            ScriptedProvider::new(vec![tool_request(vec![ToolCall {
                id: "call_1".into(),
                name: "execute_sql_query".into(),
                arguments: "not json at all".into(),
            }])]),
            sales_store(),
        );

        let err = agent.process("q").await.unwrap_err();
        assert!(matches!(err, AgentError::ProtocolViolation(_)));
    }

    #[tokio::test]
    async fn tool_results_are_tagged_with_their_call_ids() {
        struct InspectingProvider {
            turn: Mutex<usize>,
            seen_tool_ids: Arc<Mutex<Vec<String>>>,
        }

        #[async_trait]
        impl Provider for InspectingProvider {
            async fn chat(&self, request: ChatRequest<'_>) -> Result<ChatResponse> {
                let mut turn = self.turn.lock().unwrap();
                *turn += 1;
                if *turn == 1 {
                    return Ok(ChatResponse {
                        text: None,
                        tool_calls: vec![
                            ToolCall {
                                id: "call_a".into(),
                                name: "get_database_schema".into(),
                                arguments: "{}".into(),
                            },
                            ToolCall {
                                id: "call_b".into(),
                                name: "get_database_schema".into(),
                                arguments: "{}".into(),
                            },
                        ],
                    });
                }
                let ids: Vec<String> = request
                    .messages
                    .iter()
                    .filter(|m| m.role == "tool")
                    .filter_map(|m| m.tool_call_id.clone())
                    .collect();
                *self.seen_tool_ids.lock().unwrap() = ids;
                Ok(ChatResponse {
                    text: Some("ok".into()),
                    tool_calls: vec![],
                })
            }

            fn model(&self) -> &str {
                "inspecting"
            }
        }

        let seen = Arc::new(Mutex::new(vec![]));
        let registry = Arc::new(ToolRegistry::new());
        registry.register(Arc::new(DatabaseSchemaTool::new(sales_store())));
        let agent = AgentLoop::new(
            OracleAdapter::new(Arc::new(InspectingProvider {
                turn: Mutex::new(0),
                seen_tool_ids: seen.clone(),
            })),
            registry,
            Arc::new(NoopTraceSink),
        );

        agent.process("q").await.unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["call_a".to_string(), "call_b".to_string()]
        );
    }

    #[tokio::test]
    async fn failing_tool_never_crosses_the_loop_boundary() {
        struct FailingTool;

        #[async_trait]
        impl Tool for FailingTool {
            fn name(&self) -> &str {
                "fragile"
            }

            fn description(&self) -> &str {
                "Always fails"
            }

            fn parameters_schema(&self) -> serde_json::Value {
                json!({"type": "object", "properties": {}})
            }

            async fn execute(&self, _args: serde_json::Value) -> ToolResult {
                ToolResult::error("Error: something broke internally")
            }
        }

        let registry = Arc::new(ToolRegistry::new());
        registry.register(Arc::new(FailingTool));
        let agent = AgentLoop::new(
            OracleAdapter::new(Arc::new(ScriptedProvider::new(vec![
                tool_request(vec![ToolCall {
                    id: "call_1".into(),
                    name: "fragile".into(),
                    arguments: "{}".into(),
                }]),
                answer("handled the failure"),
            ]))),
            registry,
            Arc::new(NoopTraceSink),
        );

        let outcome = agent.process("q").await.unwrap();
        assert_eq!(outcome.answer, "handled the failure");
    }
}
