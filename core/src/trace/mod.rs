use tracing::info;
use uuid::Uuid;

pub const MAX_PAYLOAD_CHARS: usize = 500;

/// Observability hook around one agent run. Implementations must be
/// infallible from the caller's view: swallow and log your own faults,
/// never propagate them. The loop calls the sink unconditionally and
/// its outcome must not depend on whether tracing is enabled.
pub trait TraceSink: Send + Sync {
    fn run_started(&self, _run_id: Uuid, _question: &str) {}

    fn oracle_called(&self, _run_id: Uuid, _iteration: usize, _reply: &str) {}

    fn tool_called(&self, _run_id: Uuid, _name: &str, _args: &str, _output: &str) {}

    fn run_finished(&self, _run_id: Uuid, _success: bool, _summary: &str, _query_count: usize) {}
}

/// Default sink: records nothing.
pub struct NoopTraceSink;

impl TraceSink for NoopTraceSink {}

/// Emits every span as a `tracing` event, payloads bounded so huge
/// result sets never balloon the log stream.
pub struct LogTraceSink;

impl TraceSink for LogTraceSink {
    fn run_started(&self, run_id: Uuid, question: &str) {
        info!(%run_id, question = %truncate_payload(question), "agent run started");
    }

    fn oracle_called(&self, run_id: Uuid, iteration: usize, reply: &str) {
        info!(%run_id, iteration, reply = %truncate_payload(reply), "oracle replied");
    }

    fn tool_called(&self, run_id: Uuid, name: &str, args: &str, output: &str) {
        info!(
            %run_id,
            tool = name,
            args = %truncate_payload(args),
            output = %truncate_payload(output),
            "tool executed"
        );
    }

    fn run_finished(&self, run_id: Uuid, success: bool, summary: &str, query_count: usize) {
        info!(
            %run_id,
            success,
            query_count,
            summary = %truncate_payload(summary),
            "agent run finished"
        );
    }
}

pub fn truncate_payload(text: &str) -> String {
    if text.chars().count() <= MAX_PAYLOAD_CHARS {
        return text.to_string();
    }
    let truncated: String = text.chars().take(MAX_PAYLOAD_CHARS).collect();
    format!("{}...", truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_payloads_pass_through() {
        assert_eq!(truncate_payload("hello"), "hello");
    }

    #[test]
    fn long_payloads_are_bounded() {
        let long = "x".repeat(2000);
        let truncated = truncate_payload(&long);
        assert_eq!(truncated.chars().count(), MAX_PAYLOAD_CHARS + 3);
        assert!(truncated.ends_with("..."));
    }
}
