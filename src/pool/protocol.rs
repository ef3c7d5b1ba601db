//! Worker message protocol
//!
//! Commands and replies travel as one JSON object per line.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};
use tracing::{debug, warn};

use crate::bench::WorkerRunner;
use crate::pool::{WorkerCommand, WorkerReply};
use crate::{DocBenchError, Result};

/// Write one message followed by a newline and flush
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Read the next non-empty message; `None` once the stream is closed
pub async fn read_message<R, T>(lines: &mut Lines<R>) -> Result<Option<T>>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let message = serde_json::from_str(&line)
            .map_err(|e| DocBenchError::ProtocolError(format!("malformed message '{}': {}", line, e)))?;
        return Ok(Some(message));
    }

    Ok(None)
}

/// Serve commands until `Shutdown` or end of input.
///
/// Every `Run` gets exactly one reply; a failed run is reported as an error
/// reply and the worker keeps serving.
pub async fn serve_worker<R, W>(runner: &WorkerRunner, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();

    loop {
        let command = match read_message::<_, WorkerCommand>(&mut lines).await {
            Ok(Some(command)) => command,
            Ok(None) => break,
            Err(DocBenchError::ProtocolError(message)) => {
                warn!(worker = runner.index(), %message, "Ignoring malformed command");
                write_message(&mut writer, &WorkerReply::Error { message }).await?;
                continue;
            }
            Err(e) => return Err(e),
        };

        match command {
            WorkerCommand::Run { concurrency_level } => {
                debug!(worker = runner.index(), concurrency_level, "Running benchmarks");
                let reply = match runner.run(concurrency_level).await {
                    Ok(result) => WorkerReply::Ok { result },
                    Err(e) => {
                        warn!(worker = runner.index(), error = %e, "Benchmark run failed");
                        WorkerReply::Error { message: e.to_string() }
                    }
                };
                write_message(&mut writer, &reply).await?;
            }
            WorkerCommand::Shutdown => {
                debug!(worker = runner.index(), "Shutdown requested");
                break;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::{ThroughputBenchmark, WorkloadFactory};
    use crate::models::BenchmarkType;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::BufReader;

    struct NoopWorkload;

    #[async_trait]
    impl ThroughputBenchmark for NoopWorkload {
        async fn set_up(&mut self) -> Result<()> {
            Ok(())
        }

        async fn iteration(&self) -> Result<()> {
            tokio::time::sleep(Duration::from_millis(1)).await;
            Ok(())
        }

        async fn tear_down(&mut self) -> Result<()> {
            Ok(())
        }
    }

    struct NoopFactory;

    impl WorkloadFactory for NoopFactory {
        fn create(&self, _: BenchmarkType, _: usize) -> Box<dyn ThroughputBenchmark> {
            Box::new(NoopWorkload)
        }
    }

    fn runner() -> WorkerRunner {
        WorkerRunner::new(0, Arc::new(NoopFactory)).with_durations(Duration::from_millis(5), Duration::from_millis(20))
    }

    async fn serve(input: &str) -> Vec<WorkerReply> {
        let mut output = Vec::new();
        serve_worker(&runner(), BufReader::new(input.as_bytes()), &mut output)
            .await
            .unwrap();

        let mut lines = BufReader::new(output.as_slice()).lines();
        let mut replies = Vec::new();
        while let Some(reply) = read_message(&mut lines).await.unwrap() {
            replies.push(reply);
        }
        replies
    }

    #[tokio::test]
    async fn test_run_then_shutdown() {
        let replies = serve(concat!(
            r#"{"command":"run","concurrency_level":2}"#,
            "\n",
            r#"{"command":"shutdown"}"#,
            "\n",
            r#"{"command":"run","concurrency_level":2}"#,
            "\n",
        ))
        .await;

        assert_eq!(replies.len(), 1);
        match &replies[0] {
            WorkerReply::Ok { result } => {
                assert_eq!(result.write().concurrency_level(), 2);
                assert!(result.read().average_throughput() > 0.0);
            }
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_end_of_input_stops_serving() {
        assert!(serve("").await.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_command_gets_error_reply() {
        let replies = serve("not json\n").await;
        assert_eq!(replies.len(), 1);
        assert!(matches!(replies[0], WorkerReply::Error { .. }));
    }

    #[tokio::test]
    async fn test_invalid_concurrency_reported_as_error() {
        let replies = serve("{\"command\":\"run\",\"concurrency_level\":0}\n").await;
        match &replies[0] {
            WorkerReply::Error { message } => assert!(message.contains("Concurrency level")),
            other => panic!("unexpected reply {:?}", other),
        }
    }
}
