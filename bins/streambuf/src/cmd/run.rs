use base64::Engine as _;
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use streambuf_api::{RecordError, RecordInput};
use streambuf_engine::RecordClient;

use crate::error::CliError;

/// One NDJSON line on stdin. The payload is either base64 `data` or UTF-8 `text`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct InputLine {
    stream_name: String,
    partition_key: String,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

fn parse_line(line: &str) -> Result<RecordInput, String> {
    let parsed: InputLine = serde_json::from_str(line).map_err(|e| e.to_string())?;
    let payload = match (parsed.data, parsed.text) {
        (Some(data), None) => base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| format!("data: {e}"))?,
        (None, Some(text)) => text.into_bytes(),
        (Some(_), Some(_)) => return Err("set either 'data' or 'text', not both".into()),
        (None, None) => return Err("missing 'data' or 'text'".into()),
    };
    Ok(RecordInput::new(parsed.stream_name, parsed.partition_key, payload))
}

#[derive(Debug, Default)]
struct Counters {
    accepted: u64,
    rejected: u64,
    invalid: u64,
}

pub async fn run(config_path: &str) -> Result<(), CliError> {
    tracing::info!("streambuf starting");
    let engine = super::bootstrap(config_path)?;
    engine.scheduler().start();
    tracing::info!("reading records from stdin, press Ctrl+C to stop");

    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "no Ctrl+C handler, waiting for stdin to close");
            std::future::pending::<()>().await;
        }
        tracing::info!("shutting down...");
    };
    let stdin = BufReader::new(tokio::io::stdin());
    let counters = ingest(engine.client(), stdin, ctrl_c).await?;

    tracing::info!(
        accepted = counters.accepted,
        rejected = counters.rejected,
        invalid = counters.invalid,
        "input finished"
    );
    engine.shutdown().await?;
    Ok(())
}

/// Record every line from `reader` until EOF or until `shutdown` resolves.
///
/// `shutdown` is polled across iterations, so a signal that lands while a
/// record is being stored still ends the loop on the next turn.
async fn ingest<R, F>(
    client: &RecordClient,
    reader: R,
    shutdown: F,
) -> Result<Counters, CliError>
where
    R: AsyncBufRead + Unpin,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut lines = reader.lines();
    let mut counters = Counters::default();
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            line = lines.next_line() => {
                let Some(line) = line? else {
                    tracing::info!("stdin closed");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let input = match parse_line(&line) {
                    Ok(input) => input,
                    Err(e) => {
                        counters.invalid += 1;
                        tracing::warn!(error = %e, "skipping invalid input line");
                        continue;
                    }
                };
                match client.record(input).await {
                    Ok(_) => counters.accepted += 1,
                    Err(e @ RecordError::LimitExceeded { .. }) => {
                        counters.rejected += 1;
                        tracing::warn!(error = %e, "record rejected");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }
    }
    Ok(counters)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use streambuf_api::{
        BatchSubmissionResult, BoxFuture, Record, RecordSender, RecordStore, StoreLimits,
    };
    use streambuf_store_memory::MemoryRecordStore;
    use tokio::io::AsyncWriteExt;
    use tokio::sync::oneshot;

    use super::*;

    struct NoopSender;

    impl RecordSender for NoopSender {
        fn send<'a>(
            &'a self,
            _stream_name: &'a str,
            _records: &'a [Record],
        ) -> BoxFuture<'a, Result<BatchSubmissionResult, RecordError>> {
            Box::pin(async { Ok(BatchSubmissionResult::default()) })
        }
    }

    fn client(max_bytes: u64) -> RecordClient {
        let store: Arc<dyn RecordStore> =
            Arc::new(MemoryRecordStore::new(StoreLimits::shared(10, max_bytes)));
        RecordClient::new(store, Arc::new(NoopSender))
    }

    #[tokio::test]
    async fn shutdown_ends_ingest_while_input_is_open() {
        let client = client(1000);
        let (mut writer, reader) = tokio::io::duplex(1024);
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let feed = async {
            writer
                .write_all(
                    b"{\"stream_name\":\"s\",\"partition_key\":\"k\",\"text\":\"a\"}\n\
                      not json\n\
                      {\"stream_name\":\"s\",\"partition_key\":\"k\",\"text\":\"b\"}\n",
                )
                .await
                .unwrap();
            while client.count().await.unwrap() < 2 {
                tokio::task::yield_now().await;
            }
            stop_tx.send(()).unwrap();
        };
        let stop = async {
            stop_rx.await.unwrap();
        };

        // The writer stays open, so only the shutdown future can end the loop.
        let (counters, ()) = tokio::join!(ingest(&client, BufReader::new(reader), stop), feed);
        let counters = counters.unwrap();
        assert_eq!(counters.accepted, 2);
        assert_eq!(counters.invalid, 1);
        drop(writer);
    }

    #[tokio::test]
    async fn eof_ends_ingest_and_counts_rejections() {
        let client = client(10);
        let input: &[u8] = b"\
            {\"stream_name\":\"s\",\"partition_key\":\"k\",\"text\":\"12345678\"}\n\
            \n\
            {\"stream_name\":\"s\",\"partition_key\":\"k\",\"text\":\"abc\"}\n";

        let counters = ingest(&client, input, std::future::pending()).await.unwrap();
        assert_eq!(counters.accepted, 1);
        assert_eq!(counters.rejected, 1);
        assert_eq!(counters.invalid, 0);
        assert_eq!(client.cache_size().await.unwrap(), 8);
    }

    #[test]
    fn text_payload() {
        let line = r#"{"stream_name":"clicks","partition_key":"u1","text":"hi"}"#;
        let input = parse_line(line).unwrap();
        assert_eq!(input.stream_name, "clicks");
        assert_eq!(input.partition_key, "u1");
        assert_eq!(input.data, b"hi");
    }

    #[test]
    fn base64_payload() {
        let input = parse_line(r#"{"stream_name":"s","partition_key":"k","data":"AAEC"}"#).unwrap();
        assert_eq!(input.data, vec![0, 1, 2]);
    }

    #[test]
    fn payload_must_be_present_once() {
        assert!(parse_line(r#"{"stream_name":"s","partition_key":"k"}"#).is_err());
        assert!(
            parse_line(r#"{"stream_name":"s","partition_key":"k","data":"AA==","text":"x"}"#)
                .is_err()
        );
        assert!(parse_line(r#"{"stream_name":"s","partition_key":"k","data":"!!"}"#).is_err());
        assert!(parse_line("not json").is_err());
    }
}
