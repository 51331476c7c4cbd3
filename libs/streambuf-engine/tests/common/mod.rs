//! Scripted senders and stores shared by the engine integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;

use streambuf_api::{
    BatchSubmissionResult, BoxFuture, PutRecordOutcome, Record, RecordError, RecordId,
    RecordInput, RecordSender, RecordStore, ServiceError, classify,
};

/// Holds a send until the test releases it.
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

/// In-process sender whose per-record outcomes are scripted by partition key.
#[derive(Default)]
pub struct ScriptedSender {
    max_retries: u32,
    errors: HashMap<String, String>,
    failing_streams: HashSet<String>,
    unclassified: bool,
    gate: Option<Arc<Gate>>,
    calls: AtomicUsize,
    sent: Mutex<Vec<(String, Vec<RecordId>)>>,
}

impl ScriptedSender {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries, ..Default::default() }
    }

    /// Every record with `partition_key` comes back with `code`.
    pub fn with_error(mut self, partition_key: &str, code: &str) -> Self {
        self.errors.insert(partition_key.into(), code.into());
        self
    }

    /// The whole batch call fails for `stream`.
    pub fn failing_stream(mut self, stream: &str) -> Self {
        self.failing_streams.insert(stream.into());
        self
    }

    /// Return no per-record outcomes at all.
    pub fn unclassified(mut self) -> Self {
        self.unclassified = true;
        self
    }

    pub fn gated(mut self) -> (Self, Arc<Gate>) {
        let gate = Arc::new(Gate::default());
        self.gate = Some(gate.clone());
        (self, gate)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn streams_sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(s, _)| s.clone()).collect()
    }

    pub fn ids_sent(&self) -> Vec<RecordId> {
        self.sent.lock().unwrap().iter().flat_map(|(_, ids)| ids.clone()).collect()
    }
}

impl RecordSender for ScriptedSender {
    fn send<'a>(
        &'a self,
        stream_name: &'a str,
        records: &'a [Record],
    ) -> BoxFuture<'a, Result<BatchSubmissionResult, RecordError>> {
        Box::pin(async move {
            if records.is_empty() {
                return Ok(BatchSubmissionResult::default());
            }
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.sent
                .lock()
                .unwrap()
                .push((stream_name.to_string(), records.iter().map(|r| r.id).collect()));

            if let Some(gate) = &self.gate {
                gate.entered.notify_one();
                gate.release.notified().await;
            }
            if self.failing_streams.contains(stream_name) {
                return Err(ServiceError::InternalFailure("scripted outage".into()).into());
            }
            if self.unclassified {
                return Ok(classify(stream_name, records, &[], self.max_retries));
            }

            let outcomes: Vec<PutRecordOutcome> = records
                .iter()
                .map(|r| match self.errors.get(&r.partition_key) {
                    Some(code) => PutRecordOutcome::error(code.as_str(), "scripted"),
                    None => PutRecordOutcome::ok(),
                })
                .collect();
            Ok(classify(stream_name, records, &outcomes, self.max_retries))
        })
    }
}

/// Store wrapper whose `delete` fails a configurable number of times.
pub struct FlakyStore<S> {
    inner: S,
    delete_failures: AtomicUsize,
}

impl<S> FlakyStore<S> {
    pub fn new(inner: S, delete_failures: usize) -> Self {
        Self { inner, delete_failures: AtomicUsize::new(delete_failures) }
    }
}

impl<S: RecordStore> RecordStore for FlakyStore<S> {
    fn append(&self, input: RecordInput) -> BoxFuture<'_, Result<Record, RecordError>> {
        self.inner.append(input)
    }

    fn grouped_by_stream(&self) -> BoxFuture<'_, Result<Vec<Vec<Record>>, RecordError>> {
        self.inner.grouped_by_stream()
    }

    fn delete<'a>(&'a self, ids: &'a [RecordId]) -> BoxFuture<'a, Result<(), RecordError>> {
        let remaining = self.delete_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.delete_failures.store(remaining - 1, Ordering::SeqCst);
            return Box::pin(async { Err(RecordError::storage("disk I/O error")) });
        }
        self.inner.delete(ids)
    }

    fn increment_retry_count<'a>(
        &'a self,
        ids: &'a [RecordId],
    ) -> BoxFuture<'a, Result<(), RecordError>> {
        self.inner.increment_retry_count(ids)
    }

    fn clear(&self) -> BoxFuture<'_, Result<u64, RecordError>> {
        self.inner.clear()
    }

    fn current_cache_size(&self) -> BoxFuture<'_, Result<u64, RecordError>> {
        self.inner.current_cache_size()
    }

    fn count(&self) -> BoxFuture<'_, Result<u64, RecordError>> {
        self.inner.count()
    }
}

pub fn input(stream: &str, partition_key: &str, size: usize) -> RecordInput {
    RecordInput::new(stream, partition_key, vec![b'x'; size])
}
