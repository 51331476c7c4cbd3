use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use streambuf_api::{
    BatchSubmissionResult, BoxFuture, ClearOutcome, FlushOutcome, Record, RecordError, RecordId,
    RecordInput, RecordSender, RecordStore,
};

// ════════════════════════════════════════════════════════════════
//  RecordClient
// ════════════════════════════════════════════════════════════════

/// Front door of the buffer: appends records, drains them to the sender.
///
/// At most one flush cycle runs at a time. A `flush()` that arrives while
/// another is running returns [`FlushOutcome::in_progress`] right away
/// instead of waiting.
pub struct RecordClient {
    store: Arc<dyn RecordStore>,
    sender: Arc<dyn RecordSender>,
    flushing: AtomicBool,
}

impl std::fmt::Debug for RecordClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordClient")
            .field("flushing", &self.flushing.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl RecordClient {
    pub fn new(store: Arc<dyn RecordStore>, sender: Arc<dyn RecordSender>) -> Self {
        Self {
            store,
            sender,
            flushing: AtomicBool::new(false),
        }
    }

    /// Append one record. `LimitExceeded` is returned unchanged.
    pub async fn record(&self, input: RecordInput) -> Result<Record, RecordError> {
        self.store.append(input).await
    }

    /// Send every stream's current window and apply the outcomes.
    ///
    /// Streams go one at a time. A sender failure aborts the cycle; streams
    /// already processed keep their applied mutations, and the failing
    /// stream's records stay untouched.
    pub async fn flush(&self) -> Result<FlushOutcome, RecordError> {
        let Some(_guard) = FlushGuard::try_acquire(&self.flushing) else {
            tracing::debug!("flush already in progress, request dropped");
            return Ok(FlushOutcome::in_progress());
        };

        let groups = self.store.grouped_by_stream().await?;
        let mut flushed = 0;
        let mut submitted = 0;
        for batch in &groups {
            let Some(first) = batch.first() else { continue };
            let stream = first.stream_name.as_str();

            let result = self.sender.send(stream, batch).await.map_err(|e| {
                tracing::warn!(
                    stream = %stream,
                    records = batch.len(),
                    error = %e,
                    "send failed, aborting flush"
                );
                e
            })?;
            tracing::debug!(
                stream = %stream,
                successful = result.successful_ids.len(),
                retryable = result.retryable_ids.len(),
                failed = result.failed_ids.len(),
                "batch sent"
            );
            if !result.failed_ids.is_empty() {
                tracing::warn!(
                    stream = %stream,
                    records = result.failed_ids.len(),
                    "dropping records that exhausted their retries or were rejected"
                );
            }

            self.apply(&result).await?;
            submitted += batch.len();
            flushed += result.successful_ids.len();
        }

        if submitted > 0 {
            tracing::info!(streams = groups.len(), submitted, flushed, "flush complete");
        }
        Ok(FlushOutcome::flushed(flushed))
    }

    /// Delete every buffered record. Not coordinated with a running flush.
    pub async fn clear_cache(&self) -> Result<ClearOutcome, RecordError> {
        let records_cleared = self.store.clear().await?;
        tracing::info!(records = records_cleared, "cache cleared");
        Ok(ClearOutcome { records_cleared })
    }

    pub async fn cache_size(&self) -> Result<u64, RecordError> {
        self.store.current_cache_size().await
    }

    pub async fn count(&self) -> Result<u64, RecordError> {
        self.store.count().await
    }

    pub fn is_flushing(&self) -> bool {
        self.flushing.load(Ordering::Acquire)
    }

    /// Apply one batch result. The three id sets are disjoint, so the
    /// mutations run concurrently.
    async fn apply(&self, result: &BatchSubmissionResult) -> Result<(), RecordError> {
        let store = &*self.store;
        tokio::try_join!(
            retry_once("delete sent records", &result.successful_ids, |ids| store.delete(ids)),
            retry_once("delete failed records", &result.failed_ids, |ids| store.delete(ids)),
            retry_once("increment retry count", &result.retryable_ids, |ids| {
                store.increment_retry_count(ids)
            }),
        )?;
        Ok(())
    }
}

/// Run a store mutation, retrying it once on failure. Empty id lists skip
/// the store entirely.
async fn retry_once<'a, F>(op: &'static str, ids: &'a [RecordId], f: F) -> Result<(), RecordError>
where
    F: Fn(&'a [RecordId]) -> BoxFuture<'a, Result<(), RecordError>>,
{
    if ids.is_empty() {
        return Ok(());
    }
    match f(ids).await {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::warn!(
                op,
                records = ids.len(),
                error = %e,
                "store update failed, retrying once"
            );
            f(ids).await.map_err(|e| e.with_context(op))
        }
    }
}

/// Holds the flush flag; clears it on drop, including on error paths.
struct FlushGuard<'a>(&'a AtomicBool);

impl<'a> FlushGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlushGuard(flag))
    }
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
