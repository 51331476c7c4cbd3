use std::future::Future;
use std::pin::Pin;

use crate::error::RecordError;
use crate::record::{Record, RecordId, RecordInput};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ════════════════════════════════════════════════════════════════
//  Limits
// ════════════════════════════════════════════════════════════════

/// Capacity and send-window limits shared by all store backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreLimits {
    /// Hard ceiling on buffered payload bytes, enforced at append.
    pub max_bytes: u64,
    /// Max records returned per stream by one `grouped_by_stream()` call.
    pub window_max_records: usize,
    /// Max cumulative payload bytes returned per stream by one call.
    pub window_max_bytes: u64,
}

impl StoreLimits {
    /// Limits where the cache cap doubles as the send-window byte cap.
    pub fn shared(max_records: usize, max_bytes: u64) -> Self {
        Self {
            max_bytes,
            window_max_records: max_records,
            window_max_bytes: max_bytes,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_bytes == 0 {
            return Err("max_bytes must be greater than zero".into());
        }
        if self.window_max_records == 0 {
            return Err("max_records must be greater than zero".into());
        }
        if self.window_max_bytes == 0 {
            return Err("window_max_bytes must be greater than zero".into());
        }
        if self.window_max_bytes > self.max_bytes {
            tracing::warn!(
                window_max_bytes = self.window_max_bytes,
                max_bytes = self.max_bytes,
                "send window is larger than the cache, it will never fill"
            );
        }
        Ok(())
    }

    /// Capacity gate for one append.
    ///
    /// Rejects when the cache would overflow, and when the payload alone
    /// exceeds the send window (such a record could never be selected).
    pub fn check_append(&self, current: u64, incoming: u64) -> Result<(), RecordError> {
        if current.saturating_add(incoming) > self.max_bytes {
            return Err(RecordError::LimitExceeded { current, incoming, max: self.max_bytes });
        }
        if incoming > self.window_max_bytes {
            return Err(RecordError::LimitExceeded {
                current,
                incoming,
                max: self.window_max_bytes,
            });
        }
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════
//  RecordStore
// ════════════════════════════════════════════════════════════════

/// Persistent, capacity-bounded record queue.
///
/// Mutations (`append`, `delete`, `increment_retry_count`, `clear`) are
/// serialized by the implementation. The running-size counter lives in the
/// same serialized context and `current_cache_size()` reads it without a
/// scan.
pub trait RecordStore: Send + Sync {
    /// Append one record with `retry_count = 0`.
    ///
    /// Fails with `RecordError::LimitExceeded` and leaves the store unchanged
    /// when the cache would overflow.
    fn append(&self, input: RecordInput) -> BoxFuture<'_, Result<Record, RecordError>>;

    /// Non-empty per-stream groups in ascending stream name order.
    ///
    /// Each group is in append order and truncated to the send window:
    /// at most `window_max_records` records whose running payload size
    /// stays within `window_max_bytes`.
    fn grouped_by_stream(&self) -> BoxFuture<'_, Result<Vec<Vec<Record>>, RecordError>>;

    /// Remove records by id. Absent ids are ignored. Recounts the running size.
    fn delete<'a>(&'a self, ids: &'a [RecordId]) -> BoxFuture<'a, Result<(), RecordError>>;

    /// `retry_count += 1` for each id. Absent ids are ignored.
    fn increment_retry_count<'a>(
        &'a self,
        ids: &'a [RecordId],
    ) -> BoxFuture<'a, Result<(), RecordError>>;

    /// Remove everything. Returns the number of records removed.
    fn clear(&self) -> BoxFuture<'_, Result<u64, RecordError>>;

    /// Cached running payload size in bytes.
    fn current_cache_size(&self) -> BoxFuture<'_, Result<u64, RecordError>>;

    /// Number of resident records.
    fn count(&self) -> BoxFuture<'_, Result<u64, RecordError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_gate_allows_exact_fit() {
        let limits = StoreLimits::shared(10, 100);
        assert!(limits.check_append(60, 40).is_ok());
        assert!(limits.check_append(61, 40).unwrap_err().is_limit_exceeded());
    }

    #[test]
    fn append_gate_rejects_records_wider_than_window() {
        let limits = StoreLimits { max_bytes: 1000, window_max_records: 10, window_max_bytes: 100 };
        match limits.check_append(0, 101) {
            Err(RecordError::LimitExceeded { max, .. }) => assert_eq!(max, 100),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn zero_limits_are_invalid() {
        assert!(StoreLimits::shared(0, 10).validate().is_err());
        assert!(StoreLimits::shared(10, 0).validate().is_err());
        assert!(StoreLimits::shared(10, 10).validate().is_ok());
    }
}
