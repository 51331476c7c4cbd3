use std::collections::{BTreeMap, HashMap};

use tokio::sync::Mutex;

use streambuf_api::{
    BoxFuture, Record, RecordError, RecordId, RecordInput, RecordStore, StoreLimits, now_ms,
};

// ═══════════════════════════════════════════════════════════════
//  MemoryRecordStore
// ═══════════════════════════════════════════════════════════════

struct Inner {
    next_id: i64,
    records: BTreeMap<RecordId, Record>,
    running_size: u64,
}

/// Volatile record store. Same contract as the SQLite backend, but the
/// backlog is lost with the process.
///
/// All state sits behind one mutex, so mutations are serialized and the
/// running size never drifts from the map.
pub struct MemoryRecordStore {
    inner: Mutex<Inner>,
    limits: StoreLimits,
}

impl MemoryRecordStore {
    pub fn new(limits: StoreLimits) -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: 1,
                records: BTreeMap::new(),
                running_size: 0,
            }),
            limits,
        }
    }
}

impl RecordStore for MemoryRecordStore {
    fn append(&self, input: RecordInput) -> BoxFuture<'_, Result<Record, RecordError>> {
        Box::pin(async move {
            let mut inner = self.inner.lock().await;
            let size = input.size();
            self.limits.check_append(inner.running_size, size)?;

            let id = RecordId(inner.next_id);
            inner.next_id += 1;
            let record = Record {
                id,
                stream_name: input.stream_name,
                partition_key: input.partition_key,
                data: input.data,
                retry_count: 0,
                created_at_ms: now_ms(),
            };
            inner.records.insert(id, record.clone());
            inner.running_size += size;
            Ok(record)
        })
    }

    fn grouped_by_stream(&self) -> BoxFuture<'_, Result<Vec<Vec<Record>>, RecordError>> {
        Box::pin(async move {
            let inner = self.inner.lock().await;
            Ok(send_windows(inner.records.values(), &self.limits))
        })
    }

    fn delete<'a>(&'a self, ids: &'a [RecordId]) -> BoxFuture<'a, Result<(), RecordError>> {
        Box::pin(async move {
            let mut inner = self.inner.lock().await;
            for id in ids {
                inner.records.remove(id);
            }
            inner.running_size = inner.records.values().map(Record::size).sum();
            Ok(())
        })
    }

    fn increment_retry_count<'a>(
        &'a self,
        ids: &'a [RecordId],
    ) -> BoxFuture<'a, Result<(), RecordError>> {
        Box::pin(async move {
            let mut inner = self.inner.lock().await;
            for id in ids {
                if let Some(record) = inner.records.get_mut(id) {
                    record.retry_count += 1;
                }
            }
            Ok(())
        })
    }

    fn clear(&self) -> BoxFuture<'_, Result<u64, RecordError>> {
        Box::pin(async move {
            let mut inner = self.inner.lock().await;
            let removed = inner.records.len() as u64;
            inner.records.clear();
            inner.running_size = 0;
            tracing::debug!(removed, "memory store cleared");
            Ok(removed)
        })
    }

    fn current_cache_size(&self) -> BoxFuture<'_, Result<u64, RecordError>> {
        Box::pin(async move { Ok(self.inner.lock().await.running_size) })
    }

    fn count(&self) -> BoxFuture<'_, Result<u64, RecordError>> {
        Box::pin(async move { Ok(self.inner.lock().await.records.len() as u64) })
    }
}

/// Single pass over records in id order: row number and running size per
/// stream, keeping rows within both window limits.
fn send_windows<'a>(
    records: impl Iterator<Item = &'a Record>,
    limits: &StoreLimits,
) -> Vec<Vec<Record>> {
    let mut windows: BTreeMap<&str, Vec<Record>> = BTreeMap::new();
    let mut running: HashMap<&str, (usize, u64)> = HashMap::new();

    for record in records {
        let (row_number, running_size) = running.entry(record.stream_name.as_str()).or_default();
        *row_number += 1;
        *running_size += record.size();
        if *row_number <= limits.window_max_records && *running_size <= limits.window_max_bytes {
            windows
                .entry(record.stream_name.as_str())
                .or_default()
                .push(record.clone());
        }
    }
    windows.into_values().collect()
}
