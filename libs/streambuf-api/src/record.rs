use std::fmt;

use serde::{Deserialize, Serialize};

// ════════════════════════════════════════════════════════════════
//  Record identity
// ════════════════════════════════════════════════════════════════

/// Store-assigned record identifier. Monotonically increasing in append order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RecordId {
    fn from(v: i64) -> Self {
        RecordId(v)
    }
}

// ════════════════════════════════════════════════════════════════
//  Records
// ════════════════════════════════════════════════════════════════

/// Producer-facing record, before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordInput {
    /// Destination stream at the ingestion service.
    pub stream_name: String,
    /// Routing key, opaque to the buffer.
    pub partition_key: String,
    /// Opaque payload bytes. Base64 on the serde boundary.
    #[serde(with = "payload_base64")]
    pub data: Vec<u8>,
}

impl RecordInput {
    pub fn new(
        stream_name: impl Into<String>,
        partition_key: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            stream_name: stream_name.into(),
            partition_key: partition_key.into(),
            data: data.into(),
        }
    }

    /// Payload length in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// A buffered record as persisted by a `RecordStore`.
///
/// Only `retry_count` ever changes after append, and it only grows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub stream_name: String,
    pub partition_key: String,
    #[serde(with = "payload_base64")]
    pub data: Vec<u8>,
    pub retry_count: u32,
    /// Append time, Unix milliseconds.
    pub created_at_ms: i64,
}

impl Record {
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

// ════════════════════════════════════════════════════════════════
//  Outcomes
// ════════════════════════════════════════════════════════════════

/// Per-batch classification produced by a `RecordSender`.
///
/// The three id sets are disjoint. Ids submitted but present in none of
/// them were left unclassified and stay in the store untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSubmissionResult {
    pub successful_ids: Vec<RecordId>,
    pub retryable_ids: Vec<RecordId>,
    pub failed_ids: Vec<RecordId>,
}

impl BatchSubmissionResult {
    pub fn is_empty(&self) -> bool {
        self.classified_len() == 0
    }

    /// Total number of ids across the three sets.
    pub fn classified_len(&self) -> usize {
        self.successful_ids.len() + self.retryable_ids.len() + self.failed_ids.len()
    }
}

/// Result of one `flush()` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushOutcome {
    pub records_flushed: usize,
    /// True when the request was dropped because another flush was running.
    pub in_progress: bool,
}

impl FlushOutcome {
    pub fn flushed(records_flushed: usize) -> Self {
        Self { records_flushed, in_progress: false }
    }

    pub fn in_progress() -> Self {
        Self { records_flushed: 0, in_progress: true }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClearOutcome {
    pub records_cleared: u64,
}

/// Current Unix time in milliseconds.
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

mod payload_base64 {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        serializer.serialize_str(&encoded)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let b64 = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(b64)
            .map_err(serde::de::Error::custom)
    }
}
