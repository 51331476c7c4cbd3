//! PutRecords JSON wire shapes.

use base64::Engine;
use serde::{Deserialize, Serialize};

use streambuf_api::{PutRecordOutcome, Record};

pub(crate) const CONTENT_TYPE: &str = "application/x-amz-json-1.1";
pub(crate) const TARGET: &str = "Kinesis_20131202.PutRecords";

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct PutRecordsRequest<'a> {
    pub stream_name: &'a str,
    pub records: Vec<PutRecordsRequestEntry<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct PutRecordsRequestEntry<'a> {
    /// Base64 payload.
    pub data: String,
    pub partition_key: &'a str,
}

impl<'a> PutRecordsRequest<'a> {
    pub fn new(stream_name: &'a str, records: &'a [Record]) -> Self {
        let records = records
            .iter()
            .map(|r| PutRecordsRequestEntry {
                data: base64::engine::general_purpose::STANDARD.encode(&r.data),
                partition_key: &r.partition_key,
            })
            .collect();
        Self { stream_name, records }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct PutRecordsResponse {
    #[serde(default)]
    pub failed_record_count: u64,
    #[serde(default)]
    pub records: Vec<PutRecordsResultEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct PutRecordsResultEntry {
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl PutRecordsResponse {
    pub fn outcomes(self) -> Vec<PutRecordOutcome> {
        self.records
            .into_iter()
            .map(|e| PutRecordOutcome {
                error_code: e.error_code.filter(|c| !c.is_empty()),
                error_message: e.error_message,
            })
            .collect()
    }
}

/// Error body of a non-2xx response: `{"__type": "...", "message": "..."}`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ServiceErrorBody {
    #[serde(rename = "__type", default)]
    pub error_type: Option<String>,
    #[serde(alias = "Message", default)]
    pub message: Option<String>,
}
