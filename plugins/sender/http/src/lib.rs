mod protocol;

use std::collections::HashMap;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;

use streambuf_api::{
    BatchSubmissionResult, BoxFuture, PutRecordOutcome, Record, RecordError, RecordSender,
    ServiceError, classify,
};

use protocol::{PutRecordsRequest, PutRecordsResponse, ServiceErrorBody};

// ════════════════════════════════════════════════════════════════
//  Config
// ════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
pub struct HttpSenderConfig {
    /// Ingestion endpoint URL (or a signing proxy in front of it).
    pub endpoint: String,
    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Static headers added to every request (API keys, proxy auth).
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

fn default_timeout_secs() -> u64 { 30 }

impl HttpSenderConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout_secs: default_timeout_secs(),
            headers: HashMap::new(),
        }
    }
}

// ════════════════════════════════════════════════════════════════
//  HttpRecordSender
// ════════════════════════════════════════════════════════════════

/// `RecordSender` for a PutRecords-style JSON ingestion API.
///
/// One POST per stream batch. Per-record errors in a 2xx response are
/// classified against the retry budget; a non-2xx response or a transport
/// failure fails the whole batch.
pub struct HttpRecordSender {
    http: reqwest::Client,
    endpoint: String,
    headers: HeaderMap,
    max_retries: u32,
}

impl HttpRecordSender {
    pub fn new(cfg: &HttpSenderConfig, max_retries: u32) -> Result<Self, RecordError> {
        if cfg.endpoint.is_empty() {
            return Err(RecordError::unknown("sender config", "endpoint is empty"));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| RecordError::unknown("HTTP client", e))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static(protocol::CONTENT_TYPE),
        );
        headers.insert("x-amz-target", HeaderValue::from_static(protocol::TARGET));
        for (key, value) in &cfg.headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| RecordError::unknown(format!("header name '{key}'"), e))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| RecordError::unknown(format!("header value for '{key}'"), e))?;
            headers.insert(name, value);
        }

        Ok(Self {
            http,
            endpoint: cfg.endpoint.clone(),
            headers,
            max_retries,
        })
    }

    /// Execute one PutRecords call and return per-record outcomes in order.
    async fn put_records(
        &self,
        stream_name: &str,
        records: &[Record],
    ) -> Result<Vec<PutRecordOutcome>, RecordError> {
        let body = PutRecordsRequest::new(stream_name, records);
        let resp = self
            .http
            .post(&self.endpoint)
            .headers(self.headers.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::Network { source: Box::new(e) })?;

        let status = resp.status();
        let header_type = resp
            .headers()
            .get("x-amzn-errortype")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(':').next().unwrap_or(v).to_string());
        let text = resp
            .text()
            .await
            .map_err(|e| ServiceError::Network { source: Box::new(e) })?;

        if !status.is_success() {
            return Err(service_error(status, header_type, &text).into());
        }

        let parsed: PutRecordsResponse = serde_json::from_str(&text)
            .map_err(|e| RecordError::unknown("decode PutRecords response", e))?;
        tracing::debug!(
            stream = %stream_name,
            submitted = records.len(),
            failed = parsed.failed_record_count,
            "PutRecords response"
        );
        Ok(parsed.outcomes())
    }
}

/// Decode a non-2xx response into the service error set.
fn service_error(
    status: reqwest::StatusCode,
    header_type: Option<String>,
    body: &str,
) -> ServiceError {
    let parsed: ServiceErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed.message.unwrap_or_else(|| body.to_string());
    match parsed.error_type.or(header_type) {
        Some(code) => ServiceError::from_code(&code, message),
        None => ServiceError::Unknown { code: status.as_u16().to_string(), message },
    }
}

impl RecordSender for HttpRecordSender {
    fn send<'a>(
        &'a self,
        stream_name: &'a str,
        records: &'a [Record],
    ) -> BoxFuture<'a, Result<BatchSubmissionResult, RecordError>> {
        Box::pin(async move {
            if records.is_empty() {
                return Ok(BatchSubmissionResult::default());
            }
            let outcomes = self.put_records(stream_name, records).await?;
            Ok(classify(stream_name, records, &outcomes, self.max_retries))
        })
    }
}
