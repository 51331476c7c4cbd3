use crate::error::RecordError;
use crate::record::{BatchSubmissionResult, Record};
use crate::store::BoxFuture;

/// Remote batch submission.
///
/// One call per stream. An `Err` means the batch call itself failed and
/// nothing in the batch was classified; the caller must leave those records
/// untouched.
pub trait RecordSender: Send + Sync {
    /// Submit `records` to `stream_name` and classify each record.
    ///
    /// Empty `records` must return an empty result without a remote call.
    fn send<'a>(
        &'a self,
        stream_name: &'a str,
        records: &'a [Record],
    ) -> BoxFuture<'a, Result<BatchSubmissionResult, RecordError>>;
}

/// Per-record result reported by the ingestion service, in submission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutRecordOutcome {
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

impl PutRecordOutcome {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: Some(code.into()),
            error_message: Some(message.into()),
        }
    }
}

/// Only throughput-exceeded and internal-failure are worth resubmitting.
pub fn is_retryable_error_code(code: &str) -> bool {
    matches!(
        code,
        "ProvisionedThroughputExceededException" | "InternalFailure" | "InternalFailureException"
    )
}

/// Classify each submitted record by the service's per-record outcome.
///
/// - no error: successful
/// - retryable error, `retry_count < max_retries`: retryable
/// - retryable error with exhausted budget, or any other error: failed
///
/// Outcomes are matched to records by position. On a length mismatch the
/// records without an outcome are left unclassified, so the next flush
/// picks them up again untouched.
pub fn classify(
    stream_name: &str,
    records: &[Record],
    outcomes: &[PutRecordOutcome],
    max_retries: u32,
) -> BatchSubmissionResult {
    if outcomes.len() != records.len() {
        tracing::warn!(
            stream = %stream_name,
            submitted = records.len(),
            returned = outcomes.len(),
            "service returned a mismatched number of record results"
        );
    }

    let mut result = BatchSubmissionResult::default();
    for (record, outcome) in records.iter().zip(outcomes) {
        let Some(code) = outcome.error_code.as_deref() else {
            result.successful_ids.push(record.id);
            continue;
        };

        if !is_retryable_error_code(code) {
            tracing::warn!(
                stream = %stream_name,
                id = %record.id,
                code,
                reason = outcome.error_message.as_deref().unwrap_or(""),
                "record rejected, discarding"
            );
            result.failed_ids.push(record.id);
        } else if record.retry_count >= max_retries {
            tracing::warn!(
                stream = %stream_name,
                id = %record.id,
                retry_count = record.retry_count,
                code,
                "retry budget exhausted, discarding"
            );
            result.failed_ids.push(record.id);
        } else {
            tracing::debug!(stream = %stream_name, id = %record.id, code, "record will be retried");
            result.retryable_ids.push(record.id);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordId;

    fn record(id: i64, retry_count: u32) -> Record {
        Record {
            id: RecordId(id),
            stream_name: "s".into(),
            partition_key: "k".into(),
            data: vec![0; 4],
            retry_count,
            created_at_ms: 0,
        }
    }

    const THROTTLED: &str = "ProvisionedThroughputExceededException";

    #[test]
    fn three_way_classification() {
        let records = [record(1, 0), record(2, 0), record(3, 0)];
        let outcomes = [
            PutRecordOutcome::ok(),
            PutRecordOutcome::error(THROTTLED, "slow down"),
            PutRecordOutcome::error("ValidationException", "bad"),
        ];
        let result = classify("s", &records, &outcomes, 3);
        assert_eq!(result.successful_ids, vec![RecordId(1)]);
        assert_eq!(result.retryable_ids, vec![RecordId(2)]);
        assert_eq!(result.failed_ids, vec![RecordId(3)]);
    }

    #[test]
    fn retry_budget_boundary() {
        let max_retries = 2;
        let below = [record(1, max_retries - 1)];
        let at = [record(1, max_retries)];
        let throttled = [PutRecordOutcome::error("InternalFailure", "oops")];

        let result = classify("s", &below, &throttled, max_retries);
        assert_eq!(result.retryable_ids, vec![RecordId(1)]);

        let result = classify("s", &at, &throttled, max_retries);
        assert!(result.retryable_ids.is_empty());
        assert_eq!(result.failed_ids, vec![RecordId(1)]);
    }

    #[test]
    fn short_response_leaves_tail_unclassified() {
        let records = [record(1, 0), record(2, 0), record(3, 0)];
        let outcomes = [PutRecordOutcome::ok()];
        let result = classify("s", &records, &outcomes, 3);
        assert_eq!(result.successful_ids, vec![RecordId(1)]);
        assert_eq!(result.classified_len(), 1);
    }

    #[test]
    fn extra_outcomes_are_ignored() {
        let records = [record(7, 0)];
        let outcomes = [PutRecordOutcome::ok(), PutRecordOutcome::error(THROTTLED, "")];
        let result = classify("s", &records, &outcomes, 3);
        assert_eq!(result.successful_ids, vec![RecordId(7)]);
        assert_eq!(result.classified_len(), 1);
    }

    #[test]
    fn only_two_codes_are_retryable() {
        assert!(is_retryable_error_code(THROTTLED));
        assert!(is_retryable_error_code("InternalFailure"));
        assert!(!is_retryable_error_code("AccessDeniedException"));
        assert!(!is_retryable_error_code("KMSThrottlingException"));
    }
}
