pub mod error;
pub mod record;
pub mod sender;
pub mod store;

pub use error::{BoxError, RecordError, ServiceError};
pub use record::{
    BatchSubmissionResult, ClearOutcome, FlushOutcome, Record, RecordId, RecordInput, now_ms,
};
pub use sender::{PutRecordOutcome, RecordSender, classify, is_retryable_error_code};
pub use store::{BoxFuture, RecordStore, StoreLimits};
