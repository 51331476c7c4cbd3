use std::fmt;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error returned by every store, sender and client operation.
///
/// Capacity and storage failures surface to the caller as-is. Per-record
/// delivery failures never show up here; only a failed batch call does.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// Append rejected: the cache is full. Never retried automatically.
    #[error("cache limit exceeded: {current} + {incoming} bytes > {max} bytes")]
    LimitExceeded { current: u64, incoming: u64, max: u64 },

    /// The local store failed to read or write.
    #[error("storage: {message}")]
    Storage { message: String },

    /// The remote batch call failed outright.
    #[error("service: {0}")]
    Service(#[from] ServiceError),

    #[error("{message}")]
    Unknown {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl RecordError {
    pub fn storage(msg: impl Into<String>) -> Self {
        RecordError::Storage { message: msg.into() }
    }

    pub fn unknown(msg: impl Into<String>, source: impl Into<BoxError>) -> Self {
        RecordError::Unknown { message: msg.into(), source: Some(source.into()) }
    }

    /// Add context to the error, preserving the variant.
    ///
    /// Produces: `"context: original message"`.
    pub fn with_context(self, ctx: impl fmt::Display) -> Self {
        match self {
            RecordError::Storage { message } => {
                RecordError::Storage { message: format!("{ctx}: {message}") }
            }
            RecordError::Unknown { message, source } => {
                RecordError::Unknown { message: format!("{ctx}: {message}"), source }
            }
            other => other,
        }
    }

    pub fn is_limit_exceeded(&self) -> bool {
        matches!(self, RecordError::LimitExceeded { .. })
    }
}

/// Batch-level failure of the remote ingestion call.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("internal failure: {0}")]
    InternalFailure(String),

    #[error("provisioned throughput exceeded: {0}")]
    ThroughputExceeded(String),

    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("kms failure: {0}")]
    KmsFailure(String),

    /// Connection, TLS or timeout failure before a response was read.
    #[error("network: {source}")]
    Network {
        #[source]
        source: BoxError,
    },

    #[error("unknown service error '{code}': {message}")]
    Unknown { code: String, message: String },
}

impl ServiceError {
    /// Map a named service error code onto the closed set.
    ///
    /// Accepts both bare codes and `namespace#Code` shapes.
    pub fn from_code(code: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let short = code.rsplit('#').next().unwrap_or(code);
        match short {
            "AccessDeniedException" => ServiceError::AccessDenied(message),
            "InternalFailure" | "InternalFailureException" => {
                ServiceError::InternalFailure(message)
            }
            "ProvisionedThroughputExceededException" => ServiceError::ThroughputExceeded(message),
            "ResourceNotFoundException" => ServiceError::ResourceNotFound(message),
            "InvalidArgumentException" => ServiceError::InvalidArgument(message),
            "LimitExceededException" => ServiceError::LimitExceeded(message),
            s if s.starts_with("KMS") => ServiceError::KmsFailure(message),
            _ => ServiceError::Unknown { code: short.to_string(), message },
        }
    }

    /// Whether the whole batch is worth resubmitting as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ServiceError::InternalFailure(_)
                | ServiceError::ThroughputExceeded(_)
                | ServiceError::Network { .. }
        )
    }
}
