use streambuf_api::RecordError;
use streambuf_engine::EngineError;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Engine(#[from] EngineError),

    #[error("{0}")]
    Record(#[from] RecordError),

    #[error("stdin: {0}")]
    Stdin(#[from] std::io::Error),
}
