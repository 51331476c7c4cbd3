pub mod bootstrap;
pub mod client;
pub mod config;
pub mod error;
pub mod scheduler;

pub use bootstrap::Engine;
pub use client::RecordClient;
pub use config::{EngineConfig, StorageKind};
pub use error::EngineError;
pub use scheduler::{FlushScheduler, FlushStrategy};
