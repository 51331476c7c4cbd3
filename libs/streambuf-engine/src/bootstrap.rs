use std::sync::Arc;

use streambuf_api::{FlushOutcome, RecordSender, RecordStore};
use streambuf_sender_http::HttpRecordSender;
use streambuf_store_memory::MemoryRecordStore;
use streambuf_store_sqlite::SqliteRecordStore;

use crate::client::RecordClient;
use crate::config::{EngineConfig, StorageKind};
use crate::error::EngineError;
use crate::scheduler::FlushScheduler;

/// A configured buffer: client plus its (not yet started) flush scheduler.
pub struct Engine {
    client: Arc<RecordClient>,
    scheduler: FlushScheduler,
    config: EngineConfig,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("client", &self.client)
            .field("config", &self.config)
            .finish()
    }
}

impl Engine {
    /// Open the store and build the sender described by `config`.
    pub fn bootstrap(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let store = create_store(&config)?;
        let sender = create_sender(&config)?;
        Ok(Self::with_parts(config, store, sender))
    }

    /// Assemble an engine around an already-built store and sender.
    pub fn with_parts(
        config: EngineConfig,
        store: Arc<dyn RecordStore>,
        sender: Arc<dyn RecordSender>,
    ) -> Self {
        let client = Arc::new(RecordClient::new(store, sender));
        let scheduler = FlushScheduler::new(client.clone(), config.flush_strategy());
        Engine { client, scheduler, config }
    }

    pub fn client(&self) -> &Arc<RecordClient> {
        &self.client
    }

    pub fn scheduler(&self) -> &FlushScheduler {
        &self.scheduler
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Stop the scheduler, then drain once more with an explicit flush.
    pub async fn shutdown(&self) -> Result<FlushOutcome, EngineError> {
        self.scheduler.shutdown().await;
        let outcome = self.client.flush().await?;
        tracing::info!(records = outcome.records_flushed, "final flush done");
        Ok(outcome)
    }
}

fn create_store(config: &EngineConfig) -> Result<Arc<dyn RecordStore>, EngineError> {
    let limits = config.limits();
    match config.storage {
        StorageKind::Memory => {
            tracing::warn!("memory storage selected, buffered records are lost on exit");
            Ok(Arc::new(MemoryRecordStore::new(limits)))
        }
        StorageKind::Sqlite => {
            let store = SqliteRecordStore::open_in_dir(&config.data_dir, &config.storage_id, limits)
                .map_err(|e| {
                    EngineError::from(e).with_context(format!("storage '{}'", config.storage_id))
                })?;
            Ok(Arc::new(store))
        }
    }
}

fn create_sender(config: &EngineConfig) -> Result<Arc<dyn RecordSender>, EngineError> {
    let sender = HttpRecordSender::new(&config.sender, config.max_retries)
        .map_err(|e| EngineError::from(e).with_context("sender"))?;
    tracing::info!(
        endpoint = %config.sender.endpoint,
        max_retries = config.max_retries,
        "created sender"
    );
    Ok(Arc::new(sender))
}

#[cfg(test)]
mod tests {
    use super::*;
    use streambuf_api::RecordInput;

    fn config(toml: &str) -> EngineConfig {
        EngineConfig::parse(toml).unwrap()
    }

    #[tokio::test]
    async fn bootstraps_sqlite_store_under_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(&format!(
            r#"
            storage_id = "orders"
            data_dir = "{}"
            flush_interval_secs = 0
            [sender]
            endpoint = "http://127.0.0.1:9/"
            "#,
            dir.path().display()
        ));

        let engine = Engine::bootstrap(cfg).unwrap();
        engine.client().record(RecordInput::new("A", "k", vec![0u8; 10])).await.unwrap();
        assert_eq!(engine.client().cache_size().await.unwrap(), 10);
        assert!(dir.path().join("orders.db").exists());
    }

    #[tokio::test]
    async fn bootstraps_memory_store() {
        let cfg = config(
            r#"
            storage = "memory"
            max_bytes = 100
            [sender]
            endpoint = "http://127.0.0.1:9/"
            "#,
        );
        let engine = Engine::bootstrap(cfg).unwrap();
        let err = engine
            .client()
            .record(RecordInput::new("A", "k", vec![0u8; 101]))
            .await
            .unwrap_err();
        assert!(err.is_limit_exceeded());
        assert!(!engine.scheduler().is_running());
    }
}
