//! # streambuf-store-sqlite
//!
//! Durable `RecordStore` on SQLite.
//!
//! A dedicated OS thread owns the `rusqlite::Connection` together with the
//! running-size counter. Async callers send [`DbCommand`] messages over a
//! bounded tokio channel and await a `oneshot` reply, so every mutation is
//! serialized through one writer and the counter cannot drift between two
//! lock domains.
//!
//! ```rust,ignore
//! use streambuf_api::StoreLimits;
//! use streambuf_store_sqlite::SqliteRecordStore;
//!
//! let limits = StoreLimits::shared(500, 5 << 20);
//! let store = SqliteRecordStore::open_in_dir("./data", "analytics", limits)?;
//! ```

mod sql;

use std::path::{Path, PathBuf};

use rusqlite::{Connection, params};
use tokio::sync::{mpsc, oneshot};

use streambuf_api::{
    BoxFuture, Record, RecordError, RecordId, RecordInput, RecordStore, StoreLimits, now_ms,
};

/// Commands queued ahead of the writer before callers start waiting.
const COMMAND_BUFFER: usize = 64;

type Reply<T> = oneshot::Sender<Result<T, RecordError>>;

// ---------------------------------------------------------------------------
// Command enum: sent from async callers to the writer thread
// ---------------------------------------------------------------------------

enum DbCommand {
    Append {
        input: RecordInput,
        created_at_ms: i64,
        reply: Reply<Record>,
    },
    Grouped {
        reply: Reply<Vec<Vec<Record>>>,
    },
    Delete {
        ids: Vec<RecordId>,
        reply: Reply<()>,
    },
    IncrementRetry {
        ids: Vec<RecordId>,
        reply: Reply<()>,
    },
    Clear {
        reply: Reply<u64>,
    },
    CacheSize {
        reply: Reply<u64>,
    },
    Count {
        reply: Reply<u64>,
    },
}

// ---------------------------------------------------------------------------
// SqliteRecordStore: the public API
// ---------------------------------------------------------------------------

/// SQLite record store.
///
/// `Clone` is cheap, it only clones the channel handle. The writer thread
/// stops once every clone is dropped.
#[derive(Clone)]
pub struct SqliteRecordStore {
    tx: mpsc::Sender<DbCommand>,
    path: Option<PathBuf>,
}

impl SqliteRecordStore {
    /// Open (or create) `<data_dir>/<storage_id>.db`.
    ///
    /// `storage_id` namespaces one logical buffer instance.
    pub fn open_in_dir(
        data_dir: impl AsRef<Path>,
        storage_id: &str,
        limits: StoreLimits,
    ) -> Result<Self, RecordError> {
        validate_storage_id(storage_id)?;
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir).map_err(|e| {
            RecordError::storage(format!("create data dir '{}': {e}", data_dir.display()))
        })?;
        Self::open(data_dir.join(format!("{storage_id}.db")), limits)
    }

    /// Open (or create) a database file at `path`.
    ///
    /// Schema and WAL mode are configured synchronously, before the writer
    /// thread starts. The running size is initialized from the existing
    /// backlog.
    pub fn open(path: impl AsRef<Path>, limits: StoreLimits) -> Result<Self, RecordError> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).map_err(|e| storage_err("open", e))?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
            .map_err(|e| storage_err("enable WAL", e))?;
        let store = Self::start(conn, limits, Some(path.clone()))?;
        tracing::info!(path = %path.display(), "opened sqlite record store");
        Ok(store)
    }

    /// Ephemeral database, gone when the store is dropped.
    pub fn open_in_memory(limits: StoreLimits) -> Result<Self, RecordError> {
        let conn = Connection::open_in_memory().map_err(|e| storage_err("open", e))?;
        Self::start(conn, limits, None)
    }

    /// Database file path, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn start(
        conn: Connection,
        limits: StoreLimits,
        path: Option<PathBuf>,
    ) -> Result<Self, RecordError> {
        conn.execute_batch(sql::SCHEMA).map_err(|e| storage_err("create schema", e))?;
        let running_size = sql::total_size(&conn).map_err(|e| storage_err("initial size", e))?;
        if running_size > 0 {
            tracing::info!(bytes = running_size, "recovered buffered records");
        }

        let (tx, rx) = mpsc::channel::<DbCommand>(COMMAND_BUFFER);
        let writer = Writer { conn, limits, running_size };
        std::thread::Builder::new()
            .name("streambuf-sqlite".to_string())
            .spawn(move || run_db_thread(writer, rx))
            .map_err(|e| RecordError::storage(format!("spawn writer thread: {e}")))?;

        Ok(Self { tx, path })
    }
}

fn storage_err(ctx: &str, e: rusqlite::Error) -> RecordError {
    RecordError::storage(format!("{ctx}: {e}"))
}

/// Allowed: `^[A-Za-z0-9_.-]+$`, not starting with a dot.
fn validate_storage_id(id: &str) -> Result<(), RecordError> {
    if id.is_empty() {
        return Err(RecordError::storage("storage id is empty"));
    }
    if id.starts_with('.') {
        return Err(RecordError::storage(format!(
            "invalid storage id '{id}': must not start with a dot"
        )));
    }
    if let Some(ch) = id.chars().find(|c| !c.is_ascii_alphanumeric() && !"_.-".contains(*c)) {
        return Err(RecordError::storage(format!(
            "invalid character '{ch}' in storage id '{id}'"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Writer thread: blocking event loop
// ---------------------------------------------------------------------------

struct Writer {
    conn: Connection,
    limits: StoreLimits,
    running_size: u64,
}

impl Writer {
    fn append(&mut self, input: RecordInput, created_at_ms: i64) -> Result<Record, RecordError> {
        let size = input.size();
        self.limits.check_append(self.running_size, size)?;

        let size_col = i64::try_from(size)
            .map_err(|_| RecordError::storage(format!("payload size {size} overflows i64")))?;
        self.conn
            .prepare_cached(
                "INSERT INTO records
                     (stream_name, partition_key, data, data_size, retry_count, created_at)
                 VALUES (?1, ?2, ?3, ?4, 0, ?5)",
            )
            .and_then(|mut stmt| {
                stmt.execute(params![
                    input.stream_name,
                    input.partition_key,
                    input.data,
                    size_col,
                    created_at_ms
                ])
            })
            .map_err(|e| storage_err("append", e))?;
        let id = RecordId(self.conn.last_insert_rowid());
        self.running_size += size;

        Ok(Record {
            id,
            stream_name: input.stream_name,
            partition_key: input.partition_key,
            data: input.data,
            retry_count: 0,
            created_at_ms,
        })
    }

    fn delete(&mut self, ids: &[RecordId]) -> rusqlite::Result<()> {
        sql::for_each_id(&mut self.conn, "DELETE FROM records WHERE id = ?1", ids)?;
        // Authoritative recount instead of a delta over mixed deletions.
        self.running_size = sql::total_size(&self.conn)?;
        Ok(())
    }

    fn increment_retry(&mut self, ids: &[RecordId]) -> rusqlite::Result<()> {
        sql::for_each_id(
            &mut self.conn,
            "UPDATE records SET retry_count = retry_count + 1 WHERE id = ?1",
            ids,
        )
    }

    fn clear(&mut self) -> rusqlite::Result<u64> {
        let removed = self.conn.execute("DELETE FROM records", [])?;
        self.running_size = 0;
        Ok(removed as u64)
    }
}

fn run_db_thread(mut writer: Writer, mut rx: mpsc::Receiver<DbCommand>) {
    while let Some(cmd) = rx.blocking_recv() {
        match cmd {
            DbCommand::Append { input, created_at_ms, reply } => {
                let _ = reply.send(writer.append(input, created_at_ms));
            }
            DbCommand::Grouped { reply } => {
                let result = sql::grouped_by_stream(&writer.conn, &writer.limits)
                    .map_err(|e| storage_err("grouped retrieval", e));
                let _ = reply.send(result);
            }
            DbCommand::Delete { ids, reply } => {
                let _ = reply.send(writer.delete(&ids).map_err(|e| storage_err("delete", e)));
            }
            DbCommand::IncrementRetry { ids, reply } => {
                let result = writer
                    .increment_retry(&ids)
                    .map_err(|e| storage_err("increment retry count", e));
                let _ = reply.send(result);
            }
            DbCommand::Clear { reply } => {
                let _ = reply.send(writer.clear().map_err(|e| storage_err("clear", e)));
            }
            DbCommand::CacheSize { reply } => {
                let _ = reply.send(Ok(writer.running_size));
            }
            DbCommand::Count { reply } => {
                let result = sql::count(&writer.conn).map_err(|e| storage_err("count", e));
                let _ = reply.send(result);
            }
        }
    }
    // All senders dropped → exit cleanly.
    tracing::debug!("sqlite writer thread stopped");
}

// ---------------------------------------------------------------------------
// send_cmd! macro: enqueue + await oneshot
// ---------------------------------------------------------------------------

macro_rules! send_cmd {
    ($tx:expr, $cmd:expr) => {{
        let (reply_tx, reply_rx) = oneshot::channel();
        $tx.send($cmd(reply_tx))
            .await
            .map_err(|_| RecordError::storage("sqlite writer has shut down"))?;
        reply_rx
            .await
            .map_err(|_| RecordError::storage("sqlite writer dropped the reply"))?
    }};
}

// ---------------------------------------------------------------------------
// RecordStore impl
// ---------------------------------------------------------------------------

impl RecordStore for SqliteRecordStore {
    fn append(&self, input: RecordInput) -> BoxFuture<'_, Result<Record, RecordError>> {
        let created_at_ms = now_ms();
        Box::pin(async move {
            send_cmd!(self.tx, |reply| DbCommand::Append { input, created_at_ms, reply })
        })
    }

    fn grouped_by_stream(&self) -> BoxFuture<'_, Result<Vec<Vec<Record>>, RecordError>> {
        Box::pin(async move { send_cmd!(self.tx, |reply| DbCommand::Grouped { reply }) })
    }

    fn delete<'a>(&'a self, ids: &'a [RecordId]) -> BoxFuture<'a, Result<(), RecordError>> {
        let ids = ids.to_vec();
        Box::pin(async move { send_cmd!(self.tx, |reply| DbCommand::Delete { ids, reply }) })
    }

    fn increment_retry_count<'a>(
        &'a self,
        ids: &'a [RecordId],
    ) -> BoxFuture<'a, Result<(), RecordError>> {
        let ids = ids.to_vec();
        Box::pin(async move {
            send_cmd!(self.tx, |reply| DbCommand::IncrementRetry { ids, reply })
        })
    }

    fn clear(&self) -> BoxFuture<'_, Result<u64, RecordError>> {
        Box::pin(async move { send_cmd!(self.tx, |reply| DbCommand::Clear { reply }) })
    }

    fn current_cache_size(&self) -> BoxFuture<'_, Result<u64, RecordError>> {
        Box::pin(async move { send_cmd!(self.tx, |reply| DbCommand::CacheSize { reply }) })
    }

    fn count(&self) -> BoxFuture<'_, Result<u64, RecordError>> {
        Box::pin(async move { send_cmd!(self.tx, |reply| DbCommand::Count { reply }) })
    }
}
