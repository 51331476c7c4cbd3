use rusqlite::{Connection, params};

use streambuf_api::{Record, RecordId, StoreLimits};

pub(crate) const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS records (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    stream_name   TEXT    NOT NULL,
    partition_key TEXT    NOT NULL,
    data          BLOB    NOT NULL,
    data_size     INTEGER NOT NULL,
    retry_count   INTEGER NOT NULL DEFAULT 0,
    created_at    INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_records_stream_id ON records(stream_name, id);
CREATE INDEX IF NOT EXISTS idx_records_data_size ON records(data_size);
";

/// Row number and running size per stream in one pass, both ordered by id.
const GROUPED_SQL: &str = "
WITH windowed AS (
    SELECT id, stream_name, partition_key, data, retry_count, created_at,
           ROW_NUMBER() OVER (
               PARTITION BY stream_name ORDER BY id
           ) AS rn,
           SUM(data_size) OVER (
               PARTITION BY stream_name ORDER BY id
               ROWS BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW
           ) AS running_size
    FROM records
)
SELECT id, stream_name, partition_key, data, retry_count, created_at
FROM windowed
WHERE rn <= ?1 AND running_size <= ?2
ORDER BY stream_name, id";

pub(crate) fn total_size(conn: &Connection) -> rusqlite::Result<u64> {
    let total: i64 =
        conn.query_row("SELECT COALESCE(SUM(data_size), 0) FROM records", [], |row| row.get(0))?;
    Ok(total.max(0) as u64)
}

pub(crate) fn count(conn: &Connection) -> rusqlite::Result<u64> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
    Ok(n.max(0) as u64)
}

/// Run a single-id statement for every id inside one transaction.
pub(crate) fn for_each_id(
    conn: &mut Connection,
    statement: &str,
    ids: &[RecordId],
) -> rusqlite::Result<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare_cached(statement)?;
        for id in ids {
            stmt.execute(params![id.0])?;
        }
    }
    tx.commit()
}

pub(crate) fn grouped_by_stream(
    conn: &Connection,
    limits: &StoreLimits,
) -> rusqlite::Result<Vec<Vec<Record>>> {
    // Limits beyond i64 simply mean "no limit".
    let max_records = i64::try_from(limits.window_max_records).unwrap_or(i64::MAX);
    let max_bytes = i64::try_from(limits.window_max_bytes).unwrap_or(i64::MAX);

    let mut stmt = conn.prepare_cached(GROUPED_SQL)?;
    let rows = stmt.query_map(params![max_records, max_bytes], |row| {
        Ok(Record {
            id: RecordId(row.get(0)?),
            stream_name: row.get(1)?,
            partition_key: row.get(2)?,
            data: row.get(3)?,
            retry_count: row.get(4)?,
            created_at_ms: row.get(5)?,
        })
    })?;

    let mut groups: Vec<Vec<Record>> = Vec::new();
    for row in rows {
        let record = row?;
        match groups.last_mut() {
            Some(group) if group[0].stream_name == record.stream_name => group.push(record),
            _ => groups.push(vec![record]),
        }
    }
    Ok(groups)
}
