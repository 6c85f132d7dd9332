//! Durable Stream (C1, spec §4.1). Crash-safe append log with consumer-group
//! semantics, backed by SQLite — the teacher's `pipeline::db` module already
//! leans on `rusqlite` with WAL mode for every persistence need; C1 reuses
//! that same connection/migration style rather than introducing a message
//! broker the retrieval pack never depends on.
//!
//! Records are stored as a length-prefixed msgpack blob (spec §6: "a single
//! binary field holding a length-prefixed serialized RawTransaction using a
//! compact schema (msgpack-style)"). Per-group delivery state lives in
//! `pending_entries`; a row there models one record owned by one consumer
//! until acked.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::StreamError;
use crate::model::RawTransaction;
use crate::util::now_unix_ms;

#[derive(Debug, Clone)]
pub struct StreamRecord {
    pub id: i64,
    pub record: RawTransaction,
}

#[async_trait]
pub trait DurableStream: Send + Sync {
    async fn append(&self, record: &RawTransaction) -> Result<i64, StreamError>;

    async fn read_group(
        &self,
        group: &str,
        consumer: &str,
        count: usize,
        block_ms: u64,
    ) -> Result<Vec<StreamRecord>, StreamError>;

    async fn ack(&self, group: &str, ids: &[i64]) -> Result<(), StreamError>;

    async fn claim_idle(
        &self,
        group: &str,
        consumer: &str,
        min_idle_ms: u64,
        start_id: i64,
        count: usize,
    ) -> Result<Vec<StreamRecord>, StreamError>;

    /// Approximate outstanding backlog: unacked pending entries across all
    /// groups. Used by the backpressure controller as `buffer_len` (spec §4.9).
    async fn length(&self) -> Result<u64, StreamError>;

    /// Oldest ingest_time among unacked pending entries, used to compute
    /// `processing_lag_s` (spec §4.9). `None` when nothing is pending.
    async fn oldest_unacked_ingest_time(&self) -> Result<Option<i64>, StreamError>;

    async fn trim_to_maxlen(&self, n: u64) -> Result<(), StreamError>;
}

pub struct SqliteDurableStream {
    conn: Mutex<Connection>,
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS stream_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    payload BLOB NOT NULL,
    ingest_time INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS group_cursor (
    group_name TEXT PRIMARY KEY,
    last_id INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS pending_entries (
    group_name TEXT NOT NULL,
    record_id INTEGER NOT NULL,
    consumer TEXT NOT NULL,
    delivered_at_ms INTEGER NOT NULL,
    acked INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (group_name, record_id)
);

CREATE INDEX IF NOT EXISTS idx_pending_group_acked
    ON pending_entries (group_name, acked);
"#;

impl SqliteDurableStream {
    pub fn open(db_path: &str) -> Result<Self, StreamError> {
        let conn = if db_path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            if let Some(parent) = Path::new(db_path).parent() {
                if !parent.as_os_str().is_empty() {
                    let _ = std::fs::create_dir_all(parent);
                }
            }
            Connection::open(db_path)?
        };
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(SCHEMA)?;
        log::info!("📘 durable stream: SQLite opened at {}", db_path);
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn encode(record: &RawTransaction) -> Result<Vec<u8>, StreamError> {
        rmp_serde::to_vec(record).map_err(|e| StreamError::Codec(e.to_string()))
    }

    fn decode(bytes: &[u8]) -> Result<RawTransaction, StreamError> {
        rmp_serde::from_slice(bytes).map_err(|e| StreamError::Codec(e.to_string()))
    }
}

#[async_trait]
impl DurableStream for SqliteDurableStream {
    async fn append(&self, record: &RawTransaction) -> Result<i64, StreamError> {
        let payload = Self::encode(record)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO stream_records (payload, ingest_time) VALUES (?1, ?2)",
            params![payload, record.ingest_time],
        )?;
        Ok(conn.last_insert_rowid())
    }

    async fn read_group(
        &self,
        group: &str,
        consumer: &str,
        count: usize,
        _block_ms: u64,
    ) -> Result<Vec<StreamRecord>, StreamError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO group_cursor (group_name, last_id) VALUES (?1, 0)",
            params![group],
        )?;
        let last_id: i64 = conn.query_row(
            "SELECT last_id FROM group_cursor WHERE group_name = ?1",
            params![group],
            |r| r.get(0),
        )?;

        let mut stmt = conn.prepare(
            "SELECT id, payload FROM stream_records WHERE id > ?1 ORDER BY id ASC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![last_id, count as i64], |r| {
            let id: i64 = r.get(0)?;
            let payload: Vec<u8> = r.get(1)?;
            Ok((id, payload))
        })?;

        let now = now_unix_ms();
        let mut out = Vec::with_capacity(count);
        let mut new_last_id = last_id;
        for row in rows {
            let (id, payload) = row?;
            let record = Self::decode(&payload)?;
            conn.execute(
                "INSERT OR REPLACE INTO pending_entries
                    (group_name, record_id, consumer, delivered_at_ms, acked)
                 VALUES (?1, ?2, ?3, ?4, 0)",
                params![group, id, consumer, now],
            )?;
            new_last_id = id;
            out.push(StreamRecord { id, record });
        }
        if new_last_id != last_id {
            conn.execute(
                "UPDATE group_cursor SET last_id = ?1 WHERE group_name = ?2",
                params![new_last_id, group],
            )?;
        }
        Ok(out)
    }

    async fn ack(&self, group: &str, ids: &[i64]) -> Result<(), StreamError> {
        if ids.is_empty() {
            return Ok(());
        }
        let conn = self.conn.lock().unwrap();
        for id in ids {
            conn.execute(
                "UPDATE pending_entries SET acked = 1 WHERE group_name = ?1 AND record_id = ?2",
                params![group, id],
            )?;
        }
        Ok(())
    }

    async fn claim_idle(
        &self,
        group: &str,
        consumer: &str,
        min_idle_ms: u64,
        start_id: i64,
        count: usize,
    ) -> Result<Vec<StreamRecord>, StreamError> {
        let conn = self.conn.lock().unwrap();
        let cutoff = now_unix_ms() - min_idle_ms as i64;

        let mut stmt = conn.prepare(
            "SELECT record_id FROM pending_entries
             WHERE group_name = ?1 AND acked = 0 AND record_id >= ?2 AND delivered_at_ms <= ?3
             ORDER BY record_id ASC LIMIT ?4",
        )?;
        let ids: Vec<i64> = stmt
            .query_map(params![group, start_id, cutoff, count as i64], |r| r.get(0))?
            .collect::<Result<_, _>>()?;
        drop(stmt);

        let now = now_unix_ms();
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let payload: Vec<u8> = conn.query_row(
                "SELECT payload FROM stream_records WHERE id = ?1",
                params![id],
                |r| r.get(0),
            )?;
            conn.execute(
                "UPDATE pending_entries SET consumer = ?1, delivered_at_ms = ?2
                 WHERE group_name = ?3 AND record_id = ?4",
                params![consumer, now, group, id],
            )?;
            out.push(StreamRecord { id, record: Self::decode(&payload)? });
        }
        Ok(out)
    }

    async fn length(&self) -> Result<u64, StreamError> {
        let conn = self.conn.lock().unwrap();
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM pending_entries WHERE acked = 0",
            [],
            |r| r.get(0),
        )?;
        Ok(n as u64)
    }

    async fn oldest_unacked_ingest_time(&self) -> Result<Option<i64>, StreamError> {
        let conn = self.conn.lock().unwrap();
        let ts: Option<i64> = conn
            .query_row(
                "SELECT MIN(sr.ingest_time) FROM stream_records sr
                 JOIN pending_entries pe ON pe.record_id = sr.id
                 WHERE pe.acked = 0",
                [],
                |r| r.get(0),
            )
            .optional()?
            .flatten();
        Ok(ts)
    }

    async fn trim_to_maxlen(&self, n: u64) -> Result<(), StreamError> {
        let conn = self.conn.lock().unwrap();
        let total: i64 = conn.query_row("SELECT COUNT(*) FROM stream_records", [], |r| r.get(0))?;
        let excess = total - n as i64;
        if excess <= 0 {
            return Ok(());
        }
        conn.execute(
            "DELETE FROM stream_records WHERE id IN (
                SELECT id FROM stream_records ORDER BY id ASC LIMIT ?1
            )",
            params![excess],
        )?;
        Ok(())
    }
}
