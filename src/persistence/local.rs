use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

use super::LocalStore;
use crate::model::PersistencePayload;
use crate::util::ensure_directory;

const DB_SCHEMA_VERSION: &str = "0.1.0";
const ANNOTATIONS_KEY: &str = "annotations";

/// Provenance of the last successful load of one dataset kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub path: String,
    pub sha256: String,
    pub record_count: usize,
    pub loaded_at: String,
}

pub struct SqliteStore {
    connection: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            ensure_directory(parent)?;
        }

        let connection = Connection::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        configure_connection(&connection)?;
        ensure_schema(&connection)?;

        Ok(Self { connection })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let connection = Connection::open_in_memory().context("failed to open in-memory db")?;
        ensure_schema(&connection)?;
        Ok(Self { connection })
    }

    /// Records every `(kind, record)` pair in one transaction.
    pub fn record_datasets(&self, records: &[(&str, &DatasetRecord)]) -> Result<()> {
        let tx = self
            .connection
            .unchecked_transaction()
            .context("failed to begin dataset record transaction")?;
        for (kind, record) in records {
            let value =
                serde_json::to_string(record).context("failed to serialize dataset record")?;
            set_metadata(&tx, &dataset_key(kind), &value)?;
        }
        tx.commit().context("failed to commit dataset records")
    }

    pub fn dataset(&self, kind: &str) -> Result<Option<DatasetRecord>> {
        let Some(raw) = self.metadata(&dataset_key(kind))? else {
            return Ok(None);
        };
        let record = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse stored {kind} dataset record"))?;
        Ok(Some(record))
    }

    pub fn metadata(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .connection
            .query_row("SELECT value FROM metadata WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()
            .with_context(|| format!("failed to read metadata key {key}"))?;
        Ok(value)
    }

    /// When the annotation state was last written, if ever.
    pub fn annotations_updated_at(&self) -> Result<Option<DateTime<Utc>>> {
        self.connection
            .query_row(
                "SELECT updated_at FROM kv WHERE key = ?1",
                [ANNOTATIONS_KEY],
                |row| row.get(0),
            )
            .optional()
            .context("failed to read annotation state timestamp")
    }
}

impl LocalStore for SqliteStore {
    fn read(&self) -> Result<Option<PersistencePayload>> {
        let raw: Option<String> = self
            .connection
            .query_row(
                "SELECT value FROM kv WHERE key = ?1",
                [ANNOTATIONS_KEY],
                |row| row.get(0),
            )
            .optional()
            .context("failed to read stored annotation state")?;

        let Some(raw) = raw else {
            return Ok(None);
        };
        let payload = serde_json::from_str(&raw).context("failed to parse stored annotation state")?;
        Ok(Some(payload))
    }

    fn write(&self, payload: &PersistencePayload) -> Result<()> {
        let value = serde_json::to_string(payload).context("failed to serialize annotation state")?;
        self.connection
            .execute(
                "INSERT INTO kv(key, value, updated_at) VALUES(?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value=excluded.value, updated_at=excluded.updated_at",
                params![ANNOTATIONS_KEY, value, Utc::now()],
            )
            .context("failed to write annotation state")?;
        Ok(())
    }
}

fn set_metadata(connection: &Connection, key: &str, value: &str) -> Result<()> {
    connection
        .execute(
            "INSERT INTO metadata(key, value) VALUES(?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value=excluded.value",
            params![key, value],
        )
        .with_context(|| format!("failed to write metadata key {key}"))?;
    Ok(())
}

fn dataset_key(kind: &str) -> String {
    format!("dataset.{kind}")
}

fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    Ok(())
}

fn ensure_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
            CREATE TABLE IF NOT EXISTS metadata (
              key TEXT PRIMARY KEY,
              value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS kv (
              key TEXT PRIMARY KEY,
              value TEXT NOT NULL,
              updated_at TEXT NOT NULL
            );
            ",
        )
        .context("failed to initialize schema")?;

    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [DB_SCHEMA_VERSION],
    )?;

    Ok(())
}

#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: std::rc::Rc<std::cell::RefCell<MemoryState>>,
}

#[cfg(test)]
#[derive(Debug, Default)]
struct MemoryState {
    payload: Option<PersistencePayload>,
    writes: usize,
}

#[cfg(test)]
impl MemoryStore {
    pub fn seeded(payload: PersistencePayload) -> Self {
        let store = Self::default();
        store.inner.borrow_mut().payload = Some(payload);
        store
    }

    pub fn writes(&self) -> usize {
        self.inner.borrow().writes
    }

    pub fn stored(&self) -> Option<PersistencePayload> {
        self.inner.borrow().payload.clone()
    }
}

#[cfg(test)]
impl LocalStore for MemoryStore {
    fn read(&self) -> Result<Option<PersistencePayload>> {
        Ok(self.inner.borrow().payload.clone())
    }

    fn write(&self, payload: &PersistencePayload) -> Result<()> {
        let mut state = self.inner.borrow_mut();
        state.payload = Some(payload.clone());
        state.writes += 1;
        Ok(())
    }
}
