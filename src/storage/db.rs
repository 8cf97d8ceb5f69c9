use std::path::Path;

use anyhow::anyhow;
use chrono::{DateTime, Local, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use crate::storage::{
    KeyValueStore,
    error::StorageError,
    schema::{self, columns::*, tables::*},
};

pub type MillisSinceUnix = i64;

/// Key-value store kept in a single SQLite table
pub struct SqliteStore {
    pub(crate) db: Connection,
}

impl SqliteStore {
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::from_existing_conn(Connection::open_in_memory()?)
    }

    pub fn open(path: &Path) -> Result<Self, StorageError> {
        Self::from_existing_conn(Connection::open(path)?)
    }

    pub fn from_existing_conn(db: Connection) -> Result<Self, StorageError> {
        schema::init(&db)?;
        Ok(Self { db })
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let value = self
            .db
            .query_row(
                &format!("SELECT {VALUE} FROM {KV} WHERE {KEY} = ?1"),
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.db.execute(
            &format!(
                "INSERT INTO {KV} ({KEY}, {VALUE}) VALUES (?1, ?2)
             ON CONFLICT({KEY}) DO UPDATE SET {VALUE} = excluded.{VALUE}"
            ),
            params![key, value],
        )?;
        Ok(())
    }
}

/// current wall-clock time in milliseconds since unix epoch
pub fn now_millis() -> MillisSinceUnix {
    Utc::now().timestamp_millis()
}

/// converts number of milliseconds since unix epoch to local date time
pub fn i64_millis_to_local_time(since_unix: i64) -> anyhow::Result<DateTime<Local>> {
    let datetime = DateTime::from_timestamp_millis(since_unix).ok_or(anyhow!(
        "failed to convert {since_unix} ms timestamp to datetime"
    ))?;

    Ok(DateTime::from(datetime))
}
