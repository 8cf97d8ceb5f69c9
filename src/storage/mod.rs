//! Durable key-value stores and the containers persisted in them.

use std::sync::{Arc, Mutex};

use anyhow::{Context, anyhow};

use crate::{
    config::{StorageConfig, StorageKind},
    storage::error::StorageError,
};

pub mod container;
pub mod db;
pub mod error;
pub mod fs;
pub mod memory;
pub(crate) mod schema;

/// A string-to-string store the persistent containers write through to.
///
/// Implementations are expected to be synchronous: once `set` returns `Ok`,
/// a subsequent `get` for the same key returns the written value.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Store shared between every container of one session
pub type SharedStore = Arc<Mutex<dyn KeyValueStore>>;

pub fn shared<S: KeyValueStore + 'static>(store: S) -> SharedStore {
    Arc::new(Mutex::new(store))
}

/// Opens the backend selected in the config.
pub fn open(config: &StorageConfig) -> anyhow::Result<SharedStore> {
    let store = match config.kind {
        StorageKind::Memory => shared(memory::MemoryStore::default()),
        StorageKind::Sqlite => {
            let store = match &config.path {
                Some(path) => db::SqliteStore::open(path)
                    .with_context(|| format!("failed to open database {}", path.display()))?,
                None => db::SqliteStore::open_in_memory()?,
            };
            shared(store)
        }
        StorageKind::Directory => {
            let path = config
                .path
                .as_ref()
                .ok_or(anyhow!("directory storage requires a path"))?;
            shared(fs::DirStore::open(path)?)
        }
    };
    log::debug!("opened {:?} storage", config.kind);
    Ok(store)
}

pub(crate) fn lock(
    store: &SharedStore,
) -> Result<std::sync::MutexGuard<'_, dyn KeyValueStore + 'static>, StorageError> {
    store
        .lock()
        .map_err(|e| StorageError::Internal(anyhow!("storage lock poisoned: {e}")))
}
