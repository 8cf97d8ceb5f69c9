//! Containers mirrored to a [`KeyValueStore`] under a single key.
//!
//! A container loads its contents when opened and writes the whole
//! collection back after every mutation (or on [`Persistent::flush`] in
//! [`WriteMode::Deferred`]). Sequences and sets are stored as a JSON array,
//! maps as a JSON array of `[key, value]` pairs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::storage::{SharedStore, error::StorageError, lock};

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Every mutation is written before it returns. A failed write rolls
    /// the mutation back.
    #[default]
    Through,
    /// Mutations only mark the container dirty; `flush` writes it.
    Deferred,
}

/// How a collection is turned into the stored string and back.
pub trait Codec: Default + Clone {
    fn decode(raw: &str) -> Result<Self, serde_json::Error>;

    fn encode(&self) -> Result<String, serde_json::Error>;
}

impl<T> Codec for Vec<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl<K, V> Codec for BTreeMap<K, V>
where
    K: Ord + Serialize + DeserializeOwned + Clone,
    V: Serialize + DeserializeOwned + Clone,
{
    fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        let pairs: Vec<(K, V)> = serde_json::from_str(raw)?;
        Ok(pairs.into_iter().collect())
    }

    fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.iter().collect::<Vec<(&K, &V)>>())
    }
}

/// Generic write-through wrapper; the typed containers below build on it.
pub struct Persistent<C> {
    key: String,
    store: SharedStore,
    mode: WriteMode,
    dirty: bool,
    inner: C,
}

impl<C: Codec> Persistent<C> {
    /// Loads `key` from `store`. A missing or blank value yields an empty
    /// collection, and so does a value that fails to decode.
    pub fn open(key: &str, store: SharedStore, mode: WriteMode) -> Result<Self, StorageError> {
        let raw = lock(&store)?.get(key)?;

        let inner = match raw.as_deref().map(str::trim) {
            None | Some("") => C::default(),
            Some(raw) => C::decode(raw).unwrap_or_else(|e| {
                log::warn!("discarding malformed data stored under '{key}': {e}");
                C::default()
            }),
        };

        Ok(Self {
            key: key.to_string(),
            store,
            mode,
            dirty: false,
            inner,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn get(&self) -> &C {
        &self.inner
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Applies `f` to the collection and persists the result.
    pub fn update<R>(&mut self, f: impl FnOnce(&mut C) -> R) -> Result<R, StorageError> {
        match self.mode {
            WriteMode::Through => {
                let mut next = self.inner.clone();
                let out = f(&mut next);
                self.write(&next)?;
                self.inner = next;
                Ok(out)
            }
            WriteMode::Deferred => {
                let out = f(&mut self.inner);
                self.dirty = true;
                Ok(out)
            }
        }
    }

    /// Writes pending changes. No-op unless the container is dirty.
    pub fn flush(&mut self) -> Result<(), StorageError> {
        if self.dirty {
            self.write(&self.inner)?;
            self.dirty = false;
        }
        Ok(())
    }

    fn write(&self, contents: &C) -> Result<(), StorageError> {
        let raw = contents
            .encode()
            .map_err(|e| StorageError::write(&self.key, e.into()))?;
        lock(&self.store)?
            .set(&self.key, &raw)
            .map_err(|e| StorageError::write(&self.key, e))?;
        log::debug!("persisted '{}' ({} bytes)", self.key, raw.len());
        Ok(())
    }
}

/// Persistent ordered sequence
pub struct PersistentVec<T> {
    inner: Persistent<Vec<T>>,
}

impl<T> PersistentVec<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    pub fn open(key: &str, store: SharedStore, mode: WriteMode) -> Result<Self, StorageError> {
        Ok(Self {
            inner: Persistent::open(key, store, mode)?,
        })
    }

    pub fn len(&self) -> usize {
        self.inner.get().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.get().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.inner.get().get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.inner.get().iter()
    }

    pub fn push(&mut self, value: T) -> Result<(), StorageError> {
        self.inner.update(|v| v.push(value))
    }

    /// Inserts at `index`, clamped to the end of the sequence.
    pub fn insert(&mut self, index: usize, value: T) -> Result<(), StorageError> {
        self.inner.update(|v| {
            let index = index.min(v.len());
            v.insert(index, value)
        })
    }

    pub fn remove(&mut self, index: usize) -> Result<Option<T>, StorageError> {
        if index >= self.len() {
            return Ok(None);
        }
        self.inner.update(|v| Some(v.remove(index)))
    }

    /// Replaces the element at `index`, returning the old one.
    pub fn set(&mut self, index: usize, value: T) -> Result<Option<T>, StorageError> {
        if index >= self.len() {
            return Ok(None);
        }
        self.inner
            .update(|v| Some(std::mem::replace(&mut v[index], value)))
    }

    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.inner.update(Vec::clear)
    }

    pub fn flush(&mut self) -> Result<(), StorageError> {
        self.inner.flush()
    }
}

/// Persistent set that iterates in insertion order
pub struct PersistentSet<T> {
    inner: Persistent<Vec<T>>,
}

impl<T> PersistentSet<T>
where
    T: Serialize + DeserializeOwned + Clone + PartialEq,
{
    pub fn open(key: &str, store: SharedStore, mode: WriteMode) -> Result<Self, StorageError> {
        let mut inner: Persistent<Vec<T>> = Persistent::open(key, store, mode)?;
        // hand-edited data may hold duplicates; keep first occurrences
        let mut seen: Vec<T> = Vec::with_capacity(inner.inner.len());
        for value in inner.inner.drain(..) {
            if !seen.contains(&value) {
                seen.push(value);
            }
        }
        inner.inner = seen;
        Ok(Self { inner })
    }

    pub fn len(&self) -> usize {
        self.inner.get().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.get().is_empty()
    }

    pub fn contains(&self, value: &T) -> bool {
        self.inner.get().contains(value)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.inner.get().iter()
    }

    /// Returns false, without writing, if the value is already present.
    pub fn insert(&mut self, value: T) -> Result<bool, StorageError> {
        if self.contains(&value) {
            return Ok(false);
        }
        self.inner.update(|v| v.push(value))?;
        Ok(true)
    }

    pub fn remove(&mut self, value: &T) -> Result<bool, StorageError> {
        if !self.contains(value) {
            return Ok(false);
        }
        self.inner.update(|v| v.retain(|x| x != value))?;
        Ok(true)
    }

    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.inner.update(Vec::clear)
    }

    pub fn flush(&mut self) -> Result<(), StorageError> {
        self.inner.flush()
    }
}

/// Persistent map ordered by key
pub struct PersistentMap<K, V> {
    inner: Persistent<BTreeMap<K, V>>,
}

impl<K, V> PersistentMap<K, V>
where
    K: Ord + Serialize + DeserializeOwned + Clone,
    V: Serialize + DeserializeOwned + Clone,
{
    pub fn open(key: &str, store: SharedStore, mode: WriteMode) -> Result<Self, StorageError> {
        Ok(Self {
            inner: Persistent::open(key, store, mode)?,
        })
    }

    pub fn len(&self) -> usize {
        self.inner.get().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.get().is_empty()
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.inner.get().get(key)
    }

    pub fn first(&self) -> Option<(&K, &V)> {
        self.inner.get().first_key_value()
    }

    pub fn last(&self) -> Option<(&K, &V)> {
        self.inner.get().last_key_value()
    }

    pub fn iter(&self) -> std::collections::btree_map::Iter<'_, K, V> {
        self.inner.get().iter()
    }

    pub fn insert(&mut self, key: K, value: V) -> Result<Option<V>, StorageError> {
        self.inner.update(|m| m.insert(key, value))
    }

    pub fn remove(&mut self, key: &K) -> Result<Option<V>, StorageError> {
        if !self.inner.get().contains_key(key) {
            return Ok(None);
        }
        self.inner.update(|m| m.remove(key))
    }

    /// Removes the entry with the smallest key. Does not write when empty.
    pub fn pop_first(&mut self) -> Result<Option<(K, V)>, StorageError> {
        if self.is_empty() {
            return Ok(None);
        }
        self.inner.update(BTreeMap::pop_first)
    }

    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.inner.update(BTreeMap::clear)
    }

    /// Several changes persisted as one write.
    pub fn update<R>(&mut self, f: impl FnOnce(&mut BTreeMap<K, V>) -> R) -> Result<R, StorageError> {
        self.inner.update(f)
    }

    pub fn flush(&mut self) -> Result<(), StorageError> {
        self.inner.flush()
    }
}
