use std::collections::HashMap;

use crate::storage::{KeyValueStore, error::StorageError};

/// Process-local store, nothing survives the process.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn with_entry(mut self, key: &str, value: &str) -> Self {
        self.entries.insert(key.to_string(), value.to_string());
        self
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}


/// Store whose writes can be made to fail, for exercising error paths.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct FailingStore {
    inner: MemoryStore,
    switch: FailSwitch,
}

#[cfg(test)]
#[derive(Debug, Default)]
struct FailRules {
    all: bool,
    /// successful writes left before every further write fails
    remaining: Option<usize>,
    key: Option<String>,
}

#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct FailSwitch {
    rules: std::sync::Arc<std::sync::Mutex<FailRules>>,
    writes: std::sync::Arc<std::sync::atomic::AtomicUsize>,
}

#[cfg(test)]
impl FailSwitch {
    pub fn fail_writes(&self, fail: bool) {
        self.rules.lock().unwrap().all = fail;
    }

    /// Lets `n` more writes through, then fails the rest.
    pub fn fail_after(&self, n: usize) {
        self.rules.lock().unwrap().remaining = Some(n);
    }

    /// Fails writes to `key` only.
    pub fn fail_key(&self, key: &str) {
        self.rules.lock().unwrap().key = Some(key.to_string());
    }

    /// number of successful writes so far
    pub fn writes(&self) -> usize {
        self.writes.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn allow(&self, key: &str) -> bool {
        let mut rules = self.rules.lock().unwrap();
        if rules.all || rules.key.as_deref() == Some(key) {
            return false;
        }
        match &mut rules.remaining {
            Some(0) => false,
            Some(n) => {
                *n -= 1;
                true
            }
            None => true,
        }
    }
}

#[cfg(test)]
impl FailingStore {
    pub fn switch(&self) -> FailSwitch {
        self.switch.clone()
    }
}

#[cfg(test)]
impl KeyValueStore for FailingStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        if !self.switch.allow(key) {
            return Err(StorageError::Fs(std::io::Error::other("quota exceeded")));
        }
        self.switch
            .writes
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.inner.set(key, value)
    }
}
