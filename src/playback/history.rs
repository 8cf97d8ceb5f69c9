//! Append-only record of what was played and when

use crate::{
    domain::track::Track,
    playback::{key::EntryKey, queue::Clock},
    storage::{
        SharedStore,
        container::{PersistentMap, WriteMode},
        db::{MillisSinceUnix, now_millis},
        error::StorageError,
    },
};

pub const DEFAULT_MAX_ENTRIES: usize = 1000;

pub struct PlayLog {
    entries: PersistentMap<EntryKey, Track>,
    /// 0 keeps everything
    max_entries: usize,
    clock: Clock,
}

impl PlayLog {
    pub fn open(
        key: &str,
        store: SharedStore,
        mode: WriteMode,
        max_entries: usize,
    ) -> Result<Self, StorageError> {
        Ok(Self {
            entries: PersistentMap::open(key, store, mode)?,
            max_entries,
            clock: now_millis,
        })
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Records `track` as played now.
    pub fn add(&mut self, track: Track) -> Result<EntryKey, StorageError> {
        let key = EntryKey::next_after(self.entries.last().map(|(k, _)| k), (self.clock)());
        self.insert(key, track)
    }

    /// Records `track` as played at `at`. Several entries at the same
    /// millisecond are kept apart by their sequence number.
    ///
    /// Returns `None` without writing when the log is full and `at` is older
    /// than every kept entry, since that entry would be evicted right away.
    pub fn add_at(
        &mut self,
        track: Track,
        at: MillisSinceUnix,
    ) -> Result<Option<EntryKey>, StorageError> {
        let mut key = EntryKey::new(at);
        while self.entries.get(&key).is_some() {
            key.seq += 1;
        }

        let full = self.max_entries > 0 && self.entries.len() >= self.max_entries;
        if full && self.entries.first().is_some_and(|(oldest, _)| key < *oldest) {
            log::debug!("play log full, not recording {} at {at}", track.url());
            return Ok(None);
        }
        self.insert(key, track).map(Some)
    }

    fn insert(&mut self, key: EntryKey, track: Track) -> Result<EntryKey, StorageError> {
        let max_entries = self.max_entries;
        let evicted = self.entries.update(|entries| {
            entries.insert(key, track);
            let mut evicted = 0;
            while max_entries > 0 && entries.len() > max_entries {
                entries.pop_first();
                evicted += 1;
            }
            evicted
        })?;
        if evicted > 0 {
            log::debug!("play log full, evicted {evicted} oldest entries");
        }
        Ok(key)
    }

    /// Entries in chronological order. Every call starts from the oldest.
    pub fn entries(&self) -> impl Iterator<Item = (&EntryKey, &Track)> + '_ {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<(&EntryKey, &Track)> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.entries.clear()
    }

    pub fn flush(&mut self) -> Result<(), StorageError> {
        self.entries.flush()
    }
}
