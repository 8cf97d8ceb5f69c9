use crate::{
    domain::track::{Track, TrackMetadata},
    playback::key::EntryKey,
    storage::{
        SharedStore,
        container::{PersistentMap, WriteMode},
        db::{MillisSinceUnix, now_millis},
        error::StorageError,
    },
};

pub type Clock = fn() -> MillisSinceUnix;

/// Persistent FIFO of tracks waiting for their first play
pub struct Queue {
    entries: PersistentMap<EntryKey, Track>,
    clock: Clock,
}

impl Queue {
    pub fn open(key: &str, store: SharedStore, mode: WriteMode) -> Result<Self, StorageError> {
        Ok(Self {
            entries: PersistentMap::open(key, store, mode)?,
            clock: now_millis,
        })
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Appends a track behind everything already queued.
    pub fn enqueue(&mut self, track: Track) -> Result<EntryKey, StorageError> {
        let key = EntryKey::next_after(self.entries.last().map(|(k, _)| k), (self.clock)());
        log::debug!("queued {} as {key}", track.url());
        self.entries.insert(key, track)?;
        Ok(key)
    }

    /// Removes and returns the oldest track, `None` when nothing is queued.
    pub fn dequeue(&mut self) -> Result<Option<Track>, StorageError> {
        Ok(self.entries.pop_first()?.map(|(_, track)| track))
    }

    /// Removes up to `n` of the oldest tracks in a single write. On error
    /// the queue is left as it was.
    pub fn dequeue_many(&mut self, n: usize) -> Result<Vec<Track>, StorageError> {
        if n == 0 || self.is_empty() {
            return Ok(Vec::new());
        }
        self.entries.update(|entries| {
            std::iter::from_fn(|| entries.pop_first())
                .take(n)
                .map(|(_, track)| track)
                .collect()
        })
    }

    pub fn peek(&self) -> Option<&Track> {
        self.entries.first().map(|(_, track)| track)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// oldest first
    pub fn iter(&self) -> impl Iterator<Item = (&EntryKey, &Track)> + '_ {
        self.entries.iter()
    }

    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.entries.clear()
    }

    /// Patches every queued entry for `url`, returns how many were updated.
    pub fn update_metadata(
        &mut self,
        url: &str,
        metadata: &TrackMetadata,
    ) -> Result<usize, StorageError> {
        if !self.entries.iter().any(|(_, t)| t.url() == url) {
            return Ok(0);
        }
        self.entries.update(|entries| {
            let mut patched = 0;
            for track in entries.values_mut().filter(|t| t.url() == url) {
                track.resolve(metadata.clone());
                patched += 1;
            }
            patched
        })
    }

    pub fn flush(&mut self) -> Result<(), StorageError> {
        self.entries.flush()
    }
}
