use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::storage::db::MillisSinceUnix;

/// Ordering key for queue and log entries
///
/// `at_ms` is the wall-clock time of insertion and `seq` tells apart entries
/// inserted within the same millisecond. Serialized as `[at_ms, seq]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "(MillisSinceUnix, u32)", into = "(MillisSinceUnix, u32)")]
pub struct EntryKey {
    pub at_ms: MillisSinceUnix,
    pub seq: u32,
}

impl EntryKey {
    pub fn new(at_ms: MillisSinceUnix) -> Self {
        Self { at_ms, seq: 0 }
    }

    /// Smallest key at `now` that sorts after `last`.
    ///
    /// If the clock went backwards, the new key stays on `last`'s millisecond.
    pub fn next_after(last: Option<&EntryKey>, now: MillisSinceUnix) -> Self {
        match last {
            Some(last) if last.at_ms >= now => match last.seq.checked_add(1) {
                Some(seq) => Self {
                    at_ms: last.at_ms,
                    seq,
                },
                None => Self::new(last.at_ms + 1),
            },
            _ => Self::new(now),
        }
    }
}

impl From<(MillisSinceUnix, u32)> for EntryKey {
    fn from((at_ms, seq): (MillisSinceUnix, u32)) -> Self {
        Self { at_ms, seq }
    }
}

impl From<EntryKey> for (MillisSinceUnix, u32) {
    fn from(key: EntryKey) -> Self {
        (key.at_ms, key.seq)
    }
}

impl Display for EntryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.at_ms, self.seq)
    }
}
