//! Background resolution of track tags
//!
//! Resolution is fire-and-forget: each request runs on its own thread and
//! the result is picked up later by whoever owns the player, see
//! [`MetadataFetcher::drain`]. Nothing is cancelled once requested.

use std::{
    path::PathBuf,
    sync::{
        Arc,
        mpsc::{self, Receiver, Sender},
    },
    thread,
};

use lofty::{Accessor, Probe, TaggedFileExt};
use thiserror::Error;

use crate::domain::track::TrackMetadata;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("cannot read tags from {0}, only local files are supported")]
    Unsupported(String),

    #[error("failed to read tags from {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("{0} carries no tags")]
    NoTags(String),
}

pub trait MetadataResolver: Send + Sync {
    fn resolve(&self, url: &str) -> Result<TrackMetadata, MetadataError>;
}

/// Reads album, artist and title from a local file's tags.
#[derive(Debug, Default)]
pub struct TagResolver;

impl MetadataResolver for TagResolver {
    fn resolve(&self, url: &str) -> Result<TrackMetadata, MetadataError> {
        let path = local_path(url).ok_or_else(|| MetadataError::Unsupported(url.to_string()))?;
        let read_error = |e: lofty::LoftyError| MetadataError::Read {
            path: path.to_string_lossy().to_string(),
            reason: e.to_string(),
        };

        let tagged_file = Probe::open(&path)
            .map_err(read_error)?
            .read()
            .map_err(read_error)?;

        let tag = tagged_file
            .primary_tag()
            .or(tagged_file.first_tag())
            .ok_or_else(|| MetadataError::NoTags(url.to_string()))?;

        Ok(TrackMetadata {
            album: tag.album().map(|s| s.to_string()),
            artist: tag.artist().map(|s| s.to_string()),
            title: tag.title().map(|s| s.to_string()),
        })
    }
}

/// Local path behind a URL: `file://` URLs and bare paths. Other schemes give `None`.
pub fn local_path(url: &str) -> Option<PathBuf> {
    if let Some(path) = url.strip_prefix("file://") {
        return Some(PathBuf::from(path));
    }
    if url.contains("://") {
        return None;
    }
    Some(PathBuf::from(url))
}

#[derive(Debug)]
pub struct Resolved {
    pub url: String,
    pub result: Result<TrackMetadata, MetadataError>,
}

pub struct MetadataFetcher {
    resolver: Arc<dyn MetadataResolver>,
    tx: Sender<Resolved>,
    rx: Receiver<Resolved>,
}

impl MetadataFetcher {
    pub fn new(resolver: Arc<dyn MetadataResolver>) -> Self {
        let (tx, rx) = mpsc::channel();
        Self { resolver, tx, rx }
    }

    /// Starts resolving `url` in the background.
    pub fn request(&self, url: &str) {
        let url = url.to_string();
        let tx = self.tx.clone();
        let resolver = Arc::clone(&self.resolver);

        thread::spawn(move || {
            let result = resolver.resolve(&url);
            // the fetcher may be gone by now, nobody wants the answer then
            let _ = tx.send(Resolved { url, result });
        });
    }

    /// Everything that finished since the last call, without blocking.
    pub fn drain(&self) -> Vec<Resolved> {
        self.rx.try_iter().collect()
    }

    #[cfg(test)]
    pub fn wait(&self, timeout: std::time::Duration) -> Option<Resolved> {
        self.rx.recv_timeout(timeout).ok()
    }
}
