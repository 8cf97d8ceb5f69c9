use std::fmt::Display;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrackError {
    #[error("a track needs a URL string or a record with a non-empty url, got: {0}")]
    InvalidTrackConstruction(String),
}

/// Represent a playable track, identified by its URL
///
/// Metadata is filled in lazily once the tags have been read,
/// `resolved` tells whether that already happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TrackRecord", into = "TrackRecord")]
pub struct Track {
    url: String,
    metadata: TrackMetadata,
    resolved: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub album: Option<String>,
    pub artist: Option<String>,
    pub title: Option<String>,
}

impl TrackMetadata {
    pub fn is_empty(&self) -> bool {
        self.album.is_none() && self.artist.is_none() && self.title.is_none()
    }
}

/// The two shapes a track can be built from, and stored as.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TrackRecord {
    FromUrl(String),
    WithMetadata {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        album: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        artist: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default)]
        resolved: bool,
    },
}

impl Track {
    pub fn from_url(url: impl Into<String>) -> Result<Self, TrackError> {
        Self::try_from(TrackRecord::FromUrl(url.into()))
    }

    /// Builds a track from loosely typed input, e.g. a hand-edited JSON entry.
    pub fn from_value(value: serde_json::Value) -> Result<Self, TrackError> {
        let shown = value.to_string();
        let record: TrackRecord = serde_json::from_value(value)
            .map_err(|_| TrackError::InvalidTrackConstruction(shown))?;
        Self::try_from(record)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn metadata(&self) -> &TrackMetadata {
        &self.metadata
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Fills in resolved tags. Fields missing from `metadata` keep what we had.
    pub fn resolve(&mut self, metadata: TrackMetadata) {
        let TrackMetadata {
            album,
            artist,
            title,
        } = metadata;
        self.metadata.album = album.or(self.metadata.album.take());
        self.metadata.artist = artist.or(self.metadata.artist.take());
        self.metadata.title = title.or(self.metadata.title.take());
        self.resolved = true;
    }
}

impl TryFrom<TrackRecord> for Track {
    type Error = TrackError;

    fn try_from(record: TrackRecord) -> Result<Self, Self::Error> {
        let track = match record {
            TrackRecord::FromUrl(url) => Track {
                url,
                metadata: TrackMetadata::default(),
                resolved: false,
            },
            TrackRecord::WithMetadata {
                url,
                album,
                artist,
                title,
                resolved,
            } => Track {
                url,
                metadata: TrackMetadata {
                    album,
                    artist,
                    title,
                },
                resolved,
            },
        };

        if track.url.trim().is_empty() {
            return Err(TrackError::InvalidTrackConstruction(format!(
                "{:?}",
                track.url
            )));
        }
        Ok(track)
    }
}

impl From<Track> for TrackRecord {
    fn from(track: Track) -> Self {
        if !track.resolved && track.metadata.is_empty() {
            return TrackRecord::FromUrl(track.url);
        }
        TrackRecord::WithMetadata {
            url: track.url,
            album: track.metadata.album,
            artist: track.metadata.artist,
            title: track.metadata.title,
            resolved: track.resolved,
        }
    }
}

impl Display for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.metadata.artist, &self.metadata.title) {
            (Some(artist), Some(title)) => write!(f, "{artist} - {title}"),
            (None, Some(title)) => write!(f, "{title}"),
            _ => write!(f, "{}", self.url),
        }
    }
}
