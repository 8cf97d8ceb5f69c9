use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("filesystem error: {0}")]
    Fs(#[from] std::io::Error),

    #[error("failed to serialize container: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write key '{key}': {source}")]
    Write {
        key: String,
        #[source]
        source: Box<StorageError>,
    },

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl StorageError {
    pub fn write(key: &str, source: StorageError) -> Self {
        Self::Write {
            key: key.to_string(),
            source: Box::new(source),
        }
    }
}
