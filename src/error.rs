use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the image catalog and its file storage.
///
/// Missing files are not errors: lookups return `None` and metrics
/// degrade to zeros instead.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    /// The save directory could not be created, so no write into it can succeed.
    #[error("Failed to create directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Image {0} not found")]
    NotFound(i64),
}

pub type Result<T> = std::result::Result<T, ImageError>;
