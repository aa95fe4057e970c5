use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the placement analytics shell.
///
/// The normalization and aggregation core never fails; these variants only
/// arise while loading payloads, reading configuration or filling the cache.
#[derive(Error, Debug)]
pub enum PlacementError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// The payload file or directory does not exist.
    #[error("Payload path not found: {0}")]
    PayloadPathNotFound(PathBuf),

    /// A payload directory contained no JSON files.
    #[error("No JSON files found in {0}")]
    NoPayloadFiles(PathBuf),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A cache loader failed; every caller waiting on the key sees this.
    #[error("Failed to load cache entry {key}: {message}")]
    CacheLoad { key: String, message: String },

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the placement crates.
pub type Result<T> = std::result::Result<T, PlacementError>;
