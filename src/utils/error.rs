// src/utils/error.rs
use thiserror::Error;

// Errors raised while opening or reading a source document
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse PDF {path}: {source}")]
    Pdf {
        path: String,
        #[source]
        source: lopdf::Error,
    },

    #[error("Invalid table bundle {path}: {source}")]
    Bundle {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unsupported document type: {0}")]
    Unsupported(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid page range '{0}'")]
    PageRange(String),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Could not read config file {path}: {reason}")]
    File { path: String, reason: String },

    #[error("Invalid setting: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {0}")]
    Settings(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Document error: {0}")]
    Source(#[from] SourceError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Data processing failed: {0}")]
    Processing(String),

    #[error("Run cancelled after {0} document(s)")]
    Cancelled(usize),
}
