//! Error types for the Toongrab application.
//!
//! Uses `thiserror` for structured error definitions that provide
//! clear context about what went wrong.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for fetching and HTML extraction.
#[derive(Error, Debug)]
pub enum ScrapeError {
    /// HTTP request failed at the transport level
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    /// The required element isn't found in HTML
    #[error("Element not found: {0}")]
    ElementNotFound(String),
}

/// Error type for the chapter-selector grammar.
///
/// These are surfaced to the caller before any download starts.
#[derive(Error, Debug)]
pub enum SelectionError {
    /// The selector string was empty
    #[error("Chapter selection is empty")]
    Empty,

    /// A token was neither a number, a range, nor `all`
    #[error("Invalid selection token: '{0}'")]
    InvalidToken(String),

    /// A single number named a chapter that does not exist
    #[error("Chapter {0} not found")]
    ChapterNotFound(String),
}

/// Error type for PDF archiving.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// No images were handed to the archiver
    #[error("No images to archive")]
    NoImages,

    /// Failed to open an image file
    #[error("Failed to read image {path}: {source}")]
    ReadImage {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to decode an image file
    #[error("Failed to decode image {path}: {message}")]
    DecodeImage { path: PathBuf, message: String },

    /// Failed to encode or write the PDF
    #[error("Failed to write PDF {path}: {message}")]
    WritePdf { path: PathBuf, message: String },
}

/// Error type for configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse config file
    #[error("Failed to parse config: {0}")]
    ParseError(String),

    /// Invalid configuration value
    #[error("Invalid config value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Config directory not found
    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// Result type alias using anyhow for application-level error handling.
pub type Result<T> = anyhow::Result<T>;
