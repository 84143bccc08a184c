//! Toongrab - webtoon catalog search and concurrent chapter downloader.
//!
//! This library provides functionality for:
//! - Searching a webtoon catalog and extracting manga details from HTML
//! - Numbering and ordering chapters, including side stories
//! - Downloading chapter images concurrently with bounded parallelism
//! - Merging downloaded chapters into PDFs

pub mod archive;
pub mod config;
pub mod console;
pub mod download;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod select;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use console::Console;
pub use download::{ChapterReport, ChapterStatus, DownloadEngine, DownloadOptions, Progress};
pub use error::{ArchiveError, ConfigError, ScrapeError, SelectionError};
pub use extract::{Chapter, MangaDetails, SearchResult};
pub use fetch::Fetcher;
pub use select::resolve_selection;
