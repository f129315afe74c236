use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TraceError>;
pub type ReportResult<T> = std::result::Result<T, ReportError>;

/// Document level failures. Any of these aborts the whole run.
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("Failed to open file {}: {source}", path.display())]
    FailedToOpenFile { path: PathBuf, source: io::Error },

    #[error("An I/O error has occurred while trying to read {}: {source}", path.display())]
    FailedToRead { path: PathBuf, source: io::Error },

    #[error("Failed to compute digest of {}: {source}", path.display())]
    FailedToDigest { path: PathBuf, source: io::Error },

    #[error("Trace data contains invalid UTF-8: {source}")]
    InvalidUtf8 { source: std::string::FromUtf8Error },

    #[error("Offset {offset}: trace is not well-formed XML: {message}")]
    MalformedXml { offset: u64, message: String },

    #[error("Reached EOF while element `{name}` was still open")]
    UnclosedElement { name: String },
}

impl TraceError {
    pub(crate) fn malformed(offset: u64, err: impl std::fmt::Display) -> Self {
        TraceError::MalformedXml {
            offset,
            message: err.to_string(),
        }
    }
}

/// Failures while paginating or writing reports.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Page size must be a positive number, got {chunk_size}")]
    InvalidChunkSize { chunk_size: usize },

    #[error("There is a directory at {}, refusing to overwrite", path.display())]
    OutputIsDirectory { path: PathBuf },

    #[error("Refused to overwrite existing report {}", path.display())]
    OverwriteDeclined { path: PathBuf },

    #[error("Failed to write report {}: {source}", path.display())]
    FailedToWrite { path: PathBuf, source: io::Error },
}
