//! Error types for sheetsync-core

use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in sheetsync-core and across the sheet access traits
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid cell address format
    #[error("Invalid cell address: {0}")]
    InvalidAddress(String),

    /// Invalid cell range format
    #[error("Invalid cell range: {0}")]
    InvalidRange(String),

    /// Row index out of bounds
    #[error("Row index {0} out of bounds (max: {1})")]
    RowOutOfBounds(u32, u32),

    /// Column index out of bounds
    #[error("Column index {0} out of bounds (max: {1})")]
    ColumnOutOfBounds(u32, u32),

    /// Sheet index out of bounds
    #[error("Sheet index {0} out of bounds (count: {1})")]
    SheetOutOfBounds(usize, usize),

    /// Sheet not found by name
    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    /// Write attempted on a read-only backend
    #[error("The {0} backend is read-only")]
    ReadOnly(&'static str),

    /// Source is neither a legacy nor a packaged workbook
    #[error("Unsupported workbook format: {0}")]
    UnsupportedFormat(String),

    /// A backend failed to read or write a workbook
    #[error("{path}: {message}")]
    Backend { path: String, message: String },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a new "other" error with a message
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }

    /// Create a backend error for a workbook path
    pub fn backend<P: Into<String>, M: ToString>(path: P, message: M) -> Self {
        Error::Backend {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
