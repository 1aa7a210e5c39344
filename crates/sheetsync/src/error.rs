//! Error types for report synchronization

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using [`SyncError`]
pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Errors surfaced by the synchronizer and its configuration loader.
///
/// Per-date and per-column mismatches are not errors; they are reported as
/// [`SkipReason`](crate::sync::SkipReason)s on the bucket result.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No configuration file exists for the point
    #[error("No report configuration for point '{point_id}' at {}", path.display())]
    ConfigNotFound { point_id: String, path: PathBuf },

    /// A configuration file exists but is not valid
    #[error("Invalid report configuration {}: {message}", path.display())]
    ConfigParse { path: PathBuf, message: String },

    /// Neither a year output nor any template exists
    #[error("No report or template found for point '{point_id}', year {year}")]
    SourceFileNotFound { point_id: String, year: i32 },

    /// The target workbook could not be opened or read
    #[error("Failed to read workbook {}: {source}", path.display())]
    BackendRead {
        path: PathBuf,
        #[source]
        source: sheetsync_core::Error,
    },

    /// The bucket's workbook could not be written
    #[error("Failed to persist workbook {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: sheetsync_core::Error,
    },

    /// Group values could not be loaded
    #[error("Invalid group values in {}: {message}", path.display())]
    GroupValues { path: PathBuf, message: String },

    /// Core error
    #[error(transparent)]
    Core(#[from] sheetsync_core::Error),
}

impl SyncError {
    /// Whether the error ends only the current year bucket
    pub fn is_bucket_local(&self) -> bool {
        matches!(
            self,
            SyncError::SourceFileNotFound { .. } | SyncError::BackendRead { .. }
        )
    }
}
