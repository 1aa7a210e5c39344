//! # sheetsync
//!
//! Date-indexed synchronization of tag samples into periodic spreadsheet
//! reports.
//!
//! A report template holds one block of rows per calendar day. Incoming
//! [`GroupValue`]s are matched to those rows by the value of their date
//! cell, written column by column according to the point's
//! [`ReportConfig`], and persisted as one workbook per year.
//!
//! ## Features
//!
//! - Read legacy `.xls` workbooks and read/write `.xlsx` workbooks through
//!   one [`WorkbookAccess`] interface
//! - Extract ranges as flat cell lists or row/column groups
//! - Patch written cells into `.xlsx` templates, keeping their formatting
//!
//! ## Example
//!
//! ```rust,no_run
//! use sheetsync::{load_group_values, ConfigLoader, ReportSynchronizer, SyncOptions};
//!
//! let loader = ConfigLoader::new("config").with_environment("staging");
//! let synchronizer = ReportSynchronizer::new(&loader, SyncOptions::default());
//!
//! let values = load_group_values("values.json".as_ref()).unwrap();
//! let report = synchronizer.synchronize("P7", &values).unwrap();
//! for result in &report.results {
//!     println!("{} {}", result.report_year, result.result_path.display());
//! }
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod group_value;
pub mod open;
pub mod prelude;
pub mod sync;

pub use config::{ConfigLoader, ReportConfig, SheetRef};
pub use error::{SyncError, SyncResult};
pub use extract::{
    column_values, extract_cells, extract_column_groups, extract_row_groups, row_values,
    ColumnKeys, Group, HeaderMode, Members,
};
pub use group_value::{load_group_values, parse_group_values, GroupValue, Series};
pub use open::open_workbook;
pub use sync::{
    BucketFailure, ReportSynchronizer, SkipReason, SyncOptions, SyncReport, SynchronizationResult,
};

// Re-export core types
pub use sheetsync_core::{
    BackendKind, Cell, CellAddress, CellError, CellRange, CellType, CellValue, ClassifyOptions,
    Error, IterOptions, Result, SheetId, SheetView, Source, WorkbookAccess,
};
