//! Prelude module - common imports for sheetsync users
//!
//! ```rust
//! use sheetsync::prelude::*;
//! ```

pub use crate::{
    // Cell types
    Cell,
    CellAddress,
    CellRange,
    CellType,
    CellValue,
    ClassifyOptions,

    // Configuration
    ConfigLoader,
    ReportConfig,

    // Error types
    Error,
    Result,
    SyncError,

    // Extraction
    ColumnKeys,
    Group,
    HeaderMode,
    Members,

    // Synchronization
    GroupValue,
    ReportSynchronizer,
    SkipReason,
    SyncOptions,
    SyncReport,
    SynchronizationResult,

    // Workbook access
    IterOptions,
    SheetId,
    SheetView,
    Source,
    WorkbookAccess,
};
