//! # sheetsync-core
//!
//! Core data structures for the sheetsync report synchronizer.
//!
//! This crate provides the types shared by both spreadsheet backends and the
//! synchronizer, and performs no I/O itself:
//! - [`CellAddress`] and [`CellRange`] - 1-based A1 addressing
//! - [`RawCell`] - a cell as a backend reads it
//! - [`Cell`] - a classified cell with its [`CellType`] and [`CellValue`]
//! - [`SheetView`] and [`WorkbookAccess`] - the capability traits every backend implements
//!
//! ## Example
//!
//! ```rust
//! use sheetsync_core::{Cell, CellAddress, CellValue, ClassifyOptions, RawCell, RawValue};
//!
//! let addr: CellAddress = "C7".parse().unwrap();
//! let raw = RawCell::new(RawValue::Number(1963.69481));
//! let cell = Cell::classify(addr, &raw, &ClassifyOptions::default());
//! assert_eq!(cell.value, CellValue::Number(1963.695));
//! ```

pub mod access;
pub mod cell;
pub mod error;

// Re-exports for convenience
pub use access::{BackendKind, IterOptions, SheetId, SheetView, Source, WorkbookAccess};
pub use cell::{
    Cell, CellAddress, CellError, CellRange, CellStorage, CellType, CellValue, ClassifyOptions,
    FormulaSource, RawCell, RawValue,
};
pub use error::{Error, Result};

/// Maximum number of rows in a worksheet (Excel limit)
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet (Excel limit)
pub const MAX_COLS: u32 = 16_384;
