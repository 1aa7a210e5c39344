//! Cell-related types and utilities
//!
//! This module contains:
//! - [`CellAddress`] / [`CellRange`] - A cell's location (e.g., "A1") and rectangles of cells
//! - [`RawCell`] - A cell as a backend reads it
//! - [`Cell`] - A classified cell with its semantic [`CellType`] and [`CellValue`]
//! - [`CellStorage`] - Sparse row-major storage
//! - Excel date serial helpers

mod address;
mod classify;
mod date;
mod storage;
mod value;

pub use address::{index_to_letter, letter_to_index, CellAddress, CellRange, CellRangeIterator};
pub use classify::{round_to, Cell, ClassifyOptions, DATETIME_FORMAT, DAY_FORMAT};
pub use date::{
    datetime_to_serial, is_builtin_date_format, is_date_format, is_date_format_code,
    serial_to_datetime,
};
pub use storage::CellStorage;
pub use value::{CellError, CellType, CellValue, FormulaSource, RawCell, RawValue};
