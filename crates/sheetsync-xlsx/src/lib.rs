//! # sheetsync-xlsx
//!
//! XLSX (Office Open XML) backend for sheetsync.
//!
//! Reading loads every worksheet into sparse storage and keeps the original
//! package bytes. Persisting patches only the written cells into a copy of
//! that package, so template formatting and unrelated parts survive as-is.

pub mod error;
pub mod reader;
pub mod workbook;
pub mod writer;

mod styles;

pub use error::{XlsxError, XlsxResult};
pub use reader::XlsxReader;
pub use workbook::{XlsxSheet, XlsxWorkbook};
