//! # sheetsync-xls
//!
//! Read-only XLS (BIFF8) backend for sheetsync.
//!
//! This crate handles the legacy Excel binary format (.xls): the `Workbook`
//! stream of a compound file is split into BIFF8 records, and the cell
//! values of each worksheet are kept in a map keyed by A1 address.

pub mod biff;
pub mod error;
pub mod reader;
pub mod workbook;
mod styles;

pub use error::{XlsError, XlsResult};
pub use reader::XlsReader;
pub use workbook::{XlsSheet, XlsWorkbook};
