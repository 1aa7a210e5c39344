//! End-to-end tests for sheetsync-xls.
//!
//! Each test assembles a BIFF8 workbook with [`common::XlsFixture`], stores
//! it in a compound file, and reads it back with `XlsReader`.

mod common;
mod reading;

pub use common::*;
