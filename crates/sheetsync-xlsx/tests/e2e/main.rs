//! End-to-end tests for sheetsync-xlsx.
//!
//! Each test builds its package in memory with [`common::XlsxFixture`], reads
//! it with `XlsxReader`, and asserts on the classified cells or on the parts
//! of the patched package.

mod common;
mod reading;
mod writing;

// Re-export common utilities for submodules
pub use common::*;
