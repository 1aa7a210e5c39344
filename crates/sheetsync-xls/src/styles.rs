//! Date detection from BIFF8 FORMAT and XF records.
//!
//! A numeric cell is a date when the XF record it references points at a
//! date number format, either one of the built-in ids or a FORMAT record
//! whose code renders date or time parts.

use std::collections::HashMap;

use sheetsync_core::cell::is_date_format;

use crate::biff::parser::read_u16;
use crate::biff::strings::read_unicode_string;
use crate::error::XlsResult;

/// Number formats collected from the workbook globals
#[derive(Debug, Default)]
pub(crate) struct NumberFormats {
    /// Custom codes from FORMAT records, by format id
    codes: HashMap<u16, String>,
    /// Format id of each XF record, in XF order
    xf_formats: Vec<u16>,
}

impl NumberFormats {
    pub(crate) fn add_format(&mut self, data: &[u8]) -> XlsResult<()> {
        let (id, code) = parse_format(data)?;
        self.codes.insert(id, code);
        Ok(())
    }

    pub(crate) fn add_xf(&mut self, data: &[u8]) -> XlsResult<()> {
        self.xf_formats.push(parse_xf_format(data)?);
        Ok(())
    }

    /// Check if the cell format `xf` renders a date
    pub(crate) fn is_date(&self, xf: u16) -> bool {
        match self.xf_formats.get(xf as usize) {
            Some(&id) => is_date_format(
                id as u32,
                self.codes.get(&id).map(String::as_str),
            ),
            None => false,
        }
    }
}

/// Parse a FORMAT record (0x041E).
///
/// Layout:
///   0  u16  ifmt   format index
///   2  ...  format string (unicode string, 2-byte length prefix)
fn parse_format(data: &[u8]) -> XlsResult<(u16, String)> {
    let mut off = 0;
    let ifmt = read_u16(data, &mut off)?;
    let code = read_unicode_string(data, &mut off)?;
    Ok((ifmt, code))
}

/// Format index of an XF record (0x00E0): `ifnt` (u16) then `ifmt` (u16).
fn parse_xf_format(data: &[u8]) -> XlsResult<u16> {
    let mut off = 2;
    read_u16(data, &mut off)
}
