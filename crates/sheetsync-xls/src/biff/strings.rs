//! BIFF8 Unicode string decoding.
//!
//! BIFF8 strings have a complex encoding:
//! - Header: char_count (2 bytes, 1 byte for short strings) + flags (1 byte)
//! - Flags bit 0 (`fHighByte`): 0 = compressed Latin-1, 1 = uncompressed UTF-16LE
//! - Flags bit 2 (`fExtSt`): extended string data follows (Asian phonetic)
//! - Flags bit 3 (`fRichSt`): rich text run array follows
//! - If fRichSt: 2-byte run count follows the flags
//! - If fExtSt: 4-byte extended data size follows
//! - Then the character data, the runs (4 bytes each) and the extended data
//!
//! In SST records the character data of one string can be split by a
//! CONTINUE boundary. The continuation then starts with a new flags byte
//! that may switch between compressed and uncompressed characters.

use super::parser::{read_u16, read_u32, read_u8};
use crate::error::{XlsError, XlsResult};

const HIGH_BYTE: u8 = 0x01;
const EXT_ST: u8 = 0x04;
const RICH_ST: u8 = 0x08;

/// Reads strings from a record body, aware of its CONTINUE boundaries.
pub struct StringCursor<'a> {
    data: &'a [u8],
    boundaries: &'a [usize],
    pos: usize,
}

impl<'a> StringCursor<'a> {
    pub fn new(data: &'a [u8], boundaries: &'a [usize], pos: usize) -> Self {
        Self {
            data,
            boundaries,
            pos,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Read a string with a 2-byte length prefix (SST, LABEL, STRING, FORMAT).
    pub fn read_unicode_string(&mut self) -> XlsResult<String> {
        let char_count = read_u16(self.data, &mut self.pos)? as usize;
        self.read_string_body(char_count)
    }

    /// Read a string with a 1-byte length prefix (BOUNDSHEET).
    pub fn read_short_string(&mut self) -> XlsResult<String> {
        let char_count = read_u8(self.data, &mut self.pos)? as usize;
        self.read_string_body(char_count)
    }

    fn read_string_body(&mut self, char_count: usize) -> XlsResult<String> {
        let flags = read_u8(self.data, &mut self.pos)?;
        let run_count = if flags & RICH_ST != 0 {
            read_u16(self.data, &mut self.pos)? as usize
        } else {
            0
        };
        let ext_size = if flags & EXT_ST != 0 {
            read_u32(self.data, &mut self.pos)? as usize
        } else {
            0
        };

        let text = self.read_characters(char_count, flags & HIGH_BYTE != 0)?;

        // Formatting runs and phonetic data are not needed
        self.skip(run_count * 4 + ext_size)?;
        Ok(text)
    }

    /// Next CONTINUE boundary at or after the cursor
    fn next_boundary(&self) -> Option<usize> {
        self.boundaries.iter().copied().find(|&b| b >= self.pos)
    }

    fn read_characters(&mut self, count: usize, mut wide: bool) -> XlsResult<String> {
        let mut units: Vec<u16> = Vec::with_capacity(count);

        while units.len() < count {
            let limit = match self.next_boundary() {
                Some(b) if b == self.pos => {
                    // Split string: the continuation restates the width
                    let flags = read_u8(self.data, &mut self.pos)?;
                    wide = flags & HIGH_BYTE != 0;
                    self.next_boundary().unwrap_or(self.data.len())
                }
                Some(b) => b,
                None => self.data.len(),
            };

            let width = if wide { 2 } else { 1 };
            let available = (limit - self.pos) / width;
            if available == 0 {
                return Err(XlsError::Parse(format!(
                    "string data too short: need {} more characters at offset {}",
                    count - units.len(),
                    self.pos
                )));
            }

            let take = available.min(count - units.len());
            let chunk = &self.data[self.pos..self.pos + take * width];
            if wide {
                units.extend(chunk.chunks_exact(2).map(|p| u16::from_le_bytes([p[0], p[1]])));
            } else {
                units.extend(chunk.iter().map(|&b| b as u16));
            }
            self.pos += take * width;
        }

        String::from_utf16(&units).map_err(|e| XlsError::Parse(format!("invalid UTF-16 string: {e}")))
    }

    fn skip(&mut self, n: usize) -> XlsResult<()> {
        if self.pos + n > self.data.len() {
            return Err(XlsError::Parse(format!(
                "cannot skip {} bytes at offset {}",
                n, self.pos
            )));
        }
        self.pos += n;
        Ok(())
    }
}

/// Read a string with a 2-byte length prefix from a single-record body.
pub fn read_unicode_string(data: &[u8], offset: &mut usize) -> XlsResult<String> {
    let mut cursor = StringCursor::new(data, &[], *offset);
    let text = cursor.read_unicode_string()?;
    *offset = cursor.position();
    Ok(text)
}

/// Read a string with a 1-byte length prefix from a single-record body.
pub fn read_short_string(data: &[u8], offset: &mut usize) -> XlsResult<String> {
    let mut cursor = StringCursor::new(data, &[], *offset);
    let text = cursor.read_short_string()?;
    *offset = cursor.position();
    Ok(text)
}

/// Parse the Shared String Table from an SST record body with its
/// CONTINUE bodies appended at `boundaries`.
///
/// The body starts with the total reference count (u32) and the unique
/// string count (u32), followed by the strings. A damaged tail is logged and
/// the strings read so far are kept.
pub fn parse_sst(data: &[u8], boundaries: &[usize]) -> XlsResult<Vec<String>> {
    let mut offset = 0;
    let _total_strings = read_u32(data, &mut offset)?;
    let unique_count = read_u32(data, &mut offset)? as usize;

    let mut cursor = StringCursor::new(data, boundaries, offset);
    let mut strings = Vec::with_capacity(unique_count.min(data.len()));

    for i in 0..unique_count {
        match cursor.read_unicode_string() {
            Ok(s) => strings.push(s),
            Err(e) => {
                log::warn!("SST parse error at string {i}/{unique_count}: {e}");
                break;
            }
        }
    }

    Ok(strings)
}
