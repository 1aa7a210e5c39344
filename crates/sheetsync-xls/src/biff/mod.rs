//! BIFF8 (Binary Interchange File Format) handling.
//!
//! A BIFF8 stream is a sequence of records, each with a 4-byte header
//! (2 bytes record type + 2 bytes body length) followed by the body.
//!
//! CONTINUE records (type 0x003C) extend the body of the preceding record
//! beyond the 8224-byte per-record limit. Their bodies are appended to the
//! parent, and the offsets where they start are kept: string data split
//! across a boundary restarts with a fresh flags byte.

pub mod parser;
pub mod records;
pub mod strings;

use crate::error::{XlsError, XlsResult};

/// A single BIFF8 record with its CONTINUE bodies merged.
#[derive(Debug, Clone, PartialEq)]
pub struct BiffRecord {
    /// Record type ID (e.g. `records::SST`, `records::NUMBER`).
    pub record_type: u16,
    /// Record body bytes, continuations included.
    pub data: Vec<u8>,
    /// Offsets into `data` where each CONTINUE body begins.
    pub continues: Vec<usize>,
    /// Byte offset of this record's header in the stream.
    pub stream_offset: usize,
}

/// Split a workbook stream into records, merging CONTINUE records
/// into their parent.
///
/// A truncated trailing record ends the stream.
pub fn read_all_records(stream: &[u8]) -> Vec<BiffRecord> {
    let mut records: Vec<BiffRecord> = Vec::new();
    let mut pos = 0usize;

    while pos + 4 <= stream.len() {
        let stream_offset = pos;
        let record_type = u16::from_le_bytes([stream[pos], stream[pos + 1]]);
        let body_len = u16::from_le_bytes([stream[pos + 2], stream[pos + 3]]) as usize;
        pos += 4;

        let Some(body) = stream.get(pos..pos + body_len) else {
            log::warn!(
                "record 0x{record_type:04X} at offset {stream_offset} is truncated, stopping"
            );
            break;
        };
        pos += body_len;

        if record_type == records::CONTINUE {
            match records.last_mut() {
                Some(prev) => {
                    prev.continues.push(prev.data.len());
                    prev.data.extend_from_slice(body);
                }
                None => log::debug!("orphaned CONTINUE record dropped"),
            }
        } else {
            records.push(BiffRecord {
                record_type,
                data: body.to_vec(),
                continues: Vec::new(),
                stream_offset,
            });
        }
    }

    records
}

/// Extract the BOF record fields from a record body.
///
/// Returns `(version, substream_type)`.
pub fn parse_bof(data: &[u8]) -> XlsResult<(u16, u16)> {
    if data.len() < 4 {
        return Err(XlsError::InvalidFormat("BOF record too short".into()));
    }
    let version = u16::from_le_bytes([data[0], data[1]]);
    let dt = u16::from_le_bytes([data[2], data[3]]);
    Ok((version, dt))
}
