//! XLS (BIFF8) reader.
//!
//! Opens a Compound File Binary (CFB/OLE2) container, reads the `Workbook`
//! stream, parses BIFF8 records, and collects the cell values of every
//! worksheet into an [`XlsWorkbook`].

use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use sheetsync_core::cell::serial_to_datetime;
use sheetsync_core::{CellAddress, CellError, FormulaSource, RawCell, RawValue};

use crate::biff::parser::{read_cell_header, read_f64, read_rk, read_u16, read_u32, read_u8};
use crate::biff::records;
use crate::biff::strings::{parse_sst, read_short_string, read_unicode_string};
use crate::biff::{self, BiffRecord};
use crate::error::{XlsError, XlsResult};
use crate::styles::NumberFormats;
use crate::workbook::{XlsSheet, XlsWorkbook};

/// XLS file reader.
pub struct XlsReader;

/// Metadata for a sheet parsed from the BOUNDSHEET record.
#[derive(Debug)]
struct SheetInfo {
    /// Absolute byte offset of the sheet's BOF in the Workbook stream.
    offset: usize,
    /// Sheet type: 0 = worksheet, 2 = chart, 6 = macro/VBA.
    sheet_type: u8,
    name: String,
}

/// Workbook-level data every sheet needs to decode its cells
struct Globals {
    sst: Vec<String>,
    formats: NumberFormats,
    date_1904: bool,
}

impl Globals {
    /// Numbers under a date format become dates
    fn number(&self, value: f64, xf: u16) -> RawValue {
        if self.formats.is_date(xf) {
            if let Some(dt) = serial_to_datetime(value, self.date_1904) {
                return RawValue::Date(dt);
            }
        }
        RawValue::Number(value)
    }
}

fn error_value(code: u8) -> RawValue {
    RawValue::Error(CellError::from_code(code).unwrap_or(CellError::Value))
}

impl XlsReader {
    /// Read an XLS file from a filesystem path.
    pub fn read_file<P: AsRef<Path>>(path: P) -> XlsResult<XlsWorkbook> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::read(file)
    }

    /// Read an XLS file from its bytes.
    pub fn read_bytes(bytes: &[u8]) -> XlsResult<XlsWorkbook> {
        Self::read(Cursor::new(bytes))
    }

    /// Read an XLS file from any `Read + Seek` source.
    pub fn read<R: Read + Seek>(reader: R) -> XlsResult<XlsWorkbook> {
        let mut cfb = cfb::CompoundFile::open(reader)?;

        let stream_path = if cfb.exists("/Workbook") {
            "/Workbook"
        } else if cfb.exists("/Book") {
            "/Book"
        } else {
            return Err(XlsError::InvalidFormat(
                "no Workbook or Book stream found in CFB".into(),
            ));
        };

        let mut stream = Vec::new();
        cfb.open_stream(stream_path)?.read_to_end(&mut stream)?;

        let all_records = biff::read_all_records(&stream);
        let (globals, sheet_infos) = Self::read_globals(&all_records)?;

        // Index of the record starting at each stream offset
        let by_offset: HashMap<usize, usize> = all_records
            .iter()
            .enumerate()
            .map(|(i, rec)| (rec.stream_offset, i))
            .collect();

        let mut sheets = Vec::new();
        for info in sheet_infos {
            if info.sheet_type != records::SHEET_TYPE_WORKSHEET {
                log::debug!("skipping non-worksheet sheet '{}'", info.name);
                continue;
            }
            let Some(&start) = by_offset.get(&info.offset) else {
                return Err(XlsError::InvalidFormat(format!(
                    "sheet '{}' points at offset {} where no record starts",
                    info.name, info.offset
                )));
            };

            let mut sheet = XlsSheet::new(info.name);
            Self::read_sheet(&all_records[start..], &globals, &mut sheet)?;
            sheets.push(sheet);
        }

        Ok(XlsWorkbook::new(sheets, globals.date_1904))
    }

    /// Parse the workbook globals substream up to its EOF.
    fn read_globals(all_records: &[BiffRecord]) -> XlsResult<(Globals, Vec<SheetInfo>)> {
        let mut globals = Globals {
            sst: Vec::new(),
            formats: NumberFormats::default(),
            date_1904: false,
        };
        let mut sheets = Vec::new();

        let Some(first) = all_records.first() else {
            return Err(XlsError::InvalidFormat("empty workbook stream".into()));
        };
        let (version, dt) = if first.record_type == records::BOF {
            biff::parse_bof(&first.data)?
        } else {
            (0, 0)
        };
        if dt != records::BOF_WORKBOOK_GLOBALS {
            return Err(XlsError::InvalidFormat(
                "no workbook globals BOF found".into(),
            ));
        }
        if version != records::BIFF8_VERSION {
            return Err(XlsError::UnsupportedVersion(format!(
                "expected BIFF8 (0x0600), got 0x{version:04X}"
            )));
        }

        for rec in &all_records[1..] {
            match rec.record_type {
                records::EOF => break,
                records::SST => globals.sst = parse_sst(&rec.data, &rec.continues)?,
                records::BOUNDSHEET => sheets.push(Self::parse_boundsheet(&rec.data)?),
                records::DATEMODE => {
                    let mut off = 0;
                    globals.date_1904 = read_u16(&rec.data, &mut off)? == 1;
                }
                records::FORMAT => {
                    if let Err(e) = globals.formats.add_format(&rec.data) {
                        log::warn!("unreadable FORMAT record: {e}");
                    }
                }
                records::XF => globals.formats.add_xf(&rec.data)?,
                _ => {}
            }
        }

        Ok((globals, sheets))
    }

    /// Parse a BOUNDSHEET record body.
    fn parse_boundsheet(data: &[u8]) -> XlsResult<SheetInfo> {
        let mut offset = 0;
        let abs_offset = read_u32(data, &mut offset)? as usize;
        let _visibility = read_u8(data, &mut offset)?;
        let sheet_type = read_u8(data, &mut offset)?;
        let name = read_short_string(data, &mut offset)?;

        Ok(SheetInfo {
            offset: abs_offset,
            sheet_type,
            name,
        })
    }

    /// Parse cell records from a sheet substream, starting at its BOF.
    fn read_sheet(
        substream: &[BiffRecord],
        globals: &Globals,
        sheet: &mut XlsSheet,
    ) -> XlsResult<()> {
        // A STRING record carries the text result of the FORMULA before it
        let mut pending_formula: Option<CellAddress> = None;
        let mut depth = 0usize;

        for rec in substream {
            match rec.record_type {
                records::BOF => {
                    if depth == 0 {
                        let (_, dt) = biff::parse_bof(&rec.data)?;
                        if dt != records::BOF_WORKSHEET {
                            log::debug!("unexpected substream type 0x{dt:04X}");
                        }
                    }
                    depth += 1;
                    continue;
                }
                records::EOF => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        break;
                    }
                    continue;
                }
                // Embedded substreams (charts) carry no worksheet cells
                _ if depth > 1 => continue,
                records::STRING => {
                    if let Some(addr) = pending_formula.take() {
                        let mut off = 0;
                        let text = read_unicode_string(&rec.data, &mut off)?;
                        if let Some(cell) = sheet.get_mut(&addr) {
                            cell.value = RawValue::Text(text);
                        }
                    }
                    continue;
                }
                records::FORMULA => {
                    pending_formula = Self::parse_formula(&rec.data, globals, sheet)?;
                    continue;
                }
                _ => {}
            }

            pending_formula = None;
            match rec.record_type {
                records::LABELSST => {
                    let mut off = 0;
                    let (row, col, _) = read_cell_header(&rec.data, &mut off)?;
                    let index = read_u32(&rec.data, &mut off)? as usize;
                    match globals.sst.get(index) {
                        Some(s) => sheet.insert(
                            CellAddress::new(row, col),
                            RawCell::new(RawValue::Text(s.clone())),
                        ),
                        None => log::warn!("SST index {index} out of range"),
                    }
                }
                records::LABEL => {
                    let mut off = 0;
                    let (row, col, _) = read_cell_header(&rec.data, &mut off)?;
                    let text = read_unicode_string(&rec.data, &mut off)?;
                    sheet.insert(CellAddress::new(row, col), RawCell::new(RawValue::Text(text)));
                }
                records::NUMBER => {
                    let mut off = 0;
                    let (row, col, xf) = read_cell_header(&rec.data, &mut off)?;
                    let value = read_f64(&rec.data, &mut off)?;
                    sheet.insert(CellAddress::new(row, col), RawCell::new(globals.number(value, xf)));
                }
                records::RK => {
                    let mut off = 0;
                    let (row, col, xf) = read_cell_header(&rec.data, &mut off)?;
                    let value = read_rk(&rec.data, &mut off)?;
                    sheet.insert(CellAddress::new(row, col), RawCell::new(globals.number(value, xf)));
                }
                records::MULRK => Self::parse_mulrk(&rec.data, globals, sheet)?,
                records::BOOLERR => {
                    let mut off = 0;
                    let (row, col, _) = read_cell_header(&rec.data, &mut off)?;
                    let value = read_u8(&rec.data, &mut off)?;
                    let is_error = read_u8(&rec.data, &mut off)? != 0;
                    let raw = if is_error {
                        error_value(value)
                    } else {
                        RawValue::Bool(value != 0)
                    };
                    sheet.insert(CellAddress::new(row, col), RawCell::new(raw));
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// MULRK: row(2) + first_col(2) + [xf(2) + rk(4)]* + last_col(2)
    fn parse_mulrk(data: &[u8], globals: &Globals, sheet: &mut XlsSheet) -> XlsResult<()> {
        if data.len() < 6 {
            return Err(XlsError::Parse("MULRK record too short".into()));
        }
        let mut off = 0;
        let row = read_u16(data, &mut off)? as u32 + 1;
        let mut col = read_u16(data, &mut off)? as u32 + 1;
        let rk_data_end = data.len() - 2;

        while off + 6 <= rk_data_end {
            let xf = read_u16(data, &mut off)?;
            let value = read_rk(data, &mut off)?;
            sheet.insert(CellAddress::new(row, col), RawCell::new(globals.number(value, xf)));
            col += 1;
        }
        Ok(())
    }

    /// FORMULA: row(2) + col(2) + xf(2) + result(8) + options(2) + reserved(4) + tokens
    ///
    /// Only the cached result is kept; the token stream is not decompiled.
    /// Returns the address when a STRING record with the text result follows.
    fn parse_formula(
        data: &[u8],
        globals: &Globals,
        sheet: &mut XlsSheet,
    ) -> XlsResult<Option<CellAddress>> {
        let mut off = 0;
        let (row, col, xf) = read_cell_header(data, &mut off)?;
        let result = data
            .get(off..off + 8)
            .ok_or_else(|| XlsError::Parse("FORMULA record too short".into()))?;
        let addr = CellAddress::new(row, col);

        // Bytes 6-7 set to 0xFFFF mark a non-numeric result
        let (value, string_follows) = if result[6] == 0xFF && result[7] == 0xFF {
            match result[0] {
                0x00 => (RawValue::Empty, true),
                0x01 => (RawValue::Bool(result[2] != 0), false),
                0x02 => (error_value(result[2]), false),
                0x03 => (RawValue::Text(String::new()), false),
                other => {
                    log::debug!("unknown formula result type {other} at {addr}");
                    (RawValue::Empty, false)
                }
            }
        } else {
            let mut at = 0;
            (globals.number(read_f64(result, &mut at)?, xf), false)
        };

        sheet.insert(addr, RawCell::with_formula(value, FormulaSource::new(String::new())));
        Ok(string_follows.then_some(addr))
    }
}
