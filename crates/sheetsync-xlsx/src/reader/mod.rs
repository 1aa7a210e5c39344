//! XLSX reader

use std::collections::HashMap;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use sheetsync_core::cell::serial_to_datetime;
use sheetsync_core::{CellAddress, CellError, CellStorage, FormulaSource, RawCell, RawValue};

use crate::error::{XlsxError, XlsxResult};
use crate::styles::{read_date_styles, DateStyles};
use crate::workbook::{XlsxSheet, XlsxWorkbook};

/// Decode Excel's `_xHHHH_` escape sequences in strings.
///
/// Excel uses this format to encode special characters in XML:
/// - `_x000d_` = CR (carriage return)
/// - `_x000a_` = LF (line feed)
/// - `_x0009_` = Tab
/// - `_x005f_` = Underscore (escaped underscore)
fn decode_excel_escapes(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '_' {
            result.push(c);
            continue;
        }

        let mut hex_chars = String::new();
        let mut saw_x = false;
        let mut decoded = None;

        if chars.peek() == Some(&'x') {
            chars.next();
            saw_x = true;

            while hex_chars.len() < 4 {
                match chars.peek() {
                    Some(&ch) if ch.is_ascii_hexdigit() => {
                        hex_chars.push(ch);
                        chars.next();
                    }
                    _ => break,
                }
            }

            if hex_chars.len() == 4 && chars.peek() == Some(&'_') {
                chars.next();
                decoded = u32::from_str_radix(&hex_chars, 16)
                    .ok()
                    .and_then(char::from_u32);
            }
        }

        match decoded {
            Some(ch) => result.push(ch),
            None => {
                // Not a valid escape sequence, output what we consumed
                result.push('_');
                if saw_x {
                    result.push('x');
                }
                result.push_str(&hex_chars);
            }
        }
    }

    result
}

fn attr_string(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .and_then(|attr| attr.unescape_value().ok().map(|s| s.to_string()))
}

/// Sheet entry of `xl/workbook.xml`
struct SheetEntry {
    name: String,
    r_id: String,
}

/// Cell being assembled while its element is open
#[derive(Default)]
struct PendingCell {
    reference: Option<String>,
    cell_type: Option<String>,
    style: Option<u32>,
    value: Option<String>,
    formula: Option<String>,
    shared_ref: Option<String>,
    shared_index: Option<String>,
}

/// XLSX file reader
pub struct XlsxReader;

impl XlsxReader {
    /// Read a workbook from a file path
    pub fn read_file<P: AsRef<Path>>(path: P) -> XlsxResult<XlsxWorkbook> {
        let bytes = std::fs::read(path)?;
        Self::read_bytes(bytes)
    }

    /// Read a workbook from its package bytes
    ///
    /// The bytes are kept so the workbook can later be persisted by patching.
    pub fn read_bytes(bytes: Vec<u8>) -> XlsxResult<XlsxWorkbook> {
        let (sheets, date_1904) = Self::read(Cursor::new(bytes.as_slice()))?;
        Ok(XlsxWorkbook::new(bytes, sheets, date_1904))
    }

    fn read<R: Read + Seek>(reader: R) -> XlsxResult<(Vec<XlsxSheet>, bool)> {
        let mut archive = zip::ZipArchive::new(reader)?;

        // Verify this is an XLSX file
        if archive.by_name("[Content_Types].xml").is_err() {
            return Err(XlsxError::InvalidFormat(
                "Missing [Content_Types].xml".into(),
            ));
        }

        let shared_strings = Self::read_shared_strings(&mut archive)?;
        let date_styles = match archive.by_name("xl/styles.xml") {
            Ok(file) => read_date_styles(file)?,
            Err(_) => DateStyles::default(),
        };

        // Read workbook.xml to get sheet info
        let (entries, date_1904) = Self::read_workbook_xml(&mut archive)?;

        // Read workbook.xml.rels to get sheet paths
        let sheet_paths = Self::read_workbook_rels(&mut archive)?;

        let mut sheets = Vec::with_capacity(entries.len());
        for entry in entries {
            let Some(part) = sheet_paths.get(&entry.r_id) else {
                log::warn!(
                    "sheet '{}' has no worksheet relationship {}, skipping",
                    entry.name,
                    entry.r_id
                );
                continue;
            };
            let cells = Self::read_worksheet(
                &mut archive,
                part,
                &shared_strings,
                &date_styles,
                date_1904,
            )?;
            sheets.push(XlsxSheet::new(entry.name, part.clone(), cells));
        }

        Ok((sheets, date_1904))
    }

    /// Read the shared strings table
    fn read_shared_strings<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
    ) -> XlsxResult<Vec<String>> {
        let mut strings = Vec::new();

        let file = match archive.by_name("xl/sharedStrings.xml") {
            Ok(f) => f,
            Err(_) => return Ok(strings), // No shared strings is valid
        };

        let reader = BufReader::new(file);
        let mut xml_reader = Reader::from_reader(reader);
        xml_reader.trim_text(true);

        let mut buf = Vec::new();
        let mut current_string = String::new();
        let mut in_si = false;
        let mut in_t = false;
        let mut in_phonetic = false;

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => match e.name().as_ref() {
                    b"si" => {
                        in_si = true;
                        current_string.clear();
                    }
                    b"rPh" => in_phonetic = true,
                    b"t" if in_si && !in_phonetic => in_t = true,
                    _ => {}
                },
                Ok(Event::Empty(e)) if e.name().as_ref() == b"si" => {
                    strings.push(String::new());
                }
                Ok(Event::End(e)) => match e.name().as_ref() {
                    b"si" => {
                        strings.push(decode_excel_escapes(&current_string));
                        current_string.clear();
                        in_si = false;
                    }
                    b"rPh" => in_phonetic = false,
                    b"t" => in_t = false,
                    _ => {}
                },
                Ok(Event::Text(e)) if in_t => {
                    if let Ok(text) = e.unescape() {
                        current_string.push_str(&text);
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(strings)
    }

    /// Read workbook.xml to get sheet names, rIds and the date system
    fn read_workbook_xml<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
    ) -> XlsxResult<(Vec<SheetEntry>, bool)> {
        let file = archive
            .by_name("xl/workbook.xml")
            .map_err(|_| XlsxError::MissingPart("xl/workbook.xml".into()))?;

        let reader = BufReader::new(file);
        let mut xml_reader = Reader::from_reader(reader);
        xml_reader.trim_text(true);

        let mut buf = Vec::new();
        let mut sheets = Vec::new();
        let mut date_1904 = false;

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Empty(e)) | Ok(Event::Start(e)) => match e.name().as_ref() {
                    b"sheet" => {
                        let name = attr_string(&e, b"name");
                        let r_id = attr_string(&e, b"r:id");
                        if let (Some(name), Some(r_id)) = (name, r_id) {
                            sheets.push(SheetEntry { name, r_id });
                        }
                    }
                    b"workbookPr" => {
                        date_1904 = matches!(
                            attr_string(&e, b"date1904").as_deref(),
                            Some("1") | Some("true")
                        );
                    }
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok((sheets, date_1904))
    }

    /// Read workbook.xml.rels to get sheet file paths
    fn read_workbook_rels<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
    ) -> XlsxResult<HashMap<String, String>> {
        let file = archive
            .by_name("xl/_rels/workbook.xml.rels")
            .map_err(|_| XlsxError::MissingPart("xl/_rels/workbook.xml.rels".into()))?;

        let reader = BufReader::new(file);
        let mut xml_reader = Reader::from_reader(reader);
        xml_reader.trim_text(true);

        let mut buf = Vec::new();
        let mut rels = HashMap::new();

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Empty(e)) | Ok(Event::Start(e))
                    if e.name().as_ref() == b"Relationship" =>
                {
                    let id = attr_string(&e, b"Id");
                    let target = attr_string(&e, b"Target");
                    let rel_type = attr_string(&e, b"Type");

                    // Only include worksheet relationships
                    if let (Some(id), Some(target), Some(rel_type)) = (id, target, rel_type) {
                        if rel_type.ends_with("/worksheet") {
                            // Target is relative to xl/ folder
                            let full_path = match target.strip_prefix('/') {
                                Some(absolute) => absolute.to_string(),
                                None => format!("xl/{}", target),
                            };
                            rels.insert(id, full_path);
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(rels)
    }

    /// Read the cells of a worksheet part into sparse storage
    fn read_worksheet<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
        path: &str,
        shared_strings: &[String],
        date_styles: &DateStyles,
        date_1904: bool,
    ) -> XlsxResult<CellStorage> {
        let file = archive
            .by_name(path)
            .map_err(|_| XlsxError::MissingPart(path.to_string()))?;

        let reader = BufReader::new(file);
        let mut xml_reader = Reader::from_reader(reader);
        xml_reader.trim_text(true);

        let mut buf = Vec::new();
        let mut storage = CellStorage::new();

        // Shared formula masters: si -> formula text
        let mut shared_formulas: HashMap<String, String> = HashMap::new();

        let mut cell = PendingCell::default();
        let mut in_cell = false;
        let mut in_value = false;
        let mut in_formula = false;
        let mut in_inline_str = false;
        let mut in_inline_text = false;

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => match e.name().as_ref() {
                    b"c" => {
                        in_cell = true;
                        cell = Self::start_cell(&e);
                    }
                    b"v" if in_cell => in_value = true,
                    b"f" if in_cell => {
                        in_formula = true;
                        Self::read_formula_attrs(&e, &mut cell);
                    }
                    b"is" if in_cell => {
                        in_inline_str = true;
                        cell.cell_type = Some("inlineStr".to_string());
                    }
                    b"t" if in_inline_str => in_inline_text = true,
                    _ => {}
                },
                Ok(Event::End(e)) => match e.name().as_ref() {
                    b"c" => {
                        let done = std::mem::take(&mut cell);
                        Self::process_cell(
                            &mut storage,
                            done,
                            &mut shared_formulas,
                            shared_strings,
                            date_styles,
                            date_1904,
                        )?;
                        in_cell = false;
                    }
                    b"v" => in_value = false,
                    b"f" => in_formula = false,
                    b"is" => in_inline_str = false,
                    b"t" if in_inline_str => in_inline_text = false,
                    _ => {}
                },
                Ok(Event::Text(e)) => {
                    if in_value {
                        if let Ok(text) = e.unescape() {
                            cell.value = Some(text.to_string());
                        }
                    } else if in_formula {
                        if let Ok(text) = e.unescape() {
                            cell.formula = Some(text.to_string());
                        }
                    } else if in_inline_text {
                        if let Ok(text) = e.unescape() {
                            // Rich inline strings arrive as several runs
                            cell.value.get_or_insert_with(String::new).push_str(&text);
                        }
                    }
                }
                Ok(Event::Empty(e)) => match e.name().as_ref() {
                    b"c" => {
                        // Empty cell element (may still carry a style)
                        let empty = Self::start_cell(&e);
                        Self::process_cell(
                            &mut storage,
                            empty,
                            &mut shared_formulas,
                            shared_strings,
                            date_styles,
                            date_1904,
                        )?;
                    }
                    b"f" if in_cell => Self::read_formula_attrs(&e, &mut cell),
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(storage)
    }

    fn start_cell(e: &BytesStart) -> PendingCell {
        PendingCell {
            reference: attr_string(e, b"r"),
            cell_type: attr_string(e, b"t"),
            style: attr_string(e, b"s").and_then(|s| s.parse().ok()),
            ..PendingCell::default()
        }
    }

    fn read_formula_attrs(e: &BytesStart, cell: &mut PendingCell) {
        if attr_string(e, b"t").as_deref() == Some("shared") {
            cell.shared_index = attr_string(e, b"si");
            cell.shared_ref = attr_string(e, b"ref");
        }
    }

    /// Process a cell and add it to the sheet storage
    fn process_cell(
        storage: &mut CellStorage,
        cell: PendingCell,
        shared_formulas: &mut HashMap<String, String>,
        shared_strings: &[String],
        date_styles: &DateStyles,
        date_1904: bool,
    ) -> XlsxResult<()> {
        let Some(reference) = cell.reference else {
            log::warn!("cell without a reference, skipping");
            return Ok(());
        };
        let addr = CellAddress::parse(&reference).map_err(|e| {
            XlsxError::Parse(format!("Invalid cell reference '{}': {}", reference, e))
        })?;

        let is_date = date_styles.is_date(cell.style);
        let value = match cell.value.as_deref() {
            Some(v) => Self::parse_value(
                v,
                cell.cell_type.as_deref(),
                is_date,
                shared_strings,
                date_1904,
            )?,
            None => RawValue::Empty,
        };

        // Shared formula dependents carry only `si`; they reuse the master text
        let formula = match (cell.formula, cell.shared_index) {
            (Some(text), Some(si)) => {
                shared_formulas.insert(si, text.clone());
                Some(FormulaSource {
                    text,
                    shared_ref: cell.shared_ref,
                })
            }
            (Some(text), None) => Some(FormulaSource::new(text)),
            (None, Some(si)) => shared_formulas.get(&si).map(|text| FormulaSource {
                text: text.clone(),
                shared_ref: cell.shared_ref,
            }),
            (None, None) => None,
        };

        storage.set(addr.row, addr.col, RawCell { value, formula });
        Ok(())
    }

    fn parse_value(
        value: &str,
        cell_type: Option<&str>,
        is_date: bool,
        shared_strings: &[String],
        date_1904: bool,
    ) -> XlsxResult<RawValue> {
        let raw = match cell_type {
            // Shared string
            Some("s") => {
                let idx: usize = value.trim().parse().map_err(|_| {
                    XlsxError::Parse(format!("Invalid shared string index: {}", value))
                })?;
                let s = shared_strings.get(idx).ok_or_else(|| {
                    XlsxError::Parse(format!("Shared string index {} out of bounds", idx))
                })?;
                RawValue::Text(s.clone())
            }

            Some("b") => RawValue::Bool(value == "1" || value.eq_ignore_ascii_case("true")),

            Some("e") => CellError::from_literal(value)
                .map(RawValue::Error)
                .unwrap_or_else(|| RawValue::Text(value.to_string())),

            Some("inlineStr") | Some("str") => RawValue::Text(decode_excel_escapes(value)),

            // ISO 8601 date cell
            Some("d") => match parse_iso_datetime(value) {
                Some(dt) => RawValue::Date(dt),
                None => RawValue::Text(value.to_string()),
            },

            // Number (default type or explicit "n")
            None | Some("n") => match value.trim().parse::<f64>() {
                Ok(n) if is_date => serial_to_datetime(n, date_1904)
                    .map(RawValue::Date)
                    .unwrap_or(RawValue::Number(n)),
                Ok(n) => RawValue::Number(n),
                Err(_) => RawValue::Text(value.to_string()),
            },

            // Unknown type - treat as string
            Some(_) => RawValue::Text(value.to_string()),
        };
        Ok(raw)
    }
}

fn parse_iso_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim().trim_end_matches('Z');
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
