//! XLSX package patcher
//!
//! Persisting never regenerates a workbook. The original package is copied
//! entry by entry, and only the worksheets with written cells are rewritten:
//! each is streamed through a quick-xml reader/writer pair that replaces or
//! inserts the written `<c>` elements and passes everything else through
//! byte-for-byte. When anything was written, the calculation chain is dropped
//! and Excel is asked to recalculate on load.

use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Read, Write};

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::Writer;
use sheetsync_core::cell::datetime_to_serial;
use sheetsync_core::{CellAddress, CellValue};

use crate::error::{XlsxError, XlsxResult};
use crate::workbook::parse_datetime_value;

mod shared;

use shared::{plan_promotions, write_promoted};

/// Written cells of one sheet: row -> column -> value, 1-based
pub(crate) type CellEdits = BTreeMap<u32, BTreeMap<u32, CellValue>>;

const CALC_CHAIN_PART: &str = "xl/calcChain.xml";
const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

/// Elements of `<workbook>` that must follow `<calcPr>`
const AFTER_CALC_PR: &[&[u8]] = &[
    b"oleSize",
    b"customWorkbookViews",
    b"pivotCaches",
    b"smartTagPr",
    b"smartTagTypes",
    b"webPublishing",
    b"fileRecoveryPr",
    b"webPublishObjects",
    b"extLst",
];

/// Copy `package`, applying the cell edits to the named worksheet parts
pub(crate) fn patch_package(
    package: &[u8],
    edits: &HashMap<&str, &CellEdits>,
    date_1904: bool,
) -> XlsxResult<Vec<u8>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(package))?;
    if let Some(part) = edits
        .keys()
        .find(|part| !archive.file_names().any(|name| name == **part))
    {
        return Err(XlsxError::MissingPart(part.to_string()));
    }

    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::with_capacity(package.len())));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    for i in 0..archive.len() {
        let name = archive.by_index_raw(i)?.name().to_string();

        let patched = match name.as_str() {
            CALC_CHAIN_PART => continue,
            WORKBOOK_PART => Some(force_full_calc_on_load(&read_entry(
                &mut archive.by_index(i)?,
            )?)?),
            WORKBOOK_RELS_PART => Some(remove_calc_chain_relationship(&read_entry(
                &mut archive.by_index(i)?,
            )?)?),
            CONTENT_TYPES_PART => Some(remove_calc_chain_override(&read_entry(
                &mut archive.by_index(i)?,
            )?)?),
            part => match edits.get(part) {
                Some(sheet_edits) => Some(patch_sheet_xml(
                    &read_entry(&mut archive.by_index(i)?)?,
                    sheet_edits,
                    date_1904,
                )?),
                None => None,
            },
        };

        match patched {
            Some(bytes) => {
                log::trace!("rewrote {} ({} bytes)", name, bytes.len());
                zip.start_file(name, options)?;
                zip.write_all(&bytes)?;
            }
            // Untouched parts keep their compressed bytes
            None => zip.raw_copy_file(archive.by_index_raw(i)?)?,
        }
    }

    Ok(zip.finish()?.into_inner())
}

fn read_entry<R: Read>(entry: &mut R) -> XlsxResult<Vec<u8>> {
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes)?;
    Ok(bytes)
}

fn attr_string(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .and_then(|attr| attr.unescape_value().ok().map(|s| s.to_string()))
}

/// Pending writes of the row currently open in the output
struct RowState {
    row: u32,
    cells: BTreeMap<u32, CellValue>,
    last_col: u32,
}

/// Rewrite one worksheet part with `edits` applied
pub(crate) fn patch_sheet_xml(
    xml: &[u8],
    edits: &CellEdits,
    date_1904: bool,
) -> XlsxResult<Vec<u8>> {
    let mut pending = edits.clone();
    let mut promotions = plan_promotions(xml, edits)?;

    let mut reader = Reader::from_reader(xml);
    reader.trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + 256));
    let mut buf = Vec::new();

    let mut saw_sheet_data = false;
    let mut in_sheet_data = false;
    let mut last_row = 0u32;
    let mut row: Option<RowState> = None;
    // Inside an untouched <c> being passed through
    let mut in_cell = false;
    // Inside a replaced <c> whose old content is dropped
    let mut skipping_cell = false;
    // Position of the untouched <c> being passed through
    let mut current_cell: Option<(u32, u32)> = None;
    let mut last_col = 0u32;
    // Inside a dependent <f> replaced by a promoted definition
    let mut skipping_formula = false;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Eof => break,

            Event::End(ref e) if skipping_cell && e.local_name().as_ref() == b"c" => {
                skipping_cell = false;
            }
            _ if skipping_cell => {}

            Event::End(ref e) if skipping_formula && e.local_name().as_ref() == b"f" => {
                skipping_formula = false;
            }
            _ if skipping_formula => {}

            Event::Start(ref e) if e.local_name().as_ref() == b"sheetData" => {
                saw_sheet_data = true;
                in_sheet_data = true;
                writer.write_event(Event::Start(e.to_owned()))?;
            }
            Event::Empty(ref e) if e.local_name().as_ref() == b"sheetData" => {
                saw_sheet_data = true;
                if pending.is_empty() {
                    writer.write_event(Event::Empty(e.to_owned()))?;
                } else {
                    // Expand `<sheetData/>` into `<sheetData>...</sheetData>`
                    writer.write_event(Event::Start(e.to_owned()))?;
                    write_rows_before(&mut writer, &mut pending, None, date_1904)?;
                    writer.write_event(Event::End(BytesEnd::new("sheetData")))?;
                }
            }
            Event::End(ref e) if e.local_name().as_ref() == b"sheetData" => {
                write_rows_before(&mut writer, &mut pending, None, date_1904)?;
                in_sheet_data = false;
                writer.write_event(Event::End(e.to_owned()))?;
            }

            Event::Start(ref e) if in_sheet_data && e.local_name().as_ref() == b"row" => {
                let r = row_number(e).unwrap_or(last_row + 1);
                last_row = r;
                last_col = 0;
                write_rows_before(&mut writer, &mut pending, Some(r), date_1904)?;
                match pending.remove(&r) {
                    Some(cells) => {
                        writer.write_event(Event::Start(without_spans(e)))?;
                        row = Some(RowState {
                            row: r,
                            cells,
                            last_col: 0,
                        });
                    }
                    None => writer.write_event(Event::Start(e.to_owned()))?,
                }
            }
            Event::Empty(ref e) if in_sheet_data && e.local_name().as_ref() == b"row" => {
                let r = row_number(e).unwrap_or(last_row + 1);
                last_row = r;
                write_rows_before(&mut writer, &mut pending, Some(r), date_1904)?;
                match pending.remove(&r) {
                    Some(cells) => {
                        writer.write_event(Event::Start(without_spans(e)))?;
                        for (col, value) in &cells {
                            write_cell(&mut writer, r, *col, None, value, date_1904)?;
                        }
                        writer.write_event(Event::End(BytesEnd::new("row")))?;
                    }
                    None => writer.write_event(Event::Empty(e.to_owned()))?,
                }
            }
            Event::End(ref e) if in_sheet_data && e.local_name().as_ref() == b"row" => {
                if let Some(state) = row.take() {
                    for (col, value) in &state.cells {
                        write_cell(&mut writer, state.row, *col, None, value, date_1904)?;
                    }
                }
                in_cell = false;
                writer.write_event(Event::End(e.to_owned()))?;
            }

            // Inside a row with pending writes, intercept cell events
            Event::Start(ref e) if row.is_some() && e.local_name().as_ref() == b"c" => {
                if let Some(state) = row.as_mut() {
                    let col = cell_column(e).unwrap_or(state.last_col + 1);
                    state.last_col = col;
                    write_cells_before(&mut writer, state, col, date_1904)?;
                    match state.cells.remove(&col) {
                        Some(value) => {
                            let style = attr_string(e, b"s");
                            write_cell(&mut writer, state.row, col, style, &value, date_1904)?;
                            skipping_cell = true;
                        }
                        None => {
                            writer.write_event(Event::Start(e.to_owned()))?;
                            current_cell = Some((state.row, col));
                            in_cell = true;
                        }
                    }
                }
            }
            Event::Empty(ref e) if row.is_some() && e.local_name().as_ref() == b"c" => {
                if let Some(state) = row.as_mut() {
                    let col = cell_column(e).unwrap_or(state.last_col + 1);
                    state.last_col = col;
                    write_cells_before(&mut writer, state, col, date_1904)?;
                    match state.cells.remove(&col) {
                        Some(value) => {
                            let style = attr_string(e, b"s");
                            write_cell(&mut writer, state.row, col, style, &value, date_1904)?;
                        }
                        None => writer.write_event(Event::Empty(e.to_owned()))?,
                    }
                }
            }
            Event::End(ref e) if in_cell && e.local_name().as_ref() == b"c" => {
                in_cell = false;
                current_cell = None;
                writer.write_event(Event::End(e.to_owned()))?;
            }
            // Cells must precede any other child of the row (e.g. extLst)
            Event::Start(_) | Event::Empty(_) if row.is_some() && !in_cell => {
                if let Some(state) = row.as_mut() {
                    let cells = std::mem::take(&mut state.cells);
                    for (col, value) in &cells {
                        write_cell(&mut writer, state.row, *col, None, value, date_1904)?;
                    }
                }
                writer.write_event(event.into_owned())?;
            }

            // Cells of rows without writes, tracked for shared formula moves
            Event::Start(ref e) if in_sheet_data && e.local_name().as_ref() == b"c" => {
                last_col = cell_column(e).unwrap_or(last_col + 1);
                current_cell = Some((last_row, last_col));
                in_cell = true;
                writer.write_event(Event::Start(e.to_owned()))?;
            }
            Event::Empty(ref e) if in_sheet_data && e.local_name().as_ref() == b"c" => {
                last_col = cell_column(e).unwrap_or(last_col + 1);
                writer.write_event(Event::Empty(e.to_owned()))?;
            }
            Event::Start(ref e) if in_cell && e.local_name().as_ref() == b"f" => {
                match current_cell.and_then(|pos| promotions.remove(&pos)) {
                    Some(promotion) => {
                        write_promoted(&mut writer, e, &promotion)?;
                        skipping_formula = true;
                    }
                    None => writer.write_event(Event::Start(e.to_owned()))?,
                }
            }
            Event::Empty(ref e) if in_cell && e.local_name().as_ref() == b"f" => {
                match current_cell.and_then(|pos| promotions.remove(&pos)) {
                    Some(promotion) => write_promoted(&mut writer, e, &promotion)?,
                    None => writer.write_event(Event::Empty(e.to_owned()))?,
                }
            }

            ev => writer.write_event(ev)?,
        }
        buf.clear();
    }

    if !saw_sheet_data {
        return Err(XlsxError::InvalidFormat(
            "worksheet has no sheetData element".into(),
        ));
    }

    Ok(writer.into_inner())
}

fn row_number(e: &BytesStart) -> Option<u32> {
    attr_string(e, b"r")?.parse().ok()
}

fn cell_column(e: &BytesStart) -> Option<u32> {
    let reference = attr_string(e, b"r")?;
    CellAddress::parse(&reference).ok().map(|addr| addr.col)
}

/// Copy of a `<row>` start tag without `spans`, which edits may invalidate
fn without_spans(e: &BytesStart) -> BytesStart<'static> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut row = BytesStart::new(name);
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() != b"spans" {
            row.push_attribute(attr);
        }
    }
    row
}

/// Write whole new rows for pending edits above `row` (all of them for `None`)
fn write_rows_before<W: Write>(
    writer: &mut Writer<W>,
    pending: &mut CellEdits,
    row: Option<u32>,
    date_1904: bool,
) -> XlsxResult<()> {
    let earlier = match row {
        Some(r) => {
            let later = pending.split_off(&r);
            std::mem::replace(pending, later)
        }
        None => std::mem::take(pending),
    };

    for (r, cells) in earlier {
        let number = r.to_string();
        let mut start = BytesStart::new("row");
        start.push_attribute(("r", number.as_str()));
        writer.write_event(Event::Start(start))?;
        for (col, value) in &cells {
            write_cell(writer, r, *col, None, value, date_1904)?;
        }
        writer.write_event(Event::End(BytesEnd::new("row")))?;
    }
    Ok(())
}

/// Write the pending cells of the open row that sit left of `col`
fn write_cells_before<W: Write>(
    writer: &mut Writer<W>,
    state: &mut RowState,
    col: u32,
    date_1904: bool,
) -> XlsxResult<()> {
    let later = state.cells.split_off(&col);
    let earlier = std::mem::replace(&mut state.cells, later);
    for (c, value) in &earlier {
        write_cell(writer, state.row, *c, None, value, date_1904)?;
    }
    Ok(())
}

fn format_number(n: f64) -> String {
    // f64 Display never uses exponent notation and round-trips exactly
    format!("{}", n)
}

/// Write one `<c>` element holding `value`; any formula is gone
fn write_cell<W: Write>(
    writer: &mut Writer<W>,
    row: u32,
    col: u32,
    style: Option<String>,
    value: &CellValue,
    date_1904: bool,
) -> XlsxResult<()> {
    let reference = CellAddress::new(row, col).to_a1_string();
    let mut c = BytesStart::new("c");
    c.push_attribute(("r", reference.as_str()));
    if let Some(s) = style.as_deref() {
        c.push_attribute(("s", s));
    }

    let (cell_type, text) = match value {
        CellValue::Null => {
            writer.write_event(Event::Empty(c))?;
            return Ok(());
        }
        CellValue::Number(n) if n.is_finite() => (None, format_number(*n)),
        CellValue::Number(_) => (Some("e"), "#NUM!".to_string()),
        CellValue::Boolean(b) => (Some("b"), if *b { "1" } else { "0" }.to_string()),
        CellValue::Error(e) => (Some("e"), e.clone()),
        CellValue::DateTime(s) => match parse_datetime_value(s) {
            Some(dt) => (None, format_number(datetime_to_serial(dt, date_1904))),
            None => return write_inline_string(writer, c, s),
        },
        CellValue::String(s) => return write_inline_string(writer, c, s),
    };

    if let Some(t) = cell_type {
        c.push_attribute(("t", t));
    }
    writer.write_event(Event::Start(c))?;
    writer.write_event(Event::Start(BytesStart::new("v")))?;
    writer.write_event(Event::Text(BytesText::new(&text)))?;
    writer.write_event(Event::End(BytesEnd::new("v")))?;
    writer.write_event(Event::End(BytesEnd::new("c")))?;
    Ok(())
}

fn write_inline_string<W: Write>(
    writer: &mut Writer<W>,
    mut c: BytesStart<'_>,
    text: &str,
) -> XlsxResult<()> {
    c.push_attribute(("t", "inlineStr"));
    writer.write_event(Event::Start(c))?;
    writer.write_event(Event::Start(BytesStart::new("is")))?;

    let mut t = BytesStart::new("t");
    if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) {
        t.push_attribute(("xml:space", "preserve"));
    }
    writer.write_event(Event::Start(t))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new("t")))?;

    writer.write_event(Event::End(BytesEnd::new("is")))?;
    writer.write_event(Event::End(BytesEnd::new("c")))?;
    Ok(())
}

fn patched_calc_pr(e: &BytesStart) -> BytesStart<'static> {
    let mut calc_pr = BytesStart::new("calcPr");
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() != b"fullCalcOnLoad" {
            calc_pr.push_attribute(attr);
        }
    }
    calc_pr.push_attribute(("fullCalcOnLoad", "1"));
    calc_pr
}

/// Set `<calcPr fullCalcOnLoad="1"/>` in `xl/workbook.xml`, adding it if absent
fn force_full_calc_on_load(workbook_xml: &[u8]) -> XlsxResult<Vec<u8>> {
    let mut reader = Reader::from_reader(workbook_xml);
    reader.trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(workbook_xml.len() + 64));
    let mut buf = Vec::new();

    let mut depth = 0usize;
    let mut done = false;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Eof => break,
            Event::Empty(ref e) if e.local_name().as_ref() == b"calcPr" => {
                done = true;
                writer.write_event(Event::Empty(patched_calc_pr(e)))?;
            }
            Event::Start(ref e) if e.local_name().as_ref() == b"calcPr" => {
                done = true;
                depth += 1;
                writer.write_event(Event::Start(patched_calc_pr(e)))?;
            }
            Event::Start(ref e) | Event::Empty(ref e)
                if !done
                    && depth == 1
                    && AFTER_CALC_PR.iter().any(|n| *n == e.local_name().as_ref()) =>
            {
                done = true;
                let mut calc_pr = BytesStart::new("calcPr");
                calc_pr.push_attribute(("fullCalcOnLoad", "1"));
                writer.write_event(Event::Empty(calc_pr))?;
                if matches!(event, Event::Start(_)) {
                    depth += 1;
                }
                writer.write_event(event.into_owned())?;
            }
            Event::End(ref e) if depth == 1 && !done => {
                done = true;
                let mut calc_pr = BytesStart::new("calcPr");
                calc_pr.push_attribute(("fullCalcOnLoad", "1"));
                writer.write_event(Event::Empty(calc_pr))?;
                depth -= 1;
                writer.write_event(Event::End(e.to_owned()))?;
            }
            Event::Start(_) => {
                depth += 1;
                writer.write_event(event.into_owned())?;
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                writer.write_event(event.into_owned())?;
            }
            ev => writer.write_event(ev)?,
        }
        buf.clear();
    }

    Ok(writer.into_inner())
}

/// Drop the elements named `element` for which `is_calc_chain` holds
fn drop_elements<F>(xml: &[u8], element: &[u8], is_calc_chain: F) -> XlsxResult<Vec<u8>>
where
    F: Fn(&BytesStart) -> bool,
{
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut buf = Vec::new();
    let mut skipping = false;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Eof => break,
            Event::End(ref e) if skipping && e.local_name().as_ref() == element => {
                skipping = false;
            }
            _ if skipping => {}
            Event::Start(ref e) if e.local_name().as_ref() == element && is_calc_chain(e) => {
                skipping = true;
            }
            Event::Empty(ref e) if e.local_name().as_ref() == element && is_calc_chain(e) => {}
            ev => writer.write_event(ev)?,
        }
        buf.clear();
    }

    Ok(writer.into_inner())
}

fn remove_calc_chain_relationship(rels_xml: &[u8]) -> XlsxResult<Vec<u8>> {
    drop_elements(rels_xml, b"Relationship", |e| {
        attr_string(e, b"Type").is_some_and(|t| t.ends_with("/calcChain"))
            || attr_string(e, b"Target").is_some_and(|t| t.ends_with("calcChain.xml"))
    })
}

fn remove_calc_chain_override(content_types_xml: &[u8]) -> XlsxResult<Vec<u8>> {
    drop_elements(content_types_xml, b"Override", |e| {
        attr_string(e, b"PartName").is_some_and(|p| p.ends_with("calcChain.xml"))
    })
}
