//! Shared formula groups under patching
//!
//! A shared formula is defined once, on its master cell, by
//! `<f t="shared" ref=".." si="N">text</f>`; every other cell of the group
//! carries only `<f t="shared" si="N"/>`. Overwriting the master would orphan
//! the rest of the group, so the definition moves to the first surviving
//! member, with its relative references shifted to the new position.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::Writer;
use sheetsync_core::cell::{index_to_letter, letter_to_index};
use sheetsync_core::{CellAddress, CellRange, MAX_COLS, MAX_ROWS};

use super::{attr_string, cell_column, row_number, CellEdits};
use crate::error::XlsxResult;

/// A shared formula definition handed over to a new master cell
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Promotion {
    /// New `ref` of the group
    pub reference: String,
    /// Formula text as seen from the new master
    pub text: String,
}

#[derive(Default)]
struct SharedGroup {
    master: Option<(u32, u32)>,
    text: String,
    /// Dependent cells in document order
    members: Vec<(u32, u32)>,
}

/// `si` of a shared `<f>` element
fn shared_index(e: &BytesStart) -> Option<String> {
    match attr_string(e, b"t").as_deref() {
        Some("shared") => attr_string(e, b"si"),
        _ => None,
    }
}

/// Find the shared groups whose master is about to be overwritten, keyed by
/// the (row, col) of the cell that takes over the definition.
pub(crate) fn plan_promotions(
    xml: &[u8],
    edits: &CellEdits,
) -> XlsxResult<HashMap<(u32, u32), Promotion>> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(false);
    let mut buf = Vec::new();

    let mut groups: BTreeMap<String, SharedGroup> = BTreeMap::new();
    let mut row = 0u32;
    let mut col = 0u32;
    let mut cell: Option<(u32, u32)> = None;
    // si of the master whose formula text is being read
    let mut reading: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"row" => {
                row = row_number(e).unwrap_or(row + 1);
                col = 0;
            }
            Event::Start(ref e) if e.local_name().as_ref() == b"c" => {
                col = cell_column(e).unwrap_or(col + 1);
                cell = Some((row, col));
            }
            Event::Empty(ref e) if e.local_name().as_ref() == b"c" => {
                col = cell_column(e).unwrap_or(col + 1);
            }
            Event::End(ref e) if e.local_name().as_ref() == b"c" => cell = None,

            Event::Start(ref e) if e.local_name().as_ref() == b"f" => {
                reading = note_formula(&mut groups, cell, e);
            }
            Event::Empty(ref e) if e.local_name().as_ref() == b"f" => {
                note_formula(&mut groups, cell, e);
            }
            Event::Text(ref t) => {
                if let Some(group) = reading.as_ref().and_then(|si| groups.get_mut(si)) {
                    group.text.push_str(&t.unescape()?);
                }
            }
            Event::End(ref e) if e.local_name().as_ref() == b"f" => reading = None,
            _ => {}
        }
        buf.clear();
    }

    let edited = |(r, c): (u32, u32)| edits.get(&r).map_or(false, |cols| cols.contains_key(&c));

    let mut promotions = HashMap::new();
    for (si, group) in groups {
        let Some(master) = group.master else {
            continue;
        };
        if !edited(master) {
            continue;
        }
        let survivors: Vec<(u32, u32)> =
            group.members.into_iter().filter(|p| !edited(*p)).collect();
        let Some(&heir) = survivors.first() else {
            continue;
        };

        let rows = i64::from(heir.0) - i64::from(master.0);
        let cols = i64::from(heir.1) - i64::from(master.1);
        let reference = group_reference(&survivors);
        log::debug!(
            "shared formula {} moves from {} to {} as {}",
            si,
            CellAddress::new(master.0, master.1),
            CellAddress::new(heir.0, heir.1),
            reference
        );
        promotions.insert(
            heir,
            Promotion {
                reference,
                text: shift_references(&group.text, rows, cols),
            },
        );
    }
    Ok(promotions)
}

/// Record one `<f>`; returns the `si` when it is a master definition
fn note_formula(
    groups: &mut BTreeMap<String, SharedGroup>,
    cell: Option<(u32, u32)>,
    e: &BytesStart,
) -> Option<String> {
    let pos = cell?;
    let si = shared_index(e)?;
    let group = groups.entry(si.clone()).or_default();
    if attr_string(e, b"ref").is_some() {
        group.master = Some(pos);
        Some(si)
    } else {
        group.members.push(pos);
        None
    }
}

/// Bounding range of the surviving members
fn group_reference(members: &[(u32, u32)]) -> String {
    let min_row = members.iter().map(|p| p.0).min().unwrap_or(1);
    let max_row = members.iter().map(|p| p.0).max().unwrap_or(min_row);
    let min_col = members.iter().map(|p| p.1).min().unwrap_or(1);
    let max_col = members.iter().map(|p| p.1).max().unwrap_or(min_col);
    if min_row == max_row && min_col == max_col {
        CellAddress::new(min_row, min_col).to_a1_string()
    } else {
        CellRange::from_indices(min_row, min_col, max_row, max_col).to_a1_string()
    }
}

/// Write the `<f>` of a new master in place of its dependent `<f .../>`
pub(crate) fn write_promoted<W: Write>(
    writer: &mut Writer<W>,
    original: &BytesStart,
    promotion: &Promotion,
) -> XlsxResult<()> {
    let name = String::from_utf8_lossy(original.name().as_ref()).into_owned();
    let mut f = BytesStart::new(name.clone());
    for attr in original.attributes().flatten() {
        if attr.key.as_ref() != b"ref" {
            f.push_attribute(attr);
        }
    }
    f.push_attribute(("ref", promotion.reference.as_str()));

    writer.write_event(Event::Start(f))?;
    writer.write_event(Event::Text(BytesText::new(&promotion.text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Move the relative cell references of `formula` by `rows` and `cols`.
///
/// String literals, quoted sheet names, error literals and function names are
/// left alone. A reference pushed off the sheet becomes `#REF!`.
pub(crate) fn shift_references(formula: &str, rows: i64, cols: i64) -> String {
    let chars: Vec<char> = formula.chars().collect();
    let mut out = String::with_capacity(formula.len() + 8);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '"' || c == '\'' {
            let end = quoted_end(&chars, i);
            out.extend(&chars[i..end]);
            i = end;
        } else if c == '#' {
            let start = i;
            i += 1;
            while i < chars.len()
                && (chars[i].is_ascii_alphanumeric() || matches!(chars[i], '/' | '!' | '?'))
            {
                i += 1;
            }
            out.extend(&chars[start..i]);
        } else if c.is_ascii_digit() || c == '.' {
            // Numbers, and the row parts of whole-row ranges, stay as they are
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '.') {
                i += 1;
            }
            out.extend(&chars[start..i]);
        } else if c.is_ascii_alphabetic() || c == '_' || c == '$' {
            let start = i;
            while i < chars.len()
                && (chars[i].is_ascii_alphanumeric() || matches!(chars[i], '_' | '$' | '.'))
            {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            let shifted = match chars.get(i) {
                Some('(') | Some('!') | Some('[') => None,
                _ => shift_cell_reference(&word, rows, cols),
            };
            out.push_str(shifted.as_deref().unwrap_or(&word));
        } else {
            out.push(c);
            i += 1;
        }
    }
    out
}

/// Index just past the quoted run starting at `start`; doubled quotes escape
fn quoted_end(chars: &[char], start: usize) -> usize {
    let quote = chars[start];
    let mut i = start + 1;
    while i < chars.len() {
        if chars[i] == quote {
            if chars.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    chars.len()
}

/// Shift one `[$]COL[$]ROW` token; `None` when the word is not a reference
fn shift_cell_reference(word: &str, rows: i64, cols: i64) -> Option<String> {
    let (col_abs, rest) = match word.strip_prefix('$') {
        Some(rest) => (true, rest),
        None => (false, word),
    };
    let letters_end = rest
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(rest.len());
    let (letters, rest) = rest.split_at(letters_end);
    let (row_abs, digits) = match rest.strip_prefix('$') {
        Some(digits) => (true, digits),
        None => (false, rest),
    };
    if letters.is_empty() || digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let col = letter_to_index(letters).ok()?;
    let row: u32 = digits.parse().ok()?;
    if row == 0 || row > MAX_ROWS {
        return None;
    }

    let new_col = if col_abs { i64::from(col) } else { i64::from(col) + cols };
    let new_row = if row_abs { i64::from(row) } else { i64::from(row) + rows };
    let on_sheet = (1..=i64::from(MAX_COLS)).contains(&new_col)
        && (1..=i64::from(MAX_ROWS)).contains(&new_row);
    if !on_sheet {
        return Some("#REF!".to_string());
    }

    Some(format!(
        "{}{}{}{}",
        if col_abs { "$" } else { "" },
        index_to_letter(new_col as u32),
        if row_abs { "$" } else { "" },
        new_row
    ))
}
