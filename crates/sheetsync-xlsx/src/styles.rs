//! Date detection from `xl/styles.xml`
//!
//! Only number formats matter here: a numeric cell is a date when its
//! `cellXfs` entry points at a date number format.

use std::collections::HashMap;
use std::io::{BufReader, Read};

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use sheetsync_core::cell::is_date_format;

use crate::error::{XlsxError, XlsxResult};

/// For each `cellXfs` index, whether the cell format renders a date
#[derive(Debug, Clone, Default)]
pub(crate) struct DateStyles {
    date_xfs: Vec<bool>,
}

impl DateStyles {
    /// Check if the style index `s` of a cell is a date format
    pub(crate) fn is_date(&self, style_index: Option<u32>) -> bool {
        style_index
            .and_then(|s| self.date_xfs.get(s as usize))
            .copied()
            .unwrap_or(false)
    }
}

fn parse_u32_attr(e: &BytesStart, key: &[u8]) -> Option<u32> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .and_then(|attr| attr.unescape_value().ok()?.parse().ok())
}

pub(crate) fn read_date_styles<R: Read>(reader: R) -> XlsxResult<DateStyles> {
    let mut xml_reader = Reader::from_reader(BufReader::new(reader));
    xml_reader.trim_text(true);

    let mut buf = Vec::new();
    let mut numfmts: HashMap<u32, String> = HashMap::new();
    let mut xf_formats: Vec<u32> = Vec::new();
    let mut in_cell_xfs = false;

    loop {
        match xml_reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"cellXfs" => {
                in_cell_xfs = true;
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"cellXfs" => {
                in_cell_xfs = false;
            }
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"numFmt" => {
                    let id = parse_u32_attr(&e, b"numFmtId");
                    let code = e
                        .attributes()
                        .flatten()
                        .find(|attr| attr.key.as_ref() == b"formatCode")
                        .and_then(|attr| attr.unescape_value().ok().map(|s| s.to_string()));
                    if let (Some(id), Some(code)) = (id, code) {
                        numfmts.insert(id, code);
                    }
                }
                b"xf" if in_cell_xfs => {
                    xf_formats.push(parse_u32_attr(&e, b"numFmtId").unwrap_or(0));
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(XlsxError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    let date_xfs = xf_formats
        .iter()
        .map(|id| is_date_format(*id, numfmts.get(id).map(String::as_str)))
        .collect();

    Ok(DateStyles { date_xfs })
}
