//! Common utilities for XLS E2E tests.
//!
//! Fixtures are real compound files: a BIFF8 `Workbook` stream is assembled
//! record by record and stored with `cfb`.

use std::io::{Cursor, Write};

const BOF: u16 = 0x0809;
const EOF: u16 = 0x000A;
const CONTINUE: u16 = 0x003C;
const BOUNDSHEET: u16 = 0x0085;
const SST: u16 = 0x00FC;
const DATEMODE: u16 = 0x0022;
const FORMAT: u16 = 0x041E;
const XF: u16 = 0x00E0;
const LABELSST: u16 = 0x00FD;
const NUMBER: u16 = 0x0203;
const RK: u16 = 0x027E;
const BOOLERR: u16 = 0x0205;
const FORMULA: u16 = 0x0006;
const STRING: u16 = 0x0207;

/// XF indexes set up by every fixture: 0 general, 1 built-in date, 2 custom date-time
pub const XF_GENERAL: u16 = 0;
pub const XF_DATE: u16 = 1;
pub const XF_DATETIME: u16 = 2;

fn record(kind: u16, body: &[u8]) -> Vec<u8> {
    let mut out = kind.to_le_bytes().to_vec();
    out.extend_from_slice(&(body.len() as u16).to_le_bytes());
    out.extend_from_slice(body);
    out
}

fn unicode_string(s: &str) -> Vec<u8> {
    let mut out = (s.chars().count() as u16).to_le_bytes().to_vec();
    out.push(0x01);
    for unit in s.encode_utf16() {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out
}

fn cell_header(row: u32, col: u32, xf: u16) -> Vec<u8> {
    let mut out = ((row - 1) as u16).to_le_bytes().to_vec();
    out.extend_from_slice(&((col - 1) as u16).to_le_bytes());
    out.extend_from_slice(&xf.to_le_bytes());
    out
}

/// Record-level builder for one worksheet; rows and columns are 1-based
#[derive(Default)]
pub struct SheetBuilder {
    records: Vec<u8>,
}

impl SheetBuilder {
    pub fn number(mut self, row: u32, col: u32, xf: u16, value: f64) -> Self {
        let mut body = cell_header(row, col, xf);
        body.extend_from_slice(&value.to_le_bytes());
        self.records.extend(record(NUMBER, &body));
        self
    }

    /// Integer stored RK-encoded
    pub fn rk(mut self, row: u32, col: u32, value: i32) -> Self {
        let mut body = cell_header(row, col, XF_GENERAL);
        body.extend_from_slice(&(((value << 2) as u32) | 0x02).to_le_bytes());
        self.records.extend(record(RK, &body));
        self
    }

    pub fn sst(mut self, row: u32, col: u32, index: u32) -> Self {
        let mut body = cell_header(row, col, XF_GENERAL);
        body.extend_from_slice(&index.to_le_bytes());
        self.records.extend(record(LABELSST, &body));
        self
    }

    pub fn boolean(mut self, row: u32, col: u32, value: bool) -> Self {
        let mut body = cell_header(row, col, XF_GENERAL);
        body.extend_from_slice(&[value as u8, 0]);
        self.records.extend(record(BOOLERR, &body));
        self
    }

    pub fn formula_number(mut self, row: u32, col: u32, xf: u16, cached: f64) -> Self {
        let mut body = cell_header(row, col, xf);
        body.extend_from_slice(&cached.to_le_bytes());
        body.extend_from_slice(&[0; 6]);
        self.records.extend(record(FORMULA, &body));
        self
    }

    pub fn formula_string(mut self, row: u32, col: u32, cached: &str) -> Self {
        let mut body = cell_header(row, col, XF_GENERAL);
        body.extend_from_slice(&[0x00, 0, 0, 0, 0, 0, 0xFF, 0xFF]);
        body.extend_from_slice(&[0; 6]);
        self.records.extend(record(FORMULA, &body));
        self.records.extend(record(STRING, &unicode_string(cached)));
        self
    }

    fn substream(&self) -> Vec<u8> {
        let mut out = record(BOF, &[0x00, 0x06, 0x10, 0x00]);
        out.extend_from_slice(&self.records);
        out.extend(record(EOF, &[]));
        out
    }
}

/// Builder for a BIFF8 workbook inside a compound file
#[derive(Default)]
pub struct XlsFixture {
    strings: Vec<String>,
    sheets: Vec<(String, SheetBuilder)>,
    date_1904: bool,
    split_sst: bool,
}

impl XlsFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared_strings(mut self, strings: &[&str]) -> Self {
        self.strings = strings.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn sheet(mut self, name: &str, sheet: SheetBuilder) -> Self {
        self.sheets.push((name.to_string(), sheet));
        self
    }

    pub fn date_1904(mut self) -> Self {
        self.date_1904 = true;
        self
    }

    /// Break the shared string table into SST + CONTINUE in the middle of
    /// the last string's characters
    pub fn split_sst(mut self) -> Self {
        self.split_sst = true;
        self
    }

    fn sst_records(&self) -> Vec<u8> {
        let mut body = (self.strings.len() as u32).to_le_bytes().to_vec();
        body.extend_from_slice(&(self.strings.len() as u32).to_le_bytes());
        let last = self.strings.len().saturating_sub(1);
        for (i, s) in self.strings.iter().enumerate() {
            if self.split_sst && i == last && s.encode_utf16().count() > 1 {
                let units: Vec<u16> = s.encode_utf16().collect();
                let (head, tail) = units.split_at(1);
                body.extend_from_slice(&(units.len() as u16).to_le_bytes());
                body.push(0x01);
                body.extend_from_slice(&head[0].to_le_bytes());
                let mut cont = vec![0x01];
                for unit in tail {
                    cont.extend_from_slice(&unit.to_le_bytes());
                }
                let mut out = record(SST, &body);
                out.extend(record(CONTINUE, &cont));
                return out;
            }
            body.extend(unicode_string(s));
        }
        record(SST, &body)
    }

    fn globals(&self, offsets: &[u32]) -> Vec<u8> {
        let mut out = record(BOF, &[0x00, 0x06, 0x05, 0x00]);
        out.extend(record(DATEMODE, &[self.date_1904 as u8, 0]));

        let mut format = 164u16.to_le_bytes().to_vec();
        format.extend(unicode_string("yyyy-mm-dd hh:mm"));
        out.extend(record(FORMAT, &format));
        for format_id in [0u16, 14, 164] {
            let mut xf = vec![0u8; 20];
            xf[2..4].copy_from_slice(&format_id.to_le_bytes());
            out.extend(record(XF, &xf));
        }

        out.extend(self.sst_records());
        for ((name, _), offset) in self.sheets.iter().zip(offsets) {
            let mut body = offset.to_le_bytes().to_vec();
            body.extend_from_slice(&[0, 0]);
            body.push(name.len() as u8);
            body.push(0);
            body.extend_from_slice(name.as_bytes());
            out.extend(record(BOUNDSHEET, &body));
        }
        out.extend(record(EOF, &[]));
        out
    }

    /// The `Workbook` stream
    pub fn stream(&self) -> Vec<u8> {
        // BOUNDSHEET size does not depend on the offset it holds
        let globals_len = self.globals(&vec![0; self.sheets.len()]).len() as u32;
        let substreams: Vec<Vec<u8>> = self.sheets.iter().map(|(_, s)| s.substream()).collect();

        let mut offsets = Vec::new();
        let mut next = globals_len;
        for sub in &substreams {
            offsets.push(next);
            next += sub.len() as u32;
        }

        let mut stream = self.globals(&offsets);
        for sub in substreams {
            stream.extend(sub);
        }
        stream
    }

    pub fn build(&self) -> Vec<u8> {
        let mut compound = cfb::CompoundFile::create(Cursor::new(Vec::new())).unwrap();
        {
            let mut stream = compound.create_stream("/Workbook").unwrap();
            stream.write_all(&self.stream()).unwrap();
            stream.flush().unwrap();
        }
        compound.flush().unwrap();
        compound.into_inner().into_inner()
    }
}
