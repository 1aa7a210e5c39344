//! Report fixtures shared by the integration tests.
//!
//! Templates are minimal XLSX packages built in memory: a title in `A1`,
//! then one row per sub-period from the start row on, with the day in
//! column `A`.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use sheetsync::{open_workbook, CellRange, CellValue, IterOptions, SheetId, Source};
use zip::write::SimpleFileOptions;

pub const POINT: &str = "P1";
pub const START_ROW: u32 = 3;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

/// cellXfs: 0 general, 1 built-in date (14)
const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><cellXfs count="2"><xf numFmtId="0"/><xf numFmtId="14" applyNumberFormat="1"/></cellXfs></styleSheet>"#;

const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Daily" sheetId="1" r:id="rId1"/></sheets><calcPr calcId="191029"/></workbook>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

pub fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// Excel serial of a day in the 1900 system
pub fn serial(s: &str) -> i64 {
    (day(s) - day("1899-12-30")).num_days()
}

/// Builder for a report template
#[derive(Default)]
pub struct ReportTemplate {
    rows: Vec<String>,
    text_dates: bool,
}

impl ReportTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write the date column as text instead of styled serials
    pub fn text_dates(mut self) -> Self {
        self.text_dates = true;
        self
    }

    /// Add `count` rows for `date`; each row carries a pressure of 9 in
    /// column `C` and a formula in column `E`
    pub fn day(mut self, date: &str, count: usize) -> Self {
        for _ in 0..count {
            let r = START_ROW as usize + self.rows.len();
            let date_cell = if self.text_dates {
                format!(r#"<c r="A{r}" t="inlineStr"><is><t>{date} 00:00</t></is></c>"#)
            } else {
                format!(r#"<c r="A{r}" s="1"><v>{}</v></c>"#, serial(date))
            };
            self.rows.push(format!(
                r#"<row r="{r}">{date_cell}<c r="C{r}"><v>9</v></c><c r="E{r}"><f>B{r}*2</f><v>0</v></c></row>"#
            ));
        }
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        let mut put = |name: &str, body: &str| {
            zip.start_file(name, options).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        };

        put("[Content_Types].xml", CONTENT_TYPES);
        put("_rels/.rels", ROOT_RELS);
        put("xl/styles.xml", STYLES);
        put("xl/workbook.xml", WORKBOOK);
        put("xl/_rels/workbook.xml.rels", WORKBOOK_RELS);
        put(
            "xl/worksheets/sheet1.xml",
            &format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>Daily report</t></is></c></row>{}</sheetData></worksheet>"#,
                self.rows.concat()
            ),
        );

        zip.finish().unwrap().into_inner()
    }

    pub fn write_to(&self, path: &Path) {
        std::fs::write(path, self.build()).unwrap();
    }
}

/// Config of point `P1`: flow in `B`, pressure in `C`, the day flag in `D`
pub fn config_json(template: &str) -> String {
    format!(
        r#"{{
            "startRow": {START_ROW},
            "dateColumn": "A",
            "dataEndColumn": "E",
            "dataColumns": {{"flow": "B", "pressure": "C", "dayValid": "D"}},
            "outputReportFile": "report_{{pointID}}_{{year}}.xlsx",
            "outputTemplateFile": "{template}",
            "outputRoots": {{"test": "out"}}
        }}"#
    )
}

/// A config directory holding `report_P1.json`
pub fn config_dir(template: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(format!("report_{POINT}.json")),
        config_json(template),
    )
    .unwrap();
    dir
}

pub fn output_path(dir: &Path, year: i32) -> PathBuf {
    dir.join("out").join(format!("report_{POINT}_{year}.xlsx"))
}

/// Populated values of `range` on the first sheet
pub fn read_values(path: &Path, range: &str) -> Vec<(String, CellValue)> {
    let workbook = open_workbook(Source::Path(path.to_path_buf())).unwrap();
    workbook
        .sheet(&SheetId::default())
        .unwrap()
        .iterate(&CellRange::parse(range).unwrap(), &IterOptions::default())
        .unwrap()
        .into_iter()
        .map(|c| (c.address.to_string(), c.value))
        .collect()
}

/// The value at one address, `Null` when unpopulated
pub fn value_at(path: &Path, a1: &str) -> CellValue {
    read_values(path, &format!("{a1}:{a1}"))
        .into_iter()
        .next()
        .map(|(_, v)| v)
        .unwrap_or(CellValue::Null)
}
