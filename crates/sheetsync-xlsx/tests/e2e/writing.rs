//! Writing tests: cell writes are patched into the original package.

use pretty_assertions::assert_eq;
use sheetsync_core::{
    CellAddress, CellRange, CellType, CellValue, IterOptions, SheetId, WorkbookAccess,
};
use sheetsync_xlsx::XlsxReader;

use crate::{read_part, XlsxFixture, STYLE_DATE};

fn fixture() -> XlsxFixture {
    XlsxFixture::new()
        .shared_strings(&["Day", "Energy"])
        .with_calc_chain()
        .sheet(
            "Daily",
            &format!(
                concat!(
                    r#"<row r="1" spans="1:2"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row>"#,
                    r#"<row r="2" spans="1:2"><c r="A2" s="{0}"><v>44562</v></c><c r="B2"><f>SUM(C2:D2)</f><v>10</v></c></row>"#,
                    r#"<row r="3" spans="1:2"><c r="A3" s="{0}"><v>44563</v></c></row>"#,
                ),
                STYLE_DATE
            ),
        )
        .sheet("Untouched", r#"<row r="1"><c r="A1"><v>99</v></c></row>"#)
}

#[test]
fn test_persist_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out").join("report.xlsx");

    let mut workbook = XlsxReader::read_bytes(fixture().build()).unwrap();
    {
        let sheet = workbook.sheet_mut(&SheetId::from("Daily")).unwrap();
        sheet
            .write(&CellAddress::parse("B2").unwrap(), CellValue::Number(12.5))
            .unwrap();
        sheet
            .write(&CellAddress::parse("B3").unwrap(), CellValue::Number(7.0))
            .unwrap();
        sheet
            .write(&CellAddress::parse("C5").unwrap(), CellValue::string("note"))
            .unwrap();
        sheet
            .write(
                &CellAddress::parse("A4").unwrap(),
                CellValue::DateTime("2022-01-03T00:00:00".into()),
            )
            .unwrap();
    }

    let written = workbook.persist(&path).unwrap();
    assert_eq!(written, path);

    let reopened = XlsxReader::read_file(&path).unwrap();
    let cells = reopened
        .sheet(&SheetId::from("Daily"))
        .unwrap()
        .iterate(&CellRange::parse("A1:C5").unwrap(), &IterOptions::default())
        .unwrap();
    let found: Vec<(String, CellValue)> = cells
        .iter()
        .map(|c| (c.address.to_string(), c.value.clone()))
        .collect();

    assert_eq!(
        found,
        vec![
            ("A1".to_string(), CellValue::string("Day")),
            ("B1".to_string(), CellValue::string("Energy")),
            ("A2".to_string(), CellValue::DateTime("2022-01-01T00:00:00".into())),
            ("B2".to_string(), CellValue::Number(12.5)),
            ("A3".to_string(), CellValue::DateTime("2022-01-02T00:00:00".into())),
            ("B3".to_string(), CellValue::Number(7.0)),
            ("A4".to_string(), CellValue::Number(44564.0)),
            ("C5".to_string(), CellValue::string("note")),
        ]
    );

    // The replaced cell lost its formula
    let b2 = cells.iter().find(|c| c.address.to_string() == "B2").unwrap();
    assert_eq!(b2.formula, None);
    assert_eq!(b2.cell_type, CellType::Number);

    let untouched = reopened.sheet(&SheetId::from("Untouched")).unwrap();
    assert_eq!(
        untouched
            .raw_cell(&CellAddress::parse("A1").unwrap())
            .map(|c| c.value.clone()),
        Some(sheetsync_core::RawValue::Number(99.0))
    );
}

#[test]
fn test_patched_package_recalculates() {
    let mut workbook = XlsxReader::read_bytes(fixture().build()).unwrap();
    workbook
        .sheet_mut(&SheetId::Index(0))
        .unwrap()
        .write(&CellAddress::parse("B2").unwrap(), CellValue::Number(1.0))
        .unwrap();
    let package = workbook.to_bytes().unwrap();

    assert!(read_part(&package, "xl/calcChain.xml").is_none());

    let workbook_xml = read_part(&package, "xl/workbook.xml").unwrap();
    assert!(workbook_xml.contains(r#"<calcPr calcId="191029" fullCalcOnLoad="1"/>"#));

    let rels = read_part(&package, "xl/_rels/workbook.xml.rels").unwrap();
    assert!(!rels.contains("calcChain"));
    let types = read_part(&package, "[Content_Types].xml").unwrap();
    assert!(!types.contains("calcChain"));

    let sheet_xml = read_part(&package, "xl/worksheets/sheet1.xml").unwrap();
    assert!(sheet_xml.contains(r#"<row r="2"><c r="A2" s="1">"#));
    assert!(sheet_xml.contains("<pageMargins"));
    // Untouched rows keep their attributes
    assert!(sheet_xml.contains(r#"<row r="1" spans="1:2">"#));

    // The untouched worksheet is carried over unchanged
    let original = fixture().build();
    assert_eq!(
        read_part(&package, "xl/worksheets/sheet2.xml"),
        read_part(&original, "xl/worksheets/sheet2.xml")
    );
}

#[test]
fn test_no_writes_keeps_package() {
    let original = fixture().build();
    let workbook = XlsxReader::read_bytes(original.clone()).unwrap();
    assert_eq!(workbook.to_bytes().unwrap(), original);
}

#[test]
fn test_write_over_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.xlsx");
    std::fs::write(&path, fixture().build()).unwrap();

    let mut workbook = XlsxReader::read_file(&path).unwrap();
    workbook
        .sheet_mut(&SheetId::Index(0))
        .unwrap()
        .write(&CellAddress::parse("B3").unwrap(), CellValue::Boolean(false))
        .unwrap();
    workbook.persist(&path).unwrap();

    let reopened = XlsxReader::read_file(&path).unwrap();
    let raw = reopened
        .sheet(&SheetId::Index(0))
        .unwrap()
        .raw_cell(&CellAddress::parse("B3").unwrap())
        .cloned();
    assert_eq!(
        raw.map(|c| c.value),
        Some(sheetsync_core::RawValue::Bool(false))
    );
}
