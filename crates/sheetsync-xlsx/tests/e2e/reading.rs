//! Reading tests: cell kinds, dates, formulas and sheet selection.

use pretty_assertions::assert_eq;
use sheetsync_core::{
    CellRange, CellType, CellValue, IterOptions, SheetId, SheetView, WorkbookAccess,
};
use sheetsync_xlsx::XlsxReader;

use crate::{XlsxFixture, STYLE_DATE, STYLE_DATETIME, STYLE_DECIMAL};

fn values(sheet: &dyn SheetView, range: &str) -> Vec<(String, CellValue)> {
    sheet
        .iterate(&CellRange::parse(range).unwrap(), &IterOptions::default())
        .unwrap()
        .into_iter()
        .map(|c| (c.address.to_string(), c.value))
        .collect()
}

#[test]
fn test_scalar_values() {
    let package = XlsxFixture::new()
        .shared_strings(&["Point", "kWh"])
        .sheet(
            "Data",
            concat!(
                r#"<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row>"#,
                r#"<row r="2"><c r="A2"><v>42</v></c><c r="B2"><v>1963.69481</v></c></row>"#,
                r#"<row r="3"><c r="A3" t="b"><v>1</v></c><c r="B3" t="e"><v>#DIV/0!</v></c></row>"#,
                r#"<row r="4"><c r="A4" t="inlineStr"><is><t>inline</t></is></c></row>"#,
            ),
        )
        .build();

    let workbook = XlsxReader::read_bytes(package).expect("Failed to read workbook");
    let sheet = workbook.sheet(&SheetId::default()).unwrap();

    assert_eq!(
        values(sheet, "A1:B4"),
        vec![
            ("A1".to_string(), CellValue::string("Point")),
            ("B1".to_string(), CellValue::string("kWh")),
            ("A2".to_string(), CellValue::Number(42.0)),
            ("B2".to_string(), CellValue::Number(1963.695)),
            ("A3".to_string(), CellValue::Boolean(true)),
            ("B3".to_string(), CellValue::Error("#DIV/0!".into())),
            ("A4".to_string(), CellValue::string("inline")),
        ]
    );
}

#[test]
fn test_date_styles() {
    let package = XlsxFixture::new()
        .sheet(
            "Data",
            &format!(
                concat!(
                    r#"<row r="1"><c r="A1" s="{}"><v>44562</v></c></row>"#,
                    r#"<row r="2"><c r="A2" s="{}"><v>44562.25</v></c></row>"#,
                    r#"<row r="3"><c r="A3" s="{}"><v>44562</v></c></row>"#,
                ),
                STYLE_DATE, STYLE_DATETIME, STYLE_DECIMAL
            ),
        )
        .build();

    let workbook = XlsxReader::read_bytes(package).unwrap();
    let cells = workbook
        .sheet(&SheetId::default())
        .unwrap()
        .iterate(&CellRange::parse("A1:A3").unwrap(), &IterOptions::default())
        .unwrap();

    assert_eq!(cells[0].cell_type, CellType::DateTime);
    assert_eq!(cells[0].value, CellValue::DateTime("2022-01-01T00:00:00".into()));
    assert_eq!(cells[1].value, CellValue::DateTime("2022-01-01T06:00:00".into()));
    // Two-decimal format is not a date
    assert_eq!(cells[2].cell_type, CellType::Number);
}

#[test]
fn test_date_1904_system() {
    let package = XlsxFixture::new()
        .date_1904()
        .sheet(
            "Data",
            &format!(r#"<row r="1"><c r="A1" s="{}"><v>0</v></c></row>"#, STYLE_DATE),
        )
        .build();

    let workbook = XlsxReader::read_bytes(package).unwrap();
    assert!(workbook.is_date_1904());
    let cells = workbook
        .sheet(&SheetId::default())
        .unwrap()
        .iterate(&CellRange::parse("A1:A1").unwrap(), &IterOptions::default())
        .unwrap();
    assert_eq!(cells[0].value, CellValue::DateTime("1904-01-01T00:00:00".into()));
}

#[test]
fn test_formulas_and_shared_formulas() {
    let package = XlsxFixture::new()
        .sheet(
            "Calc",
            concat!(
                r#"<row r="1"><c r="A1"><v>2</v></c><c r="B1"><f t="shared" ref="B1:B2" si="0">A1*2</f><v>4</v></c></row>"#,
                r#"<row r="2"><c r="A2"><v>3</v></c><c r="B2"><f t="shared" si="0"/><v>6</v></c></row>"#,
                r#"<row r="3"><c r="B3"><f>NOW()</f></c></row>"#,
            ),
        )
        .build();

    let workbook = XlsxReader::read_bytes(package).unwrap();
    let cells = workbook
        .sheet(&SheetId::from("Calc"))
        .unwrap()
        .iterate(&CellRange::parse("B1:B3").unwrap(), &IterOptions::default())
        .unwrap();

    assert_eq!(cells.len(), 3);
    assert_eq!(cells[0].value, CellValue::Number(4.0));
    assert_eq!(cells[0].formula.as_deref(), Some("A1*2"));
    assert_eq!(cells[0].shared_formula_ref.as_deref(), Some("B1:B2"));
    assert_eq!(cells[1].value, CellValue::Number(6.0));
    assert_eq!(cells[1].formula.as_deref(), Some("A1*2"));
    assert_eq!(cells[2].cell_type, CellType::Formula);
    assert_eq!(cells[2].value, CellValue::Null);
}

#[test]
fn test_sheet_selection_and_used_range() {
    let package = XlsxFixture::new()
        .sheet("First", r#"<row r="1"><c r="A1"><v>1</v></c></row>"#)
        .sheet(
            "Second",
            r#"<row r="3"><c r="C3"><v>1</v></c></row><row r="7"><c r="B7"><v>2</v></c></row>"#,
        )
        .build();

    let workbook = XlsxReader::read_bytes(package).unwrap();
    assert_eq!(workbook.sheet_names(), vec!["First", "Second"]);

    let second = workbook.sheet(&SheetId::Index(1)).unwrap();
    assert_eq!(second.name(), "Second");
    assert_eq!(second.used_range().unwrap().to_string(), "B3:C7");

    assert!(workbook.sheet(&SheetId::Index(2)).is_err());
    assert!(workbook.sheet(&SheetId::from("Missing")).is_err());
}

#[test]
fn test_include_empty_fills_rectangle() {
    let package = XlsxFixture::new()
        .sheet("Data", r#"<row r="2"><c r="B2"><v>5</v></c></row>"#)
        .build();

    let workbook = XlsxReader::read_bytes(package).unwrap();
    let cells = workbook
        .sheet(&SheetId::default())
        .unwrap()
        .iterate(
            &CellRange::parse("A1:B2").unwrap(),
            &IterOptions::default().with_empty(),
        )
        .unwrap();

    let kinds: Vec<CellType> = cells.iter().map(|c| c.cell_type).collect();
    assert_eq!(
        kinds,
        vec![CellType::Null, CellType::Null, CellType::Null, CellType::Number]
    );
}

#[test]
fn test_not_a_package() {
    assert!(XlsxReader::read_bytes(b"plain text".to_vec()).is_err());
}
