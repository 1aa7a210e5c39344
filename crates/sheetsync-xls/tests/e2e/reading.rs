//! Reading tests: values, dates, formulas and sheet lookup.

use pretty_assertions::assert_eq;
use sheetsync_core::{
    CellRange, CellType, CellValue, Error, IterOptions, SheetId, SheetView, WorkbookAccess,
};
use sheetsync_xls::XlsReader;

use crate::{SheetBuilder, XlsFixture, XF_DATE, XF_DATETIME, XF_GENERAL};

fn values(sheet: &dyn SheetView, range: &str) -> Vec<(String, CellValue)> {
    sheet
        .iterate(&CellRange::parse(range).unwrap(), &IterOptions::default())
        .unwrap()
        .into_iter()
        .map(|c| (c.address.to_string(), c.value))
        .collect()
}

#[test]
fn test_values_of_each_kind() {
    let bytes = XlsFixture::new()
        .shared_strings(&["Day", "Flow"])
        .sheet(
            "Daily",
            SheetBuilder::default()
                .sst(1, 1, 0)
                .sst(1, 2, 1)
                .number(2, 1, XF_DATE, 44562.0)
                .number(2, 2, XF_GENERAL, 1963.69481)
                .rk(3, 2, -12)
                .boolean(4, 2, true),
        )
        .build();

    let workbook = XlsReader::read_bytes(&bytes).expect("Failed to read workbook");
    assert_eq!(workbook.sheet_names(), vec!["Daily"]);

    let sheet = workbook.sheet(&SheetId::default()).unwrap();
    assert_eq!(
        values(sheet, "A1:B4"),
        vec![
            ("A1".to_string(), CellValue::string("Day")),
            ("B1".to_string(), CellValue::string("Flow")),
            ("A2".to_string(), CellValue::DateTime("2022-01-01T00:00:00".into())),
            ("B2".to_string(), CellValue::Number(1963.695)),
            ("B3".to_string(), CellValue::Number(-12.0)),
            ("B4".to_string(), CellValue::Boolean(true)),
        ]
    );
    assert_eq!(sheet.used_range().unwrap().to_string(), "A1:B4");
}

#[test]
fn test_formula_cached_results() {
    let bytes = XlsFixture::new()
        .sheet(
            "Calc",
            SheetBuilder::default()
                .formula_number(1, 1, XF_GENERAL, 2.00049)
                .formula_number(2, 1, XF_DATETIME, 44562.5)
                .formula_string(3, 1, "kWh"),
        )
        .build();

    let workbook = XlsReader::read_bytes(&bytes).unwrap();
    let cells = workbook
        .sheet(&SheetId::from("Calc"))
        .unwrap()
        .iterate(&CellRange::parse("A1:A3").unwrap(), &IterOptions::default())
        .unwrap();

    assert_eq!(cells[0].cell_type, CellType::Number);
    assert_eq!(cells[0].value, CellValue::Number(2.0));
    assert_eq!(cells[1].cell_type, CellType::DateTime);
    assert_eq!(cells[1].value, CellValue::DateTime("2022-01-01T12:00:00".into()));
    assert_eq!(cells[2].value, CellValue::string("kWh"));
}

#[test]
fn test_sheets_in_order() {
    let bytes = XlsFixture::new()
        .sheet("First", SheetBuilder::default().rk(1, 1, 1))
        .sheet("Second", SheetBuilder::default().rk(5, 3, 2))
        .build();

    let workbook = XlsReader::read_bytes(&bytes).unwrap();
    assert_eq!(workbook.sheet_names(), vec!["First", "Second"]);

    let second = workbook.sheet(&SheetId::Index(1)).unwrap();
    assert_eq!(values(second, "A1:D9"), vec![("C5".to_string(), CellValue::Number(2.0))]);
    assert!(matches!(
        workbook.sheet(&SheetId::from("Third")),
        Err(Error::SheetNotFound(_))
    ));
}

#[test]
fn test_date_1904() {
    let bytes = XlsFixture::new()
        .date_1904()
        .sheet("S", SheetBuilder::default().number(1, 1, XF_DATE, 1.0))
        .build();

    let workbook = XlsReader::read_bytes(&bytes).unwrap();
    assert!(workbook.is_date_1904());
    let sheet = workbook.sheet(&SheetId::default()).unwrap();
    assert_eq!(
        values(sheet, "A1:A1"),
        vec![("A1".to_string(), CellValue::DateTime("1904-01-02T00:00:00".into()))]
    );
}

#[test]
fn test_shared_string_split_by_continue() {
    let bytes = XlsFixture::new()
        .shared_strings(&["Day", "Énergie"])
        .split_sst()
        .sheet("S", SheetBuilder::default().sst(1, 1, 1))
        .build();

    let workbook = XlsReader::read_bytes(&bytes).unwrap();
    let sheet = workbook.sheet(&SheetId::default()).unwrap();
    assert_eq!(
        values(sheet, "A1:A1"),
        vec![("A1".to_string(), CellValue::string("Énergie"))]
    );
}

#[test]
fn test_include_empty_rectangle() {
    let bytes = XlsFixture::new()
        .sheet("S", SheetBuilder::default().rk(2, 2, 7))
        .build();

    let workbook = XlsReader::read_bytes(&bytes).unwrap();
    let cells = workbook
        .sheet(&SheetId::default())
        .unwrap()
        .iterate(
            &CellRange::parse("A1:B2").unwrap(),
            &IterOptions::default().with_empty(),
        )
        .unwrap();
    assert_eq!(cells.len(), 4);
    assert_eq!(cells.iter().filter(|c| c.is_null()).count(), 3);
}

#[test]
fn test_read_only_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.xls");
    std::fs::write(
        &path,
        XlsFixture::new()
            .sheet("S", SheetBuilder::default().rk(1, 1, 1))
            .build(),
    )
    .unwrap();

    let mut workbook = XlsReader::read_file(&path).unwrap();
    let sheet = workbook.sheet_mut(&SheetId::default()).unwrap();
    assert!(matches!(
        sheet.write(&"A1".parse().unwrap(), CellValue::Number(2.0)),
        Err(Error::ReadOnly(_))
    ));
    assert!(workbook.persist(&path).is_err());
}
