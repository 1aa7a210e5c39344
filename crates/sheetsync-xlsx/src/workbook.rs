//! Open XLSX workbook and its sheets

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use sheetsync_core::cell::DATETIME_FORMAT;
use sheetsync_core::{
    BackendKind, Cell, CellAddress, CellError, CellRange, CellStorage, CellValue, Error,
    IterOptions, RawCell, RawValue, Result, SheetId, SheetView, WorkbookAccess, MAX_COLS,
    MAX_ROWS,
};

use crate::error::XlsxResult;
use crate::writer::{patch_package, CellEdits};

/// Parse the text of a `CellValue::DateTime`
pub(crate) fn parse_datetime_value(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, DATETIME_FORMAT).ok().or_else(|| {
        NaiveDate::parse_from_str(s.get(..10)?, "%Y-%m-%d")
            .ok()?
            .and_hms_opt(0, 0, 0)
    })
}

/// One worksheet: its cells as read, plus the writes made since
#[derive(Debug)]
pub struct XlsxSheet {
    name: String,
    /// Worksheet part inside the package (e.g., "xl/worksheets/sheet1.xml")
    part: String,
    cells: CellStorage,
    edits: CellEdits,
}

impl XlsxSheet {
    pub(crate) fn new(name: String, part: String, cells: CellStorage) -> Self {
        Self {
            name,
            part,
            cells,
            edits: BTreeMap::new(),
        }
    }

    /// Worksheet part inside the package
    pub fn part(&self) -> &str {
        &self.part
    }

    /// Number of cells written since the workbook was opened
    pub fn edit_count(&self) -> usize {
        self.edits.values().map(BTreeMap::len).sum()
    }

    fn to_raw(value: &CellValue) -> RawValue {
        match value {
            CellValue::Null => RawValue::Empty,
            CellValue::Number(n) => RawValue::Number(*n),
            CellValue::String(s) => RawValue::Text(s.clone()),
            CellValue::Boolean(b) => RawValue::Bool(*b),
            CellValue::DateTime(s) => match parse_datetime_value(s) {
                Some(dt) => RawValue::Date(dt),
                None => RawValue::Text(s.clone()),
            },
            CellValue::Error(s) => match CellError::from_literal(s) {
                Some(e) => RawValue::Error(e),
                None => RawValue::Text(s.clone()),
            },
        }
    }
}

impl SheetView for XlsxSheet {
    fn name(&self) -> &str {
        &self.name
    }

    fn used_range(&self) -> Option<CellRange> {
        self.cells.used_range()
    }

    fn raw_cell(&self, address: &CellAddress) -> Option<&RawCell> {
        self.cells.get(address.row, address.col)
    }

    fn iterate(&self, range: &CellRange, options: &IterOptions) -> Result<Vec<Cell>> {
        if !options.include_empty {
            return Ok(self
                .cells
                .iter_range(range)
                .map(|(addr, raw)| Cell::classify(addr, raw, &options.classify))
                .collect());
        }

        Ok(range
            .cells()
            .map(|addr| match self.cells.get(addr.row, addr.col) {
                Some(raw) => Cell::classify(addr, raw, &options.classify),
                None => Cell::null(addr),
            })
            .collect())
    }

    fn write(&mut self, address: &CellAddress, value: CellValue) -> Result<()> {
        if address.row == 0 || address.row > MAX_ROWS {
            return Err(Error::RowOutOfBounds(address.row, MAX_ROWS));
        }
        if address.col == 0 || address.col > MAX_COLS {
            return Err(Error::ColumnOutOfBounds(address.col, MAX_COLS));
        }

        // Written cells lose their formula
        self.cells.set(
            address.row,
            address.col,
            RawCell::new(Self::to_raw(&value)),
        );
        self.edits
            .entry(address.row)
            .or_default()
            .insert(address.col, value);
        Ok(())
    }
}

/// An XLSX workbook opened for reading and patching
#[derive(Debug)]
pub struct XlsxWorkbook {
    package: Vec<u8>,
    sheets: Vec<XlsxSheet>,
    date_1904: bool,
}

impl XlsxWorkbook {
    pub(crate) fn new(package: Vec<u8>, sheets: Vec<XlsxSheet>, date_1904: bool) -> Self {
        Self {
            package,
            sheets,
            date_1904,
        }
    }

    /// Whether serials use the 1904 date system
    pub fn is_date_1904(&self) -> bool {
        self.date_1904
    }

    /// Concrete sheet access
    pub fn worksheet(&self, id: &SheetId) -> Result<&XlsxSheet> {
        let index = id.resolve(&self.sheet_names())?;
        Ok(&self.sheets[index])
    }

    /// Concrete mutable sheet access
    pub fn worksheet_mut(&mut self, id: &SheetId) -> Result<&mut XlsxSheet> {
        let index = id.resolve(&self.sheet_names())?;
        Ok(&mut self.sheets[index])
    }

    /// Build the package bytes with every write applied
    pub fn to_bytes(&self) -> XlsxResult<Vec<u8>> {
        let edits: HashMap<&str, &CellEdits> = self
            .sheets
            .iter()
            .filter(|s| !s.edits.is_empty())
            .map(|s| (s.part.as_str(), &s.edits))
            .collect();

        if edits.is_empty() {
            return Ok(self.package.clone());
        }
        patch_package(&self.package, &edits, self.date_1904)
    }

    fn write_atomically(&self, path: &Path) -> XlsxResult<()> {
        let bytes = self.to_bytes()?;

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl WorkbookAccess for XlsxWorkbook {
    fn kind(&self) -> BackendKind {
        BackendKind::Xlsx
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    fn sheet(&self, id: &SheetId) -> Result<&dyn SheetView> {
        self.worksheet(id).map(|s| s as &dyn SheetView)
    }

    fn sheet_mut(&mut self, id: &SheetId) -> Result<&mut dyn SheetView> {
        self.worksheet_mut(id).map(|s| s as &mut dyn SheetView)
    }

    fn persist(&self, path: &Path) -> Result<PathBuf> {
        let edited: usize = self.sheets.iter().map(XlsxSheet::edit_count).sum();
        log::debug!("persisting {} edited cells to {}", edited, path.display());

        self.write_atomically(path)
            .map_err(|e| e.into_core(&path.display().to_string()))?;
        Ok(path.to_path_buf())
    }
}
