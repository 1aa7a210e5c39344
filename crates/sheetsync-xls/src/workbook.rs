//! Read-only XLS workbook and its sheets

use std::path::{Path, PathBuf};

use ahash::AHashMap;
use sheetsync_core::access::collect_by_lookup;
use sheetsync_core::{
    BackendKind, Cell, CellAddress, CellRange, CellValue, Error, IterOptions, RawCell, Result,
    SheetId, SheetView, WorkbookAccess,
};

/// One worksheet, its cells keyed by A1 address
#[derive(Debug, Default)]
pub struct XlsSheet {
    name: String,
    cells: AHashMap<String, RawCell>,
    used: Option<CellRange>,
}

impl XlsSheet {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    /// Store a cell, widening the used range
    pub(crate) fn insert(&mut self, address: CellAddress, cell: RawCell) {
        if cell.is_empty() {
            return;
        }
        self.used = Some(match self.used {
            Some(r) => CellRange::from_indices(
                r.start.row.min(address.row),
                r.start.col.min(address.col),
                r.end.row.max(address.row),
                r.end.col.max(address.col),
            ),
            None => CellRange::new(address, address),
        });
        self.cells.insert(address.to_a1_string(), cell);
    }

    /// Mutable access to a stored cell
    pub(crate) fn get_mut(&mut self, address: &CellAddress) -> Option<&mut RawCell> {
        self.cells.get_mut(&address.to_a1_string())
    }

    /// Number of populated cells
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }
}

impl SheetView for XlsSheet {
    fn name(&self) -> &str {
        &self.name
    }

    fn used_range(&self) -> Option<CellRange> {
        self.used
    }

    fn raw_cell(&self, address: &CellAddress) -> Option<&RawCell> {
        self.cells.get(&address.to_a1_string())
    }

    fn iterate(&self, range: &CellRange, options: &IterOptions) -> Result<Vec<Cell>> {
        // Candidates come from the rectangle, never from the map's order
        Ok(collect_by_lookup(range, self.used, options, |addr| {
            self.cells.get(&addr.to_a1_string())
        }))
    }

    fn write(&mut self, _address: &CellAddress, _value: CellValue) -> Result<()> {
        Err(Error::ReadOnly("xls"))
    }
}

/// An XLS workbook opened for reading
#[derive(Debug)]
pub struct XlsWorkbook {
    sheets: Vec<XlsSheet>,
    date_1904: bool,
}

impl XlsWorkbook {
    pub(crate) fn new(sheets: Vec<XlsSheet>, date_1904: bool) -> Self {
        Self { sheets, date_1904 }
    }

    /// Whether serials use the 1904 date system
    pub fn is_date_1904(&self) -> bool {
        self.date_1904
    }

    /// Concrete sheet access
    pub fn worksheet(&self, id: &SheetId) -> Result<&XlsSheet> {
        let index = id.resolve(&self.sheet_names())?;
        Ok(&self.sheets[index])
    }
}

impl WorkbookAccess for XlsWorkbook {
    fn kind(&self) -> BackendKind {
        BackendKind::Xls
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    fn sheet(&self, id: &SheetId) -> Result<&dyn SheetView> {
        self.worksheet(id).map(|s| s as &dyn SheetView)
    }

    fn sheet_mut(&mut self, id: &SheetId) -> Result<&mut dyn SheetView> {
        let index = id.resolve(&self.sheet_names())?;
        Ok(&mut self.sheets[index] as &mut dyn SheetView)
    }

    fn persist(&self, _path: &Path) -> Result<PathBuf> {
        Err(Error::ReadOnly("xls"))
    }
}
