//! Backend-neutral sheet access
//!
//! Both spreadsheet backends implement [`WorkbookAccess`] and hand out sheets
//! as [`SheetView`]s. Callers pick a backend once, when opening, and never
//! inspect it afterwards.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::cell::{Cell, CellAddress, CellRange, CellValue, ClassifyOptions, RawCell};
use crate::error::{Error, Result};

/// Which backend a workbook was opened with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Legacy BIFF8 binary workbook (`.xls`), read-only
    Xls,
    /// Packaged Office Open XML workbook (`.xlsx`/`.xlsm`)
    Xlsx,
}

impl BackendKind {
    /// Whether cells can be written and the workbook persisted
    pub fn is_writable(&self) -> bool {
        matches!(self, BackendKind::Xlsx)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Xls => f.write_str("xls"),
            BackendKind::Xlsx => f.write_str("xlsx"),
        }
    }
}

/// Identifies a sheet by name or by 0-based position
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetId {
    Name(String),
    Index(usize),
}

impl Default for SheetId {
    fn default() -> Self {
        SheetId::Index(0)
    }
}

impl SheetId {
    /// Resolve against the workbook's sheet names, in order
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Result<usize> {
        match self {
            SheetId::Index(i) if *i < names.len() => Ok(*i),
            SheetId::Index(i) => Err(Error::SheetOutOfBounds(*i, names.len())),
            SheetId::Name(name) => names
                .iter()
                .position(|n| n.as_ref() == name)
                .ok_or_else(|| Error::SheetNotFound(name.clone())),
        }
    }
}

impl From<&str> for SheetId {
    fn from(name: &str) -> Self {
        SheetId::Name(name.to_string())
    }
}

impl From<usize> for SheetId {
    fn from(index: usize) -> Self {
        SheetId::Index(index)
    }
}

impl FromStr for SheetId {
    type Err = std::convert::Infallible;

    /// All-digit input is a position, anything else a name
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.parse::<usize>() {
            Ok(i) => SheetId::Index(i),
            Err(_) => SheetId::Name(s.to_string()),
        })
    }
}

impl fmt::Display for SheetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetId::Name(name) => write!(f, "'{}'", name),
            SheetId::Index(i) => write!(f, "#{}", i),
        }
    }
}

/// Where a workbook is read from
#[derive(Debug, Clone)]
pub enum Source {
    /// A file path
    Path(PathBuf),
    /// Path segments joined in order
    Segments(Vec<String>),
    /// The file contents
    Buffer(Vec<u8>),
}

impl Source {
    /// The file path, for path-like sources
    pub fn path(&self) -> Option<PathBuf> {
        match self {
            Source::Path(p) => Some(p.clone()),
            Source::Segments(segments) => Some(segments.iter().collect()),
            Source::Buffer(_) => None,
        }
    }

    /// Human-readable origin, for logs and errors
    pub fn describe(&self) -> String {
        match self.path() {
            Some(p) => p.display().to_string(),
            None => "<buffer>".to_string(),
        }
    }
}

impl From<&Path> for Source {
    fn from(path: &Path) -> Self {
        Source::Path(path.to_path_buf())
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Source::Path(path)
    }
}

impl From<Vec<u8>> for Source {
    fn from(bytes: Vec<u8>) -> Self {
        Source::Buffer(bytes)
    }
}

/// Options for [`SheetView::iterate`]
#[derive(Debug, Clone, Copy, Default)]
pub struct IterOptions {
    /// Yield a `Null` cell for every unpopulated address in the rectangle
    pub include_empty: bool,
    pub classify: ClassifyOptions,
}

impl IterOptions {
    pub fn with_empty(mut self) -> Self {
        self.include_empty = true;
        self
    }
}

/// A sheet of an open workbook
pub trait SheetView {
    /// Sheet name
    fn name(&self) -> &str;

    /// Bounding rectangle of populated cells
    fn used_range(&self) -> Option<CellRange>;

    /// The unclassified cell at `address`
    fn raw_cell(&self, address: &CellAddress) -> Option<&RawCell>;

    /// Classified cells of a rectangle, row by row.
    ///
    /// Only populated cells are returned unless `include_empty` is set.
    fn iterate(&self, range: &CellRange, options: &IterOptions) -> Result<Vec<Cell>>;

    /// Replace the value of one cell
    fn write(&mut self, address: &CellAddress, value: CellValue) -> Result<()>;
}

/// An open workbook
pub trait WorkbookAccess {
    fn kind(&self) -> BackendKind;

    /// Sheet names in workbook order
    fn sheet_names(&self) -> Vec<String>;

    fn sheet(&self, id: &SheetId) -> Result<&dyn SheetView>;

    fn sheet_mut(&mut self, id: &SheetId) -> Result<&mut dyn SheetView>;

    /// Write the workbook, with every change made through [`SheetView::write`],
    /// to `path`. Returns the path written.
    fn persist(&self, path: &Path) -> Result<PathBuf>;
}

/// Collect cells of `range` by looking up each candidate address.
///
/// Candidates are the rectangle itself when `include_empty` is set, otherwise
/// only its intersection with `used`. Order is row-major either way.
pub fn collect_by_lookup<'a, F>(
    range: &CellRange,
    used: Option<CellRange>,
    options: &IterOptions,
    lookup: F,
) -> Vec<Cell>
where
    F: Fn(&CellAddress) -> Option<&'a RawCell>,
{
    let candidates = if options.include_empty {
        Some(*range)
    } else {
        used.and_then(|u| u.intersect(range))
    };

    let Some(candidates) = candidates else {
        return Vec::new();
    };

    candidates
        .cells()
        .filter_map(|addr| match lookup(&addr) {
            Some(raw) => Some(Cell::classify(addr, raw, &options.classify)),
            None if options.include_empty => Some(Cell::null(addr)),
            None => None,
        })
        .collect()
}
