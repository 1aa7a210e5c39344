//! Range extraction and reshaping
//!
//! [`extract_cells`] reads a rectangle as a flat list. The grouping functions
//! reshape such a list by row or by column. Every index in their output is
//! the real 1-based sheet address, and rows or columns without a populated
//! cell are left out entirely rather than kept as holes.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::ser::{Serialize, SerializeMap, Serializer};
use sheetsync_core::cell::{index_to_letter, letter_to_index};
use sheetsync_core::{Cell, CellRange, CellValue, Error, IterOptions, Result, SheetView};

/// How members of a row group are keyed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeaderMode {
    /// By the column's symbolic key when one is defined, else its letter
    #[default]
    None,
    /// By column letter
    Letter,
    /// By column number
    Index,
}

impl FromStr for HeaderMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(HeaderMode::None),
            "letter" => Ok(HeaderMode::Letter),
            "index" => Ok(HeaderMode::Index),
            other => Err(Error::other(format!("unknown header mode '{}'", other))),
        }
    }
}

impl fmt::Display for HeaderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HeaderMode::None => "none",
            HeaderMode::Letter => "letter",
            HeaderMode::Index => "index",
        })
    }
}

/// Symbolic storage keys for columns, used by [`HeaderMode::None`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnKeys(BTreeMap<u32, String>);

impl ColumnKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name the column with the given letter
    pub fn insert(&mut self, column: &str, key: impl Into<String>) -> Result<()> {
        let col = letter_to_index(column)?;
        if col == 0 {
            return Err(Error::InvalidAddress(column.to_string()));
        }
        self.0.insert(col, key.into());
        Ok(())
    }

    /// Keys from an alias to column letter mapping
    pub fn from_aliases<'a, I>(aliases: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let mut keys = Self::new();
        for (alias, column) in aliases {
            keys.insert(column, alias.clone())?;
        }
        Ok(keys)
    }

    pub fn key_for(&self, col: u32) -> Option<&str> {
        self.0.get(&col).map(String::as_str)
    }
}

/// Members of one group
#[derive(Debug, Clone, PartialEq)]
pub enum Members<T> {
    /// Keyed by name, in column order
    Named(Vec<(String, T)>),
    /// Keyed by real column or row number
    Numbered(BTreeMap<u32, T>),
}

impl<T> Members<T> {
    pub fn len(&self) -> usize {
        match self {
            Members::Named(v) => v.len(),
            Members::Numbered(m) => m.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look a member up by name
    pub fn named(&self, key: &str) -> Option<&T> {
        match self {
            Members::Named(v) => v.iter().find(|(k, _)| k == key).map(|(_, t)| t),
            Members::Numbered(_) => None,
        }
    }

    /// Look a member up by number
    pub fn numbered(&self, index: u32) -> Option<&T> {
        match self {
            Members::Numbered(m) => m.get(&index),
            Members::Named(_) => None,
        }
    }

    fn map<U, F: Fn(T) -> U>(self, f: F) -> Members<U> {
        match self {
            Members::Named(v) => Members::Named(v.into_iter().map(|(k, t)| (k, f(t))).collect()),
            Members::Numbered(m) => {
                Members::Numbered(m.into_iter().map(|(k, t)| (k, f(t))).collect())
            }
        }
    }
}

impl<T: Serialize> Serialize for Members<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        match self {
            Members::Named(v) => {
                for (k, t) in v {
                    map.serialize_entry(k, t)?;
                }
            }
            Members::Numbered(m) => {
                for (k, t) in m {
                    map.serialize_entry(k, t)?;
                }
            }
        }
        map.end()
    }
}

/// One row (or column) of an extracted range
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Group<T> {
    /// Real 1-based row (or column) number
    pub index: u32,
    pub members: Members<T>,
}

impl Group<Cell> {
    /// Strip cell metadata down to the bare values
    pub fn into_values(self) -> Group<CellValue> {
        Group {
            index: self.index,
            members: self.members.map(|c| c.value),
        }
    }
}

/// Read the cells of an `A1:C9` range
pub fn extract_cells(
    sheet: &dyn SheetView,
    range: &str,
    options: &IterOptions,
) -> Result<Vec<Cell>> {
    let range = CellRange::parse(range)?;
    sheet.iterate(&range, options)
}

/// Group cells by row.
///
/// Rows whose cells are all null do not appear in the output.
pub fn extract_row_groups(
    cells: &[Cell],
    mode: HeaderMode,
    keys: &ColumnKeys,
) -> Vec<Group<Cell>> {
    let mut rows: BTreeMap<u32, Vec<&Cell>> = BTreeMap::new();
    for cell in cells {
        rows.entry(cell.address.row).or_default().push(cell);
    }

    rows.into_iter()
        .filter(|(_, row)| row.iter().any(|c| !c.is_null()))
        .map(|(index, mut row)| {
            row.sort_by_key(|c| c.address.col);
            let members = match mode {
                HeaderMode::Index => Members::Numbered(
                    row.into_iter().map(|c| (c.address.col, c.clone())).collect(),
                ),
                HeaderMode::Letter => Members::Named(
                    row.into_iter()
                        .map(|c| (index_to_letter(c.address.col), c.clone()))
                        .collect(),
                ),
                HeaderMode::None => Members::Named(
                    row.into_iter()
                        .map(|c| {
                            let key = match keys.key_for(c.address.col) {
                                Some(k) => k.to_string(),
                                None => index_to_letter(c.address.col),
                            };
                            (key, c.clone())
                        })
                        .collect(),
                ),
            };
            Group { index, members }
        })
        .collect()
}

/// Group cells by column, each keyed by real row number.
///
/// Columns whose cells are all null do not appear in the output.
pub fn extract_column_groups(cells: &[Cell]) -> Vec<Group<Cell>> {
    let mut columns: BTreeMap<u32, BTreeMap<u32, Cell>> = BTreeMap::new();
    for cell in cells {
        columns
            .entry(cell.address.col)
            .or_default()
            .insert(cell.address.row, cell.clone());
    }

    columns
        .into_iter()
        .filter(|(_, col)| col.values().any(|c| !c.is_null()))
        .map(|(index, col)| Group {
            index,
            members: Members::Numbered(col),
        })
        .collect()
}

/// Row groups with bare values
pub fn row_values(cells: &[Cell], mode: HeaderMode, keys: &ColumnKeys) -> Vec<Group<CellValue>> {
    extract_row_groups(cells, mode, keys)
        .into_iter()
        .map(Group::into_values)
        .collect()
}

/// Column groups with bare values
pub fn column_values(cells: &[Cell]) -> Vec<Group<CellValue>> {
    extract_column_groups(cells)
        .into_iter()
        .map(Group::into_values)
        .collect()
}
