//! Classification of backend cells into typed [`Cell`]s

use chrono::NaiveDate;

use super::{CellAddress, CellType, CellValue, RawCell, RawValue};

/// Format used for `CellValue::DateTime`
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Format of a day key
pub const DAY_FORMAT: &str = "%Y-%m-%d";

/// Options controlling classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifyOptions {
    /// Decimal places numbers are rounded to; `None` keeps full precision
    pub decimals: Option<u32>,
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        Self { decimals: Some(3) }
    }
}

/// Round half away from zero to `decimals` places
pub fn round_to(n: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    let rounded = (n * factor).round() / factor;
    if rounded.is_finite() {
        rounded
    } else {
        n
    }
}

/// A classified cell, regenerated on every range read
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Cell {
    pub address: CellAddress,
    pub value: CellValue,
    pub cell_type: CellType,
    /// Formula text, never evaluated
    pub formula: Option<String>,
    pub shared_formula_ref: Option<String>,
}

impl Cell {
    /// Classify a backend cell.
    ///
    /// Dates win over everything else, then numbers (rounded), then the
    /// remaining scalar kinds. A formula cell exposes its cached result as
    /// the value; without one it is typed `Formula` with a null value.
    pub fn classify(address: CellAddress, raw: &RawCell, options: &ClassifyOptions) -> Self {
        let (value, cell_type) = match &raw.value {
            RawValue::Date(dt) => (
                CellValue::DateTime(dt.format(DATETIME_FORMAT).to_string()),
                CellType::DateTime,
            ),
            RawValue::Number(n) => {
                let n = match options.decimals {
                    Some(d) => round_to(*n, d),
                    None => *n,
                };
                (CellValue::Number(n), CellType::Number)
            }
            RawValue::Text(s) => (CellValue::String(s.clone()), CellType::String),
            RawValue::Bool(b) => (CellValue::Boolean(*b), CellType::Boolean),
            RawValue::Error(e) => (CellValue::Error(e.as_str().to_string()), CellType::Error),
            RawValue::Empty if raw.formula.is_some() => (CellValue::Null, CellType::Formula),
            RawValue::Empty => (CellValue::Null, CellType::Null),
        };

        // Backends that cannot render formula text pass it empty
        let (formula, shared_formula_ref) = match &raw.formula {
            Some(f) if f.text.is_empty() => (None, f.shared_ref.clone()),
            Some(f) => (Some(f.text.clone()), f.shared_ref.clone()),
            None => (None, None),
        };

        Self {
            address,
            value,
            cell_type,
            formula,
            shared_formula_ref,
        }
    }

    /// An empty cell at `address`
    pub fn null(address: CellAddress) -> Self {
        Self {
            address,
            value: CellValue::Null,
            cell_type: CellType::Null,
            formula: None,
            shared_formula_ref: None,
        }
    }

    /// Check if the cell has neither a value nor a formula
    pub fn is_null(&self) -> bool {
        self.cell_type == CellType::Null
    }

    /// The `YYYY-MM-DD` key used to match this cell against a calendar day
    ///
    /// Dates give their date part. Strings give their first ten characters
    /// when those form a date, otherwise the trimmed text. Other types have
    /// no key.
    pub fn day_key(&self) -> Option<String> {
        match &self.value {
            CellValue::DateTime(s) => s.get(..10).map(str::to_string),
            CellValue::String(s) => {
                let s = s.trim();
                match s.get(..10) {
                    Some(head) if NaiveDate::parse_from_str(head, DAY_FORMAT).is_ok() => {
                        Some(head.to_string())
                    }
                    _ if s.is_empty() => None,
                    _ => Some(s.to_string()),
                }
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{CellError, FormulaSource};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn a1() -> CellAddress {
        CellAddress::new(1, 1)
    }

    fn classify(raw: RawCell) -> Cell {
        Cell::classify(a1(), &raw, &ClassifyOptions::default())
    }

    #[test]
    fn test_numbers_round_to_three_decimals() {
        let cell = classify(RawCell::new(RawValue::Number(1963.69481)));
        assert_eq!(cell.cell_type, CellType::Number);
        assert_eq!(cell.value, CellValue::Number(1963.695));
    }

    #[test]
    fn test_rounding_can_be_disabled() {
        let raw = RawCell::new(RawValue::Number(1963.69481));
        let cell = Cell::classify(a1(), &raw, &ClassifyOptions { decimals: None });
        assert_eq!(cell.value, CellValue::Number(1963.69481));
    }

    #[test]
    fn test_date_is_reformatted() {
        let dt = NaiveDate::from_ymd_opt(2022, 1, 2)
            .unwrap()
            .and_hms_opt(6, 30, 0)
            .unwrap();
        let cell = classify(RawCell::new(RawValue::Date(dt)));
        assert_eq!(cell.cell_type, CellType::DateTime);
        assert_eq!(cell.value, CellValue::DateTime("2022-01-02T06:30:00".into()));
        assert_eq!(cell.day_key().as_deref(), Some("2022-01-02"));
    }

    #[test]
    fn test_formula_with_cached_date() {
        let dt = NaiveDate::from_ymd_opt(2022, 3, 4)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let raw = RawCell::with_formula(RawValue::Date(dt), FormulaSource::new("A2+1"));
        let cell = classify(raw);
        assert_eq!(cell.cell_type, CellType::DateTime);
        assert_eq!(cell.value, CellValue::DateTime("2022-03-04T00:00:00".into()));
        assert_eq!(cell.formula.as_deref(), Some("A2+1"));
    }

    #[test]
    fn test_formula_with_cached_number() {
        let raw = RawCell::with_formula(
            RawValue::Number(2.00049),
            FormulaSource {
                text: "SUM(B2:B5)".into(),
                shared_ref: Some("C2:C9".into()),
            },
        );
        let cell = classify(raw);
        assert_eq!(cell.cell_type, CellType::Number);
        assert_eq!(cell.value, CellValue::Number(2.0));
        assert_eq!(cell.formula.as_deref(), Some("SUM(B2:B5)"));
        assert_eq!(cell.shared_formula_ref.as_deref(), Some("C2:C9"));
    }

    #[test]
    fn test_formula_without_cached_value() {
        let cell = classify(RawCell::with_formula(RawValue::Empty, FormulaSource::new("NOW()")));
        assert_eq!(cell.cell_type, CellType::Formula);
        assert_eq!(cell.value, CellValue::Null);
    }

    #[test]
    fn test_scalar_kinds() {
        assert_eq!(classify(RawCell::default()).cell_type, CellType::Null);
        assert_eq!(
            classify(RawCell::new(RawValue::Bool(true))).value,
            CellValue::Boolean(true)
        );
        assert_eq!(
            classify(RawCell::new(RawValue::Text("kWh".into()))).value,
            CellValue::String("kWh".into())
        );
        let err = classify(RawCell::new(RawValue::Error(CellError::Div0)));
        assert_eq!(err.cell_type, CellType::Error);
        assert_eq!(err.value, CellValue::Error("#DIV/0!".into()));
    }

    #[test]
    fn test_day_key_from_strings() {
        let text = |s: &str| classify(RawCell::new(RawValue::Text(s.into())));
        assert_eq!(text("2022-01-01").day_key().as_deref(), Some("2022-01-01"));
        assert_eq!(text("2022-01-01 00:15").day_key().as_deref(), Some("2022-01-01"));
        assert_eq!(text(" Total ").day_key().as_deref(), Some("Total"));
        assert_eq!(text("   ").day_key(), None);
        assert_eq!(classify(RawCell::new(RawValue::Number(1.0))).day_key(), None);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(1.23456, 3), 1.235);
        assert_eq!(round_to(-1.23456, 2), -1.23);
        assert_eq!(round_to(42.0, 0), 42.0);
    }
}
