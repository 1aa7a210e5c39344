//! Cell value types
//!
//! Two layers live here. [`RawValue`] / [`RawCell`] are what a backend reads
//! out of a file, before any interpretation. [`CellValue`] / [`CellType`] are
//! the semantic view handed to callers after classification.

use chrono::NaiveDateTime;
use std::fmt;

/// A value as reported by a backend, before classification
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RawValue {
    /// No value stored (or a formula with no cached result)
    #[default]
    Empty,
    /// Numeric value
    Number(f64),
    /// Text value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Error value
    Error(CellError),
    /// A number the backend identified as a date through its number format
    Date(NaiveDateTime),
}

/// Formula text attached to a cell; never evaluated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormulaSource {
    /// Formula text without the leading '='
    pub text: String,
    /// Range the formula is shared over (e.g., "B2:B50"), when it is the
    /// master cell of a shared formula
    pub shared_ref: Option<String>,
}

impl FormulaSource {
    /// Create a formula source without a shared reference
    pub fn new<S: Into<String>>(text: S) -> Self {
        Self {
            text: text.into(),
            shared_ref: None,
        }
    }
}

/// A backend cell: its stored value plus an optional formula.
///
/// For formula cells, `value` is the cached result.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawCell {
    pub value: RawValue,
    pub formula: Option<FormulaSource>,
}

impl RawCell {
    /// Create a cell holding a plain value
    pub fn new(value: RawValue) -> Self {
        Self {
            value,
            formula: None,
        }
    }

    /// Create a formula cell with its cached result
    pub fn with_formula(value: RawValue, formula: FormulaSource) -> Self {
        Self {
            value,
            formula: Some(formula),
        }
    }

    /// Check if the cell carries neither a value nor a formula
    pub fn is_empty(&self) -> bool {
        self.value == RawValue::Empty && self.formula.is_none()
    }
}

/// Semantic type of a classified cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum CellType {
    Null,
    Number,
    String,
    Boolean,
    DateTime,
    Formula,
    Error,
}

impl CellType {
    /// Get the type name
    pub fn as_str(&self) -> &'static str {
        match self {
            CellType::Null => "Null",
            CellType::Number => "Number",
            CellType::String => "String",
            CellType::Boolean => "Boolean",
            CellType::DateTime => "DateTime",
            CellType::Formula => "Formula",
            CellType::Error => "Error",
        }
    }
}

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The semantic value of a classified cell; also the value written back
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum CellValue {
    /// Empty cell (no value)
    #[default]
    Null,

    /// Numeric value
    Number(f64),

    /// String value
    String(String),

    /// Boolean value (TRUE/FALSE)
    Boolean(bool),

    /// Date/time as `YYYY-MM-DDTHH:MM:SS`
    DateTime(String),

    /// Error literal (#VALUE!, #REF!, etc.)
    Error(String),
}

impl CellValue {
    /// Create a new string value
    pub fn string<S: Into<String>>(s: S) -> Self {
        CellValue::String(s.into())
    }

    /// Check if the cell is empty
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Try to get the value as a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Try to get the value as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CellValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get the textual content (strings, dates and error literals)
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::String(s) | CellValue::DateTime(s) | CellValue::Error(s) => Some(s),
            _ => None,
        }
    }

    /// Get the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            CellValue::Null => "null",
            CellValue::Number(_) => "number",
            CellValue::String(_) => "string",
            CellValue::Boolean(_) => "boolean",
            CellValue::DateTime(_) => "datetime",
            CellValue::Error(_) => "error",
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => write!(f, ""),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::String(s) | CellValue::DateTime(s) | CellValue::Error(s) => {
                write!(f, "{}", s)
            }
            CellValue::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
        }
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Boolean(b)
    }
}

impl From<i32> for CellValue {
    fn from(n: i32) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::string(s)
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::String(s)
    }
}

/// Excel error values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellError {
    /// #NULL! - Incorrect range operator
    Null,
    /// #DIV/0! - Division by zero
    Div0,
    /// #VALUE! - Wrong type of argument or operand
    Value,
    /// #REF! - Invalid cell reference
    Ref,
    /// #NAME? - Unrecognized formula name
    Name,
    /// #NUM! - Invalid numeric value
    Num,
    /// #N/A - Value not available
    Na,
    /// #GETTING_DATA - External data is loading
    GettingData,
}

impl CellError {
    /// Get the display string for this error
    pub fn as_str(&self) -> &'static str {
        match self {
            CellError::Null => "#NULL!",
            CellError::Div0 => "#DIV/0!",
            CellError::Value => "#VALUE!",
            CellError::Ref => "#REF!",
            CellError::Name => "#NAME?",
            CellError::Num => "#NUM!",
            CellError::Na => "#N/A",
            CellError::GettingData => "#GETTING_DATA",
        }
    }

    /// Parse an error literal
    pub fn from_literal(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "#NULL!" => Some(CellError::Null),
            "#DIV/0!" => Some(CellError::Div0),
            "#VALUE!" => Some(CellError::Value),
            "#REF!" => Some(CellError::Ref),
            "#NAME?" => Some(CellError::Name),
            "#NUM!" => Some(CellError::Num),
            "#N/A" => Some(CellError::Na),
            "#GETTING_DATA" => Some(CellError::GettingData),
            _ => None,
        }
    }

    /// Map a BIFF error code to an error value
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(CellError::Null),
            0x07 => Some(CellError::Div0),
            0x0F => Some(CellError::Value),
            0x17 => Some(CellError::Ref),
            0x1D => Some(CellError::Name),
            0x24 => Some(CellError::Num),
            0x2A => Some(CellError::Na),
            0x2B => Some(CellError::GettingData),
            _ => None,
        }
    }
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
