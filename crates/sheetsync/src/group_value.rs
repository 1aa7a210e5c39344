//! Dated tag samples
//!
//! On the wire a group value is a JSON object:
//!
//! ```json
//! {
//!   "!value": { "dateTime": "2022-01-01T00:00:00Z" },
//!   "plant:flow": [12.5, 13.0, null],
//!   "plant:dayValid": 1
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use sheetsync_core::cell::DAY_FORMAT;

use crate::error::{SyncError, SyncResult};

/// Ordered samples of one tag; `None` leaves its cell untouched
pub type Series = Vec<Option<f64>>;

/// One reporting period's samples, keyed by `ownerGroup:alias`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "WireGroupValue")]
pub struct GroupValue {
    date: NaiveDate,
    series: BTreeMap<String, Series>,
}

#[derive(Deserialize)]
struct WireMeta {
    #[serde(rename = "dateTime")]
    date_time: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireSeries {
    Scalar(Option<f64>),
    Array(Vec<Option<f64>>),
}

#[derive(Deserialize)]
struct WireGroupValue {
    #[serde(rename = "!value")]
    meta: WireMeta,
    #[serde(flatten)]
    series: BTreeMap<String, WireSeries>,
}

impl TryFrom<WireGroupValue> for GroupValue {
    type Error = String;

    fn try_from(wire: WireGroupValue) -> Result<Self, Self::Error> {
        let date = parse_day(&wire.meta.date_time)
            .ok_or_else(|| format!("invalid dateTime '{}'", wire.meta.date_time))?;
        let series = wire
            .series
            .into_iter()
            .map(|(key, s)| {
                let values = match s {
                    WireSeries::Scalar(v) => vec![v],
                    WireSeries::Array(v) => v,
                };
                (key, values)
            })
            .collect();
        Ok(Self { date, series })
    }
}

/// Calendar date of a date or date-time string.
///
/// An offset, when present, is ignored: the date is kept as written.
pub fn parse_day(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local().date());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|dt| dt.date())
        .or_else(|| NaiveDate::parse_from_str(s, DAY_FORMAT).ok())
}

impl GroupValue {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            series: BTreeMap::new(),
        }
    }

    /// Add a series under its qualified key
    pub fn with_series(mut self, key: impl Into<String>, values: Series) -> Self {
        self.series.insert(key.into(), values);
        self
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn year(&self) -> i32 {
        self.date.year()
    }

    /// The `YYYY-MM-DD` key matched against date rows
    pub fn day_key(&self) -> String {
        self.date.format(DAY_FORMAT).to_string()
    }

    pub fn series(&self) -> &BTreeMap<String, Series> {
        &self.series
    }

    /// The first series, in key order, whose key ends in `:alias`
    pub fn series_for_alias(&self, alias: &str) -> Option<&Series> {
        self.series
            .iter()
            .find(|(key, _)| alias_of(key) == alias)
            .map(|(_, s)| s)
    }
}

/// The part of a qualified key after its last colon
pub fn alias_of(key: &str) -> &str {
    key.rsplit_once(':').map_or(key, |(_, alias)| alias)
}

/// Parse a JSON array of group values
pub fn parse_group_values(json: &str) -> serde_json::Result<Vec<GroupValue>> {
    serde_json::from_str(json)
}

/// Read a JSON array of group values from a file
pub fn load_group_values(path: &Path) -> SyncResult<Vec<GroupValue>> {
    let to_error = |message: String| SyncError::GroupValues {
        path: path.to_path_buf(),
        message,
    };
    let json = std::fs::read_to_string(path).map_err(|e| to_error(e.to_string()))?;
    parse_group_values(&json).map_err(|e| to_error(e.to_string()))
}
