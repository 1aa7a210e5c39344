//! Date-indexed report synchronization
//!
//! Incoming [`GroupValue`]s are bucketed by calendar year. Each bucket opens
//! the year's report (or a template when the report does not exist yet),
//! writes every period into the rows whose date cell matches it, and
//! persists the report under its canonical name.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use sheetsync_core::cell::letter_to_index;
use sheetsync_core::{
    CellAddress, CellValue, ClassifyOptions, Error, IterOptions, SheetId, SheetView,
    Source,
};

use crate::config::{ConfigLoader, ReportConfig};
use crate::error::{SyncError, SyncResult};
use crate::group_value::GroupValue;
use crate::open::open_workbook;

/// Aliases of the "day valid" flag column, compared case-insensitively
pub const DAY_VALID_ALIASES: [&str; 4] = ["dayValid", "validDay", "day_valid", "valid_day"];

/// Tuning for [`ReportSynchronizer`]
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Number of trailing years kept, counting the latest
    pub window: u32,
    pub classify: ClassifyOptions,
    /// Columns with these aliases are always written with `1`
    pub day_valid_aliases: Vec<String>,
    /// Sheet used when the config names none
    pub sheet: SheetId,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            window: 5,
            classify: ClassifyOptions::default(),
            day_valid_aliases: DAY_VALID_ALIASES.iter().map(|s| s.to_string()).collect(),
            sheet: SheetId::default(),
        }
    }
}

impl SyncOptions {
    fn is_day_valid(&self, alias: &str) -> bool {
        self.day_valid_aliases
            .iter()
            .any(|a| a.eq_ignore_ascii_case(alias))
    }
}

/// Why part of a period was not written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// No row in the date column carries the period's date
    NoMatchingDateRow { date: String },
    /// The series and the matched row block differ in length
    ColumnLengthMismatch {
        date: String,
        alias: String,
        rows: usize,
        values: usize,
    },
    /// The alias maps past the report's data end column
    ColumnOutsideReport { alias: String, column: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoMatchingDateRow { date } => write!(f, "{}: no matching date row", date),
            SkipReason::ColumnLengthMismatch {
                date,
                alias,
                rows,
                values,
            } => write!(
                f,
                "{}: '{}' has {} values for {} rows",
                date, alias, values, rows
            ),
            SkipReason::ColumnOutsideReport { alias, column } => {
                write!(f, "'{}' maps to column {} outside the report", alias, column)
            }
        }
    }
}

/// Outcome of one year bucket
#[derive(Debug, Clone, PartialEq)]
pub struct SynchronizationResult {
    /// Where the report was persisted
    pub result_path: PathBuf,
    pub report_year: i32,
    /// Dates with at least one written cell, ascending
    pub report_dates: Vec<String>,
    /// The file the bucket was read from
    pub source_path: PathBuf,
    pub written_cells: usize,
    pub skipped: Vec<SkipReason>,
}

/// A year bucket that could not be processed
#[derive(Debug)]
pub struct BucketFailure {
    pub year: i32,
    pub error: SyncError,
}

/// Outcome of one [`ReportSynchronizer::synchronize`] call
#[derive(Debug, Default)]
pub struct SyncReport {
    pub point_id: String,
    /// Persisted buckets, ascending by year
    pub results: Vec<SynchronizationResult>,
    pub failures: Vec<BucketFailure>,
    /// Dates outside the rolling window
    pub dropped: Vec<String>,
}

/// A resolved column of the report
struct DataColumn<'c> {
    alias: &'c str,
    col: u32,
    day_valid: bool,
}

/// Writes group values into a point's yearly reports
pub struct ReportSynchronizer<'a> {
    loader: &'a ConfigLoader,
    options: SyncOptions,
}

impl<'a> ReportSynchronizer<'a> {
    pub fn new(loader: &'a ConfigLoader, options: SyncOptions) -> Self {
        Self { loader, options }
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Synchronize `values` into the reports of `point_id`.
    ///
    /// A missing config or a failed persist aborts the call. A bucket whose
    /// source cannot be found or read is recorded in
    /// [`SyncReport::failures`] and the remaining buckets still run.
    pub fn synchronize(&self, point_id: &str, values: &[GroupValue]) -> SyncResult<SyncReport> {
        let config = self.loader.load(point_id)?;
        let mut report = SyncReport {
            point_id: point_id.to_string(),
            ..SyncReport::default()
        };

        let (buckets, dropped) = self.bucket_by_year(values);
        report.dropped = dropped;
        if !report.dropped.is_empty() {
            tracing::debug!(
                point_id,
                count = report.dropped.len(),
                "dropped periods outside the rolling window"
            );
        }

        for (year, bucket) in buckets {
            match self.sync_bucket(point_id, &config, year, &bucket) {
                Ok(result) => report.results.push(result),
                Err(error) if error.is_bucket_local() => {
                    tracing::warn!(point_id, year, %error, "year bucket failed");
                    report.failures.push(BucketFailure { year, error });
                }
                Err(error) => return Err(error),
            }
        }

        Ok(report)
    }

    /// Sort periods by date and split them into the years of the window.
    ///
    /// The sort is stable, so of two periods with the same date the later
    /// one is written last.
    fn bucket_by_year<'v>(
        &self,
        values: &'v [GroupValue],
    ) -> (BTreeMap<i32, Vec<&'v GroupValue>>, Vec<String>) {
        let mut sorted: Vec<&GroupValue> = values.iter().collect();
        sorted.sort_by_key(|gv| gv.date());

        let mut buckets: BTreeMap<i32, Vec<&GroupValue>> = BTreeMap::new();
        let mut dropped = Vec::new();
        let Some(latest) = sorted.last().map(|gv| gv.year()) else {
            return (buckets, dropped);
        };
        let window = self.options.window.max(1) as i32;
        let first = latest - (window - 1);

        for gv in sorted {
            if gv.year() >= first {
                buckets.entry(gv.year()).or_default().push(gv);
            } else {
                dropped.push(gv.day_key());
            }
        }
        (buckets, dropped)
    }

    /// The canonical report path of a year
    pub fn report_path(&self, point_id: &str, config: &ReportConfig, year: i32) -> PathBuf {
        self.loader
            .output_dir(config)
            .join(config.report_file_name(point_id, year))
    }

    /// The file a bucket is read from: the year's report, else the template
    /// in the output root, else the shared template.
    pub fn resolve_source(
        &self,
        point_id: &str,
        config: &ReportConfig,
        year: i32,
    ) -> SyncResult<PathBuf> {
        let template = config.template_file_name(point_id, year);
        let candidates = [
            self.report_path(point_id, config, year),
            self.loader.output_dir(config).join(&template),
            self.loader.template_root().join(&template),
        ];

        candidates
            .into_iter()
            .find(|p| p.is_file())
            .ok_or_else(|| SyncError::SourceFileNotFound {
                point_id: point_id.to_string(),
                year,
            })
    }

    fn data_columns<'c>(
        &self,
        config: &'c ReportConfig,
        skipped: &mut Vec<SkipReason>,
    ) -> Vec<DataColumn<'c>> {
        let end = letter_to_index(&config.data_end_column).unwrap_or(0);
        let mut columns = Vec::new();
        for (alias, letter) in &config.data_columns {
            let col = letter_to_index(letter).unwrap_or(0);
            if col == 0 || col > end {
                tracing::warn!(%alias, column = %letter, "column outside the report, skipped");
                skipped.push(SkipReason::ColumnOutsideReport {
                    alias: alias.clone(),
                    column: letter.clone(),
                });
                continue;
            }
            columns.push(DataColumn {
                alias,
                col,
                day_valid: self.options.is_day_valid(alias),
            });
        }
        columns
    }

    fn sync_bucket(
        &self,
        point_id: &str,
        config: &ReportConfig,
        year: i32,
        bucket: &[&GroupValue],
    ) -> SyncResult<SynchronizationResult> {
        let source_path = self.resolve_source(point_id, config, year)?;
        let result_path = self.report_path(point_id, config, year);
        let read_error = |source: Error| SyncError::BackendRead {
            path: source_path.clone(),
            source,
        };

        let mut workbook = open_workbook(Source::Path(source_path.clone())).map_err(read_error)?;
        if !workbook.kind().is_writable() {
            return Err(read_error(Error::ReadOnly("xls")));
        }

        let sheet_id = config.sheet_id().unwrap_or_else(|| self.options.sheet.clone());
        let mut skipped = Vec::new();
        let columns = self.data_columns(config, &mut skipped);
        let mut report_dates: Vec<String> = Vec::new();
        let mut written_cells = 0;

        {
            let sheet = workbook.sheet_mut(&sheet_id).map_err(read_error)?;
            let date_rows = self.locate_date_rows(&*sheet, config).map_err(read_error)?;

            for gv in bucket {
                let date = gv.day_key();
                let Some(rows) = date_rows.get(&date) else {
                    tracing::warn!(point_id, %date, "no matching date row, skipped");
                    skipped.push(SkipReason::NoMatchingDateRow { date });
                    continue;
                };

                let written = write_period(sheet, gv, rows, &columns, &mut skipped)
                    .map_err(read_error)?;
                written_cells += written;
                if written > 0 && !report_dates.contains(&date) {
                    report_dates.push(date);
                }
            }
        }

        let persisted = workbook
            .persist(&result_path)
            .map_err(|source| SyncError::Persist {
                path: result_path.clone(),
                source,
            })?;

        tracing::info!(
            point_id,
            year,
            path = %persisted.display(),
            dates = report_dates.len(),
            cells = written_cells,
            "report synchronized"
        );

        Ok(SynchronizationResult {
            result_path: persisted,
            report_year: year,
            report_dates,
            source_path,
            written_cells,
            skipped,
        })
    }

    /// Rows of the date window keyed by their day, ascending
    fn locate_date_rows(
        &self,
        sheet: &dyn SheetView,
        config: &ReportConfig,
    ) -> sheetsync_core::Result<BTreeMap<String, Vec<u32>>> {
        let range = config.date_range(sheet.used_range().map(|r| r.end.row));
        let options = IterOptions {
            include_empty: false,
            classify: self.options.classify,
        };

        let mut rows: BTreeMap<String, Vec<u32>> = BTreeMap::new();
        for cell in sheet.iterate(&range, &options)? {
            if let Some(day) = cell.day_key() {
                rows.entry(day).or_default().push(cell.address.row);
            }
        }
        Ok(rows)
    }
}

/// Write one period into its matched rows, returning the cells written
fn write_period(
    sheet: &mut dyn SheetView,
    gv: &GroupValue,
    rows: &[u32],
    columns: &[DataColumn<'_>],
    skipped: &mut Vec<SkipReason>,
) -> sheetsync_core::Result<usize> {
    let mut written = 0;
    for column in columns {
        if column.day_valid {
            for &row in rows {
                sheet.write(&CellAddress::new(row, column.col), CellValue::Number(1.0))?;
                written += 1;
            }
            continue;
        }

        let Some(series) = gv.series_for_alias(column.alias) else {
            continue;
        };
        if series.len() != rows.len() {
            tracing::warn!(
                date = %gv.day_key(),
                alias = column.alias,
                rows = rows.len(),
                values = series.len(),
                "series length differs from the date block, column left untouched"
            );
            skipped.push(SkipReason::ColumnLengthMismatch {
                date: gv.day_key(),
                alias: column.alias.to_string(),
                rows: rows.len(),
                values: series.len(),
            });
            continue;
        }

        for (&row, value) in rows.iter().zip(series) {
            if let Some(v) = value {
                sheet.write(&CellAddress::new(row, column.col), CellValue::Number(*v))?;
                written += 1;
            }
        }
    }
    Ok(written)
}
