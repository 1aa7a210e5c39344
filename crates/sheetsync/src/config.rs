//! Report configuration
//!
//! One JSON file per monitoring point, `<dir>/<prefix><pointID>.json`. A
//! config may name another point in `baseParams`; that point's file is
//! loaded underneath it, exactly one level deep.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use sheetsync_core::cell::letter_to_index;
use sheetsync_core::{CellRange, SheetId};

use crate::error::{SyncError, SyncResult};

/// Environment variable selecting the output root
pub const ENVIRONMENT_VAR: &str = "SHEETSYNC_ENV";

/// Environment used when none is configured
pub const DEFAULT_ENVIRONMENT: &str = "production";

/// File name prefix of config files
pub const DEFAULT_PREFIX: &str = "report_";

/// Keys whose object values merge with the base config instead of replacing it
const MERGED_KEYS: [&str; 2] = ["dataColumns", "outputRoots"];

/// A sheet given by name or 0-based index
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SheetRef {
    Index(usize),
    Name(String),
}

impl From<&SheetRef> for SheetId {
    fn from(r: &SheetRef) -> Self {
        match r {
            SheetRef::Index(i) => SheetId::Index(*i),
            SheetRef::Name(n) => SheetId::Name(n.clone()),
        }
    }
}

/// Layout and file naming of one point's reports
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportConfig {
    /// First row of the date block
    pub start_row: u32,
    /// Last row of the date block; the sheet's last used row when absent
    #[serde(default)]
    pub end_row: Option<u32>,
    /// Column holding each row's date
    pub date_column: String,
    /// Last column of the report's data block
    pub data_end_column: String,
    /// Alias to column letter
    #[serde(default)]
    pub data_columns: BTreeMap<String, String>,
    /// Year report file name, e.g. `report_{pointID}_{year}.xlsx`
    pub output_report_file: String,
    /// Template file name, e.g. `template_{pointID}.xlsx`
    pub output_template_file: String,
    #[serde(default, deserialize_with = "point_id_opt")]
    pub base_params: Option<String>,
    /// Environment name to output directory
    #[serde(default)]
    pub output_roots: BTreeMap<String, String>,
    /// Output directory when no environment entry matches
    #[serde(default)]
    pub output_root: Option<String>,
    #[serde(default)]
    pub sheet: Option<SheetRef>,
}

/// Point ids may be written as strings or numbers
fn point_id_opt<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Expand `{pointID}` and `{year}` in a file name template
pub fn expand_template(template: &str, point_id: &str, year: i32) -> String {
    template
        .replace("{pointID}", point_id)
        .replace("{year}", &year.to_string())
}

impl ReportConfig {
    pub fn report_file_name(&self, point_id: &str, year: i32) -> String {
        expand_template(&self.output_report_file, point_id, year)
    }

    pub fn template_file_name(&self, point_id: &str, year: i32) -> String {
        expand_template(&self.output_template_file, point_id, year)
    }

    /// Output directory for an environment
    pub fn output_root_for(&self, environment: &str) -> Option<&str> {
        self.output_roots
            .get(environment)
            .or(self.output_root.as_ref())
            .map(String::as_str)
    }

    pub fn sheet_id(&self) -> Option<SheetId> {
        self.sheet.as_ref().map(SheetId::from)
    }

    /// 1-based index of the date column
    pub fn date_column_index(&self) -> u32 {
        letter_to_index(&self.date_column).unwrap_or(0)
    }

    /// Cells of the date column searched for date rows.
    ///
    /// Runs from `startRow` to `endRow`, or to `last_row` (the sheet's last
    /// used row) when no end is configured.
    pub fn date_range(&self, last_row: Option<u32>) -> CellRange {
        let col = self.date_column_index();
        let end_row = self
            .end_row
            .or(last_row)
            .unwrap_or(self.start_row)
            .max(self.start_row);
        CellRange::from_indices(self.start_row, col, end_row, col)
    }

    fn validate(&self) -> Result<(), String> {
        if self.start_row == 0 {
            return Err("startRow must be at least 1".into());
        }
        if let Some(end) = self.end_row {
            if end < self.start_row {
                return Err(format!("endRow {} is before startRow {}", end, self.start_row));
            }
        }
        let columns = [&self.date_column, &self.data_end_column]
            .into_iter()
            .chain(self.data_columns.values());
        for column in columns {
            match letter_to_index(column) {
                Ok(i) if i > 0 => {}
                _ => return Err(format!("'{}' is not a column letter", column)),
            }
        }
        Ok(())
    }
}

/// Loads and caches report configs from one directory
#[derive(Debug)]
pub struct ConfigLoader {
    dir: PathBuf,
    prefix: String,
    environment: String,
    template_root: Option<PathBuf>,
    cache: RefCell<HashMap<String, ReportConfig>>,
}

impl ConfigLoader {
    /// Loader for `dir`; the environment comes from `SHEETSYNC_ENV` unless set
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            prefix: DEFAULT_PREFIX.to_string(),
            environment: std::env::var(ENVIRONMENT_VAR)
                .ok()
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string()),
            template_root: None,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    /// Directory holding shared fallback templates (default: the config dir)
    pub fn with_template_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.template_root = Some(root.into());
        self
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn template_root(&self) -> &Path {
        self.template_root.as_deref().unwrap_or(&self.dir)
    }

    pub fn config_path(&self, point_id: &str) -> PathBuf {
        self.dir.join(format!("{}{}.json", self.prefix, point_id))
    }

    /// Output directory of a config for the loader's environment.
    ///
    /// Relative roots are taken from the config directory; without any
    /// root the config directory itself is used.
    pub fn output_dir(&self, config: &ReportConfig) -> PathBuf {
        match config.output_root_for(&self.environment) {
            Some(root) => self.dir.join(root),
            None => self.dir.clone(),
        }
    }

    /// Load a point's config with its base merged underneath
    pub fn load(&self, point_id: &str) -> SyncResult<ReportConfig> {
        if let Some(config) = self.cache.borrow().get(point_id) {
            return Ok(config.clone());
        }

        let path = self.config_path(point_id);
        let mut raw = self.read_object(point_id)?;

        let base_id = match raw.get("baseParams") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        if let Some(base_id) = base_id {
            tracing::debug!(point_id, base = %base_id, "merging base config");
            let base = self.read_object(&base_id)?;
            raw = merge_one_level(base, raw);
        }

        let config: ReportConfig =
            serde_json::from_value(Value::Object(raw)).map_err(|e| SyncError::ConfigParse {
                path: path.clone(),
                message: e.to_string(),
            })?;
        config
            .validate()
            .map_err(|message| SyncError::ConfigParse { path, message })?;

        self.cache
            .borrow_mut()
            .insert(point_id.to_string(), config.clone());
        Ok(config)
    }

    /// Forget cached configs
    pub fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }

    fn read_object(&self, point_id: &str) -> SyncResult<Map<String, Value>> {
        let path = self.config_path(point_id);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SyncError::ConfigNotFound {
                    point_id: point_id.to_string(),
                    path,
                })
            }
            Err(e) => {
                return Err(SyncError::ConfigParse {
                    path,
                    message: e.to_string(),
                })
            }
        };

        match serde_json::from_str(&text) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(SyncError::ConfigParse {
                path,
                message: "expected a JSON object".into(),
            }),
            Err(e) => Err(SyncError::ConfigParse {
                path,
                message: e.to_string(),
            }),
        }
    }
}

/// Overlay `derived` on `base`, merging the mapping keys one level deep
fn merge_one_level(
    mut base: Map<String, Value>,
    derived: Map<String, Value>,
) -> Map<String, Value> {
    for (key, value) in derived {
        let merged = match (base.remove(&key), value) {
            (Some(Value::Object(mut inner)), Value::Object(over))
                if MERGED_KEYS.contains(&key.as_str()) =>
            {
                inner.extend(over);
                Value::Object(inner)
            }
            (_, value) => value,
        };
        base.insert(key, merged);
    }
    base
}
