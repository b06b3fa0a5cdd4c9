use crate::error::{ProcessingError, Result};
use crate::processors::transform::{format_decimals, ColumnTransform};
use crate::utils::constants::MAX_CADENCE_SECONDS;
use crate::utils::filename::{parse_timestamp, timestamp_from_filename};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;
use validator::Validate;

/// Grid cell resolution in the x and y direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct GridResolution {
    #[serde(default = "default_grid_units")]
    pub units: String,

    #[validate(range(exclusive_min = 0.0))]
    pub x: f64,

    #[validate(range(exclusive_min = 0.0))]
    pub y: f64,
}

fn default_grid_units() -> String {
    "degrees".to_string()
}

impl GridResolution {
    pub fn degrees(x: f64, y: f64) -> Self {
        Self {
            units: default_grid_units(),
            x,
            y,
        }
    }
}

/// Geometry of non-gridded datasets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(rename = "type", default = "default_geometry_type")]
    pub kind: String,

    /// Store all features in one document instead of one per feature
    #[serde(default, alias = "isCollection")]
    pub collection: bool,
}

fn default_geometry_type() -> String {
    "Point".to_string()
}

impl Geometry {
    pub fn points() -> Self {
        Self {
            kind: default_geometry_type(),
            collection: false,
        }
    }
}

/// Regex used to mine values (only `timestamp`) out of file names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilenamePattern {
    pub regex: String,

    #[serde(default)]
    pub map: BTreeMap<String, String>,
}

/// A step or span given as one number or as a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(i64),
    Many(Vec<i64>),
}

impl OneOrMany {
    pub fn into_vec(self) -> Vec<i64> {
        match self {
            OneOrMany::One(v) => vec![v],
            OneOrMany::Many(v) => v,
        }
    }
}

/// Time layout of a dataset: regular steps or observation spans (seconds).
#[derive(Debug, Clone, PartialEq)]
pub enum Cadence {
    Steps(Vec<i64>),
    Spans(Vec<i64>),
    Unspecified,
}

/// One layer of dataset configuration: a model preset, a JSON sidecar or
/// command line overrides. Later layers win field by field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,

    #[serde(default, alias = "grid", skip_serializing_if = "Option::is_none")]
    pub gridres: Option<GridResolution>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<String>>,

    #[serde(default, alias = "spans", skip_serializing_if = "Option::is_none")]
    pub span: Option<OneOrMany>,

    #[serde(default, alias = "steps", skip_serializing_if = "Option::is_none")]
    pub step: Option<OneOrMany>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub var_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gridded: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Geometry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formats: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<FilenamePattern>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transforms: Option<BTreeMap<String, ColumnTransform>>,
}

impl DatasetConfig {
    /// Read a JSON sidecar config.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ProcessingError::MissingConfig(path.display().to_string()));
        }

        let text = fs::read_to_string(path)?;
        let config = serde_json::from_str(&text).map_err(|e| {
            ProcessingError::Config(format!("Malformed config file {}: {}", path.display(), e))
        })?;

        debug!("Loaded dataset config from {}", path.display());
        Ok(config)
    }

    /// Parse `key=value;key=value` overrides.
    ///
    /// Values are read as JSON where that fits the field (numbers, lists,
    /// objects) and as plain text otherwise.
    pub fn from_overrides(pairs: &str) -> Result<Self> {
        let mut config = DatasetConfig::default();

        for pair in pairs.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, raw) = pair.split_once('=').ok_or_else(|| {
                ProcessingError::Config(format!("Override '{}' is not of the form key=value", pair))
            })?;
            let key = key.trim();
            let raw = raw.trim();

            let layer = serde_json::from_str::<Value>(raw)
                .ok()
                .and_then(|value| Self::single_field(key, value).ok())
                .map_or_else(|| Self::single_field(key, Value::String(raw.to_string())), Ok)
                .map_err(|e| ProcessingError::Config(format!("Invalid override '{}': {}", pair, e)))?;

            if layer == DatasetConfig::default() {
                return Err(ProcessingError::Config(format!(
                    "Unknown config option in override: '{}'",
                    key
                )));
            }

            config = config.overlay(layer);
        }

        Ok(config)
    }

    fn single_field(key: &str, value: Value) -> serde_json::Result<Self> {
        let mut map = Map::new();
        map.insert(key.to_string(), value);
        serde_json::from_value(Value::Object(map))
    }

    /// Fields set in `top` replace those set here.
    pub fn overlay(self, top: DatasetConfig) -> DatasetConfig {
        DatasetConfig {
            columns: top.columns.or(self.columns),
            gridres: top.gridres.or(self.gridres),
            header: top.header.or(self.header),
            parameters: top.parameters.or(self.parameters),
            span: top.span.or(self.span),
            step: top.step.or(self.step),
            timestamp: top.timestamp.or(self.timestamp),
            title: top.title.or(self.title),
            units: top.units.or(self.units),
            var_name: top.var_name.or(self.var_name),
            gridded: top.gridded.or(self.gridded),
            geometry: top.geometry.or(self.geometry),
            formats: top.formats.or(self.formats),
            regex: top.regex.or(self.regex),
            precision: top.precision.or(self.precision),
            transforms: top.transforms.or(self.transforms),
        }
    }

    /// Timestamp mined from the data file name, when a pattern is configured.
    pub fn filename_timestamp(&self, data_path: &Path) -> Result<Option<NaiveDateTime>> {
        let Some(pattern) = &self.regex else {
            return Ok(None);
        };
        let Some(format) = pattern.map.get("timestamp") else {
            return Ok(None);
        };

        timestamp_from_filename(data_path, &pattern.regex, format)
    }

    /// Check required fields and produce the validated configuration.
    pub fn resolve(self) -> Result<ResolvedConfig> {
        let timestamp = self
            .timestamp
            .as_deref()
            .ok_or_else(|| ProcessingError::MissingData("timestamp".to_string()))
            .and_then(parse_timestamp)?;

        let var_name = self
            .var_name
            .ok_or_else(|| ProcessingError::MissingData("var_name".to_string()))?;

        let gridded = self.gridded.unwrap_or(true);
        if gridded && self.gridres.is_none() {
            return Err(ProcessingError::MissingData(
                "gridres (required for gridded datasets)".to_string(),
            ));
        }

        let cadence = match (self.step, self.span) {
            (Some(step), _) => Cadence::Steps(check_cadence("step", step.into_vec())?),
            (None, Some(span)) => Cadence::Spans(check_cadence("span", span.into_vec())?),
            (None, None) => Cadence::Unspecified,
        };

        let mut formats = BTreeMap::new();
        for (column, format) in self.formats.unwrap_or_default() {
            formats.insert(column, format_decimals(&format)?);
        }

        let columns = self.columns.unwrap_or_default();
        let resolved = ResolvedConfig {
            header: self.header.unwrap_or_else(|| columns.clone()),
            columns,
            parameters: self.parameters.unwrap_or_default(),
            timestamp,
            title: self.title.unwrap_or_default(),
            units: self.units.unwrap_or_default(),
            var_name,
            gridded,
            gridres: self.gridres,
            geometry: self.geometry,
            cadence,
            formats,
            precision: self.precision,
            transforms: self.transforms.unwrap_or_default(),
        };

        resolved.validate()?;
        Ok(resolved)
    }
}

/// Steps and spans are positive durations of at most a century.
fn check_cadence(field: &str, seconds: Vec<i64>) -> Result<Vec<i64>> {
    if seconds.is_empty() {
        return Err(ProcessingError::Config(format!("{} needs at least one value", field)));
    }
    if let Some(bad) = seconds
        .iter()
        .find(|&&s| s <= 0 || s > MAX_CADENCE_SECONDS)
    {
        return Err(ProcessingError::Config(format!(
            "{} of {} seconds is out of range (1 to {})",
            field, bad, MAX_CADENCE_SECONDS
        )));
    }
    Ok(seconds)
}

/// Dataset configuration after merging and validation.
#[derive(Debug, Clone, Validate)]
pub struct ResolvedConfig {
    #[validate(length(min = 1))]
    pub columns: Vec<String>,

    pub header: Vec<String>,

    #[validate(length(min = 1))]
    pub parameters: Vec<String>,

    pub timestamp: NaiveDateTime,

    pub title: String,

    pub units: BTreeMap<String, String>,

    #[validate(length(min = 1))]
    pub var_name: String,

    pub gridded: bool,

    #[validate(nested)]
    pub gridres: Option<GridResolution>,

    pub geometry: Option<Geometry>,

    pub cadence: Cadence,

    /// Decimal places per column
    pub formats: BTreeMap<String, usize>,

    pub precision: Option<usize>,

    pub transforms: BTreeMap<String, ColumnTransform>,
}

impl ResolvedConfig {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn steps(&self) -> Option<&[i64]> {
        match &self.cadence {
            Cadence::Steps(steps) => Some(steps),
            _ => None,
        }
    }

    pub fn spans(&self) -> Option<&[i64]> {
        match &self.cadence {
            Cadence::Spans(spans) => Some(spans),
            _ => None,
        }
    }
}
