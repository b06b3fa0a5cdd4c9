use crate::error::{ProcessingError, Result};
use crate::models::dataset_config::{DatasetConfig, ResolvedConfig};
use crate::models::frame::{Dataset, Feature, FeatureSet, GridFrame, GridLayer};
use crate::models::kind::{Layout, ModelKind};
use crate::models::matrix::Matrix;
use crate::models::metadata::DatasetMetadata;
use crate::processors::bbox::BoundingBox;
use crate::processors::timeline::date_series;
use crate::processors::transform::{round_to, to_stored};
use crate::readers::{infer_variable_name, open_source};
use crate::utils::filename::{default_sidecar_path, format_timestamp};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Per-load configuration supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct ModelOptions {
    pub config_file: Option<PathBuf>,
    pub var_name: Option<String>,
    pub timestamp: Option<String>,
    pub title: Option<String>,
    /// `key=value;key=value` overrides
    pub overrides: Option<String>,
}

impl ModelOptions {
    fn as_config(&self) -> Result<DatasetConfig> {
        let named = DatasetConfig {
            var_name: self.var_name.clone(),
            timestamp: self.timestamp.clone(),
            title: self.title.clone(),
            ..Default::default()
        };

        match &self.overrides {
            Some(pairs) => Ok(named.overlay(DatasetConfig::from_overrides(pairs)?)),
            None => Ok(named),
        }
    }
}

/// A source matrix interpreted through a model and its configuration.
#[derive(Debug, Clone)]
pub struct Model {
    kind: ModelKind,
    config: ResolvedConfig,
    matrix: Matrix,
}

impl Model {
    pub fn new(kind: ModelKind, config: ResolvedConfig, matrix: Matrix) -> Self {
        Self {
            kind,
            config,
            matrix,
        }
    }

    /// Open a data file and resolve its configuration.
    ///
    /// Layers, lowest first: model preset, timestamp mined from the file
    /// name, sidecar JSON, command line options.
    pub fn open(path: &Path, kind: ModelKind, options: &ModelOptions) -> Result<Self> {
        let preset = kind.preset();
        let sidecar = Self::sidecar(path, options.config_file.as_deref())?;
        let cli = options.as_config()?;

        let merged = preset.clone().overlay(sidecar.clone()).overlay(cli.clone());
        let mined = DatasetConfig {
            timestamp: merged
                .filename_timestamp(path)?
                .map(|ts| format_timestamp(&ts)),
            ..Default::default()
        };

        let mut config = preset.overlay(mined).overlay(sidecar).overlay(cli);

        let source = open_source(path)?;
        if config.var_name.is_none() {
            let inferred = infer_variable_name(source.as_ref())?;
            debug!("Inferred variable name '{}'", inferred);
            config.var_name = Some(inferred);
        }

        let config = config.resolve()?;
        let matrix = source.read_matrix(&config.var_name)?;

        info!(
            "Read {} ({}x{}) from {} as {}",
            config.var_name,
            matrix.rows(),
            matrix.cols(),
            path.display(),
            kind
        );

        Ok(Self::new(kind, config, matrix))
    }

    fn sidecar(path: &Path, explicit: Option<&Path>) -> Result<DatasetConfig> {
        if let Some(config_file) = explicit {
            return DatasetConfig::from_file(config_file);
        }

        let default = default_sidecar_path(path);
        if default.exists() {
            DatasetConfig::from_file(&default)
        } else {
            Ok(DatasetConfig::default())
        }
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn matrix(&self) -> &Matrix {
        &self.matrix
    }

    pub fn is_gridded(&self) -> bool {
        self.kind.layout() != Layout::Features
    }

    /// Interpret the matrix as grid layers or features.
    pub fn extract(&self) -> Result<Dataset> {
        match self.kind.layout() {
            Layout::TimeSteps => self.extract_time_steps().map(Dataset::Gridded),
            Layout::Snapshot => self.extract_snapshot().map(Dataset::Gridded),
            Layout::Features => self.extract_features().map(Dataset::Features),
        }
    }

    fn extract_time_steps(&self) -> Result<GridFrame> {
        let named = self.config.columns.len();
        if self.matrix.cols() <= named {
            return Err(ProcessingError::ColumnMismatch {
                expected: named + 1,
                found: self.matrix.cols(),
            });
        }

        let step = self
            .config
            .steps()
            .and_then(|steps| steps.first().copied())
            .ok_or_else(|| ProcessingError::MissingData("step".to_string()))?;

        let coords = self.coordinates()?;
        let parameter = self
            .config
            .parameters
            .first()
            .cloned()
            .unwrap_or_else(|| "values".to_string());

        let dates = date_series(self.config.timestamp, step, self.matrix.cols() - named)?;
        let layers = dates
            .into_iter()
            .enumerate()
            .map(|(j, timestamp)| {
                let values = self.prepare(&parameter, self.matrix.column(named + j));
                GridLayer {
                    timestamp,
                    span: None,
                    parameters: BTreeMap::from([(parameter.clone(), self.store(values))]),
                }
            })
            .collect();

        Ok(GridFrame { coords, layers })
    }

    fn extract_snapshot(&self) -> Result<GridFrame> {
        self.check_column_count()?;

        let coords = self.coordinates()?;
        let mut parameters = BTreeMap::new();
        for name in &self.config.parameters {
            let values = self.prepare(name, self.named_column(name)?);
            parameters.insert(name.clone(), self.store(values));
        }

        let span = self.config.spans().and_then(|spans| spans.first().copied());
        Ok(GridFrame {
            coords,
            layers: vec![GridLayer {
                timestamp: self.config.timestamp,
                span,
                parameters,
            }],
        })
    }

    fn extract_features(&self) -> Result<FeatureSet> {
        self.check_column_count()?;

        let xs = self.prepare("x", self.named_column("x")?);
        let ys = self.prepare("y", self.named_column("y")?);
        let values = self.prepare("value", self.named_column("value")?);
        let errors = self.prepare("error", self.named_column("error")?);
        let days = self.named_column("%j")?;
        let years = self.named_column("%Y")?;

        let mut features = Vec::with_capacity(self.matrix.rows());
        for i in 0..self.matrix.rows() {
            features.push(Feature {
                x: xs[i],
                y: ys[i],
                value: to_stored(values[i], None),
                error: to_stored(errors[i], None),
                timestamp: day_of_year(years[i], days[i])?,
            });
        }

        Ok(FeatureSet { features })
    }

    fn check_column_count(&self) -> Result<()> {
        if self.matrix.cols() != self.config.columns.len() {
            return Err(ProcessingError::ColumnMismatch {
                expected: self.config.columns.len(),
                found: self.matrix.cols(),
            });
        }
        Ok(())
    }

    fn named_column(&self, name: &str) -> Result<Vec<f64>> {
        self.config
            .column_index(name)
            .map(|i| self.matrix.column(i))
            .ok_or_else(|| ProcessingError::MissingData(format!("column '{}'", name)))
    }

    fn coordinates(&self) -> Result<Vec<[f64; 2]>> {
        let xs = self.prepare("x", self.named_column("x")?);
        let ys = self.prepare("y", self.named_column("y")?);
        Ok(xs.into_iter().zip(ys).map(|(x, y)| [x, y]).collect())
    }

    // Configured transform, then the column's number format
    fn prepare(&self, column: &str, values: Vec<f64>) -> Vec<f64> {
        let transform = self.config.transforms.get(column);
        let decimals = self.config.formats.get(column);

        values
            .into_iter()
            .map(|v| {
                let v = transform.map_or(v, |t| t.apply(v));
                decimals.map_or(v, |&d| round_to(v, d))
            })
            .collect()
    }

    fn store(&self, values: Vec<f64>) -> Vec<Option<f64>> {
        values
            .into_iter()
            .map(|v| to_stored(v, self.config.precision))
            .collect()
    }

    /// Metadata entry for `collection`; stats are filled in after storing.
    pub fn describe(&self, collection: &str, dataset: &Dataset) -> DatasetMetadata {
        let bbox = BoundingBox::from_points(dataset.points());

        let dates = match dataset {
            Dataset::Gridded(frame) if self.kind.layout() == Layout::TimeSteps => {
                match (frame.layers.first(), frame.layers.last()) {
                    (Some(first), Some(last)) => vec![
                        format_timestamp(&first.timestamp),
                        format_timestamp(&last.timestamp),
                    ],
                    _ => Vec::new(),
                }
            }
            _ => vec![format_timestamp(&self.config.timestamp)],
        };

        DatasetMetadata {
            id: collection.to_string(),
            title: self.config.title.clone(),
            units: self.config.units.clone(),
            gridded: self.is_gridded(),
            gridres: self.config.gridres.clone().filter(|_| self.is_gridded()),
            geometry: self.config.geometry.clone().filter(|_| !self.is_gridded()),
            bboxmd5: bbox.as_ref().map(BoundingBox::md5),
            bbox,
            dates,
            steps: self.config.steps().map(<[i64]>::to_vec),
            spans: self.config.spans().map(<[i64]>::to_vec),
            precision: self.config.precision.map(|p| p as i32),
            columns: self.config.columns.clone(),
            header: self.config.header.clone(),
            parameters: self.config.parameters.clone(),
            var_name: self.config.var_name.clone(),
            stats: BTreeMap::new(),
        }
    }
}

/// January 1st of `year` plus `day` days.
fn day_of_year(year: f64, day: f64) -> Result<NaiveDateTime> {
    let invalid = || {
        ProcessingError::InvalidFormat(format!("Invalid date in data: year {}, day {}", year, day))
    };
    if !year.is_finite() || !day.is_finite() {
        return Err(invalid());
    }

    NaiveDate::from_ymd_opt(year as i32, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .zip(Duration::try_days(day as i64))
        .and_then(|(start, offset)| start.checked_add_signed(offset))
        .ok_or_else(invalid)
}
