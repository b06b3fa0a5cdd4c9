use crate::models::dataset_config::{
    DatasetConfig, FilenamePattern, Geometry, GridResolution, OneOrMany,
};
use crate::processors::transform::ColumnTransform;
use clap::ValueEnum;
use std::collections::BTreeMap;
use std::fmt;

/// How the rows of a source matrix map onto stored records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Coordinate columns followed by one column per time step
    TimeSteps,
    /// One grid snapshot; each named parameter column is a layer field
    Snapshot,
    /// Scattered observations, one feature per row
    Features,
}

/// Known source models and their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModelKind {
    /// Grid cells in rows, x and y then one column per time step
    #[value(name = "spatio-temporal-matrix", alias = "SpatioTemporalMatrix")]
    SpatioTemporalMatrix,

    /// Kriged XCO2 concentrations on a lat/lng grid (6-day spans)
    #[value(name = "kriged-xco2-matrix", alias = "KrigedXCO2Matrix")]
    KrigedXco2Matrix,

    /// Bias-corrected XCO2 retrievals at arbitrary points
    #[value(name = "xco2-matrix", alias = "XCO2Matrix")]
    Xco2Matrix,
}

impl ModelKind {
    pub fn layout(&self) -> Layout {
        match self {
            ModelKind::SpatioTemporalMatrix => Layout::TimeSteps,
            ModelKind::KrigedXco2Matrix => Layout::Snapshot,
            ModelKind::Xco2Matrix => Layout::Features,
        }
    }

    /// Default configuration layer for this model.
    pub fn preset(&self) -> DatasetConfig {
        match self {
            ModelKind::SpatioTemporalMatrix => DatasetConfig {
                precision: Some(2),
                columns: Some(strings(&["x", "y"])),
                formats: Some(map(&[("x", "%.5f"), ("y", "%.5f")])),
                gridded: Some(true),
                gridres: Some(GridResolution::degrees(1.0, 1.0)),
                header: Some(strings(&["lng", "lat"])),
                step: Some(OneOrMany::Many(vec![10800])),
                parameters: Some(strings(&["values"])),
                units: Some(map(&[("x", "degrees"), ("y", "degrees")])),
                ..Default::default()
            },
            ModelKind::KrigedXco2Matrix => DatasetConfig {
                precision: Some(1),
                columns: Some(strings(&[
                    "y", "x", "values", "errors", "4", "5", "6", "7", "8",
                ])),
                formats: Some(map(&[
                    ("x", "%.5f"),
                    ("y", "%.5f"),
                    ("values", "%.2f"),
                    ("errors", "%.4f"),
                ])),
                gridded: Some(true),
                gridres: Some(GridResolution::degrees(1.0, 1.0)),
                header: Some(strings(&[
                    "lat",
                    "lng",
                    "xco2_ppm",
                    "error_ppm^2",
                    "",
                    "",
                    "",
                    "",
                    "",
                ])),
                parameters: Some(strings(&["values", "errors"])),
                span: Some(OneOrMany::Many(vec![518400])),
                regex: Some(timestamp_pattern(r"^Kriged_(?P<timestamp>\d{4}\d{2}\d{2})_.*$")),
                transforms: Some(BTreeMap::from([(
                    "errors".to_string(),
                    ColumnTransform::Sqrt,
                )])),
                units: Some(map(&[
                    ("x", "degrees"),
                    ("y", "degrees"),
                    ("values", "ppm"),
                    ("errors", "ppm"),
                ])),
                var_name: Some("krigedData".to_string()),
                title: Some("Kriged XCO2 Test".to_string()),
                ..Default::default()
            },
            ModelKind::Xco2Matrix => DatasetConfig {
                precision: Some(1),
                columns: Some(strings(&["x", "y", "value", "%j", "%Y", "error"])),
                formats: Some(map(&[
                    ("x", "%.5f"),
                    ("y", "%.5f"),
                    ("value", "%.2f"),
                    ("error", "%.4f"),
                ])),
                gridded: Some(false),
                geometry: Some(Geometry::points()),
                header: Some(strings(&[
                    "lng",
                    "lat",
                    "xco2_ppm",
                    "day",
                    "year",
                    "error_ppm",
                ])),
                span: Some(OneOrMany::Many(vec![518400])),
                parameters: Some(strings(&["value", "error"])),
                regex: Some(timestamp_pattern(r"^XCO2_(?P<timestamp>\d{4}\d{2}\d{2})_.*$")),
                units: Some(map(&[
                    ("x", "degrees"),
                    ("y", "degrees"),
                    ("value", "ppm"),
                    ("error", "ppm&sup2;"),
                ])),
                var_name: Some("XCO2".to_string()),
                title: Some("Bias-Corrected XCO2 Retrievals".to_string()),
                ..Default::default()
            },
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelKind::SpatioTemporalMatrix => "SpatioTemporalMatrix",
            ModelKind::KrigedXco2Matrix => "KrigedXCO2Matrix",
            ModelKind::Xco2Matrix => "XCO2Matrix",
        };
        write!(f, "{}", name)
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn timestamp_pattern(regex: &str) -> FilenamePattern {
    FilenamePattern {
        regex: regex.to_string(),
        map: map(&[("timestamp", "%Y%m%d")]),
    }
}
