use crate::error::Result;
use crate::models::{Dataset, FeatureSet, GridFrame};
use crate::utils::filename::format_timestamp;
use csv::{Writer, WriterBuilder};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes stored datasets back out as CSV.
pub struct CsvWriter {
    delimiter: u8,
}

impl CsvWriter {
    pub fn new() -> Self {
        Self { delimiter: b',' }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Write a dataset to a CSV file; returns the number of data rows.
    pub fn write_dataset(&self, dataset: &Dataset, path: &Path) -> Result<usize> {
        let file = File::create(path)?;
        self.write_to(dataset, file)
    }

    pub fn write_to<W: Write>(&self, dataset: &Dataset, output: W) -> Result<usize> {
        let mut writer = WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_writer(output);

        let rows = match dataset {
            Dataset::Gridded(frame) => Self::write_grid(&mut writer, frame)?,
            Dataset::Features(set) => Self::write_features(&mut writer, set)?,
        };

        writer.flush()?;
        Ok(rows)
    }

    /// One row per grid cell; one column per layer and parameter.
    fn write_grid<W: Write>(writer: &mut Writer<W>, frame: &GridFrame) -> Result<usize> {
        let parameters: BTreeSet<&String> = frame
            .layers
            .iter()
            .flat_map(|layer| layer.parameters.keys())
            .collect();
        let single = parameters.len() == 1;

        let mut header = vec!["x".to_string(), "y".to_string()];
        for layer in &frame.layers {
            let timestamp = format_timestamp(&layer.timestamp);
            for name in &parameters {
                header.push(if single {
                    timestamp.clone()
                } else {
                    format!("{}:{}", timestamp, name)
                });
            }
        }
        writer.write_record(&header)?;

        for (i, coord) in frame.coords.iter().enumerate() {
            let mut record = vec![coord[0].to_string(), coord[1].to_string()];
            for layer in &frame.layers {
                for name in &parameters {
                    let value = layer
                        .parameters
                        .get(*name)
                        .and_then(|values| values.get(i).copied().flatten());
                    record.push(value.map(|v| v.to_string()).unwrap_or_default());
                }
            }
            writer.write_record(&record)?;
        }

        Ok(frame.coords.len())
    }

    fn write_features<W: Write>(writer: &mut Writer<W>, set: &FeatureSet) -> Result<usize> {
        writer.write_record(["x", "y", "value", "error", "timestamp"])?;

        for feature in &set.features {
            writer.write_record([
                feature.x.to_string(),
                feature.y.to_string(),
                feature.value.map(|v| v.to_string()).unwrap_or_default(),
                feature.error.map(|v| v.to_string()).unwrap_or_default(),
                format_timestamp(&feature.timestamp),
            ])?;
        }

        Ok(set.len())
    }
}

impl Default for CsvWriter {
    fn default() -> Self {
        Self::new()
    }
}
