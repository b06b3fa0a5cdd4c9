pub mod hdf5_reader;
pub mod matlab_reader;

pub use hdf5_reader::Hdf5Reader;
pub use matlab_reader::MatlabReader;

use crate::error::{ProcessingError, Result};
use crate::models::Matrix;
use std::path::Path;
use tracing::debug;

/// Container format of an input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Matlab,
    Hdf5,
}

impl SourceFormat {
    /// Only Matlab (*.mat) and HDF5 (*.h5 or *.mat) files are accepted.
    pub fn detect(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match extension.as_deref() {
            Some("mat") => Ok(SourceFormat::Matlab),
            Some("h5") => Ok(SourceFormat::Hdf5),
            _ => Err(ProcessingError::UnsupportedFormat(format!(
                "{}: only Matlab (*.mat) and HDF5 (*.h5 or *.mat) files are accepted",
                path.display()
            ))),
        }
    }
}

/// A hierarchical scientific file exposing named matrices.
pub trait HierarchicalSource {
    fn format(&self) -> SourceFormat;

    /// Variable names in file order.
    fn variable_names(&self) -> Vec<String>;

    fn read_matrix(&self, name: &str) -> Result<Matrix>;
}

/// Open a data file with the reader its format calls for.
pub fn open_source(path: &Path) -> Result<Box<dyn HierarchicalSource>> {
    if !path.exists() {
        return Err(ProcessingError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Source file not found: {}", path.display()),
        )));
    }

    match SourceFormat::detect(path)? {
        SourceFormat::Matlab if matlab_reader::file_is_hdf5_backed(path)? => {
            debug!("{} is a Matlab v7.3 file, reading as HDF5", path.display());
            Ok(Box::new(Hdf5Reader::open(path)?))
        }
        SourceFormat::Matlab => Ok(Box::new(MatlabReader::open(path)?)),
        SourceFormat::Hdf5 => Ok(Box::new(Hdf5Reader::open(path)?)),
    }
}

/// Grab the first variable name that isn't `__private__`.
pub fn infer_variable_name(source: &dyn HierarchicalSource) -> Result<String> {
    source
        .variable_names()
        .into_iter()
        .find(|name| !name.starts_with("__"))
        .ok_or_else(|| ProcessingError::MissingData("No readable variables in file".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_detect_format() {
        assert_eq!(
            SourceFormat::detect(Path::new("casagfed2004.mat")).unwrap(),
            SourceFormat::Matlab
        );
        assert_eq!(
            SourceFormat::detect(Path::new("xco2.H5")).unwrap(),
            SourceFormat::Hdf5
        );
        assert!(SourceFormat::detect(Path::new("data.csv")).is_err());
        assert!(SourceFormat::detect(Path::new("data")).is_err());
    }

    #[test]
    fn test_open_and_infer_variable() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("fluxes.mat");
        let bytes = matlab_reader::mat_v5_bytes(&[
            ("__header__", 1, 1, vec![0.0]),
            ("casa_gfed_2004", 1, 3, vec![1.0, 2.0, 3.0]),
        ]);
        std::fs::File::create(&path)?.write_all(&bytes)?;

        let source = open_source(&path)?;
        assert_eq!(source.format(), SourceFormat::Matlab);
        assert_eq!(infer_variable_name(source.as_ref())?, "casa_gfed_2004");

        Ok(())
    }

    #[test]
    fn test_missing_file() {
        let result = open_source(Path::new("/nonexistent/flux.mat"));
        assert!(matches!(result, Err(ProcessingError::Io(_))));
    }
}
