use crate::error::{ProcessingError, Result};
use crate::models::Matrix;
use crate::readers::{HierarchicalSource, SourceFormat};
use std::path::Path;

/// Root-group datasets of an HDF5 file (also Matlab v7.3 files).
#[cfg(feature = "hdf5")]
pub struct Hdf5Reader {
    file: hdf5::File,
}

#[cfg(feature = "hdf5")]
impl Hdf5Reader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = hdf5::File::open(path)?;
        Ok(Self { file })
    }
}

#[cfg(feature = "hdf5")]
impl HierarchicalSource for Hdf5Reader {
    fn format(&self) -> SourceFormat {
        SourceFormat::Hdf5
    }

    fn variable_names(&self) -> Vec<String> {
        // Groups and named types are not readable as matrices
        self.file
            .member_names()
            .unwrap_or_default()
            .into_iter()
            .filter(|name| self.file.dataset(name).is_ok())
            .collect()
    }

    fn read_matrix(&self, name: &str) -> Result<Matrix> {
        let dataset = self
            .file
            .dataset(name)
            .map_err(|_| ProcessingError::VariableNotFound(name.to_string()))?;

        let shape = dataset.shape();
        let (rows, cols) = match shape.as_slice() {
            [rows, cols] => (*rows, *cols),
            [rows] => (*rows, 1),
            other => {
                return Err(ProcessingError::InvalidFormat(format!(
                    "Variable \"{}\" has {} dimensions; expected a 2-D matrix",
                    name,
                    other.len()
                )))
            }
        };

        let data: Vec<f64> = dataset.read_raw::<f64>()?;
        Matrix::from_row_major(rows, cols, data)
    }
}

/// Stand-in used when the crate is built without HDF5 support.
#[cfg(not(feature = "hdf5"))]
pub struct Hdf5Reader;

#[cfg(not(feature = "hdf5"))]
impl Hdf5Reader {
    pub fn open(path: &Path) -> Result<Self> {
        Err(ProcessingError::UnsupportedFormat(format!(
            "{} is an HDF5 file; rebuild flux-etl with `--features hdf5` to read it",
            path.display()
        )))
    }
}

#[cfg(not(feature = "hdf5"))]
impl HierarchicalSource for Hdf5Reader {
    fn format(&self) -> SourceFormat {
        SourceFormat::Hdf5
    }

    fn variable_names(&self) -> Vec<String> {
        Vec::new()
    }

    fn read_matrix(&self, name: &str) -> Result<Matrix> {
        Err(ProcessingError::VariableNotFound(name.to_string()))
    }
}
