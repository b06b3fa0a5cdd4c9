use crate::error::{ProcessingError, Result};
use crate::models::Matrix;
use crate::readers::{HierarchicalSource, SourceFormat};
use crate::utils::constants::DEFAULT_BUFFER_SIZE;
use matfile::{MatFile, NumericData};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::debug;

const HEADER_TEXT_LEN: usize = 116;
const HDF5_BACKED_MARKER: &str = "MATLAB 7.3";

/// Level-5 Matlab file held in memory.
pub struct MatlabReader {
    file: MatFile,
}

impl MatlabReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::with_capacity(DEFAULT_BUFFER_SIZE, file);
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;

        debug!("Read {} bytes from {}", bytes.len(), path.display());
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if is_hdf5_backed(bytes) {
            return Err(ProcessingError::UnsupportedFormat(
                "Matlab v7.3 files are HDF5 files; open them with the HDF5 reader".to_string(),
            ));
        }

        let file = MatFile::parse(bytes).map_err(|e| ProcessingError::Matfile(format!("{:?}", e)))?;
        Ok(Self { file })
    }
}

/// Matlab v7.3 files carry a Level-5 style text header over an HDF5 body.
pub fn is_hdf5_backed(bytes: &[u8]) -> bool {
    let header = &bytes[..bytes.len().min(HEADER_TEXT_LEN)];
    String::from_utf8_lossy(header).contains(HDF5_BACKED_MARKER)
}

pub fn file_is_hdf5_backed(path: &Path) -> Result<bool> {
    let mut file = File::open(path)?;
    let mut header = vec![0u8; HEADER_TEXT_LEN];
    let read = file.read(&mut header)?;
    Ok(is_hdf5_backed(&header[..read]))
}

fn widen(data: &NumericData) -> Vec<f64> {
    match data {
        NumericData::Int8 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::UInt8 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::Int16 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::UInt16 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::Int32 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::UInt32 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::Int64 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::UInt64 { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::Single { real, .. } => real.iter().map(|&v| v as f64).collect(),
        NumericData::Double { real, .. } => real.clone(),
    }
}

impl HierarchicalSource for MatlabReader {
    fn format(&self) -> SourceFormat {
        SourceFormat::Matlab
    }

    fn variable_names(&self) -> Vec<String> {
        self.file
            .arrays()
            .iter()
            .map(|a| a.name().to_string())
            .collect()
    }

    fn read_matrix(&self, name: &str) -> Result<Matrix> {
        let array = self
            .file
            .find_by_name(name)
            .ok_or_else(|| ProcessingError::VariableNotFound(name.to_string()))?;

        let size = array.size();
        let (rows, cols) = match size.as_slice() {
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

        Matrix::from_column_major(rows, cols, widen(array.data()))
    }
}

/// Minimal Level-5 MAT writer for building fixtures in tests.
#[cfg(test)]
pub(crate) fn mat_v5_bytes(variables: &[(&str, usize, usize, Vec<f64>)]) -> Vec<u8> {
    fn push_u32(out: &mut Vec<u8>, value: u32) {
        out.extend_from_slice(&value.to_le_bytes());
    }

    let mut out = Vec::new();
    let mut text = b"MATLAB 5.0 MAT-file, created by flux-etl tests".to_vec();
    text.resize(HEADER_TEXT_LEN, b' ');
    out.extend_from_slice(&text);
    out.extend_from_slice(&[0u8; 8]);
    out.extend_from_slice(&0x0100u16.to_le_bytes());
    out.extend_from_slice(b"IM");

    for (name, rows, cols, column_major) in variables {
        let name_padded = (name.len() + 7) / 8 * 8;
        let body_len = 16 + 16 + (8 + name_padded) + (8 + column_major.len() * 8);

        push_u32(&mut out, 14); // miMATRIX
        push_u32(&mut out, body_len as u32);

        push_u32(&mut out, 6); // array flags, miUINT32
        push_u32(&mut out, 8);
        push_u32(&mut out, 6); // mxDOUBLE_CLASS
        push_u32(&mut out, 0);

        push_u32(&mut out, 5); // dimensions, miINT32
        push_u32(&mut out, 8);
        out.extend_from_slice(&(*rows as i32).to_le_bytes());
        out.extend_from_slice(&(*cols as i32).to_le_bytes());

        push_u32(&mut out, 1); // name, miINT8
        push_u32(&mut out, name.len() as u32);
        let mut name_bytes = name.as_bytes().to_vec();
        name_bytes.resize(name_padded, 0);
        out.extend_from_slice(&name_bytes);

        push_u32(&mut out, 9); // real part, miDOUBLE
        push_u32(&mut out, (column_major.len() * 8) as u32);
        for value in column_major.iter() {
            out.extend_from_slice(&value.to_le_bytes());
        }
    }

    out
}
