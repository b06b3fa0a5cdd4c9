use crate::error::{ProcessingError, Result};

/// Dense row-major matrix of f64 read from a hierarchical file.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn from_row_major(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        if rows * cols != data.len() {
            return Err(ProcessingError::InvalidFormat(format!(
                "Matrix of {}x{} cannot hold {} values",
                rows,
                cols,
                data.len()
            )));
        }

        Ok(Self { rows, cols, data })
    }

    /// Matlab stores arrays column by column.
    pub fn from_column_major(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        if rows * cols != data.len() {
            return Err(ProcessingError::InvalidFormat(format!(
                "Matrix of {}x{} cannot hold {} values",
                rows,
                cols,
                data.len()
            )));
        }

        let mut row_major = vec![0.0; data.len()];
        for (i, value) in data.into_iter().enumerate() {
            let (row, col) = (i % rows, i / rows);
            row_major[row * cols + col] = value;
        }

        Ok(Self {
            rows,
            cols,
            data: row_major,
        })
    }

    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != cols) {
            return Err(ProcessingError::InvalidFormat(
                "Rows have differing lengths".to_string(),
            ));
        }

        Self::from_row_major(rows.len(), cols, rows.concat())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn column(&self, col: usize) -> Vec<f64> {
        (0..self.rows).map(|r| self.data[r * self.cols + col]).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_major_conversion() {
        // [[1, 2, 3], [4, 5, 6]] stored column by column
        let matrix = Matrix::from_column_major(2, 3, vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]).unwrap();

        assert_eq!((matrix.rows(), matrix.cols()), (2, 3));
        assert_eq!(matrix.column(0), vec![1.0, 4.0]);
        assert_eq!(matrix.column(2), vec![3.0, 6.0]);
    }

    #[test]
    fn test_size_mismatch() {
        assert!(Matrix::from_row_major(2, 2, vec![1.0, 2.0, 3.0]).is_err());
        assert!(Matrix::from_rows(&[vec![1.0], vec![1.0, 2.0]]).is_err());
    }
}
