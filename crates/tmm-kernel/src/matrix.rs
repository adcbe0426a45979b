use crate::error::{AcceleratorError, Result};

/// A dense host-resident matrix of f32 values.
///
/// Data is stored contiguously in row-major order: element `[r, c]` lives at
/// index `r * cols + c`.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl Matrix {
    /// Create a matrix from row-major data.
    ///
    /// # Errors
    /// Returns `ShapeMismatch` if `data.len() != rows * cols`.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(AcceleratorError::ShapeMismatch {
                expected: vec![rows, cols],
                got: vec![data.len()],
            });
        }
        Ok(Matrix { rows, cols, data })
    }

    /// Create a matrix with every element set to `value`.
    pub fn full(rows: usize, cols: usize, value: f32) -> Self {
        Matrix {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }

    /// Create a zero-filled matrix.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::full(rows, cols, 0.0)
    }

    /// Create an `n x n` matrix filled with `value`.
    pub fn square(n: usize, value: f32) -> Self {
        Self::full(n, n, value)
    }

    /// Fallible form of [`Matrix::full`] for sizes that come from user input.
    ///
    /// # Errors
    /// Returns `Resource` if the element count overflows or the host
    /// allocation fails.
    pub fn try_full(rows: usize, cols: usize, value: f32) -> Result<Self> {
        let len = rows.checked_mul(cols).ok_or_else(|| {
            AcceleratorError::Resource(format!("a {rows}x{cols} matrix overflows"))
        })?;
        let mut data = Vec::new();
        data.try_reserve_exact(len).map_err(|e| {
            AcceleratorError::Resource(format!(
                "host allocation of a {rows}x{cols} matrix failed: {e}"
            ))
        })?;
        data.resize(len, value);
        Ok(Matrix { rows, cols, data })
    }

    /// Fallible form of [`Matrix::square`].
    pub fn try_square(n: usize, value: f32) -> Result<Self> {
        Self::try_full(n, n, value)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Returns `[rows, cols]`.
    pub fn dims(&self) -> [usize; 2] {
        [self.rows, self.cols]
    }

    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Element at `[row, col]`, or `None` when out of range.
    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.data.get(row * self.cols + col).copied()
    }

    /// Row-major element slice.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// Size of the element buffer in bytes.
    pub fn size_in_bytes(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }
}
