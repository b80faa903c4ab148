// matmul.rs — Dense row-major matrices and the CPU reference product.
//
// The GPU path in gpu/matmul.rs is verified against `multiply_cpu` with
// `spot_check`, which compares only the first and last elements of the
// product. That is a cheap smoke test, not a proof of correctness: an error
// confined to interior cells passes. `max_abs_diff` compares every element
// and is reported alongside for diagnostics.

use std::fmt;

use crate::error::{GpuError, Result};

/// Absolute tolerance used by [`spot_check`].
pub const VERIFY_TOLERANCE: f32 = 1e-3;

/// A dense `rows × cols` matrix of f32, row-major.
#[derive(Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl Matrix {
    /// Wrap row-major data. Both dimensions must be non-zero and
    /// `data.len()` must equal `rows * cols`.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self> {
        if rows == 0 || cols == 0 || data.len() != rows * cols {
            return Err(GpuError::InvalidMatrixShape { rows, cols, len: data.len() });
        }
        Ok(Matrix { rows, cols, data })
    }

    /// Zero-filled matrix.
    pub fn zeros(rows: usize, cols: usize) -> Result<Self> {
        Self::from_vec(rows, cols, vec![0.0; rows * cols])
    }

    /// `n × n` identity.
    pub fn identity(n: usize) -> Result<Self> {
        let mut m = Self::zeros(n, n)?;
        for i in 0..n {
            m.data[i * n + i] = 1.0;
        }
        Ok(m)
    }

    /// Fill element `i` (row-major) with `f(i)`.
    pub fn from_fn(rows: usize, cols: usize, f: impl FnMut(usize) -> f32) -> Result<Self> {
        Self::from_vec(rows, cols, (0..rows * cols).map(f).collect())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.cols + col]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// First element in row-major order.
    pub fn first(&self) -> f32 {
        self.data[0]
    }

    /// Last element in row-major order.
    pub fn last(&self) -> f32 {
        self.data[self.data.len() - 1]
    }
}

impl fmt::Debug for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Matrix({}x{})", self.rows, self.cols)
    }
}

/// Fail unless `a · b` is defined.
pub fn check_product_shape(a: &Matrix, b: &Matrix) -> Result<()> {
    if a.cols != b.rows {
        return Err(GpuError::DimensionMismatch {
            a_rows: a.rows,
            a_cols: a.cols,
            b_rows: b.rows,
            b_cols: b.cols,
        });
    }
    Ok(())
}

/// Textbook triple loop. Result is `rows(a) × cols(b)`.
pub fn multiply_cpu(a: &Matrix, b: &Matrix) -> Result<Matrix> {
    check_product_shape(a, b)?;
    let (m, k, n) = (a.rows, a.cols, b.cols);
    let mut out = vec![0.0f32; m * n];
    for i in 0..m {
        for j in 0..n {
            let mut acc = 0.0f32;
            for p in 0..k {
                acc += a.data[i * k + p] * b.data[p * n + j];
            }
            out[i * n + j] = acc;
        }
    }
    Matrix::from_vec(m, n, out)
}

/// Compare only the first and last elements within [`VERIFY_TOLERANCE`].
pub fn spot_check(reference: &Matrix, candidate: &Matrix) -> bool {
    reference.rows == candidate.rows
        && reference.cols == candidate.cols
        && (reference.first() - candidate.first()).abs() < VERIFY_TOLERANCE
        && (reference.last() - candidate.last()).abs() < VERIFY_TOLERANCE
}

/// Largest absolute element-wise difference, or `None` if shapes differ.
pub fn max_abs_diff(a: &Matrix, b: &Matrix) -> Option<f32> {
    if a.rows != b.rows || a.cols != b.cols {
        return None;
    }
    Some(
        a.data
            .iter()
            .zip(&b.data)
            .map(|(x, y)| (x - y).abs())
            .fold(0.0f32, f32::max),
    )
}

/// Deterministic benchmark operands: `a[i] = i % 100 + 0.1`,
/// `b[i] = i % 50 + 0.2`.
pub fn benchmark_inputs(rows1: usize, cols1: usize, cols2: usize) -> Result<(Matrix, Matrix)> {
    let a = Matrix::from_fn(rows1, cols1, |i| (i % 100) as f32 + 0.1)?;
    let b = Matrix::from_fn(cols1, cols2, |i| (i % 50) as f32 + 0.2)?;
    Ok((a, b))
}
