//! Cholesky decomposition solver
//!
//! Provides a dense LLᵀ factorization for symmetric positive definite systems.
//! Suitable for small problems; large systems should go through CG instead.

use ndarray::{Array1, Array2};
use thiserror::Error;

/// Errors that can occur during Cholesky factorization
#[derive(Error, Debug)]
pub enum CholeskyError {
    #[error("Matrix is not positive definite (pivot {pivot} is {value:.3e})")]
    NotPositiveDefinite { pivot: usize, value: f64 },
    #[error("Matrix dimensions mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Cholesky factorization result
///
/// Stores the lower triangular factor L with A = L Lᵀ
#[derive(Debug, Clone)]
pub struct CholeskyFactor {
    /// Lower triangular factor
    pub l: Array2<f64>,
    /// Matrix dimension
    pub n: usize,
}

impl CholeskyFactor {
    /// Solve Ax = b using the pre-computed factorization
    pub fn solve(&self, b: &Array1<f64>) -> Result<Array1<f64>, CholeskyError> {
        if b.len() != self.n {
            return Err(CholeskyError::DimensionMismatch {
                expected: self.n,
                got: b.len(),
            });
        }

        let mut x = b.clone();

        // Forward substitution: Ly = b
        for i in 0..self.n {
            for j in 0..i {
                let update = self.l[[i, j]] * x[j];
                x[i] -= update;
            }
            x[i] /= self.l[[i, i]];
        }

        // Backward substitution: Lᵀx = y
        for i in (0..self.n).rev() {
            for j in (i + 1)..self.n {
                let update = self.l[[j, i]] * x[j];
                x[i] -= update;
            }
            x[i] /= self.l[[i, i]];
        }

        Ok(x)
    }
}

/// Compute the Cholesky factorization of a symmetric positive definite matrix
pub fn cholesky_factorize(a: &Array2<f64>) -> Result<CholeskyFactor, CholeskyError> {
    let n = a.nrows();
    if n != a.ncols() {
        return Err(CholeskyError::DimensionMismatch {
            expected: n,
            got: a.ncols(),
        });
    }

    let mut l = Array2::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }

            if i == j {
                // Diagonal pivot must stay strictly positive
                if sum <= 1e-30 {
                    return Err(CholeskyError::NotPositiveDefinite {
                        pivot: i,
                        value: sum,
                    });
                }
                l[[i, j]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }

    Ok(CholeskyFactor { l, n })
}

/// Solve Ax = b for SPD A using Cholesky decomposition
///
/// This is a convenience function that combines factorization and solve.
pub fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>, CholeskyError> {
    let factor = cholesky_factorize(a)?;
    factor.solve(b)
}
