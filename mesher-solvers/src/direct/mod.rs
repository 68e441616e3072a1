//! Direct solvers

mod cholesky;

pub use cholesky::{CholeskyError, CholeskyFactor, cholesky_solve};
