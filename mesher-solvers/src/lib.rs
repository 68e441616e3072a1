//! Linear algebra support for the spring-relaxation mesh generator
//!
//! This crate provides the sparse storage and the two solvers the assembled
//! truss systems need:
//!
//! - **CSR matrices** built from triplet streams with duplicate merging
//! - **Conjugate Gradient** for large symmetric positive definite systems
//! - **Dense Cholesky** factorization as a direct fallback for small systems
//!
//! # Example
//!
//! ```
//! use math_mesher_solvers::{CsrMatrix, CgConfig, cg};
//! use ndarray::array;
//!
//! let a = CsrMatrix::from_triplets(2, 2, vec![(0, 0, 4.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 3.0)]);
//! let b = array![1.0, 2.0];
//! let solution = cg(&a, &b, &CgConfig::default());
//! assert!(solution.converged);
//! ```

pub mod direct;
pub mod iterative;
pub mod sparse;

pub use direct::{CholeskyError, CholeskyFactor, cholesky_solve};
pub use iterative::{CgConfig, CgSolution, cg};
pub use sparse::CsrMatrix;
