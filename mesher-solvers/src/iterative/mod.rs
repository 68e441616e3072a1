//! Iterative solvers

mod cg;

pub use cg::{CgConfig, CgSolution, cg};
