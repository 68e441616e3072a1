//! Truss assembly and solve
//!
//! Every bar of the triangulation is modeled as an axial linear spring of
//! unit stiffness whose rest length comes from the desired-length field. The
//! assembler builds the global 2N×2N stiffness matrix in triplet form,
//! accumulates rest-length misfit forces (plus optional cross-bar and balloon
//! terms), eliminates constrained boundary DOFs, and solves the SPD system
//! for a displacement field.

mod springs;

pub use springs::{RelaxResult, SpringOptions, relax};
