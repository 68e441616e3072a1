//! Error types for the mesh generator
//!
//! Configuration and geometry failures are fatal and surfaced to the caller.
//! Solver and inversion failures are recovered internally by the driver
//! (step halving, per-node rollback); they only appear here because the
//! recovery ladder passes them between components.

use thiserror::Error;

/// Errors that can occur while generating a mesh.
#[derive(Debug, Error)]
pub enum MeshError {
    /// Invalid configuration parameter or empty guide mesh.
    #[error("invalid configuration: {reason}")]
    Config {
        /// What was wrong with the configuration
        reason: String,
    },

    /// The Delaunay primitive could not produce a triangulation.
    #[error("degenerate geometry: {reason}")]
    DegenerateGeometry {
        /// Why triangulation failed
        reason: String,
    },

    /// The stiffness solve broke down (singular or indefinite system, or a
    /// non-finite displacement). The stiffness matrix topology does not
    /// depend on node positions, so the driver's step halving cannot repair
    /// this; it aborts with the last good mesh instead.
    #[error("stiffness solve failed: {reason}")]
    SingularSystem {
        /// Solver diagnostic
        reason: String,
    },

    /// A step produced inverted triangles that recovery could not repair.
    #[error("{count} inverted triangles remained after displacement halving")]
    InvertedTriangle {
        /// Number of triangles with non-positive signed area
        count: usize,
    },
}

impl MeshError {
    /// Shorthand for configuration errors
    pub fn config(reason: impl Into<String>) -> Self {
        MeshError::Config {
            reason: reason.into(),
        }
    }
}
