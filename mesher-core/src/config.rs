//! Mesher configuration
//!
//! Every core-visible knob lives on [`MesherConfig`]; defaults follow the
//! reference parameterization (quality tolerance 0.6, mean quality 0.9,
//! bar-misfit tolerance 0.15, add/reject thresholds 1.4/0.6).

use crate::error::MeshError;
use crate::geometry::Rect;
use crate::guide::{GuideMesh, SizingField};
use serde::{Deserialize, Serialize};

/// How the desired edge length field is supplied
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Refinement {
    /// Constant desired edge length `h0` everywhere
    Regular,
    /// Desired edge length interpolated from a guide mesh
    GuideMesh(GuideMesh),
}

/// Type of linear solver for the spring systems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverType {
    /// Dense Cholesky factorization (small systems)
    Cholesky,
    /// Conjugate Gradient (default; the assembled systems are SPD)
    Cg,
}

/// Linear solver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Solver type to use
    pub solver_type: SolverType,
    /// Maximum CG iterations
    pub max_iterations: usize,
    /// Relative residual tolerance
    pub tolerance: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            solver_type: SolverType::Cg,
            max_iterations: 2000,
            tolerance: 1e-10,
        }
    }
}

/// Complete mesher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MesherConfig {
    /// Rectangular domain extents
    pub domain: Rect,
    /// Desired-length field source
    pub refinement: Refinement,
    /// Constant edge length (used only in regular mode)
    pub h0: f64,
    /// Maximum outer iterations
    pub itmax: usize,
    /// Per-triangle quality tolerance
    pub q_tol: f64,
    /// Mean quality tolerance
    pub mean_q_tol: f64,
    /// Bar-length misfit threshold separating density and smoothing phases
    pub mean_misfit_bar_length_tol: f64,
    /// Bars longer than `alpha_add · L0_bar` get a midpoint node inserted
    pub alpha_add: f64,
    /// Nodes whose every incident bar is shorter than `alpha_reject · L0_bar` are removed
    pub alpha_reject: f64,
    /// Global factor applied to per-bar rest lengths
    pub rest_length_scale: f64,
    /// Inject vertex-to-opposite-midpoint springs per interior triangle
    pub cross_bars_enabled: bool,
    /// Stiffness multiplier for cross-bars
    pub cross_bar_stiffness: f64,
    /// Add per-triangle outward pressure forces
    pub balloon_forces_enabled: bool,
    /// Coefficient for balloon forces
    pub balloon_coeff: f64,
    /// Bars/triangles per assembly batch (performance-only knob)
    pub assembly_block_size: usize,
    /// Linear solver configuration
    pub solver: SolverConfig,
}

impl Default for MesherConfig {
    fn default() -> Self {
        Self {
            domain: Rect::new(0.0, 1.0, 0.0, 1.0),
            refinement: Refinement::Regular,
            h0: 0.1,
            itmax: 10,
            q_tol: 0.60,
            mean_q_tol: 0.90,
            mean_misfit_bar_length_tol: 0.15,
            alpha_add: 1.4,
            alpha_reject: 0.6,
            rest_length_scale: 1.2,
            cross_bars_enabled: false,
            cross_bar_stiffness: 1.0,
            balloon_forces_enabled: false,
            balloon_coeff: 0.05,
            assembly_block_size: 256,
            solver: SolverConfig::default(),
        }
    }
}

impl MesherConfig {
    /// Regular (uniform spacing) configuration for a domain
    pub fn regular(domain: Rect, h0: f64) -> Self {
        Self {
            domain,
            refinement: Refinement::Regular,
            h0,
            ..Default::default()
        }
    }

    /// Guide-mesh driven configuration for a domain
    pub fn with_guide_mesh(domain: Rect, guide: GuideMesh) -> Self {
        Self {
            domain,
            refinement: Refinement::GuideMesh(guide),
            ..Default::default()
        }
    }

    /// The sizing field implied by the refinement mode
    pub fn sizing(&self) -> SizingField<'_> {
        match &self.refinement {
            Refinement::Regular => SizingField::Uniform(self.h0),
            Refinement::GuideMesh(guide) => SizingField::Guide(guide),
        }
    }

    /// Validate every knob; fatal configuration errors surface here
    pub fn validate(&self) -> Result<(), MeshError> {
        if !(self.domain.width() > 0.0 && self.domain.height() > 0.0) {
            return Err(MeshError::config(format!(
                "domain extents must be ordered and non-empty: x [{}, {}], y [{}, {}]",
                self.domain.x_min, self.domain.x_max, self.domain.y_min, self.domain.y_max
            )));
        }
        if !(self.q_tol > 0.0 && self.q_tol <= 1.0) {
            return Err(MeshError::config(format!(
                "q_tol must be in (0, 1], got {}",
                self.q_tol
            )));
        }
        if !(self.mean_q_tol > 0.0 && self.mean_q_tol <= 1.0) {
            return Err(MeshError::config(format!(
                "mean_q_tol must be in (0, 1], got {}",
                self.mean_q_tol
            )));
        }
        if self.mean_misfit_bar_length_tol <= 0.0 {
            return Err(MeshError::config(format!(
                "mean_misfit_bar_length_tol must be positive, got {}",
                self.mean_misfit_bar_length_tol
            )));
        }
        if matches!(self.refinement, Refinement::Regular) && self.h0 <= 0.0 {
            return Err(MeshError::config(format!(
                "h0 must be positive in regular mode, got {}",
                self.h0
            )));
        }
        if let Refinement::GuideMesh(guide) = &self.refinement {
            guide.validate()?;
        }
        if self.alpha_add <= self.alpha_reject {
            return Err(MeshError::config(format!(
                "alpha_add ({}) must exceed alpha_reject ({})",
                self.alpha_add, self.alpha_reject
            )));
        }
        if self.alpha_reject <= 0.0 {
            return Err(MeshError::config(format!(
                "alpha_reject must be positive, got {}",
                self.alpha_reject
            )));
        }
        if self.rest_length_scale <= 0.0 {
            return Err(MeshError::config(format!(
                "rest_length_scale must be positive, got {}",
                self.rest_length_scale
            )));
        }
        if self.cross_bar_stiffness < 0.0 || self.balloon_coeff < 0.0 {
            return Err(MeshError::config(
                "cross_bar_stiffness and balloon_coeff must be non-negative",
            ));
        }
        if self.itmax == 0 {
            return Err(MeshError::config("itmax must be at least 1"));
        }
        if self.assembly_block_size == 0 {
            return Err(MeshError::config("assembly_block_size must be at least 1"));
        }
        if self.solver.max_iterations == 0 || self.solver.tolerance <= 0.0 {
            return Err(MeshError::config(
                "solver max_iterations must be >= 1 and tolerance positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(MesherConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_q_tol() {
        let config = MesherConfig {
            q_tol: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_domain() {
        let config = MesherConfig {
            domain: Rect::new(1.0, 0.0, 0.0, 1.0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_h0_in_regular_mode() {
        let config = MesherConfig {
            h0: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_crossed_alphas() {
        let config = MesherConfig {
            alpha_add: 0.5,
            alpha_reject: 0.6,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
