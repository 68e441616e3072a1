//! Iteration driver
//!
//! Orchestrates the fixed-point loop: solve the spring system, pick the
//! density or smoothing sub-phase from the bar-length misfit, enforce the
//! monotone-progress discipline with snapshot rollback, and track convergence
//! metrics until the iteration cap or both quality tolerances are met.

use crate::assembly::{self, SpringOptions};
use crate::config::MesherConfig;
use crate::density;
use crate::error::MeshError;
use crate::geometry::{Point2, PointClass, signed_area};
use crate::guide::SizingField;
use crate::mesh::{Mesh, seed};
use crate::quality;
use crate::smooth;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Density sub-loop branches on the relative rms density mismatch at 0.40
const DENSITY_RATIO_SPLIT: f64 = 0.40;
/// A bar counts as badly misfit when `|rel_change| >= 50%`
const MISFIT_BAR_THRESHOLD: f64 = 0.5;
/// Cap on add/reject passes while the density ratio stays high
const DENSITY_PASS_CAP: usize = 8;
/// Cap on monotone sub-loop steps
const MONOTONE_CAP: usize = 16;

/// Cooperative cancellation flag, checked between iterations
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create an unset token
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; the driver stops at the next iteration boundary
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Convergence diagnostics for a finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvergenceReport {
    /// Both quality tolerances met
    pub converged: bool,
    /// Outer iterations performed
    pub iterations: usize,
    /// Minimum triangle quality of the returned mesh
    pub worst_quality: f64,
    /// Mean triangle quality of the returned mesh
    pub mean_quality: f64,
    /// Mean `|rel_change|` over the bars of the returned mesh
    pub mean_misfit_bar_length: f64,
}

/// Final mesh plus its convergence report
#[derive(Debug, Clone)]
pub struct MeshingOutcome {
    pub mesh: Mesh,
    pub report: ConvergenceReport,
}

/// Generate a mesh for the configured domain from scratch
pub fn generate(config: &MesherConfig) -> Result<MeshingOutcome, MeshError> {
    generate_with_cancel(config, &CancelToken::new())
}

/// Generate a mesh, checking a cancellation token between iterations
///
/// A cancelled run returns the mesh as of the last completed iteration; the
/// triangulation is always a valid Delaunay of the point set.
pub fn generate_with_cancel(
    config: &MesherConfig,
    cancel: &CancelToken,
) -> Result<MeshingOutcome, MeshError> {
    config.validate()?;

    let sizing = config.sizing();
    let (points, classes) = seed::initial_points(&config.domain, &sizing);
    let l0 = points.iter().map(|p| sizing.eval(p.x, p.y)).collect();
    let mesh = Mesh::from_points(points, classes, l0, config.rest_length_scale)?;
    log::info!(
        "seeded {} nodes ({} boundary)",
        mesh.num_points(),
        mesh.classes.iter().filter(|c| c.is_boundary()).count()
    );

    drive(mesh, config, cancel)
}

/// Run the driver on an existing mesh with the given settings
///
/// An already-converged mesh passes through with no position changes beyond
/// numerical noise and terminates after a single iteration.
pub fn refine(mesh: Mesh, config: &MesherConfig) -> Result<MeshingOutcome, MeshError> {
    config.validate()?;
    if mesh.l0.len() != mesh.num_points() || mesh.classes.len() != mesh.num_points() {
        return Err(MeshError::config(
            "mesh fields are inconsistent with its point count",
        ));
    }
    drive(mesh, config, &CancelToken::new())
}

/// Outcome of the solve step after the recovery ladder
enum StepStatus {
    Ok,
    /// Unrecoverable; the driver restores the iteration snapshot and stops
    Aborted,
}

fn drive(
    mut mesh: Mesh,
    config: &MesherConfig,
    cancel: &CancelToken,
) -> Result<MeshingOutcome, MeshError> {
    let sizing = config.sizing();
    let options = SpringOptions::from_config(config);

    mesh.refresh_connectivity()?;
    mesh.update_bar_lengths(config.rest_length_scale);
    mesh.update_qualities();

    // Pre-tolerance values just below tolerance so the loop enters
    let mut worst_q = config.q_tol - 1e-6;
    let mut mean_q = config.mean_q_tol - 1e-6;
    let mut iterations_used = 0;

    let mut iter = 1;
    while iter <= config.itmax && !(worst_q >= config.q_tol && mean_q >= config.mean_q_tol) {
        if cancel.is_cancelled() {
            log::info!("cancelled after {iterations_used} iterations");
            break;
        }

        let snapshot = mesh.clone();

        match solve_step(&mut mesh, &options, config)? {
            StepStatus::Ok => {}
            StepStatus::Aborted => {
                mesh = snapshot;
                break;
            }
        }

        // Keep `T` a valid Delaunay of `P` at every iteration boundary
        mesh.refresh_connectivity()?;
        mesh.update_bar_lengths(config.rest_length_scale);
        mesh.update_qualities();

        let mean_misfit = mesh.mean_misfit_bar_length();
        if mean_misfit >= config.mean_misfit_bar_length_tol {
            log::debug!("iteration {iter}: density phase (misfit {mean_misfit:.3})");
            density_phase(&mut mesh, config, &sizing)?;
        } else {
            log::debug!("iteration {iter}: smoothing phase (misfit {mean_misfit:.3})");
            smoothing_phase(&mut mesh, config)?;
        }

        let stats = quality::quality_stats(&mesh.qualities);
        worst_q = stats.worst;
        mean_q = stats.mean;
        iterations_used = iter;
        log::info!(
            "iteration {iter}: worst_q {worst_q:.3}, mean_q {mean_q:.3}, {} nodes",
            mesh.num_points()
        );
        iter += 1;
    }

    let stats = quality::quality_stats(&mesh.qualities);
    let report = ConvergenceReport {
        converged: stats.worst >= config.q_tol && stats.mean >= config.mean_q_tol,
        iterations: iterations_used,
        worst_quality: stats.worst,
        mean_quality: stats.mean,
        mean_misfit_bar_length: mesh.mean_misfit_bar_length(),
    };
    if !report.converged {
        log::warn!(
            "tolerances unmet after {} iterations: worst_q {:.3} (target {:.2}), mean_q {:.3} (target {:.2})",
            report.iterations,
            report.worst_quality,
            config.q_tol,
            report.mean_quality,
            config.mean_q_tol
        );
    }

    Ok(MeshingOutcome { mesh, report })
}

/// Solve for new positions with the recovery ladder: halve the implicit step
/// once on solver tolerance misses, halve interior displacement once on
/// inversions
///
/// A hard solver breakdown skips the halving: the stiffness matrix is the
/// bar-network Laplacian with unit stiffness per bar, so its entries do not
/// depend on node positions and re-solving from halved positions faces the
/// same singular system. The driver aborts with the last good mesh instead.
fn solve_step(
    mesh: &mut Mesh,
    options: &SpringOptions,
    config: &MesherConfig,
) -> Result<StepStatus, MeshError> {
    let old_points = mesh.points.clone();

    let mut result = match assembly::relax(mesh, options, &config.solver) {
        Ok(r) => r,
        Err(e) => {
            log::warn!("stiffness solve failed hard: {e}; aborting with last good mesh");
            return Ok(StepStatus::Aborted);
        }
    };

    if !result.solver_converged {
        log::warn!(
            "stiffness solve missed tolerance (residual {:.2e}); halving step and retrying",
            result.residual
        );
        mesh.points = halfway(&old_points, &result.positions, None);
        mesh.update_bar_lengths(config.rest_length_scale);

        result = match assembly::relax(mesh, options, &config.solver) {
            Ok(r) => r,
            Err(e) => {
                log::warn!("stiffness solve failed hard on retry: {e}");
                return Ok(StepStatus::Aborted);
            }
        };
        if !result.solver_converged {
            log::warn!(
                "stiffness solve failed twice (residual {:.2e}); aborting with last good mesh",
                result.residual
            );
            return Ok(StepStatus::Aborted);
        }
    }

    mesh.points = result.positions;

    let inverted = count_inverted(mesh);
    if inverted > 0 {
        log::warn!("solver step inverted {inverted} triangles; halving interior displacement");
        mesh.points = halfway(&old_points, &mesh.points, Some(&mesh.classes));
        let still_inverted = count_inverted(mesh);
        if still_inverted > 0 {
            let error = MeshError::InvertedTriangle {
                count: still_inverted,
            };
            log::warn!("{error}; aborting with last good mesh");
            return Ok(StepStatus::Aborted);
        }
    }

    Ok(StepStatus::Ok)
}

/// Midpoint between two position sets; when `classes` is given, only
/// interior nodes are halved and the rest keep their new position
fn halfway(old: &[Point2], new: &[Point2], classes: Option<&[PointClass]>) -> Vec<Point2> {
    old.iter()
        .zip(new)
        .enumerate()
        .map(|(i, (o, n))| {
            let halve = classes.map_or(true, |c| c[i] == PointClass::Interior);
            if halve { o.midpoint(n) } else { *n }
        })
        .collect()
}

/// Triangles with non-positive signed area under the current connectivity
fn count_inverted(mesh: &Mesh) -> usize {
    mesh.triangles
        .iter()
        .filter(|t| {
            signed_area(mesh.points[t[0]], mesh.points[t[1]], mesh.points[t[2]]) <= 0.0
        })
        .count()
}

/// Density phase: drain the rms density mismatch, then walk the misfit-bar
/// percentage down monotonically
fn density_phase(
    mesh: &mut Mesh,
    config: &MesherConfig,
    sizing: &SizingField,
) -> Result<(), MeshError> {
    let step = |m: &mut Mesh| {
        density::add_reject_pass(
            m,
            &config.domain,
            sizing,
            config.alpha_add,
            config.alpha_reject,
            config.rest_length_scale,
        )
    };

    let ratio = density_rms_ratio(mesh);
    if ratio > DENSITY_RATIO_SPLIT {
        let mut passes = 0;
        while density_rms_ratio(mesh) > DENSITY_RATIO_SPLIT && passes < DENSITY_PASS_CAP {
            let outcome = step(mesh)?;
            passes += 1;
            if !outcome.changed() {
                break;
            }
        }
        if passes == DENSITY_PASS_CAP {
            log::warn!("density ratio still above {DENSITY_RATIO_SPLIT} after {passes} passes");
        }
    } else {
        run_monotone(
            mesh,
            MONOTONE_CAP,
            |m| m.fraction_bars_misfit_above(MISFIT_BAR_THRESHOLD),
            |m| step(m).map(|_| ()),
            |_| false,
        )?;
    }
    Ok(())
}

/// Smoothing phase: walk the below-tolerance triangle percentage down
/// monotonically, exiting early once both quality targets hold
fn smoothing_phase(mesh: &mut Mesh, config: &MesherConfig) -> Result<(), MeshError> {
    let targets_met = |m: &Mesh| {
        let stats = quality::quality_stats(&m.qualities);
        stats.worst >= config.q_tol && stats.mean >= config.mean_q_tol
    };

    run_monotone(
        mesh,
        MONOTONE_CAP,
        |m| quality::fraction_below(&m.qualities, config.q_tol),
        |m| smooth::smooth_pass(m, config.rest_length_scale).map(|_| ()),
        targets_met,
    )
}

/// Run `step` while `metric` strictly decreases; on the first non-improvement
/// restore the pre-step snapshot and stop. `done` short-circuits the loop.
fn run_monotone<M, S, D>(
    mesh: &mut Mesh,
    cap: usize,
    metric: M,
    mut step: S,
    done: D,
) -> Result<(), MeshError>
where
    M: Fn(&Mesh) -> f64,
    S: FnMut(&mut Mesh) -> Result<(), MeshError>,
    D: Fn(&Mesh) -> bool,
{
    let mut previous = metric(mesh);
    for _ in 0..cap {
        if done(mesh) {
            break;
        }
        let before = mesh.clone();
        step(mesh)?;
        let current = metric(mesh);
        if current < previous {
            previous = current;
        } else {
            log::debug!("sub-loop metric did not improve ({previous:.4} -> {current:.4}); rolling back");
            *mesh = before;
            break;
        }
    }
    Ok(())
}

/// Relative mismatch of the rms nodal density `ρ = √2/L²` against the
/// desired `ρ₀ = √2/L0²`
fn density_rms_ratio(mesh: &Mesh) -> f64 {
    let incident = mesh.incident_bars();
    let sqrt2 = 2.0_f64.sqrt();

    let mut rho_sq_sum = 0.0;
    let mut rho0_sq_sum = 0.0;
    let mut count = 0usize;

    for node in 0..mesh.num_points() {
        if incident[node].is_empty() {
            continue;
        }
        let mean_len = incident[node]
            .iter()
            .map(|&bi| mesh.bar_lengths[bi])
            .sum::<f64>()
            / incident[node].len() as f64;
        if mean_len <= f64::EPSILON {
            continue;
        }
        let rho = sqrt2 / (mean_len * mean_len);
        let rho0 = sqrt2 / (mesh.l0[node] * mesh.l0[node]);
        rho_sq_sum += rho * rho;
        rho0_sq_sum += rho0 * rho0;
        count += 1;
    }

    if count == 0 {
        return 0.0;
    }
    let rms = (rho_sq_sum / count as f64).sqrt();
    let rms0 = (rho0_sq_sum / count as f64).sqrt();
    if rms <= f64::EPSILON {
        0.0
    } else {
        (rms - rms0).abs() / rms
    }
}
