//! Spring system assembly and relaxation step
//!
//! Per-bar contributions enter the stiffness matrix as ±1 blocks on the two
//! endpoint DOF pairs (the graph Laplacian of the bar network, one block per
//! axis), and the force vector carries `(L - L0_bar)` along the bar
//! direction. The solution of `K·Δp = f` is the displacement toward the
//! equilibrium of a truss whose rest configuration is the target.
//!
//! Contributions are accumulated in fixed-size batches before being
//! scattered serially into the global triplet set; batch size only affects
//! cache behavior, never the result. With the `parallel` feature the batches
//! are computed under rayon and scattered in deterministic batch order.

use crate::config::{MesherConfig, SolverConfig, SolverType};
use crate::error::MeshError;
use crate::geometry::{Point2, PointClass, signed_area};
use crate::mesh::{Mesh, bars};
use ndarray::Array1;
use solvers::{CgConfig, CsrMatrix, cg, cholesky_solve};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Bars shorter than this are treated as directionless (no force)
const MIN_BAR_LENGTH: f64 = 1e-14;

/// Assembler options; toggles rather than subclasses
#[derive(Debug, Clone, Copy)]
pub struct SpringOptions {
    /// Inject vertex-to-opposite-midpoint springs for interior triangles
    pub cross_bars: bool,
    /// Stiffness multiplier for cross-bars
    pub cross_bar_stiffness: f64,
    /// Add per-triangle pressure forces against near-collinear collapse
    pub balloon_forces: bool,
    /// Balloon force coefficient
    pub balloon_coeff: f64,
    /// Elements per assembly batch
    pub block_size: usize,
}

impl Default for SpringOptions {
    fn default() -> Self {
        Self {
            cross_bars: false,
            cross_bar_stiffness: 1.0,
            balloon_forces: false,
            balloon_coeff: 0.05,
            block_size: 256,
        }
    }
}

impl SpringOptions {
    /// Extract the assembler options from a mesher configuration
    pub fn from_config(config: &MesherConfig) -> Self {
        Self {
            cross_bars: config.cross_bars_enabled,
            cross_bar_stiffness: config.cross_bar_stiffness,
            balloon_forces: config.balloon_forces_enabled,
            balloon_coeff: config.balloon_coeff,
            block_size: config.assembly_block_size,
        }
    }
}

/// Result of one relaxation step
#[derive(Debug, Clone)]
pub struct RelaxResult {
    /// Updated node positions (pinned coordinates unchanged exactly)
    pub positions: Vec<Point2>,
    /// Whether the linear solver met its tolerance
    pub solver_converged: bool,
    /// Final relative residual of the solve
    pub residual: f64,
}

/// Contributions of one assembly batch: stiffness triplets and force entries
type Batch = (Vec<(usize, usize, f64)>, Vec<(usize, f64)>);

/// Solve the spring system for updated node positions
///
/// Returns `Err` only on hard failures (non-finite displacement, direct
/// solver breakdown). An unconverged CG solve is reported through
/// [`RelaxResult::solver_converged`] so the driver can halve the step and
/// retry.
pub fn relax(
    mesh: &Mesh,
    options: &SpringOptions,
    solver: &SolverConfig,
) -> Result<RelaxResult, MeshError> {
    let n = mesh.num_points();
    let ndof = 2 * n;

    let mut triplets: Vec<(usize, usize, f64)> = Vec::with_capacity(8 * mesh.num_bars());
    let mut rhs = Array1::<f64>::zeros(ndof);

    // Bar springs
    let bar_batches = assemble_batches(
        mesh.bars.len(),
        options.block_size,
        |range| bar_batch(mesh, range),
    );
    scatter(&mut triplets, &mut rhs, bar_batches);

    // Optional cross-bars over interior triangles
    if options.cross_bars {
        let kappa = options.cross_bar_stiffness;
        let cross_batches = assemble_batches(
            mesh.triangles.len(),
            options.block_size,
            |range| cross_bar_batch(mesh, range, kappa),
        );
        scatter(&mut triplets, &mut rhs, cross_batches);
    }

    // Optional balloon forces (right-hand side only)
    if options.balloon_forces {
        let coeff = options.balloon_coeff;
        let balloon_batches = assemble_batches(
            mesh.triangles.len(),
            options.block_size,
            |range| (Vec::new(), balloon_batch(mesh, range, coeff)),
        );
        scatter(&mut triplets, &mut rhs, balloon_batches);
    }

    // Boundary constraints: strike pinned DOF rows/columns to an identity
    // diagonal with zero right-hand side (constrained displacement is zero)
    let pinned = pinned_dofs(&mesh.classes);
    triplets.retain(|&(r, c, _)| !pinned[r] && !pinned[c]);
    for (dof, &is_pinned) in pinned.iter().enumerate() {
        if is_pinned {
            triplets.push((dof, dof, 1.0));
            rhs[dof] = 0.0;
        }
    }

    let matrix = CsrMatrix::from_triplets(ndof, ndof, triplets);

    let (mut displacement, solver_converged, residual) = match solver.solver_type {
        SolverType::Cg => {
            let config = CgConfig {
                max_iterations: solver.max_iterations,
                tolerance: solver.tolerance,
                print_interval: 0,
            };
            let solution = cg(&matrix, &rhs, &config);
            (solution.x, solution.converged, solution.residual)
        }
        SolverType::Cholesky => {
            let dense = matrix.to_dense();
            let x = cholesky_solve(&dense, &rhs).map_err(|e| MeshError::SingularSystem {
                reason: e.to_string(),
            })?;
            (x, true, 0.0)
        }
    };

    if displacement.iter().any(|d| !d.is_finite()) {
        return Err(MeshError::SingularSystem {
            reason: "non-finite displacement".to_string(),
        });
    }

    // Pinned DOFs must not move at all, not even by solver round-off
    for (dof, &is_pinned) in pinned.iter().enumerate() {
        if is_pinned {
            displacement[dof] = 0.0;
        }
    }

    let positions = mesh
        .points
        .iter()
        .enumerate()
        .map(|(i, p)| Point2::new(p.x + displacement[2 * i], p.y + displacement[2 * i + 1]))
        .collect();

    Ok(RelaxResult {
        positions,
        solver_converged,
        residual,
    })
}

/// Pinned DOF mask over interleaved (x, y) DOFs
fn pinned_dofs(classes: &[PointClass]) -> Vec<bool> {
    let mut pinned = vec![false; 2 * classes.len()];
    for (i, class) in classes.iter().enumerate() {
        if class.pins_x() {
            pinned[2 * i] = true;
        }
        if class.pins_y() {
            pinned[2 * i + 1] = true;
        }
    }
    pinned
}

/// Run a batch kernel over `0..count` in blocks, in parallel when available.
/// The returned batches are in deterministic block order.
fn assemble_batches<F>(count: usize, block_size: usize, kernel: F) -> Vec<Batch>
where
    F: Fn(std::ops::Range<usize>) -> Batch + Send + Sync,
{
    let block_size = block_size.max(1);
    let ranges: Vec<std::ops::Range<usize>> = (0..count)
        .step_by(block_size)
        .map(|start| start..(start + block_size).min(count))
        .collect();

    #[cfg(feature = "parallel")]
    {
        if count >= 4 * block_size {
            return ranges.into_par_iter().map(kernel).collect();
        }
    }

    ranges.into_iter().map(kernel).collect()
}

/// Serial scatter of batch contributions into the global assembly
fn scatter(triplets: &mut Vec<(usize, usize, f64)>, rhs: &mut Array1<f64>, batches: Vec<Batch>) {
    for (batch_triplets, batch_forces) in batches {
        triplets.extend(batch_triplets);
        for (dof, value) in batch_forces {
            rhs[dof] += value;
        }
    }
}

/// Axial spring contributions for a block of bars
fn bar_batch(mesh: &Mesh, range: std::ops::Range<usize>) -> Batch {
    let mut triplets = Vec::with_capacity(8 * range.len());
    let mut forces = Vec::with_capacity(4 * range.len());

    for bi in range {
        let [a, b] = mesh.bars[bi];
        let length = mesh.bar_lengths[bi];
        let rest = mesh.bar_rest_lengths[bi];

        // Unit stiffness per bar; one Laplacian block per axis
        for d in 0..2 {
            triplets.push((2 * a + d, 2 * a + d, 1.0));
            triplets.push((2 * b + d, 2 * b + d, 1.0));
            triplets.push((2 * a + d, 2 * b + d, -1.0));
            triplets.push((2 * b + d, 2 * a + d, -1.0));
        }

        if length > MIN_BAR_LENGTH {
            let misfit = length - rest;
            let pa = mesh.points[a];
            let pb = mesh.points[b];
            let dir_x = (pb.x - pa.x) / length;
            let dir_y = (pb.y - pa.y) / length;
            // A stretched bar pulls its endpoints together
            forces.push((2 * a, misfit * dir_x));
            forces.push((2 * a + 1, misfit * dir_y));
            forces.push((2 * b, -misfit * dir_x));
            forces.push((2 * b + 1, -misfit * dir_y));
        }
    }

    (triplets, forces)
}

/// Cross-bar contributions for a block of triangles
///
/// Each interior triangle gets three virtual springs from a vertex to the
/// midpoint of the opposite edge, expressed through the vertex weights
/// `(1, -1/2, -1/2)`; the stiffness contribution is the Gram matrix of that
/// weight vector, one block per axis.
fn cross_bar_batch(mesh: &Mesh, range: std::ops::Range<usize>, kappa: f64) -> Batch {
    let mut triplets = Vec::new();
    let mut forces = Vec::new();

    for ti in range {
        let tri = mesh.triangles[ti];
        if tri.iter().any(|&v| mesh.classes[v].is_boundary()) {
            continue;
        }

        // Rest length: vertex-to-opposite-midpoint distance of the
        // equilateral triangle with the element's mean bar rest length
        let mut rest_sum = 0.0;
        for (a, b) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
            match bars::bar_index(&mesh.bars, a, b) {
                Some(bi) => rest_sum += mesh.bar_rest_lengths[bi],
                None => continue,
            }
        }
        let rest = 3.0_f64.sqrt() / 2.0 * rest_sum / 3.0;

        for k in 0..3 {
            let i = tri[k];
            let j = tri[(k + 1) % 3];
            let l = tri[(k + 2) % 3];
            let weights = [(i, 1.0), (j, -0.5), (l, -0.5)];

            for &(u, wu) in &weights {
                for &(v, wv) in &weights {
                    for d in 0..2 {
                        triplets.push((2 * u + d, 2 * v + d, kappa * wu * wv));
                    }
                }
            }

            let mid = mesh.points[j].midpoint(&mesh.points[l]);
            let dx = mid.x - mesh.points[i].x;
            let dy = mid.y - mesh.points[i].y;
            let len = (dx * dx + dy * dy).sqrt();
            if len > MIN_BAR_LENGTH {
                let misfit = kappa * (len - rest);
                let dir = [dx / len, dy / len];
                for &(u, wu) in &weights {
                    for d in 0..2 {
                        forces.push((2 * u + d, misfit * dir[d] * wu));
                    }
                }
            }
        }
    }

    (triplets, forces)
}

/// Balloon force contributions for a block of triangles
///
/// Outward force on each vertex proportional to `(L0_target² - A)` along the
/// inward normal of the opposite edge.
fn balloon_batch(mesh: &Mesh, range: std::ops::Range<usize>, coeff: f64) -> Vec<(usize, f64)> {
    let mut forces = Vec::new();

    for ti in range {
        let tri = mesh.triangles[ti];
        let area = signed_area(
            mesh.points[tri[0]],
            mesh.points[tri[1]],
            mesh.points[tri[2]],
        );
        let l0_target = (mesh.l0[tri[0]] + mesh.l0[tri[1]] + mesh.l0[tri[2]]) / 3.0;
        let magnitude = coeff * (l0_target * l0_target - area);

        for k in 0..3 {
            let i = tri[k];
            let j = tri[(k + 1) % 3];
            let l = tri[(k + 2) % 3];

            // Normal of the opposite edge, oriented toward the vertex
            let ex = mesh.points[l].x - mesh.points[j].x;
            let ey = mesh.points[l].y - mesh.points[j].y;
            let elen = (ex * ex + ey * ey).sqrt();
            if elen <= MIN_BAR_LENGTH {
                continue;
            }
            let mut nx = -ey / elen;
            let mut ny = ex / elen;
            let to_vertex_x = mesh.points[i].x - mesh.points[j].x;
            let to_vertex_y = mesh.points[i].y - mesh.points[j].y;
            if nx * to_vertex_x + ny * to_vertex_y < 0.0 {
                nx = -nx;
                ny = -ny;
            }

            forces.push((2 * i, magnitude * nx));
            forces.push((2 * i + 1, magnitude * ny));
        }
    }

    forces
}
