//! Density controller: node insertion and rejection
//!
//! Drives actual nodal density toward the desired density. Nodes whose every
//! incident bar is strongly compressed are deleted (most-compressed first,
//! neighbors masked within a pass to avoid cascading collapse); bars that are
//! strongly stretched get a midpoint node inserted. Both candidate sets are
//! computed from the same post-solve state; a stretched bar cannot end at a
//! fully-compressed node, so insertions never reference deleted endpoints.

use crate::error::MeshError;
use crate::geometry::{Point2, PointClass, Rect};
use crate::guide::SizingField;
use crate::mesh::Mesh;

/// Coordinate tolerance when matching corner nodes to a side
const SIDE_TOL: f64 = 1e-12;

/// Result of one add/reject pass
#[derive(Debug, Clone, Copy, Default)]
pub struct DensityOutcome {
    /// Midpoint nodes inserted
    pub added: usize,
    /// Interior nodes removed
    pub removed: usize,
}

impl DensityOutcome {
    /// Whether the pass changed the point set
    pub fn changed(&self) -> bool {
        self.added + self.removed > 0
    }
}

/// Whether a node of the given class sits on a side of the domain
fn on_side(class: PointClass, p: &Point2, side: PointClass, domain: &Rect) -> bool {
    if class == side {
        return true;
    }
    if class != PointClass::Corner {
        return false;
    }
    match side {
        PointClass::Bottom => (p.y - domain.y_min).abs() < SIDE_TOL,
        PointClass::Top => (p.y - domain.y_max).abs() < SIDE_TOL,
        PointClass::Left => (p.x - domain.x_min).abs() < SIDE_TOL,
        PointClass::Right => (p.x - domain.x_max).abs() < SIDE_TOL,
        _ => false,
    }
}

/// Class of a node inserted at the midpoint of bar (a, b)
///
/// A bar whose endpoints share a domain side produces a boundary node on that
/// side; every other bar produces an interior node.
fn midpoint_class(mesh: &Mesh, a: usize, b: usize, domain: &Rect) -> PointClass {
    for side in [
        PointClass::Bottom,
        PointClass::Top,
        PointClass::Left,
        PointClass::Right,
    ] {
        if on_side(mesh.classes[a], &mesh.points[a], side, domain)
            && on_side(mesh.classes[b], &mesh.points[b], side, domain)
        {
            return side;
        }
    }
    PointClass::Interior
}

/// One add/reject pass over the mesh
///
/// Re-triangulates and refreshes the derived fields whenever the point set
/// changed.
pub fn add_reject_pass(
    mesh: &mut Mesh,
    domain: &Rect,
    sizing: &SizingField,
    alpha_add: f64,
    alpha_reject: f64,
    rest_length_scale: f64,
) -> Result<DensityOutcome, MeshError> {
    let mut outcome = DensityOutcome::default();

    // Rejection candidates: interior nodes with every incident bar compressed
    let incident = mesh.incident_bars();
    let mut candidates: Vec<(usize, f64)> = Vec::new();
    for node in 0..mesh.num_points() {
        if mesh.classes[node] != PointClass::Interior || incident[node].is_empty() {
            continue;
        }
        let all_compressed = incident[node]
            .iter()
            .all(|&bi| mesh.bar_lengths[bi] < alpha_reject * mesh.bar_rest_lengths[bi]);
        if all_compressed {
            let mean_ratio = incident[node]
                .iter()
                .map(|&bi| mesh.bar_lengths[bi] / mesh.bar_rest_lengths[bi])
                .sum::<f64>()
                / incident[node].len() as f64;
            candidates.push((node, mean_ratio));
        }
    }

    // Most compressed first; ties broken by index for determinism
    candidates.sort_by(|x, y| {
        x.1.partial_cmp(&y.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(x.0.cmp(&y.0))
    });

    let neighbors = mesh.node_neighbors();
    let mut masked = vec![false; mesh.num_points()];
    let mut to_delete: Vec<usize> = Vec::new();
    for &(node, _) in &candidates {
        if masked[node] {
            continue;
        }
        to_delete.push(node);
        masked[node] = true;
        for &nb in &neighbors[node] {
            masked[nb] = true;
        }
    }

    // Insertion candidates: midpoints of strongly stretched bars
    let mut insertions: Vec<(Point2, PointClass)> = Vec::new();
    for (bi, &[a, b]) in mesh.bars.iter().enumerate() {
        if mesh.bar_lengths[bi] <= alpha_add * mesh.bar_rest_lengths[bi] {
            continue;
        }
        let mid = mesh.points[a].midpoint(&mesh.points[b]);
        // Two long bars may suggest near-identical points
        let spacing = sizing.eval(mid.x, mid.y);
        let duplicate = insertions
            .iter()
            .any(|(existing, _)| existing.distance(&mid) < 0.5 * spacing);
        if duplicate {
            continue;
        }
        insertions.push((mid, midpoint_class(mesh, a, b, domain)));
    }

    // Apply deletions (descending order keeps swap_remove indices valid)
    to_delete.sort_unstable_by(|x, y| y.cmp(x));
    for node in to_delete {
        mesh.points.swap_remove(node);
        mesh.classes.swap_remove(node);
        mesh.l0.swap_remove(node);
        outcome.removed += 1;
    }

    // Apply insertions; desired length comes from the sizing field
    for (p, class) in insertions {
        mesh.l0.push(sizing.eval(p.x, p.y));
        mesh.points.push(p);
        mesh.classes.push(class);
        outcome.added += 1;
    }

    if outcome.changed() {
        mesh.refresh_connectivity()?;
        mesh.update_bar_lengths(rest_length_scale);
        mesh.update_qualities();
        log::debug!(
            "density pass: added {}, removed {}, {} nodes total",
            outcome.added,
            outcome.removed,
            mesh.num_points()
        );
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;

    fn unit() -> Rect {
        Rect::new(0.0, 1.0, 0.0, 1.0)
    }

    /// Unit square corners with a constant desired length
    fn corner_mesh(l0: f64) -> Mesh {
        let domain = unit();
        Mesh::from_points(
            domain.corners().to_vec(),
            vec![PointClass::Corner; 4],
            vec![l0; 4],
            1.0,
        )
        .unwrap()
    }

    #[test]
    fn test_stretched_bars_gain_midpoints() {
        // Desired length far below the actual edge lengths: every bar is
        // stretched past alpha_add and receives a midpoint
        let mut mesh = corner_mesh(0.4);
        let before = mesh.num_points();

        let outcome =
            add_reject_pass(&mut mesh, &unit(), &SizingField::Uniform(0.4), 1.4, 0.6, 1.0)
                .unwrap();

        assert!(outcome.added > 0);
        assert_eq!(outcome.removed, 0);
        assert_eq!(mesh.num_points(), before + outcome.added);
    }

    #[test]
    fn test_boundary_bar_midpoint_is_boundary_node() {
        let mut mesh = corner_mesh(0.4);
        add_reject_pass(&mut mesh, &unit(), &SizingField::Uniform(0.4), 1.4, 0.6, 1.0).unwrap();

        // The bottom edge connects two corners; its midpoint must be a
        // Bottom node sitting exactly on the extent
        let bottom = mesh
            .points
            .iter()
            .zip(&mesh.classes)
            .find(|(p, &c)| c == PointClass::Bottom && p.y == 0.0);
        assert!(bottom.is_some(), "expected a Bottom node at y = 0");
    }

    #[test]
    fn test_compressed_interior_node_is_removed() {
        // Two interior nodes huddled at the center with a huge desired
        // length: both are rejection candidates, the mask keeps one alive
        let domain = unit();
        let mut points = domain.corners().to_vec();
        let mut classes = vec![PointClass::Corner; 4];
        points.push(Point2::new(0.5, 0.5));
        points.push(Point2::new(0.52, 0.5));
        classes.push(PointClass::Interior);
        classes.push(PointClass::Interior);

        let mut mesh = Mesh::from_points(points, classes, vec![2.0; 6], 1.0).unwrap();
        let outcome =
            add_reject_pass(&mut mesh, &domain, &SizingField::Uniform(2.0), 1.4, 0.6, 1.0)
                .unwrap();

        assert_eq!(outcome.removed, 1, "neighbor masking keeps one node");
        assert_eq!(
            mesh.classes
                .iter()
                .filter(|&&c| c == PointClass::Interior)
                .count(),
            1
        );
    }

    #[test]
    fn test_never_removes_boundary_nodes() {
        // Desired length far above the actual edges: everything is
        // compressed, but only interior nodes are rejection candidates
        let domain = unit();
        let mut points = domain.corners().to_vec();
        let mut classes = vec![PointClass::Corner; 4];
        points.push(Point2::new(0.5, 0.0));
        classes.push(PointClass::Bottom);

        let mut mesh = Mesh::from_points(points, classes, vec![5.0; 5], 1.0).unwrap();
        let before = mesh.num_points();
        let outcome =
            add_reject_pass(&mut mesh, &domain, &SizingField::Uniform(5.0), 1.4, 0.6, 1.0)
                .unwrap();

        assert_eq!(outcome.removed, 0);
        assert_eq!(mesh.num_points(), before);
    }

    #[test]
    fn test_quiet_mesh_is_left_alone() {
        // Desired length matching the geometry: no candidates either way
        let domain = unit();
        let mut points = domain.corners().to_vec();
        let mut classes = vec![PointClass::Corner; 4];
        points.push(Point2::new(0.5, 0.5));
        classes.push(PointClass::Interior);

        let mut mesh = Mesh::from_points(points, classes, vec![0.8; 5], 1.0).unwrap();
        let before = mesh.clone();
        let outcome =
            add_reject_pass(&mut mesh, &domain, &SizingField::Uniform(0.8), 1.4, 0.6, 1.0)
                .unwrap();

        assert!(!outcome.changed());
        assert_eq!(mesh, before);
    }
}
