//! Interior smoothing
//!
//! One Laplacian sweep per call: each interior node is repositioned to the
//! centroid of its neighbors weighted by inverse bar rest length. Moves that
//! would invert an incident triangle are rolled back node-by-node; the sweep
//! ends with a Delaunay refresh.

use crate::error::MeshError;
use crate::geometry::{Point2, PointClass, signed_area};
use crate::mesh::Mesh;

/// Result of one smoothing sweep
#[derive(Debug, Clone, Copy, Default)]
pub struct SmoothOutcome {
    /// Nodes that moved
    pub moved: usize,
    /// Nodes whose move was rejected for inverting a triangle
    pub rolled_back: usize,
}

/// Would placing `node` at `candidate` invert any of its incident triangles?
fn inverts_incident(
    points: &[Point2],
    triangles: &[[usize; 3]],
    incident: &[usize],
    node: usize,
    candidate: Point2,
) -> bool {
    incident.iter().any(|&ti| {
        let tri = triangles[ti];
        let at = |v: usize| if v == node { candidate } else { points[v] };
        signed_area(at(tri[0]), at(tri[1]), at(tri[2])) <= 0.0
    })
}

/// Apply a single weighted-Laplacian sweep over the interior nodes
pub fn smooth_pass(mesh: &mut Mesh, rest_length_scale: f64) -> Result<SmoothOutcome, MeshError> {
    let incident_bars = mesh.incident_bars();
    let incident_triangles = mesh.incident_triangles();
    let mut outcome = SmoothOutcome::default();

    for node in 0..mesh.num_points() {
        if mesh.classes[node] != PointClass::Interior {
            continue;
        }
        if incident_bars[node].is_empty() {
            continue;
        }

        let mut weight_sum = 0.0;
        let mut cx = 0.0;
        let mut cy = 0.0;
        for &bi in &incident_bars[node] {
            let [a, b] = mesh.bars[bi];
            let other = if a == node { b } else { a };
            let w = 1.0 / mesh.bar_rest_lengths[bi];
            weight_sum += w;
            cx += w * mesh.points[other].x;
            cy += w * mesh.points[other].y;
        }
        let candidate = Point2::new(cx / weight_sum, cy / weight_sum);

        if inverts_incident(
            &mesh.points,
            &mesh.triangles,
            &incident_triangles[node],
            node,
            candidate,
        ) {
            outcome.rolled_back += 1;
            continue;
        }

        mesh.points[node] = candidate;
        outcome.moved += 1;
    }

    mesh.refresh_connectivity()?;
    mesh.update_bar_lengths(rest_length_scale);
    mesh.update_qualities();

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;

    fn nine_point_mesh(center: Point2) -> Mesh {
        let domain = Rect::new(0.0, 1.0, 0.0, 1.0);
        let mut points = domain.corners().to_vec();
        let mut classes = vec![PointClass::Corner; 4];
        points.extend([
            Point2::new(0.5, 0.0),
            Point2::new(1.0, 0.5),
            Point2::new(0.5, 1.0),
            Point2::new(0.0, 0.5),
        ]);
        classes.extend([
            PointClass::Bottom,
            PointClass::Right,
            PointClass::Top,
            PointClass::Left,
        ]);
        points.push(center);
        classes.push(PointClass::Interior);

        let n = points.len();
        Mesh::from_points(points, classes, vec![0.5; n], 1.0).unwrap()
    }

    #[test]
    fn test_smooth_centers_perturbed_node() {
        let mut mesh = nine_point_mesh(Point2::new(0.55, 0.45));
        let outcome = smooth_pass(&mut mesh, 1.0).unwrap();

        assert_eq!(outcome.moved, 1);
        assert_eq!(outcome.rolled_back, 0);
        let center = Point2::new(0.5, 0.5);
        let node = mesh
            .classes
            .iter()
            .position(|&c| c == PointClass::Interior)
            .unwrap();
        let before = Point2::new(0.55, 0.45).distance(&center);
        assert!(mesh.points[node].distance(&center) < before);
    }

    #[test]
    fn test_smooth_leaves_boundary_untouched() {
        let mut mesh = nine_point_mesh(Point2::new(0.55, 0.6));
        let before: Vec<Point2> = mesh.points.clone();
        smooth_pass(&mut mesh, 1.0).unwrap();

        for (i, class) in mesh.classes.iter().enumerate() {
            if class.is_boundary() {
                assert_eq!(mesh.points[i].x, before[i].x);
                assert_eq!(mesh.points[i].y, before[i].y);
            }
        }
    }

    #[test]
    fn test_inversion_detection() {
        let mesh = nine_point_mesh(Point2::new(0.5, 0.5));
        let node = mesh
            .classes
            .iter()
            .position(|&c| c == PointClass::Interior)
            .unwrap();
        let incident = mesh.incident_triangles();

        // Moving the hub outside the square flips its fan
        assert!(inverts_incident(
            &mesh.points,
            &mesh.triangles,
            &incident[node],
            node,
            Point2::new(2.0, 2.0),
        ));
        // Staying near the center keeps every triangle positive
        assert!(!inverts_incident(
            &mesh.points,
            &mesh.triangles,
            &incident[node],
            node,
            Point2::new(0.52, 0.48),
        ));
    }

    #[test]
    fn test_smooth_preserves_positive_areas() {
        let mut mesh = nine_point_mesh(Point2::new(0.7, 0.3));
        smooth_pass(&mut mesh, 1.0).unwrap();

        for t in &mesh.triangles {
            let area = signed_area(mesh.points[t[0]], mesh.points[t[1]], mesh.points[t[2]]);
            assert!(area > 0.0);
        }
    }
}
