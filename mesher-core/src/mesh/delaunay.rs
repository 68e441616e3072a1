//! Delaunay triangulation primitive
//!
//! Thin wrapper over `spade` so the rest of the core sees only
//! `delaunay(&[Point2]) -> Vec<[usize; 3]>`. Output triangles are CCW triples
//! of input indices, rotated so the smallest index comes first for stable
//! cross-iteration comparisons.

use crate::error::MeshError;
use crate::geometry::{Point2, signed_area};
use spade::{DelaunayTriangulation, Point2 as SpadePoint, Triangulation};

/// Triangulate a point set
///
/// Every non-collinear input point appears in at least one triangle. Fails
/// with [`MeshError::DegenerateGeometry`] when fewer than three points are
/// given, a coordinate is not finite, or all points are collinear.
pub fn delaunay(points: &[Point2]) -> Result<Vec<[usize; 3]>, MeshError> {
    if points.len() < 3 {
        return Err(MeshError::DegenerateGeometry {
            reason: format!("need at least 3 points, got {}", points.len()),
        });
    }

    let mut triangulation: DelaunayTriangulation<SpadePoint<f64>> = DelaunayTriangulation::new();
    let mut vertex_to_input: Vec<usize> = Vec::with_capacity(points.len());

    for (i, p) in points.iter().enumerate() {
        let handle = triangulation
            .insert(SpadePoint::new(p.x, p.y))
            .map_err(|e| MeshError::DegenerateGeometry {
                reason: format!("invalid coordinate at node {i}: {e:?}"),
            })?;
        // Coincident points return the existing vertex; keep the first mapping
        let idx = handle.index();
        if idx == vertex_to_input.len() {
            vertex_to_input.push(i);
        }
    }

    let mut triangles = Vec::with_capacity(triangulation.num_inner_faces());
    for face in triangulation.inner_faces() {
        let [va, vb, vc] = face.vertices();
        let mut tri = [
            vertex_to_input[va.fix().index()],
            vertex_to_input[vb.fix().index()],
            vertex_to_input[vc.fix().index()],
        ];
        // spade emits CCW faces; re-check to guard the orientation invariant
        if signed_area(points[tri[0]], points[tri[1]], points[tri[2]]) < 0.0 {
            tri.swap(1, 2);
        }
        // Rotate the smallest index to the front, preserving orientation
        let min_pos = (0..3).min_by_key(|&k| tri[k]).unwrap_or(0);
        tri.rotate_left(min_pos);
        triangles.push(tri);
    }

    if triangles.is_empty() {
        return Err(MeshError::DegenerateGeometry {
            reason: "all points are collinear".to_string(),
        });
    }

    triangles.sort_unstable();
    Ok(triangles)
}
