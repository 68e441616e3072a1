//! Guide mesh carrying the desired edge length field
//!
//! A guide mesh is a small static triangulation over (x, y) with a scalar
//! desired length per vertex. The core only reads it through
//! [`GuideMesh::interpolate`]: locate the containing triangle, weight the
//! vertex values barycentrically. Guide meshes are tiny, so point location is
//! a plain scan over the triangles; queries outside the convex hull clamp to
//! the nearest triangle.

use crate::error::MeshError;
use crate::geometry::{Point2, Rect, barycentric};
use crate::mesh::delaunay;
use serde::{Deserialize, Serialize};

/// Static triangulation with a desired length per vertex
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuideMesh {
    /// Vertex coordinates
    vertices: Vec<Point2>,
    /// Triangles as CCW triples of vertex indices
    triangles: Vec<[usize; 3]>,
    /// Desired edge length at each vertex (strictly positive)
    l0: Vec<f64>,
}

impl GuideMesh {
    /// Build a guide mesh by Delaunay triangulation of tagged vertices
    pub fn new(vertices: Vec<Point2>, l0: Vec<f64>) -> Result<Self, MeshError> {
        if vertices.len() != l0.len() {
            return Err(MeshError::config(format!(
                "guide mesh has {} vertices but {} length values",
                vertices.len(),
                l0.len()
            )));
        }
        let triangles = delaunay::delaunay(&vertices)?;
        let guide = Self {
            vertices,
            triangles,
            l0,
        };
        guide.validate()?;
        Ok(guide)
    }

    /// Uniform guide mesh over a rectangle: the degenerate case where every
    /// vertex carries the same desired length
    pub fn uniform(domain: Rect, l0: f64) -> Result<Self, MeshError> {
        let corners = domain.corners().to_vec();
        Self::new(corners, vec![l0; 4])
    }

    /// Rectangular guide mesh from explicit coarse / transition / refined
    /// zone corner points
    ///
    /// The refined `window` carries `l0_ref`; the `transition` ring around it
    /// and the domain corners carry `l0_coarse`, so the interpolated field is
    /// C⁰ across the coarse/transition interface and grades linearly between
    /// the transition ring and the window.
    pub fn rectangular(
        domain: Rect,
        transition: Rect,
        window: Rect,
        l0_coarse: f64,
        l0_ref: f64,
    ) -> Result<Self, MeshError> {
        if !domain.contains_rect(&transition) || !transition.contains_rect(&window) {
            return Err(MeshError::config(
                "guide mesh zones must nest: window within transition within domain",
            ));
        }

        let mut vertices = Vec::with_capacity(12);
        let mut l0 = Vec::with_capacity(12);

        // Coarse zone: domain corners
        for corner in domain.corners() {
            vertices.push(corner);
            l0.push(l0_coarse);
        }
        // Transition zone corners keep the coarse length
        for corner in transition.corners() {
            vertices.push(corner);
            l0.push(l0_coarse);
        }
        // Refined zone corners
        for corner in window.corners() {
            vertices.push(corner);
            l0.push(l0_ref);
        }

        Self::new(vertices, l0)
    }

    /// Interpolated desired length at (x, y)
    ///
    /// Scans the triangles for one containing the query point; outside the
    /// convex hull, the least-exterior triangle is used with its barycentric
    /// weights clamped to [0, 1] and renormalized.
    pub fn interpolate(&self, x: f64, y: f64) -> f64 {
        let p = Point2::new(x, y);

        let mut best: Option<([f64; 3], [usize; 3], f64)> = None;
        for &tri in &self.triangles {
            let [ia, ib, ic] = tri;
            let Some(w) = barycentric(p, self.vertices[ia], self.vertices[ib], self.vertices[ic])
            else {
                continue;
            };
            let min_w = w[0].min(w[1]).min(w[2]);
            if min_w >= 0.0 {
                return w[0] * self.l0[ia] + w[1] * self.l0[ib] + w[2] * self.l0[ic];
            }
            match best {
                Some((_, _, best_min)) if best_min >= min_w => {}
                _ => best = Some((w, tri, min_w)),
            }
        }

        // Outside the hull: clamp to the nearest triangle
        let (w, [ia, ib, ic], _) = best.expect("guide mesh has at least one valid triangle");
        let clamped = [w[0].max(0.0), w[1].max(0.0), w[2].max(0.0)];
        let sum: f64 = clamped.iter().sum();
        (clamped[0] * self.l0[ia] + clamped[1] * self.l0[ib] + clamped[2] * self.l0[ic]) / sum
    }

    /// Number of guide vertices
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Check structural invariants (non-empty, positive lengths, valid indices)
    pub fn validate(&self) -> Result<(), MeshError> {
        if self.vertices.is_empty() || self.triangles.is_empty() {
            return Err(MeshError::config("guide mesh is empty"));
        }
        if let Some((i, &l)) = self.l0.iter().enumerate().find(|(_, &l)| l <= 0.0) {
            return Err(MeshError::config(format!(
                "guide mesh length at vertex {i} must be positive, got {l}"
            )));
        }
        if self
            .triangles
            .iter()
            .flatten()
            .any(|&v| v >= self.vertices.len())
        {
            return Err(MeshError::config("guide mesh triangle index out of range"));
        }
        Ok(())
    }
}

/// Desired-length field evaluated by the seeding, density and assembly stages
#[derive(Debug, Clone, Copy)]
pub enum SizingField<'a> {
    /// Constant length (regular mode)
    Uniform(f64),
    /// Interpolated from a guide mesh
    Guide(&'a GuideMesh),
}

impl SizingField<'_> {
    /// Desired edge length at (x, y)
    pub fn eval(&self, x: f64, y: f64) -> f64 {
        match self {
            SizingField::Uniform(h0) => *h0,
            SizingField::Guide(guide) => guide.interpolate(x, y),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit() -> Rect {
        Rect::new(0.0, 1.0, 0.0, 1.0)
    }

    #[test]
    fn test_uniform_guide_interpolates_constant() {
        let guide = GuideMesh::uniform(unit(), 0.1).unwrap();
        for (x, y) in [(0.0, 0.0), (0.5, 0.5), (0.25, 0.9), (1.0, 1.0)] {
            assert_relative_eq!(guide.interpolate(x, y), 0.1, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_rejects_non_positive_length() {
        assert!(GuideMesh::uniform(unit(), 0.0).is_err());
        assert!(GuideMesh::uniform(unit(), -1.0).is_err());
    }

    #[test]
    fn test_rejects_mismatched_lengths() {
        let vertices = unit().corners().to_vec();
        assert!(GuideMesh::new(vertices, vec![0.1; 3]).is_err());
    }

    #[test]
    fn test_rectangular_zones_grade() {
        let guide = GuideMesh::rectangular(
            unit(),
            Rect::new(0.2, 0.8, 0.2, 0.8),
            Rect::new(0.35, 0.65, 0.35, 0.65),
            0.2,
            0.05,
        )
        .unwrap();

        // Refined value inside the window
        assert_relative_eq!(guide.interpolate(0.5, 0.5), 0.05, epsilon = 1e-12);
        // Coarse value outside the transition ring
        assert_relative_eq!(guide.interpolate(0.05, 0.05), 0.2, epsilon = 1e-12);
        // Graded strictly between the two in the transition band
        let mid = guide.interpolate(0.28, 0.5);
        assert!(mid > 0.05 && mid < 0.2, "transition value {mid}");
    }

    #[test]
    fn test_rectangular_rejects_non_nested_zones() {
        let result = GuideMesh::rectangular(
            unit(),
            Rect::new(0.2, 0.8, 0.2, 0.8),
            Rect::new(0.1, 0.9, 0.1, 0.9),
            0.2,
            0.05,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_clamps_outside_hull() {
        let guide = GuideMesh::uniform(unit(), 0.1).unwrap();
        assert_relative_eq!(guide.interpolate(2.0, -3.0), 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_continuity_across_transition_interface() {
        let guide = GuideMesh::rectangular(
            unit(),
            Rect::new(0.2, 0.8, 0.2, 0.8),
            Rect::new(0.35, 0.65, 0.35, 0.65),
            0.2,
            0.05,
        )
        .unwrap();

        // Values immediately inside and outside the transition ring agree
        let inside = guide.interpolate(0.2 + 1e-9, 0.5);
        let outside = guide.interpolate(0.2 - 1e-9, 0.5);
        assert_relative_eq!(inside, outside, epsilon = 1e-6);
    }
}
