//! Mesh data model
//!
//! A [`Mesh`] owns the point set, its classification, the current Delaunay
//! triangle list, the derived bar list, and the per-point/per-bar/per-triangle
//! scalar fields. Triangles and bars are ephemeral: they are rebuilt through
//! [`Mesh::refresh_connectivity`] whenever the point set changes.

pub mod bars;
pub mod delaunay;
pub mod seed;

use crate::error::MeshError;
use crate::geometry::{Point2, PointClass};
use crate::quality;
use serde::{Deserialize, Serialize};

/// Triangular mesh with spring-relaxation state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    /// Node positions `P`
    pub points: Vec<Point2>,
    /// Node classification (corner / side / interior)
    pub classes: Vec<PointClass>,
    /// Triangle list `T`, CCW triples of point indices
    pub triangles: Vec<[usize; 3]>,
    /// Bar list `B`: unique `[min, max]` index pairs in lexicographic order
    pub bars: Vec<[usize; 2]>,
    /// Desired edge length `L0` per node (strictly positive)
    pub l0: Vec<f64>,
    /// Actual length `L` per bar
    pub bar_lengths: Vec<f64>,
    /// Rest length per bar: `rest_length_scale · (L0[a] + L0[b]) / 2`
    pub bar_rest_lengths: Vec<f64>,
    /// Quality factor per triangle
    pub qualities: Vec<f64>,
}

impl Mesh {
    /// Build a mesh from classified points: triangulate, extract bars, and
    /// populate the derived fields
    pub fn from_points(
        points: Vec<Point2>,
        classes: Vec<PointClass>,
        l0: Vec<f64>,
        rest_length_scale: f64,
    ) -> Result<Self, MeshError> {
        debug_assert_eq!(points.len(), classes.len());
        debug_assert_eq!(points.len(), l0.len());

        let mut mesh = Self {
            points,
            classes,
            triangles: Vec::new(),
            bars: Vec::new(),
            l0,
            bar_lengths: Vec::new(),
            bar_rest_lengths: Vec::new(),
            qualities: Vec::new(),
        };
        mesh.refresh_connectivity()?;
        mesh.update_bar_lengths(rest_length_scale);
        mesh.update_qualities();
        Ok(mesh)
    }

    /// Number of nodes
    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    /// Number of triangles
    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    /// Number of bars
    pub fn num_bars(&self) -> usize {
        self.bars.len()
    }

    /// Re-triangulate the point set and re-extract bars
    ///
    /// The per-bar and per-triangle fields are left stale; callers follow up
    /// with [`Mesh::update_bar_lengths`] and [`Mesh::update_qualities`].
    pub fn refresh_connectivity(&mut self) -> Result<(), MeshError> {
        self.triangles = delaunay::delaunay(&self.points)?;
        self.bars = bars::extract_bars(&self.triangles);
        Ok(())
    }

    /// Recompute actual and rest lengths for every bar
    pub fn update_bar_lengths(&mut self, rest_length_scale: f64) {
        self.bar_lengths = self
            .bars
            .iter()
            .map(|&[a, b]| self.points[a].distance(&self.points[b]))
            .collect();
        self.bar_rest_lengths = self
            .bars
            .iter()
            .map(|&[a, b]| rest_length_scale * 0.5 * (self.l0[a] + self.l0[b]))
            .collect();
    }

    /// Recompute the per-triangle quality factors
    pub fn update_qualities(&mut self) {
        self.qualities = quality::triangle_qualities(&self.points, &self.triangles);
    }

    /// Relative rest-length misfit `(L - L0_bar) / L0_bar` per bar
    pub fn rel_changes(&self) -> Vec<f64> {
        self.bar_lengths
            .iter()
            .zip(&self.bar_rest_lengths)
            .map(|(&l, &l0)| (l - l0) / l0)
            .collect()
    }

    /// Mean relative misfit of bar lengths against the desired field
    ///
    /// Measured against the unscaled `(L0[a] + L0[b]) / 2`: the global
    /// rest-length factor pressurizes the truss but does not redefine the
    /// target edge length the mesh is asked to track.
    pub fn mean_misfit_bar_length(&self) -> f64 {
        if self.bars.is_empty() {
            return 0.0;
        }
        let total: f64 = self
            .bars
            .iter()
            .zip(&self.bar_lengths)
            .map(|(&[a, b], &l)| {
                let desired = 0.5 * (self.l0[a] + self.l0[b]);
                ((l - desired) / desired).abs()
            })
            .sum();
        total / self.bars.len() as f64
    }

    /// Fraction of bars whose `|rel_change|` is at or above a threshold
    pub fn fraction_bars_misfit_above(&self, threshold: f64) -> f64 {
        if self.bars.is_empty() {
            return 0.0;
        }
        let count = self
            .rel_changes()
            .iter()
            .filter(|r| r.abs() >= threshold)
            .count();
        count as f64 / self.bars.len() as f64
    }

    /// Adjacency lists from the bar list
    pub fn node_neighbors(&self) -> Vec<Vec<usize>> {
        let mut neighbors = vec![Vec::new(); self.points.len()];
        for &[a, b] in &self.bars {
            neighbors[a].push(b);
            neighbors[b].push(a);
        }
        neighbors
    }

    /// Incident bar indices per node
    pub fn incident_bars(&self) -> Vec<Vec<usize>> {
        let mut incident = vec![Vec::new(); self.points.len()];
        for (bi, &[a, b]) in self.bars.iter().enumerate() {
            incident[a].push(bi);
            incident[b].push(bi);
        }
        incident
    }

    /// Incident triangle indices per node
    pub fn incident_triangles(&self) -> Vec<Vec<usize>> {
        let mut incident = vec![Vec::new(); self.points.len()];
        for (ti, t) in self.triangles.iter().enumerate() {
            for &v in t {
                incident[v].push(ti);
            }
        }
        incident
    }
}
