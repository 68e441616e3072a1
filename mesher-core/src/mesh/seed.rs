//! Initial point placement
//!
//! Boundary discretization plus interior seeding by hexagonal circle packing.
//! Each side receives `round(length/h) + 1` equally spaced nodes (corners
//! shared), with `h` evaluated at the side midpoint. The interior is tiled
//! with a hexagonal lattice of spacing `h` at the domain centroid; lattice
//! points within `0.7·h` of any boundary node are rejected.

use crate::geometry::{Point2, PointClass, Rect};
use crate::guide::SizingField;

/// Minimum clearance between a lattice point and the boundary nodes,
/// as a fraction of the lattice spacing
const BOUNDARY_CLEARANCE: f64 = 0.7;

/// Nodes per side for a given side length and local spacing
fn side_count(length: f64, h: f64) -> usize {
    ((length / h).round() as usize + 1).max(2)
}

/// Seed the domain: classified boundary nodes plus hexagonally packed
/// interior nodes
pub fn initial_points(domain: &Rect, sizing: &SizingField) -> (Vec<Point2>, Vec<PointClass>) {
    let mut points = Vec::new();
    let mut classes = Vec::new();

    // Corners first; they stay immutable for the whole run
    for corner in domain.corners() {
        points.push(corner);
        classes.push(PointClass::Corner);
    }

    let width = domain.width();
    let height = domain.height();

    // Side midpoints set the local spacing
    let h_bottom = sizing.eval(domain.x_min + 0.5 * width, domain.y_min);
    let h_top = sizing.eval(domain.x_min + 0.5 * width, domain.y_max);
    let h_left = sizing.eval(domain.x_min, domain.y_min + 0.5 * height);
    let h_right = sizing.eval(domain.x_max, domain.y_min + 0.5 * height);

    let n_bottom = side_count(width, h_bottom);
    let n_top = side_count(width, h_top);
    let n_left = side_count(height, h_left);
    let n_right = side_count(height, h_right);

    for i in 1..n_bottom - 1 {
        let x = domain.x_min + i as f64 * width / (n_bottom - 1) as f64;
        points.push(Point2::new(x, domain.y_min));
        classes.push(PointClass::Bottom);
    }
    for i in 1..n_top - 1 {
        let x = domain.x_min + i as f64 * width / (n_top - 1) as f64;
        points.push(Point2::new(x, domain.y_max));
        classes.push(PointClass::Top);
    }
    for i in 1..n_left - 1 {
        let y = domain.y_min + i as f64 * height / (n_left - 1) as f64;
        points.push(Point2::new(domain.x_min, y));
        classes.push(PointClass::Left);
    }
    for i in 1..n_right - 1 {
        let y = domain.y_min + i as f64 * height / (n_right - 1) as f64;
        points.push(Point2::new(domain.x_max, y));
        classes.push(PointClass::Right);
    }

    let boundary_count = points.len();

    // Hexagonal lattice with spacing from the domain centroid
    let centroid = domain.centroid();
    let h = sizing.eval(centroid.x, centroid.y);
    let dy = h * 3.0_f64.sqrt() / 2.0;

    let mut row = 1;
    loop {
        let y = domain.y_min + row as f64 * dy;
        if y >= domain.y_max - 1e-12 {
            break;
        }
        // Alternate rows shift by half a spacing
        let offset = if row % 2 == 1 { 0.5 * h } else { h };
        let mut x = domain.x_min + offset;
        while x < domain.x_max - 1e-12 {
            let candidate = Point2::new(x, y);
            let clear = points[..boundary_count]
                .iter()
                .all(|b| b.distance(&candidate) >= BOUNDARY_CLEARANCE * h);
            if clear {
                points.push(candidate);
                classes.push(PointClass::Interior);
            }
            x += h;
        }
        row += 1;
    }

    (points, classes)
}
