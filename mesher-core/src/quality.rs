//! Quality evaluation
//!
//! Per-triangle quality factors and aggregate statistics. Evaluation is
//! embarrassingly parallel over triangles and runs under rayon when the
//! `parallel` feature is enabled.

use crate::geometry::{Point2, triangle_quality};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Aggregate quality statistics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityStats {
    /// Minimum quality over all triangles
    pub worst: f64,
    /// Mean quality over all triangles
    pub mean: f64,
}

/// Quality factor for every triangle
pub fn triangle_qualities(points: &[Point2], triangles: &[[usize; 3]]) -> Vec<f64> {
    #[cfg(feature = "parallel")]
    {
        if triangles.len() >= 512 {
            return triangles
                .par_iter()
                .map(|&[a, b, c]| triangle_quality(points[a], points[b], points[c]))
                .collect();
        }
    }

    triangles
        .iter()
        .map(|&[a, b, c]| triangle_quality(points[a], points[b], points[c]))
        .collect()
}

/// Worst and mean quality of a quality vector
pub fn quality_stats(qualities: &[f64]) -> QualityStats {
    if qualities.is_empty() {
        return QualityStats {
            worst: 0.0,
            mean: 0.0,
        };
    }
    let worst = qualities.iter().copied().fold(f64::INFINITY, f64::min);
    let mean = qualities.iter().sum::<f64>() / qualities.len() as f64;
    QualityStats { worst, mean }
}

/// Fraction of triangles with quality strictly below a tolerance
pub fn fraction_below(qualities: &[f64], q_tol: f64) -> f64 {
    if qualities.is_empty() {
        return 0.0;
    }
    qualities.iter().filter(|&&q| q < q_tol).count() as f64 / qualities.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_qualities_for_right_and_equilateral() {
        let points = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.0, 1.0),
            Point2::new(0.5, 3.0_f64.sqrt() / 2.0),
        ];
        let triangles = [[0, 1, 2], [0, 1, 3]];
        let q = triangle_qualities(&points, &triangles);

        // Right isoceles: 4√3 · 0.5 / (1 + 1 + 2)
        assert_relative_eq!(q[0], 3.0_f64.sqrt() / 2.0, epsilon = 1e-12);
        assert_relative_eq!(q[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_stats() {
        let stats = quality_stats(&[0.5, 0.7, 0.9]);
        assert_relative_eq!(stats.worst, 0.5);
        assert_relative_eq!(stats.mean, 0.7);
    }

    #[test]
    fn test_stats_empty() {
        let stats = quality_stats(&[]);
        assert_relative_eq!(stats.worst, 0.0);
        assert_relative_eq!(stats.mean, 0.0);
    }

    #[test]
    fn test_fraction_below() {
        let q = [0.3, 0.55, 0.61, 0.8];
        assert_relative_eq!(fraction_below(&q, 0.6), 0.5);
        assert_relative_eq!(fraction_below(&q, 0.2), 0.0);
    }
}
