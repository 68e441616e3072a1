//! Bar extraction
//!
//! Derives the unique undirected edges ("bars") of a triangle list. Bars are
//! canonicalized as `[min, max]` pairs and kept in lexicographic order so
//! bar-indexed arrays compare stably across iterations.

/// Unique canonicalized edges of a triangle list
pub fn extract_bars(triangles: &[[usize; 3]]) -> Vec<[usize; 2]> {
    let mut bars = Vec::with_capacity(triangles.len() * 3);
    for t in triangles {
        for (a, b) in [(t[0], t[1]), (t[1], t[2]), (t[2], t[0])] {
            bars.push([a.min(b), a.max(b)]);
        }
    }
    bars.sort_unstable();
    bars.dedup();
    bars
}

/// Index of a bar in a lexicographically sorted bar list
pub fn bar_index(bars: &[[usize; 2]], a: usize, b: usize) -> Option<usize> {
    bars.binary_search(&[a.min(b), a.max(b)]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_triangles_share_an_edge() {
        let triangles = [[0, 1, 2], [1, 3, 2]];
        let bars = extract_bars(&triangles);

        assert_eq!(bars, vec![[0, 1], [0, 2], [1, 2], [1, 3], [2, 3]]);
    }

    #[test]
    fn test_bars_are_canonical_and_sorted() {
        let triangles = [[5, 2, 9], [9, 2, 0]];
        let bars = extract_bars(&triangles);

        for bar in &bars {
            assert!(bar[0] < bar[1]);
        }
        let mut sorted = bars.clone();
        sorted.sort_unstable();
        assert_eq!(bars, sorted);
    }

    #[test]
    fn test_bar_index_lookup() {
        let triangles = [[0, 1, 2], [1, 3, 2]];
        let bars = extract_bars(&triangles);

        assert_eq!(bar_index(&bars, 2, 1), Some(2));
        assert_eq!(bar_index(&bars, 3, 1), Some(3));
        assert_eq!(bar_index(&bars, 0, 3), None);
    }

    #[test]
    fn test_empty_input() {
        assert!(extract_bars(&[]).is_empty());
    }
}
