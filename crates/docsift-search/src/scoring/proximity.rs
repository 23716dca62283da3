//! Proximity boost for clusters of hits within one document.

use docsift_core::ScoredResult;
use std::collections::HashMap;

/// Chunk-index distance within which two hits count as nearby.
pub const PROXIMITY_WINDOW: u32 = 2;

const BOOST_PER_NEIGHBOR: f64 = 0.1;

/// Multiply each result by `1 + 0.1 × nearby`, where `nearby` counts the
/// other results in the same document whose chunk index is within
/// [`PROXIMITY_WINDOW`]. Units without a chunk index neither gain nor give
/// a boost. Returns whether any result was boosted.
pub fn boost_proximity(results: &mut [ScoredResult]) -> bool {
    let mut by_document: HashMap<String, Vec<u32>> = HashMap::new();
    for r in results.iter() {
        if let Some(idx) = r.unit.chunk_index() {
            by_document
                .entry(r.unit.document_id().to_string())
                .or_default()
                .push(idx);
        }
    }

    let mut boosted = false;
    for r in results.iter_mut() {
        let Some(idx) = r.unit.chunk_index() else {
            continue;
        };
        let Some(indices) = by_document.get(r.unit.document_id()) else {
            continue;
        };
        // The result's own index is in the list once.
        let nearby = indices
            .iter()
            .filter(|other| other.abs_diff(idx) <= PROXIMITY_WINDOW)
            .count()
            .saturating_sub(1);
        if nearby == 0 {
            continue;
        }
        #[allow(clippy::cast_precision_loss)]
        let factor = BOOST_PER_NEIGHBOR.mul_add(nearby as f64, 1.0);
        r.score *= factor;
        if let Some(c) = r.components.as_mut() {
            c.proximity = factor;
            c.nearby_count = nearby;
        }
        boosted = true;
    }
    boosted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::test_support::scored;

    #[test]
    fn neighbors_within_window_boost() {
        let mut results = vec![
            scored("a", "d1", 10, 1.0),
            scored("b", "d1", 12, 1.0),
            scored("c", "d1", 15, 1.0),
            scored("d", "d2", 11, 1.0),
        ];
        assert!(boost_proximity(&mut results));
        assert!((results[0].score - 1.1).abs() < 1e-12);
        assert!((results[1].score - 1.1).abs() < 1e-12);
        assert!((results[2].score - 1.0).abs() < 1e-12);
        assert!((results[3].score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn boost_grows_with_neighbor_count() {
        let mut results = vec![
            scored("a", "d1", 5, 1.0),
            scored("b", "d1", 4, 1.0),
            scored("c", "d1", 6, 1.0),
            scored("d", "d1", 7, 1.0),
        ];
        boost_proximity(&mut results);
        // a has 4, 6, 7 nearby
        assert!((results[0].score - 1.3).abs() < 1e-12);
        let c = results[0].components.as_ref().expect("components");
        assert_eq!(c.nearby_count, 3);
    }

    #[test]
    fn isolated_results_are_unchanged() {
        let mut results = vec![scored("a", "d1", 0, 0.8), scored("b", "d1", 9, 0.6)];
        assert!(!boost_proximity(&mut results));
        assert!((results[0].score - 0.8).abs() < 1e-12);
    }
}
