//! Reciprocal Rank Fusion of a lexical and a semantic ranked list.
//!
//! ```text
//! rrf_score = sum over lists containing the unit of: weight / (k + rank)
//! ```
//!
//! - `k` damps the advantage of top ranks (default 60).
//! - A unit absent from a list gets nothing from it, not a penalty.
//! - Ties are broken by the number of contributing lists (more first), then
//!   by best source rank, then by unit id so output is deterministic.

use docsift_core::{
    Enrichment, FusionWeights, RankedResult, ScoreField, ScoredResult, SourceHit,
};
use std::collections::BTreeMap;

/// Contribution of one list entry.
#[must_use]
pub const fn rrf_contribution(weight: f64, k: usize, rank: usize) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let denom = (k + rank) as f64;
    weight / denom
}

/// Fuse two ranked lists into one best-first list with unique units.
#[must_use]
pub fn rrf_fuse(
    lexical: &[RankedResult],
    semantic: &[RankedResult],
    weights: FusionWeights,
    k: usize,
) -> Vec<ScoredResult> {
    let mut fused: BTreeMap<String, ScoredResult> = BTreeMap::new();

    for entry in lexical {
        let contribution = rrf_contribution(weights.lexical, k, entry.rank);
        let slot = fused
            .entry(entry.unit.unit_id.clone())
            .or_insert_with(|| empty(entry));
        if slot.lexical.is_none() {
            slot.lexical = Some(SourceHit {
                rank: entry.rank,
                score: entry.raw_score,
            });
            slot.score += contribution;
        }
    }

    for entry in semantic {
        let contribution = rrf_contribution(weights.semantic, k, entry.rank);
        let slot = fused
            .entry(entry.unit.unit_id.clone())
            .or_insert_with(|| empty(entry));
        if slot.semantic.is_none() {
            slot.semantic = Some(SourceHit {
                rank: entry.rank,
                score: entry.raw_score,
            });
            slot.score += contribution;
        }
    }

    let mut result: Vec<ScoredResult> = fused
        .into_values()
        .map(|mut r| {
            r.rrf_score = Some(r.score);
            r
        })
        .collect();
    sort_fused(&mut result);
    result
}

/// Order fused results: score, then source count, then best rank, then id.
pub fn sort_fused(results: &mut [ScoredResult]) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.source_count().cmp(&a.source_count()))
            .then_with(|| a.best_source_rank().cmp(&b.best_source_rank()))
            .then_with(|| a.unit.unit_id.cmp(&b.unit.unit_id))
    });
}

/// Intermediate list size kept for later stages.
#[must_use]
pub fn intermediate_limit(final_limit: usize, floor: usize) -> usize {
    final_limit.saturating_mul(2).max(floor)
}

fn empty(entry: &RankedResult) -> ScoredResult {
    ScoredResult {
        unit: entry.unit.clone(),
        lexical: None,
        semantic: None,
        rrf_score: None,
        rerank: None,
        score_field: ScoreField::Rrf,
        score: 0.0,
        components: None,
        enrichment: Enrichment::default(),
    }
}
