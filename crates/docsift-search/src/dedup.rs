//! Duplicate removal.
//!
//! Two independent passes for two consumers:
//! - [`dedup_by_content_hash`] drops exact repeats across the whole list
//! - [`dedup_overlapping`] drops passages whose character span mostly
//!   repeats a better passage from the same document (context assembly)

use docsift_core::ScoredResult;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Fraction of a span that must be covered for it to count as a repeat.
pub const OVERLAP_RATIO: f64 = 0.5;

/// Keep the first result for each content hash; unhashed results are kept.
#[must_use]
pub fn dedup_by_content_hash(results: Vec<ScoredResult>) -> Vec<ScoredResult> {
    let before = results.len();
    let mut seen: HashSet<String> = HashSet::new();
    let kept: Vec<ScoredResult> = results
        .into_iter()
        .filter(|r| match r.unit.content_hash.as_deref() {
            Some(hash) if !hash.is_empty() => seen.insert(hash.to_string()),
            _ => true,
        })
        .collect();
    debug!(before, after = kept.len(), "content-hash dedup");
    kept
}

/// Length of the intersection of two half-open spans.
#[must_use]
pub fn overlap_len(a: (usize, usize), b: (usize, usize)) -> usize {
    a.1.min(b.1).saturating_sub(a.0.max(b.0))
}

/// Whether `later` repeats more than half of itself from `kept`.
#[must_use]
pub fn is_overlap_duplicate(kept: (usize, usize), later: (usize, usize)) -> bool {
    let span = later.1.saturating_sub(later.0);
    if span == 0 {
        return false;
    }
    #[allow(clippy::cast_precision_loss)]
    let covered = overlap_len(kept, later) as f64 / span as f64;
    covered > OVERLAP_RATIO
}

/// Drop results whose span overlaps a better result from the same document.
///
/// Input is put in best-first order (score, then unit id) before comparing,
/// so any permutation of an equally ranked list gives the same survivors.
/// Results without a character span are always kept.
#[must_use]
pub fn dedup_overlapping(mut results: Vec<ScoredResult>) -> (Vec<ScoredResult>, usize) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.unit.unit_id.cmp(&b.unit.unit_id))
    });

    let mut kept_spans: HashMap<String, Vec<(usize, usize)>> = HashMap::new();
    let mut kept = Vec::with_capacity(results.len());
    let mut dropped = 0;

    for r in results {
        let Some(span) = r.unit.char_range() else {
            kept.push(r);
            continue;
        };
        let spans = kept_spans
            .entry(r.unit.document_id().to_string())
            .or_default();
        if spans.iter().any(|k| is_overlap_duplicate(*k, span)) {
            dropped += 1;
            continue;
        }
        spans.push(span);
        kept.push(r);
    }

    (kept, dropped)
}
