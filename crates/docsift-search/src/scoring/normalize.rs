//! Document-length normalization.
//!
//! Long documents contribute many chunks and would otherwise crowd a result
//! set. Each result is scaled by `clamp(sqrt(median / doc_chunks), 0.7, 1.0)`
//! where `median` is taken over the chunk counts of every contributing
//! document. Sets drawn from a single document are left alone.

use docsift_core::ScoredResult;
use std::collections::BTreeMap;

const MIN_FACTOR: f64 = 0.7;
const MAX_FACTOR: f64 = 1.0;

/// Chunk count per contributing document.
///
/// The document's own chunk count is used when known, otherwise the number
/// of results it has in this set.
#[must_use]
pub fn document_chunk_counts(results: &[ScoredResult]) -> BTreeMap<String, f64> {
    let mut in_set: BTreeMap<&str, (u32, Option<u32>)> = BTreeMap::new();
    for r in results {
        let slot = in_set
            .entry(r.unit.document_id())
            .or_insert((0, r.unit.document.chunk_count));
        slot.0 += 1;
    }
    in_set
        .into_iter()
        .map(|(doc, (seen, known))| {
            let count = known.filter(|c| *c > 0).unwrap_or(seen);
            (doc.to_string(), f64::from(count))
        })
        .collect()
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some(f64::midpoint(values[mid - 1], values[mid]))
    } else {
        Some(values[mid])
    }
}

/// Scale factor for a document with `doc_chunks` chunks.
#[must_use]
pub fn length_factor(median: f64, doc_chunks: f64) -> f64 {
    if doc_chunks <= 0.0 {
        return MAX_FACTOR;
    }
    (median / doc_chunks).sqrt().clamp(MIN_FACTOR, MAX_FACTOR)
}

/// Apply length normalization; returns whether it ran.
pub fn normalize_lengths(results: &mut [ScoredResult]) -> bool {
    let counts = document_chunk_counts(results);
    if counts.len() <= 1 {
        return false;
    }
    let mut values: Vec<f64> = counts.values().copied().collect();
    let Some(median) = median(&mut values) else {
        return false;
    };

    for r in results.iter_mut() {
        let doc_chunks = counts.get(r.unit.document_id()).copied().unwrap_or(median);
        let factor = length_factor(median, doc_chunks);
        r.score *= factor;
        if let Some(c) = r.components.as_mut() {
            c.length_normalization = factor;
        }
    }
    true
}
