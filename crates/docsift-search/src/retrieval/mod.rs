//! Retrieval adapters and the collaborator contracts they drive.
//!
//! The index traits are the seam to external systems. They may return
//! scores on their own scale and in their own polarity; the adapters in
//! [`lexical`] and [`semantic`] shape them into dense, best-first
//! [`RankedResult`](docsift_core::RankedResult) lists.

pub mod lexical;
pub mod semantic;

use anyhow::Result;
use docsift_core::{SearchFilters, SearchableUnit, UnitKind};

pub use lexical::lexical_search;
pub use semantic::{SemanticOutcome, ThresholdDecision, adaptive_threshold, semantic_search};

/// Ordering of native index scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScorePolarity {
    HigherIsBetter,
    /// FTS5 `bm25()` style: more negative is a better match.
    LowerIsBetter,
}

impl ScorePolarity {
    /// Map a native score onto a higher-is-better scale.
    #[must_use]
    pub const fn normalize(self, score: f64) -> f64 {
        match self {
            Self::HigherIsBetter => score,
            Self::LowerIsBetter => -score,
        }
    }
}

/// One native hit from an index, before rank assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    pub unit: SearchableUnit,
    pub score: f64,
}

/// Full-text index over one or more content classes.
pub trait LexicalIndex: Send + Sync {
    fn polarity(&self) -> ScorePolarity;

    /// Best-first hits for `query` within one content class.
    ///
    /// # Errors
    ///
    /// Returns an error when the index cannot be queried.
    fn search(
        &self,
        kind: UnitKind,
        query: &str,
        limit: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<IndexHit>>;
}

/// Vector index returning cosine similarities in `[-1, 1]`.
pub trait VectorIndex: Send + Sync {
    /// Most similar units to `vector` within one content class.
    ///
    /// # Errors
    ///
    /// Returns an error when the index cannot be queried or the vector has
    /// the wrong dimensionality.
    fn search_similar(
        &self,
        kind: UnitKind,
        vector: &[f32],
        limit: usize,
        threshold: Option<f64>,
        filters: &SearchFilters,
    ) -> Result<Vec<IndexHit>>;
}

/// Turns query text into an L2-normalised embedding.
pub trait Embedder: Send + Sync {
    /// # Errors
    ///
    /// Returns an error when the embedding service fails.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Sort hits best-first on a higher-is-better score, then assign dense
/// 1-based ranks.
pub(crate) fn rank_hits(mut hits: Vec<IndexHit>, limit: usize) -> Vec<docsift_core::RankedResult> {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.unit.unit_id.cmp(&b.unit.unit_id))
    });

    let mut seen = std::collections::HashSet::new();
    hits.into_iter()
        .filter(|hit| seen.insert(hit.unit.unit_id.clone()))
        .take(limit)
        .enumerate()
        .map(|(idx, hit)| docsift_core::RankedResult {
            unit: hit.unit,
            raw_score: hit.score,
            rank: idx + 1,
        })
        .collect()
}

/// L2-normalise a vector in place; zero vectors are left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}
