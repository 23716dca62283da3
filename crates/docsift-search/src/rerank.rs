//! Optional reordering by an external relevance reranker.
//!
//! A reranker failure never fails the query: candidates pass through in
//! their fused order and the failure is reported alongside the results.

use anyhow::Result;
use docsift_core::{Diagnostic, ErrorCode, RerankInfo, ScoreField, ScoredResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Candidate text sent to the reranker is cut to this many characters.
pub const MAX_RERANK_TEXT_CHARS: usize = 500;

/// One passage offered to the reranker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RerankCandidate {
    pub index: usize,
    pub text: String,
    pub original_score: f64,
}

/// The reranker's verdict on one candidate.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RerankVerdict {
    pub original_index: usize,
    pub relevance_score: f64,
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// External relevance reranker.
pub trait Reranker: Send + Sync {
    /// Score up to `limit` of `candidates` against `query`.
    ///
    /// # Errors
    ///
    /// Returns an error when the reranker is unavailable or answers with
    /// something unparseable.
    fn rerank(
        &self,
        query: &str,
        candidates: &[RerankCandidate],
        limit: usize,
    ) -> Result<Vec<RerankVerdict>>;
}

/// Results after an attempted rerank.
#[derive(Debug, Clone, PartialEq)]
pub struct RerankOutcome {
    pub results: Vec<ScoredResult>,
    pub reranked: bool,
    pub error: Option<Diagnostic>,
}

impl RerankOutcome {
    #[must_use]
    pub fn passthrough(results: Vec<ScoredResult>, error: impl Into<String>) -> Self {
        Self {
            results,
            reranked: false,
            error: Some(Diagnostic::new(ErrorCode::RerankDegraded, error)),
        }
    }
}

/// Map a raw relevance logit onto `(0, 1)`.
///
/// Cross-encoders answer with unbounded logits; downstream multipliers
/// assume a non-negative score.
#[must_use]
pub fn relevance_to_score(relevance: f64) -> f64 {
    1.0 / (1.0 + (-relevance).exp())
}

/// Build reranker input from best-first results.
#[must_use]
pub fn rerank_candidates(results: &[ScoredResult]) -> Vec<RerankCandidate> {
    results
        .iter()
        .enumerate()
        .map(|(index, r)| RerankCandidate {
            index,
            text: r.unit.text.chars().take(MAX_RERANK_TEXT_CHARS).collect(),
            original_score: r.score,
        })
        .collect()
}

/// Reorder `results` by reranker relevance.
///
/// Verdicts naming an unknown or already-seen index are ignored. Candidates
/// the reranker did not score follow the scored ones in their original
/// order.
#[must_use]
pub fn apply_rerank(
    query: &str,
    results: Vec<ScoredResult>,
    reranker: &dyn Reranker,
    limit: usize,
) -> RerankOutcome {
    if results.is_empty() {
        return RerankOutcome {
            results,
            reranked: false,
            error: None,
        };
    }

    let candidates = rerank_candidates(&results);
    let verdicts = match reranker.rerank(query, &candidates, limit) {
        Ok(v) => v,
        Err(err) => {
            warn!("reranker unavailable, keeping fused order: {err:#}");
            return RerankOutcome::passthrough(results, format!("{err:#}"));
        }
    };

    let mut verdicts: Vec<RerankVerdict> = {
        let mut seen = HashSet::new();
        verdicts
            .into_iter()
            .filter(|v| v.original_index < results.len() && seen.insert(v.original_index))
            .collect()
    };
    if verdicts.is_empty() {
        warn!("reranker returned no usable verdicts, keeping fused order");
        return RerankOutcome::passthrough(results, "reranker returned no usable verdicts");
    }
    verdicts.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.original_index.cmp(&b.original_index))
    });

    let mut slots: Vec<Option<ScoredResult>> = results.into_iter().map(Some).collect();
    let mut ordered = Vec::with_capacity(slots.len());
    for v in &verdicts {
        if let Some(mut r) = slots[v.original_index].take() {
            r.rerank = Some(RerankInfo {
                relevance_score: v.relevance_score,
                original_rank: v.original_index + 1,
                reasoning: v.reasoning.clone(),
            });
            r.score_field = ScoreField::Rerank;
            r.score = relevance_to_score(v.relevance_score);
            ordered.push(r);
        }
    }
    let scored = ordered.len();
    ordered.extend(slots.into_iter().flatten());
    debug!(scored, total = ordered.len(), "rerank applied");

    RerankOutcome {
        results: ordered,
        reranked: true,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::test_support::scored;
    use std::sync::Mutex;

    struct Fixed {
        verdicts: Vec<RerankVerdict>,
        seen: Mutex<Vec<RerankCandidate>>,
    }

    impl Reranker for Fixed {
        fn rerank(&self, _: &str, candidates: &[RerankCandidate], _: usize) -> Result<Vec<RerankVerdict>> {
            self.seen
                .lock()
                .expect("lock")
                .extend(candidates.iter().cloned());
            Ok(self.verdicts.clone())
        }
    }

    struct Failing;

    impl Reranker for Failing {
        fn rerank(&self, _: &str, _: &[RerankCandidate], _: usize) -> Result<Vec<RerankVerdict>> {
            anyhow::bail!("worker exited with status 1")
        }
    }

    fn verdict(index: usize, score: f64) -> RerankVerdict {
        RerankVerdict {
            original_index: index,
            relevance_score: score,
            reasoning: None,
        }
    }

    fn results() -> Vec<ScoredResult> {
        vec![
            scored("a", "d1", 0, 0.03),
            scored("b", "d1", 5, 0.02),
            scored("c", "d1", 9, 0.01),
        ]
    }

    #[test]
    fn reorders_by_relevance() {
        let reranker = Fixed {
            verdicts: vec![verdict(0, 2.0), verdict(2, 9.0), verdict(1, 5.0)],
            seen: Mutex::new(Vec::new()),
        };
        let out = apply_rerank("q", results(), &reranker, 3);
        assert!(out.reranked);
        let ids: Vec<&str> = out.results.iter().map(|r| r.unit.unit_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
        let top = out.results[0].rerank.as_ref().expect("rerank info");
        assert_eq!(top.original_rank, 3);
        assert_eq!(out.results[0].score_field, ScoreField::Rerank);
    }

    #[test]
    fn negative_logits_become_positive_scores_in_order() {
        let reranker = Fixed {
            verdicts: vec![verdict(0, -3.0), verdict(1, -1.0), verdict(2, 0.5)],
            seen: Mutex::new(Vec::new()),
        };
        let out = apply_rerank("q", results(), &reranker, 3);
        let ids: Vec<&str> = out.results.iter().map(|r| r.unit.unit_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
        for r in &out.results {
            assert!(r.score > 0.0 && r.score < 1.0, "{} scored {}", r.unit.unit_id, r.score);
        }
        let a = out.results[2].rerank.as_ref().expect("rerank info");
        assert!((a.relevance_score + 3.0).abs() < f64::EPSILON);
        assert!((out.results[2].score - relevance_to_score(-3.0)).abs() < 1e-12);
    }

    #[test]
    fn relevance_mapping_is_monotonic_and_centered() {
        assert!((relevance_to_score(0.0) - 0.5).abs() < 1e-12);
        assert!(relevance_to_score(-8.0) < relevance_to_score(-7.9));
        assert!(relevance_to_score(40.0) <= 1.0);
        assert!(relevance_to_score(-40.0) >= 0.0);
    }

    #[test]
    fn unscored_candidates_follow_in_original_order() {
        let reranker = Fixed {
            verdicts: vec![verdict(2, 1.0), verdict(7, 3.0), verdict(2, 4.0)],
            seen: Mutex::new(Vec::new()),
        };
        let out = apply_rerank("q", results(), &reranker, 3);
        let ids: Vec<&str> = out.results.iter().map(|r| r.unit.unit_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
        assert!(out.results[1].rerank.is_none());
    }

    #[test]
    fn failure_passes_through() {
        let out = apply_rerank("q", results(), &Failing, 3);
        assert!(!out.reranked);
        let diag = out.error.expect("rerank diagnostic");
        assert_eq!(diag.code, "E4001");
        assert!(diag.message.contains("status 1"));
        let ids: Vec<&str> = out.results.iter().map(|r| r.unit.unit_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn candidate_text_is_truncated() {
        let mut long = results();
        long[0].unit.text = "é".repeat(900);
        let reranker = Fixed {
            verdicts: vec![verdict(0, 1.0)],
            seen: Mutex::new(Vec::new()),
        };
        let _ = apply_rerank("q", long, &reranker, 3);
        let seen = reranker.seen.lock().expect("lock");
        assert_eq!(seen[0].text.chars().count(), MAX_RERANK_TEXT_CHARS);
        assert!((seen[0].original_score - 0.03).abs() < f64::EPSILON);
    }
}
