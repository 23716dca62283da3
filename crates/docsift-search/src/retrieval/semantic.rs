//! Semantic adapter: KNN lookups with an adaptive similarity cutoff.
//!
//! When the caller does not fix a threshold, a larger candidate pool is
//! fetched and the cutoff is derived from that pool's own score spread:
//!
//! ```text
//! threshold = clamp(mean - std_dev, floor, ceiling)
//! ```
//!
//! With fewer than two candidates there is no spread to measure and the
//! floor is used as-is.

use super::{VectorIndex, rank_hits};
use anyhow::{Context, Result};
use docsift_core::{RankedResult, SearchConfig, SearchFilters};
use serde::Serialize;
use tracing::{debug, warn};

/// Bounds and pool sizing for the adaptive cutoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdPolicy {
    pub floor: f64,
    pub ceiling: f64,
    pub pool_floor: usize,
    pub overfetch_factor: usize,
}

impl ThresholdPolicy {
    #[must_use]
    pub const fn from_config(config: &SearchConfig) -> Self {
        Self {
            floor: config.adaptive_threshold_floor,
            ceiling: config.adaptive_threshold_ceiling,
            pool_floor: config.adaptive_pool_floor,
            overfetch_factor: config.overfetch_factor,
        }
    }

    /// Candidate pool size for a requested limit.
    #[must_use]
    pub fn pool_size(&self, limit: usize) -> usize {
        limit
            .saturating_mul(self.overfetch_factor.max(1))
            .max(self.pool_floor)
    }
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self::from_config(&SearchConfig::default())
    }
}

/// The similarity cutoff actually applied, for auditing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdDecision {
    pub value: f64,
    pub adaptive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub std_dev: Option<f64>,
    pub pool_size: usize,
}

impl ThresholdDecision {
    #[must_use]
    pub const fn explicit(value: f64) -> Self {
        Self {
            value,
            adaptive: false,
            mean: None,
            std_dev: None,
            pool_size: 0,
        }
    }
}

/// Semantic hits plus the cutoff that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticOutcome {
    pub results: Vec<RankedResult>,
    pub threshold: ThresholdDecision,
}

/// Derive a cutoff from a similarity distribution.
///
/// Uses the population standard deviation of `scores`.
#[must_use]
pub fn adaptive_threshold(scores: &[f64], policy: &ThresholdPolicy) -> ThresholdDecision {
    if scores.len() < 2 {
        return ThresholdDecision {
            value: policy.floor,
            adaptive: true,
            mean: None,
            std_dev: None,
            pool_size: scores.len(),
        };
    }

    #[allow(clippy::cast_precision_loss)]
    let n = scores.len() as f64;
    let mean = scores.iter().sum::<f64>() / n;
    let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();

    ThresholdDecision {
        value: (mean - std_dev).clamp(policy.floor, policy.ceiling),
        adaptive: true,
        mean: Some(mean),
        std_dev: Some(std_dev),
        pool_size: scores.len(),
    }
}

/// Run KNN over every requested content class.
///
/// `explicit_threshold` bypasses the adaptive cutoff entirely.
///
/// # Errors
///
/// Returns the first index error, annotated with the failing content class.
pub fn semantic_search(
    index: &dyn VectorIndex,
    embedding: &[f32],
    limit: usize,
    explicit_threshold: Option<f64>,
    filters: &SearchFilters,
    policy: &ThresholdPolicy,
) -> Result<SemanticOutcome> {
    let fetch = match explicit_threshold {
        Some(_) => limit,
        None => policy.pool_size(limit),
    };
    if limit == 0 {
        return Ok(SemanticOutcome {
            results: Vec::new(),
            threshold: explicit_threshold
                .map_or_else(|| adaptive_threshold(&[], policy), ThresholdDecision::explicit),
        });
    }

    let mut hits = Vec::new();
    for kind in filters.kinds() {
        let found = index
            .search_similar(kind, embedding, fetch, explicit_threshold, filters)
            .with_context(|| format!("vector lookup over {kind} units"))?;
        debug!(%kind, returned = found.len(), "semantic class lookup");
        hits.extend(found.into_iter().filter(|hit| filters.admits(&hit.unit)));
    }

    let pool = rank_hits(hits, fetch);
    let threshold = match explicit_threshold {
        Some(value) => ThresholdDecision::explicit(value),
        None => {
            let scores: Vec<f64> = pool.iter().map(|r| r.raw_score).collect();
            let decision = adaptive_threshold(&scores, policy);
            if decision.mean.is_none() {
                warn!(
                    pool = decision.pool_size,
                    floor = decision.value,
                    "too few semantic candidates for adaptive threshold, using floor"
                );
            }
            decision
        }
    };

    let results: Vec<RankedResult> = pool
        .into_iter()
        .take_while(|r| r.raw_score >= threshold.value)
        .take(limit)
        .collect();
    debug!(
        threshold = threshold.value,
        adaptive = threshold.adaptive,
        kept = results.len(),
        "semantic threshold applied"
    );

    Ok(SemanticOutcome { results, threshold })
}
