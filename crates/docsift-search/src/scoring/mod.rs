//! Deterministic post-retrieval scoring.
//!
//! The pipeline runs in a fixed order over every result, whatever mode
//! produced it:
//!
//! 1. quality multiplier (applied on its own, outside the clamp)
//! 2. heading, atomic, content-type, block-confidence and header/footer
//!    multipliers, whose product is clamped to `[0.5, 2.0]`
//! 3. document-length normalization, when results span several documents
//! 4. proximity boost, hybrid mode only
//! 5. re-sort by the active score
//!
//! Each stage takes and returns the full list so it can be tested in
//! isolation. The multipliers applied to a result are recorded in its
//! [`ScoreComponents`].

pub mod boilerplate;
pub mod normalize;
pub mod proximity;
pub mod quality;
pub mod structural;

pub use boilerplate::{BOILERPLATE_PENALTY, BoilerplateMatch, BoilerplateMatcher};
pub use normalize::normalize_lengths;
pub use proximity::boost_proximity;
pub use quality::quality_multiplier;
pub use structural::{
    QueryIntent, atomic_multiplier, block_confidence_multiplier, heading_multiplier,
};

use docsift_core::{Diagnostic, ErrorCode, ScoreComponents, ScoredResult, SearchMode};
use tracing::{debug, warn};

/// Bounds of the combined structural multiplier.
pub const CUMULATIVE_MIN: f64 = 0.5;
pub const CUMULATIVE_MAX: f64 = 2.0;

/// Per-query inputs shared by every scoring stage.
#[derive(Debug, Clone)]
pub struct ScoringContext<'a> {
    pub mode: SearchMode,
    pub intent: QueryIntent,
    pub boilerplate: &'a BoilerplateMatcher,
}

impl<'a> ScoringContext<'a> {
    /// Context for the unexpanded `query`.
    #[must_use]
    pub fn new(query: &str, mode: SearchMode, boilerplate: &'a BoilerplateMatcher) -> Self {
        Self {
            mode,
            intent: QueryIntent::from_query(query),
            boilerplate,
        }
    }
}

/// Scored list plus which optional passes ran.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringOutcome {
    pub results: Vec<ScoredResult>,
    pub length_normalized: bool,
    pub proximity_applied: bool,
}

/// Run every stage in order and re-sort.
#[must_use]
pub fn score_results(results: Vec<ScoredResult>, ctx: &ScoringContext<'_>) -> ScoringOutcome {
    let mut results = apply_multipliers(results, ctx);
    let length_normalized = normalize_lengths(&mut results);
    let proximity_applied = ctx.mode == SearchMode::Hybrid && boost_proximity(&mut results);
    sort_by_score(&mut results);
    debug!(
        count = results.len(),
        length_normalized, proximity_applied, "scoring pipeline complete"
    );
    ScoringOutcome {
        results,
        length_normalized,
        proximity_applied,
    }
}

/// Quality and clamped structural multipliers for every result.
#[must_use]
pub fn apply_multipliers(results: Vec<ScoredResult>, ctx: &ScoringContext<'_>) -> Vec<ScoredResult> {
    results
        .into_iter()
        .map(|r| apply_to_result(r, ctx))
        .collect()
}

fn apply_to_result(mut result: ScoredResult, ctx: &ScoringContext<'_>) -> ScoredResult {
    let unit = &result.unit;
    let mut components = ScoreComponents::neutral(result.score);

    components.quality = quality_multiplier(unit.quality_score());
    components.heading = heading_multiplier(unit.structure.heading_level);
    components.atomic = atomic_multiplier(unit.structure.is_atomic);

    match unit.structure.content_tags() {
        Ok(tags) => {
            components.content_type = ctx.intent.content_type_multiplier(&tags);
            components.block_confidence = block_confidence_multiplier(&tags);
        }
        Err(err) => {
            warn!(
                unit_id = %unit.unit_id,
                "malformed content_types, skipping content multipliers: {err}"
            );
            components.diagnostics.push(Diagnostic::new(
                ErrorCode::MalformedMetadata,
                format!("content_types is not a JSON string array: {err}"),
            ));
        }
    }

    components.header_footer = ctx.boilerplate.penalty(&unit.text);
    components.cumulative_raw = components.heading
        * components.atomic
        * components.content_type
        * components.block_confidence
        * components.header_footer;
    components.cumulative = clamp_cumulative(components.cumulative_raw);

    result.score = result.score * components.quality * components.cumulative;
    result.components = Some(components);
    result
}

/// Clamp a combined multiplier into `[CUMULATIVE_MIN, CUMULATIVE_MAX]`.
#[must_use]
pub fn clamp_cumulative(raw: f64) -> f64 {
    raw.clamp(CUMULATIVE_MIN, CUMULATIVE_MAX)
}

/// Stable sort, best active score first.
pub fn sort_by_score(results: &mut [ScoredResult]) {
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
}


#[cfg(test)]
mod tests {
    use super::test_support::scored;
    use super::*;
    use docsift_core::{ContentTag, StructuralMetadata};
    use proptest::prelude::*;

    fn ctx(matcher: &BoilerplateMatcher) -> ScoringContext<'_> {
        ScoringContext::new("payment terms", SearchMode::Hybrid, matcher)
    }

    // -----------------------------------------------------------------------
    // Multipliers
    // -----------------------------------------------------------------------

    #[test]
    fn heading_atomic_confidence_compose() {
        let matcher = BoilerplateMatcher::default();
        let mut r = scored("a", "d1", 0, 1.0);
        r.unit.structure.heading_level = Some(1);
        r.unit.structure.is_atomic = true;

        let out = apply_multipliers(vec![r], &ctx(&matcher));
        let c = out[0].components.as_ref().expect("components");
        assert!((c.cumulative_raw - 1.6588).abs() < 1e-9);
        assert!((c.cumulative - 1.6588).abs() < 1e-9);
        assert!((c.quality - 0.9).abs() < f64::EPSILON);
        assert!((out[0].score - 1.6588 * 0.9).abs() < 1e-9);
    }

    #[test]
    fn boilerplate_penalty_is_inside_clamp() {
        let matcher = BoilerplateMatcher::default();
        let mut r = scored("a", "d1", 0, 1.0);
        r.unit.text = "Page 3 of 10".into();
        r.unit.document.quality_score = Some(5.0);
        let out = apply_multipliers(vec![r], &ctx(&matcher));
        let c = out[0].components.as_ref().expect("components");
        assert!((c.header_footer - 0.5).abs() < f64::EPSILON);
        assert!((c.cumulative - 0.58).abs() < 1e-9);
        assert!((out[0].score - 0.58).abs() < 1e-9);
    }

    #[test]
    fn structural_product_stays_under_ceiling() {
        let matcher = BoilerplateMatcher::default();
        let mut r = scored("a", "d1", 0, 1.0);
        r.unit.structure = StructuralMetadata {
            heading_level: Some(1),
            is_atomic: true,
            content_types: Some(StructuralMetadata::encode_tags(&[ContentTag::Table])),
            ..StructuralMetadata::default()
        };
        r.unit.document.quality_score = Some(5.0);
        let ctx = ScoringContext::new("revenue table", SearchMode::Lexical, &matcher);
        let out = apply_multipliers(vec![r], &ctx);
        let c = out[0].components.as_ref().expect("components");
        // 1.3 * 1.1 * 1.2 * (0.8 + 0.4 * 0.72)
        assert!((c.cumulative_raw - 1.867_008).abs() < 1e-9);
        assert!(c.cumulative <= CUMULATIVE_MAX);
    }

    #[test]
    fn malformed_tags_default_to_neutral_with_diagnostic() {
        let matcher = BoilerplateMatcher::default();
        let mut r = scored("a", "d1", 0, 1.0);
        r.unit.structure.content_types = Some("table;code".into());
        let out = apply_multipliers(vec![r], &ctx(&matcher));
        let c = out[0].components.as_ref().expect("components");
        assert!((c.content_type - 1.0).abs() < f64::EPSILON);
        assert!((c.block_confidence - 1.0).abs() < f64::EPSILON);
        assert_eq!(c.diagnostics.len(), 1);
        assert_eq!(c.diagnostics[0].code, ErrorCode::MalformedMetadata.code());
    }

    // -----------------------------------------------------------------------
    // Pipeline
    // -----------------------------------------------------------------------

    #[test]
    fn pipeline_resorts_by_final_score() {
        let matcher = BoilerplateMatcher::default();
        let mut boosted = scored("low", "d1", 0, 0.9);
        boosted.unit.structure.heading_level = Some(1);
        let plain = scored("high", "d1", 20, 1.0);
        let out = score_results(vec![plain, boosted], &ctx(&matcher));
        assert_eq!(out.results[0].unit.unit_id, "low");
        assert!(!out.length_normalized);
    }

    #[test]
    fn proximity_only_runs_in_hybrid_mode() {
        let matcher = BoilerplateMatcher::default();
        let results = vec![scored("a", "d1", 1, 1.0), scored("b", "d1", 2, 1.0)];
        let hybrid = score_results(results.clone(), &ctx(&matcher));
        assert!(hybrid.proximity_applied);
        let lexical = ScoringContext::new("payment terms", SearchMode::Lexical, &matcher);
        let single = score_results(results, &lexical);
        assert!(!single.proximity_applied);
        assert!(hybrid.results[0].score > single.results[0].score);
    }

    struct FlatLogit(f64);

    impl crate::rerank::Reranker for FlatLogit {
        fn rerank(
            &self,
            _: &str,
            candidates: &[crate::rerank::RerankCandidate],
            _: usize,
        ) -> anyhow::Result<Vec<crate::rerank::RerankVerdict>> {
            Ok(candidates
                .iter()
                .map(|c| crate::rerank::RerankVerdict {
                    original_index: c.index,
                    relevance_score: self.0,
                    reasoning: None,
                })
                .collect())
        }
    }

    #[test]
    fn boosts_survive_negative_rerank_logits() {
        let matcher = BoilerplateMatcher::default();
        let plain = scored("plain", "d1", 0, 0.03);
        let mut headed = scored("headed", "d1", 20, 0.02);
        headed.unit.structure.heading_level = Some(1);
        headed.unit.structure.is_atomic = true;

        let reranked = crate::rerank::apply_rerank("q", vec![plain, headed], &FlatLogit(-3.0), 2);
        assert!(reranked.reranked);
        let lexical = ScoringContext::new("payment terms", SearchMode::Lexical, &matcher);
        let out = score_results(reranked.results, &lexical);

        assert_eq!(out.results[0].unit.unit_id, "headed");
        assert!(out.results.iter().all(|r| r.score > 0.0));
    }

    #[test]
    fn boilerplate_penalty_demotes_under_mixed_sign_logits() {
        let matcher = BoilerplateMatcher::default();
        let mut footer = scored("footer", "d1", 0, 0.03);
        footer.unit.text = "Page 3 of 10".into();
        let body = scored("body", "d1", 20, 0.02);

        let reranked = crate::rerank::apply_rerank("q", vec![footer, body], &FlatLogit(-0.5), 2);
        let lexical = ScoringContext::new("payment terms", SearchMode::Lexical, &matcher);
        let out = score_results(reranked.results, &lexical);
        assert_eq!(out.results[0].unit.unit_id, "body");

        let mut footer = scored("footer", "d1", 0, 0.03);
        footer.unit.text = "Page 3 of 10".into();
        let body = scored("body", "d1", 20, 0.02);
        let reranked = crate::rerank::apply_rerank("q", vec![footer, body], &FlatLogit(2.0), 2);
        let out = score_results(reranked.results, &lexical);
        assert_eq!(out.results[0].unit.unit_id, "body");
    }

    proptest! {
        #[test]
        fn cumulative_always_within_bounds(
            level in proptest::option::of(0_u8..8),
            atomic in any::<bool>(),
            tags in proptest::collection::vec(
                prop_oneof![
                    Just(ContentTag::Table),
                    Just(ContentTag::Code),
                    Just(ContentTag::List),
                    Just(ContentTag::Figure),
                    Just(ContentTag::Text),
                ],
                0..4,
            ),
            boiler in any::<bool>(),
            query in prop_oneof![Just("table data"), Just("code list"), Just("plain words")],
        ) {
            let matcher = BoilerplateMatcher::default();
            let mut r = scored("a", "d1", 0, 1.0);
            r.unit.structure.heading_level = level;
            r.unit.structure.is_atomic = atomic;
            r.unit.structure.content_types = Some(StructuralMetadata::encode_tags(&tags));
            if boiler {
                r.unit.text = "Page 1 of 2".into();
            }
            let ctx = ScoringContext::new(query, SearchMode::Lexical, &matcher);
            let out = apply_multipliers(vec![r], &ctx);
            let c = out[0].components.as_ref().expect("components");
            prop_assert!((CUMULATIVE_MIN..=CUMULATIVE_MAX).contains(&c.cumulative));
        }
    }
}
