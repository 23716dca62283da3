//! Search orchestration.
//!
//! One call runs the whole pipeline for one query:
//!
//! ```text
//! validate -> preprocess -> resolve document filter
//!   -> { lexical | embed + semantic }   (concurrent)
//!   -> fuse (hybrid) or pass through -> rerank (optional)
//!   -> score -> content-hash dedup (optional) -> truncate
//!   -> enrich (optional) -> group (optional)
//! ```
//!
//! Hybrid mode degrades to lexical-only when no embedder or vector index is
//! configured. A collaborator that is configured but fails aborts the query.

use crate::context::{AssembledContext, assemble_context};
use crate::dedup::dedup_by_content_hash;
use crate::enrich::{EnrichOptions, EnrichmentSource, enrich_results};
use crate::fusion::{intermediate_limit, rrf_fuse};
use crate::group::group_by_document;
use crate::metadata::{MetadataStore, resolve_document_filter};
use crate::query::{PreparedQuery, QueryPreprocessor};
use crate::rerank::{Reranker, apply_rerank};
use crate::retrieval::semantic::ThresholdPolicy;
use crate::retrieval::{
    Embedder, LexicalIndex, SemanticOutcome, ThresholdDecision, VectorIndex, lexical_search,
    semantic_search,
};
use crate::scoring::{BoilerplateMatcher, ScoringContext, score_results};
use docsift_core::{
    Diagnostic, DocumentGroup, ErrorCode, FusionWeights, MetadataFilter, QueryClassification,
    RankedResult, ScoredResult, SearchConfig, SearchError, SearchFilters, SearchMode, Stage,
    WeightSource,
};
use serde::Serialize;
use std::thread::ScopedJoinHandle;
use tracing::{debug, info, instrument, warn};

/// External systems the engine drives.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub lexical: &'a dyn LexicalIndex,
    pub vector: Option<&'a dyn VectorIndex>,
    pub embedder: Option<&'a dyn Embedder>,
    pub reranker: Option<&'a dyn Reranker>,
    pub metadata: Option<&'a dyn MetadataStore>,
    pub enrichment: Option<&'a dyn EnrichmentSource>,
}

impl<'a> Collaborators<'a> {
    /// Lexical-only collaborators.
    #[must_use]
    pub fn lexical(index: &'a dyn LexicalIndex) -> Self {
        Self {
            lexical: index,
            vector: None,
            embedder: None,
            reranker: None,
            metadata: None,
            enrichment: None,
        }
    }

    const fn semantic_ready(&self) -> bool {
        self.vector.is_some() && self.embedder.is_some()
    }
}

/// One query.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub mode: SearchMode,
    pub limit: usize,
    pub filters: SearchFilters,
    pub metadata: MetadataFilter,
    /// Fusion weights that override routing and configuration.
    pub weights: Option<FusionWeights>,
    /// Fixed similarity cutoff; `None` uses the adaptive threshold.
    pub threshold: Option<f64>,
    /// Overrides of the configured switches.
    pub expand: Option<bool>,
    pub auto_route: Option<bool>,
    pub dedup: Option<bool>,
    pub rerank: bool,
    pub group: bool,
    pub enrich: EnrichOptions,
}

impl SearchRequest {
    pub const DEFAULT_LIMIT: usize = 10;

    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            mode: SearchMode::default(),
            limit: Self::DEFAULT_LIMIT,
            filters: SearchFilters::default(),
            metadata: MetadataFilter::default(),
            weights: None,
            threshold: None,
            expand: None,
            auto_route: None,
            dedup: None,
            rerank: false,
            group: false,
            enrich: EnrichOptions::default(),
        }
    }

    #[must_use]
    pub const fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }
}

/// Results in the requested layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "layout", content = "items", rename_all = "snake_case")]
pub enum ResultSet {
    Flat(Vec<ScoredResult>),
    Grouped(Vec<DocumentGroup>),
}

impl ResultSet {
    /// Number of results, counting inside groups.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Flat(results) => results.len(),
            Self::Grouped(groups) => groups.iter().map(|g| g.result_count).sum(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Results in ranked order; grouped results are flattened group by group.
    #[must_use]
    pub fn iter_results(&self) -> Vec<&ScoredResult> {
        match self {
            Self::Flat(results) => results.iter().collect(),
            Self::Grouped(groups) => groups.iter().flat_map(|g| g.results.iter()).collect(),
        }
    }
}

/// How many candidates each stage saw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SearchCounts {
    pub lexical: usize,
    pub semantic: usize,
    pub fused: usize,
    /// Removed by content-hash dedup.
    pub deduplicated: usize,
    pub returned: usize,
}

/// Decisions actually taken for a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchDecisions {
    /// Mode that ran, after any degradation.
    pub effective_mode: SearchMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded: Option<String>,
    pub weights: FusionWeights,
    pub weight_source: WeightSource,
    pub auto_routed: bool,
    pub classification: QueryClassification,
    pub rrf_k: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<ThresholdDecision>,
    pub expansion_applied: bool,
    pub reranked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_error: Option<Diagnostic>,
    pub length_normalized: bool,
    pub proximity_applied: bool,
}

/// Everything a caller gets back for one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expanded_query: Option<String>,
    pub mode: SearchMode,
    pub results: ResultSet,
    pub counts: SearchCounts,
    pub decisions: SearchDecisions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guidance: Option<String>,
}

/// A budgeted reading context plus the decisions behind it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextResponse {
    pub query: String,
    pub context: AssembledContext,
    pub counts: SearchCounts,
    pub decisions: SearchDecisions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guidance: Option<String>,
}

/// Runs queries against a fixed set of collaborators and configuration.
pub struct SearchEngine<'a> {
    collaborators: Collaborators<'a>,
    config: SearchConfig,
    preprocessor: QueryPreprocessor,
    boilerplate: BoilerplateMatcher,
    policy: ThresholdPolicy,
}

struct Retrieved {
    lexical: Vec<RankedResult>,
    semantic: Option<SemanticOutcome>,
}

impl<'a> SearchEngine<'a> {
    /// # Errors
    ///
    /// Returns [`SearchError::Validation`] when the configuration is unusable.
    pub fn new(collaborators: Collaborators<'a>, config: SearchConfig) -> Result<Self, SearchError> {
        config.validate()?;
        Ok(Self {
            preprocessor: QueryPreprocessor::new(&config),
            boilerplate: BoilerplateMatcher::new(&config.boilerplate),
            policy: ThresholdPolicy::from_config(&config),
            collaborators,
            config,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Run one query end to end.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Validation`] for malformed input and
    /// [`SearchError::Collaborator`] when an index, the embedder or the
    /// metadata store fails.
    #[instrument(skip(self, request), fields(mode = %request.mode, limit = request.limit))]
    pub fn search(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError> {
        self.validate(request)?;

        let expand = request.expand.unwrap_or(self.config.expand_queries);
        let auto_route = request.auto_route.unwrap_or(self.config.auto_route);
        let prepared = self
            .preprocessor
            .prepare(&request.query, expand, auto_route, request.weights);

        let mut filters = request.filters.clone();
        filters.documents = resolve_document_filter(
            self.collaborators.metadata,
            filters.documents.clone(),
            &request.metadata,
        )
        .map_err(|err| {
            collaborator_error(Stage::Metadata, &prepared.original, request.mode, &filters, &err)
        })?;

        let (mode, degraded) = self.effective_mode(request.mode, &prepared, &filters)?;
        let mut decisions = SearchDecisions {
            effective_mode: mode,
            degraded,
            weights: prepared.weights,
            weight_source: prepared.weight_source,
            auto_routed: prepared.weight_source == WeightSource::AutoRoute,
            classification: prepared.classification.clone(),
            rrf_k: self.config.rrf_k,
            threshold: None,
            expansion_applied: prepared.expansion_applied,
            reranked: false,
            rerank_error: None,
            length_normalized: false,
            proximity_applied: false,
        };
        let expanded_query = prepared
            .expansion_applied
            .then(|| prepared.lexical.clone());

        if filters.documents.matches_none() {
            info!("document filters matched nothing, skipping retrieval");
            return Ok(SearchResponse {
                query: prepared.original,
                expanded_query,
                mode: request.mode,
                results: empty_layout(request.group),
                counts: SearchCounts::default(),
                decisions,
                guidance: Some(
                    "The document and metadata filters excluded every document. \
                     Relax --document or the metadata filters and retry."
                        .to_string(),
                ),
            });
        }

        let keep = intermediate_limit(request.limit, self.config.min_fusion_pool);
        let fetch = request
            .limit
            .saturating_mul(self.config.overfetch_factor.max(1))
            .max(keep);

        // The semantic adapter sizes its own over-fetched pool from `keep`.
        let retrieved = self.retrieve(&prepared, mode, fetch, keep, request.threshold, &filters)?;
        let mut counts = SearchCounts {
            lexical: retrieved.lexical.len(),
            semantic: retrieved.semantic.as_ref().map_or(0, |s| s.results.len()),
            ..SearchCounts::default()
        };
        decisions.threshold = retrieved.semantic.as_ref().map(|s| s.threshold.clone());

        let mut candidates = combine(retrieved, mode, &prepared, self.config.rrf_k);
        counts.fused = candidates.len();
        candidates.truncate(keep);

        if request.rerank {
            match self.collaborators.reranker {
                Some(reranker) => {
                    let outcome = apply_rerank(&prepared.original, candidates, reranker, keep);
                    decisions.reranked = outcome.reranked;
                    decisions.rerank_error = outcome.error;
                    candidates = outcome.results;
                }
                None => {
                    warn!("rerank requested but no reranker is configured");
                    decisions.rerank_error = Some(Diagnostic::new(
                        ErrorCode::RerankDegraded,
                        "no reranker configured",
                    ));
                }
            }
        }

        let scoring = ScoringContext::new(&prepared.original, mode, &self.boilerplate);
        let scored = score_results(candidates, &scoring);
        decisions.length_normalized = scored.length_normalized;
        decisions.proximity_applied = scored.proximity_applied;
        let mut results = scored.results;

        if request.dedup.unwrap_or(self.config.dedup_by_content_hash) {
            let before = results.len();
            results = dedup_by_content_hash(results);
            counts.deduplicated = before - results.len();
        }
        results.truncate(request.limit);

        if let Some(source) = self.collaborators.enrichment {
            results = enrich_results(results, source, &request.enrich);
        }
        counts.returned = results.len();

        let guidance = results
            .is_empty()
            .then(|| empty_guidance(&prepared.original, mode, &filters));
        let results = if request.group {
            ResultSet::Grouped(group_by_document(results))
        } else {
            ResultSet::Flat(results)
        };
        debug!(?counts, "search complete");

        Ok(SearchResponse {
            query: prepared.original,
            expanded_query,
            mode: request.mode,
            results,
            counts,
            decisions,
            guidance,
        })
    }

    /// Search, then assemble an overlap-free passage set within `max_chars`.
    ///
    /// # Errors
    ///
    /// As [`SearchEngine::search`], plus a validation error for a zero
    /// budget.
    pub fn context(
        &self,
        request: &SearchRequest,
        max_chars: usize,
    ) -> Result<ContextResponse, SearchError> {
        if max_chars == 0 {
            return Err(SearchError::validation("max_chars", "must be positive"));
        }
        let mut flat = request.clone();
        flat.group = false;
        let response = self.search(&flat)?;
        let results = match response.results {
            ResultSet::Flat(results) => results,
            ResultSet::Grouped(groups) => groups.into_iter().flat_map(|g| g.results).collect(),
        };
        let context = assemble_context(results, max_chars);
        debug!(
            passages = context.passages.len(),
            chars = context.total_chars,
            dropped = context.dropped_overlaps,
            "context assembled"
        );
        Ok(ContextResponse {
            query: response.query,
            context,
            counts: response.counts,
            decisions: response.decisions,
            guidance: response.guidance,
        })
    }

    fn validate(&self, request: &SearchRequest) -> Result<(), SearchError> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(SearchError::validation("query", "must not be empty"));
        }
        let chars = query.chars().count();
        if chars > self.config.max_query_chars {
            return Err(SearchError::validation(
                "query",
                format!(
                    "{chars} characters exceeds the limit of {}",
                    self.config.max_query_chars
                ),
            ));
        }
        if request.limit == 0 || request.limit > self.config.max_limit {
            return Err(SearchError::validation(
                "limit",
                format!("{} is outside 1..={}", request.limit, self.config.max_limit),
            ));
        }
        if let Some(w) = request.weights {
            for (source, value) in [("lexical", w.lexical), ("semantic", w.semantic)] {
                if !value.is_finite() || value < 0.0 {
                    return Err(SearchError::validation(
                        "weights",
                        format!("{source} weight {value} is not a non-negative number"),
                    ));
                }
            }
        }
        if let Some(t) = request.threshold {
            if !t.is_finite() || !(-1.0..=1.0).contains(&t) {
                return Err(SearchError::validation(
                    "threshold",
                    format!("{t} is outside -1..=1"),
                ));
            }
        }
        request.filters.validate()?;
        request.metadata.validate()
    }

    fn effective_mode(
        &self,
        requested: SearchMode,
        prepared: &PreparedQuery,
        filters: &SearchFilters,
    ) -> Result<(SearchMode, Option<String>), SearchError> {
        if !requested.uses_semantic() || self.collaborators.semantic_ready() {
            return Ok((requested, None));
        }
        let reason = "no embedder or vector index configured";
        if requested == SearchMode::Hybrid {
            warn!("semantic layer unavailable, falling back to lexical-only search: {reason}");
            return Ok((SearchMode::Lexical, Some(reason.to_string())));
        }
        Err(SearchError::Collaborator {
            stage: Stage::Embedding,
            query: prepared.original.clone(),
            mode: requested,
            filters: filters.summary(),
            detail: reason.to_string(),
        })
    }

    fn retrieve(
        &self,
        prepared: &PreparedQuery,
        mode: SearchMode,
        fetch: usize,
        semantic_limit: usize,
        threshold: Option<f64>,
        filters: &SearchFilters,
    ) -> Result<Retrieved, SearchError> {
        std::thread::scope(|scope| {
            let lexical = mode
                .uses_lexical()
                .then(|| scope.spawn(|| self.run_lexical(prepared, mode, fetch, filters)));
            let semantic = mode.uses_semantic().then(|| {
                scope.spawn(|| {
                    self.run_semantic(prepared, mode, semantic_limit, threshold, filters)
                })
            });

            let lexical = match lexical {
                Some(handle) => joined(handle, "lexical")?,
                None => Vec::new(),
            };
            let semantic = match semantic {
                Some(handle) => Some(joined(handle, "semantic")?),
                None => None,
            };
            Ok::<_, SearchError>(Retrieved { lexical, semantic })
        })
    }

    fn run_lexical(
        &self,
        prepared: &PreparedQuery,
        mode: SearchMode,
        fetch: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<RankedResult>, SearchError> {
        let results = lexical_search(self.collaborators.lexical, &prepared.lexical, fetch, filters)
            .map_err(|err| {
                collaborator_error(Stage::Lexical, &prepared.original, mode, filters, &err)
            })?;
        debug!(count = results.len(), "lexical retrieval");
        Ok(results)
    }

    fn run_semantic(
        &self,
        prepared: &PreparedQuery,
        mode: SearchMode,
        limit: usize,
        threshold: Option<f64>,
        filters: &SearchFilters,
    ) -> Result<SemanticOutcome, SearchError> {
        let fail = |stage: Stage, err: anyhow::Error| {
            collaborator_error(stage, &prepared.original, mode, filters, &err)
        };
        let (Some(embedder), Some(vector)) =
            (self.collaborators.embedder, self.collaborators.vector)
        else {
            return Err(fail(
                Stage::Embedding,
                anyhow::anyhow!("no embedder or vector index configured"),
            ));
        };

        // Only the unexpanded query is embedded.
        let embedding = embedder
            .embed(&prepared.original)
            .map_err(|err| fail(Stage::Embedding, err))?;
        let outcome = semantic_search(vector, &embedding, limit, threshold, filters, &self.policy)
            .map_err(|err| fail(Stage::Semantic, err))?;
        debug!(
            count = outcome.results.len(),
            threshold = outcome.threshold.value,
            "semantic retrieval"
        );
        Ok(outcome)
    }
}

fn joined<T>(
    handle: ScopedJoinHandle<'_, Result<T, SearchError>>,
    what: &str,
) -> Result<T, SearchError> {
    handle
        .join()
        .map_err(|_| SearchError::Internal(format!("{what} retrieval worker panicked")))?
}

fn combine(
    retrieved: Retrieved,
    mode: SearchMode,
    prepared: &PreparedQuery,
    rrf_k: usize,
) -> Vec<ScoredResult> {
    let semantic = retrieved.semantic.map(|s| s.results).unwrap_or_default();
    match mode {
        SearchMode::Hybrid => rrf_fuse(&retrieved.lexical, &semantic, prepared.weights, rrf_k),
        SearchMode::Lexical => retrieved
            .lexical
            .into_iter()
            .map(ScoredResult::from_lexical)
            .collect(),
        SearchMode::Semantic => semantic.into_iter().map(ScoredResult::from_semantic).collect(),
    }
}

fn collaborator_error(
    stage: Stage,
    query: &str,
    mode: SearchMode,
    filters: &SearchFilters,
    err: &anyhow::Error,
) -> SearchError {
    SearchError::Collaborator {
        stage,
        query: query.to_string(),
        mode,
        filters: filters.summary(),
        detail: format!("{err:#}"),
    }
}

const fn empty_layout(group: bool) -> ResultSet {
    if group {
        ResultSet::Grouped(Vec::new())
    } else {
        ResultSet::Flat(Vec::new())
    }
}

fn empty_guidance(query: &str, mode: SearchMode, filters: &SearchFilters) -> String {
    let mut hints = vec!["use broader or fewer terms".to_string()];
    if *filters != SearchFilters::default() {
        hints.push("remove filters".to_string());
    }
    match mode {
        SearchMode::Lexical => hints.push("try --mode hybrid for meaning-based matches".to_string()),
        SearchMode::Semantic => hints.push("try --mode lexical for exact terms".to_string()),
        SearchMode::Hybrid => {}
    }
    format!("No results for {query:?}; {}.", hints.join(", "))
}
