//! Result shapes produced by retrieval, fusion and scoring.

use crate::error::Diagnostic;
use crate::model::unit::SearchableUnit;
use serde::{Deserialize, Serialize};

/// One entry of a single retrieval source's ranked list.
///
/// Ranks are 1-based and dense within the originating list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub unit: SearchableUnit,
    /// Source-specific score, higher is better (BM25 after sign
    /// normalization, or cosine similarity).
    pub raw_score: f64,
    pub rank: usize,
}

/// Which score a result is currently ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreField {
    Bm25,
    Similarity,
    Rrf,
    Rerank,
}

impl ScoreField {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bm25 => "bm25_score",
            Self::Similarity => "similarity_score",
            Self::Rrf => "rrf_score",
            Self::Rerank => "rerank_score",
        }
    }
}

/// Position and raw score of a result in one source list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceHit {
    pub rank: usize,
    pub score: f64,
}

/// Reranker verdict for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankInfo {
    pub relevance_score: f64,
    /// 1-based position before reranking.
    pub original_rank: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// Multipliers applied to one result by the scoring pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponents {
    /// Active score before any multiplier.
    pub base_score: f64,
    pub quality: f64,
    pub heading: f64,
    pub atomic: f64,
    pub content_type: f64,
    pub block_confidence: f64,
    pub header_footer: f64,
    /// Product of heading through header/footer, before clamping.
    pub cumulative_raw: f64,
    /// `cumulative_raw` clamped to `[0.5, 2.0]`.
    pub cumulative: f64,
    pub length_normalization: f64,
    pub proximity: f64,
    pub nearby_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl ScoreComponents {
    #[must_use]
    pub const fn neutral(base_score: f64) -> Self {
        Self {
            base_score,
            quality: 1.0,
            heading: 1.0,
            atomic: 1.0,
            content_type: 1.0,
            block_confidence: 1.0,
            header_footer: 1.0,
            cumulative_raw: 1.0,
            cumulative: 1.0,
            length_normalization: 1.0,
            proximity: 1.0,
            nearby_count: 0,
            diagnostics: Vec::new(),
        }
    }
}

/// A neighboring chunk attached as reading context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextChunk {
    pub unit_id: String,
    pub chunk_index: u32,
    pub text: String,
    #[serde(default)]
    pub page_number: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterRef {
    pub cluster_id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub similarity: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRelation {
    pub target_document_id: String,
    pub relation_type: String,
    #[serde(default)]
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMeta {
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub row_count: Option<u32>,
    #[serde(default)]
    pub column_count: Option<u32>,
    #[serde(default)]
    pub headers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMeta {
    pub image_id: String,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub page_number: Option<u32>,
}

/// Optional enrichment blocks; `None` means the enrichment did not run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Result<Vec<ContextChunk>, Diagnostic>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clusters: Option<Result<Vec<ClusterRef>, Diagnostic>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relations: Option<Result<Vec<DocumentRelation>, Diagnostic>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<Result<Option<TableMeta>, Diagnostic>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Result<Option<ImageMeta>, Diagnostic>>,
}

impl Enrichment {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.context.is_none()
            && self.clusters.is_none()
            && self.relations.is_none()
            && self.table.is_none()
            && self.image.is_none()
    }

    /// Every diagnostic recorded across enrichment blocks.
    #[must_use]
    pub fn diagnostics(&self) -> Vec<&Diagnostic> {
        let mut out = Vec::new();
        if let Some(Err(d)) = &self.context {
            out.push(d);
        }
        if let Some(Err(d)) = &self.clusters {
            out.push(d);
        }
        if let Some(Err(d)) = &self.relations {
            out.push(d);
        }
        if let Some(Err(d)) = &self.table {
            out.push(d);
        }
        if let Some(Err(d)) = &self.image {
            out.push(d);
        }
        out
    }
}

/// A result flowing through fusion, scoring, dedup and enrichment.
///
/// Each distinct unit appears at most once in a list of these. Only the
/// scoring pipeline rewrites `score`; the per-source fields keep the
/// values observed at retrieval time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredResult {
    pub unit: SearchableUnit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lexical: Option<SourceHit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic: Option<SourceHit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rrf_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rerank: Option<RerankInfo>,
    pub score_field: ScoreField,
    /// Value of the active score field.
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<ScoreComponents>,
    #[serde(default, skip_serializing_if = "Enrichment::is_empty")]
    pub enrichment: Enrichment,
}

impl ScoredResult {
    /// Wrap a lexical hit for single-mode (no fusion) processing.
    #[must_use]
    pub fn from_lexical(ranked: RankedResult) -> Self {
        Self {
            lexical: Some(SourceHit {
                rank: ranked.rank,
                score: ranked.raw_score,
            }),
            semantic: None,
            rrf_score: None,
            rerank: None,
            score_field: ScoreField::Bm25,
            score: ranked.raw_score,
            components: None,
            enrichment: Enrichment::default(),
            unit: ranked.unit,
        }
    }

    /// Wrap a semantic hit for single-mode (no fusion) processing.
    #[must_use]
    pub fn from_semantic(ranked: RankedResult) -> Self {
        Self {
            lexical: None,
            semantic: Some(SourceHit {
                rank: ranked.rank,
                score: ranked.raw_score,
            }),
            rrf_score: None,
            rerank: None,
            score_field: ScoreField::Similarity,
            score: ranked.raw_score,
            components: None,
            enrichment: Enrichment::default(),
            unit: ranked.unit,
        }
    }

    /// Number of retrieval sources that returned this unit.
    #[must_use]
    pub fn source_count(&self) -> usize {
        usize::from(self.lexical.is_some()) + usize::from(self.semantic.is_some())
    }

    /// Best (lowest) rank across sources; `usize::MAX` when absent from both.
    #[must_use]
    pub fn best_source_rank(&self) -> usize {
        [self.lexical, self.semantic]
            .iter()
            .flatten()
            .map(|hit| hit.rank)
            .min()
            .unwrap_or(usize::MAX)
    }
}

/// Results sharing one document, with denormalized document metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentGroup {
    pub document_id: String,
    pub file_name: String,
    pub file_path: String,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub quality_score: Option<f64>,
    pub result_count: usize,
    pub results: Vec<ScoredResult>,
}
