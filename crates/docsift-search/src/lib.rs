#![forbid(unsafe_code)]
//! docsift-search library.
//!
//! Hybrid retrieval over an OCR corpus: BM25 full-text lookups and embedding
//! similarity are fused with Reciprocal Rank Fusion, re-scored with document
//! quality and layout structure, deduplicated, optionally reranked and
//! enriched. [`SearchEngine`] drives the whole pipeline against the
//! collaborator traits; [`CorpusStore`] implements them over SQLite.
//!
//! # Conventions
//!
//! - **Errors**: Collaborators return `anyhow::Result`; the engine maps their
//!   failures into [`docsift_core::SearchError`] with the failing stage.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod context;
pub mod dedup;
pub mod engine;
pub mod enrich;
pub mod fusion;
pub mod group;
pub mod metadata;
pub mod process;
pub mod query;
pub mod rerank;
pub mod retrieval;
pub mod scoring;
pub mod sqlite;

pub use context::{AssembledContext, assemble_context};
pub use engine::{
    Collaborators, ContextResponse, ResultSet, SearchCounts, SearchDecisions, SearchEngine,
    SearchRequest, SearchResponse,
};
pub use enrich::{EnrichOptions, EnrichmentSource};
pub use metadata::MetadataStore;
pub use process::{CommandEmbedder, CommandReranker, WorkerCommand};
pub use rerank::Reranker;
pub use retrieval::{Embedder, IndexHit, LexicalIndex, ScorePolarity, VectorIndex};
pub use sqlite::CorpusStore;
