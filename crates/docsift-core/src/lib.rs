#![forbid(unsafe_code)]
//! docsift-core library.
//!
//! Shared vocabulary for the retrieval pipeline: searchable units and the
//! result shapes derived from them, structured filters, search configuration
//! and the error taxonomy.
//!
//! # Conventions
//!
//! - **Errors**: Library entry points return [`error::SearchError`]; per-result
//!   degradations are carried as [`error::Diagnostic`] values.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod config;
pub mod error;
pub mod filter;
pub mod model;

pub use config::{CONFIG_RELATIVE_PATH, SearchConfig, WorkerConfig, load_search_config};
pub use error::{Diagnostic, ErrorCode, SearchError, Stage};
pub use filter::{DocumentFilter, HeadingRange, MetadataFilter, PageRange, SearchFilters};
pub use model::{
    ClusterRef, ContentTag, ContextChunk, DocumentGroup, DocumentInfo, DocumentRelation,
    Enrichment, FusionWeights, ImageMeta, ParseUnitKindError, QueryClassification, QueryKind,
    RankedResult, RerankInfo, ScoreComponents, ScoreField, ScoredResult, SearchMode,
    SearchableUnit, SourceHit, StructuralMetadata, TableMeta, UnitDetail, UnitKind, WeightSource,
};
