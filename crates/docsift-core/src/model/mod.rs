//! Data model shared by every pipeline stage.

pub mod query;
pub mod result;
pub mod unit;

pub use query::{FusionWeights, QueryClassification, QueryKind, SearchMode, WeightSource};
pub use result::{
    ClusterRef, ContextChunk, DocumentGroup, DocumentRelation, Enrichment, ImageMeta,
    RankedResult, RerankInfo, ScoreComponents, ScoreField, ScoredResult, SourceHit, TableMeta,
};
pub use unit::{
    ContentTag, DocumentInfo, ParseUnitKindError, SearchableUnit, StructuralMetadata, UnitDetail,
    UnitKind,
};
