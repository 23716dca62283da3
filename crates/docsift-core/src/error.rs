use crate::model::SearchMode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    ConfigReadError,
    CorpusNotFound,
    InvalidRequest,
    InvalidFilter,
    LexicalIndexFailed,
    EmbeddingFailed,
    VectorIndexFailed,
    MetadataStoreFailed,
    RerankDegraded,
    EnrichmentFailed,
    MalformedMetadata,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::ConfigReadError => "E1002",
            Self::CorpusNotFound => "E1003",
            Self::InvalidRequest => "E2001",
            Self::InvalidFilter => "E2002",
            Self::LexicalIndexFailed => "E3001",
            Self::EmbeddingFailed => "E3002",
            Self::VectorIndexFailed => "E3003",
            Self::MetadataStoreFailed => "E3004",
            Self::RerankDegraded => "E4001",
            Self::EnrichmentFailed => "E4002",
            Self::MalformedMetadata => "E4003",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::ConfigReadError => "Config file unreadable",
            Self::CorpusNotFound => "Corpus database not found",
            Self::InvalidRequest => "Invalid search request",
            Self::InvalidFilter => "Invalid search filter",
            Self::LexicalIndexFailed => "Full-text index lookup failed",
            Self::EmbeddingFailed => "Query embedding failed",
            Self::VectorIndexFailed => "Vector index lookup failed",
            Self::MetadataStoreFailed => "Metadata filter resolution failed",
            Self::RerankDegraded => "Reranker unavailable; results left in fused order",
            Self::EnrichmentFailed => "Result enrichment failed",
            Self::MalformedMetadata => "Structural metadata could not be parsed",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in .docsift/config.toml and retry."),
            Self::ConfigReadError => Some("Check read permissions on .docsift/config.toml."),
            Self::CorpusNotFound => Some("Pass --db with the path of an ingested corpus database."),
            Self::InvalidRequest | Self::InvalidFilter => {
                Some("Correct the reported field and resubmit the query.")
            }
            Self::LexicalIndexFailed => Some("Verify the FTS5 tables exist in the corpus database."),
            Self::EmbeddingFailed => {
                Some("Check the embedding worker command, or search with --mode lexical.")
            }
            Self::VectorIndexFailed => Some("Verify stored embeddings match the query dimension."),
            Self::MetadataStoreFailed => Some("Retry without metadata filters to isolate the cause."),
            Self::RerankDegraded | Self::EnrichmentFailed | Self::MalformedMetadata => None,
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }

    /// Whether this code aborts a query or only degrades it.
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        !matches!(
            self,
            Self::RerankDegraded | Self::EnrichmentFailed | Self::MalformedMetadata
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Pipeline stage that talks to an external collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Lexical,
    Embedding,
    Semantic,
    Metadata,
}

impl Stage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lexical => "lexical search",
            Self::Embedding => "query embedding",
            Self::Semantic => "semantic search",
            Self::Metadata => "metadata filter resolution",
        }
    }

    #[must_use]
    pub const fn error_code(self) -> ErrorCode {
        match self {
            Self::Lexical => ErrorCode::LexicalIndexFailed,
            Self::Embedding => ErrorCode::EmbeddingFailed,
            Self::Semantic => ErrorCode::VectorIndexFailed,
            Self::Metadata => ErrorCode::MetadataStoreFailed,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Query-level failure.
///
/// Validation errors are raised before any retrieval runs. Collaborator errors
/// carry the query, mode and a filter summary so the failing call can be
/// reproduced.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("{stage} failed for query {query:?} (mode={mode}, filters={filters}): {detail}")]
    Collaborator {
        stage: Stage,
        query: String,
        mode: SearchMode,
        filters: String,
        detail: String,
    },

    #[error("failed to load config {}: {detail}", .path.display())]
    Config {
        path: PathBuf,
        detail: String,
        parse: bool,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl SearchError {
    #[must_use]
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { field, .. } => {
                if matches!(
                    *field,
                    "page_range" | "heading_levels" | "min_quality" | "section_prefix"
                ) {
                    ErrorCode::InvalidFilter
                } else {
                    ErrorCode::InvalidRequest
                }
            }
            Self::Collaborator { stage, .. } => stage.error_code(),
            Self::Config { parse: true, .. } => ErrorCode::ConfigParseError,
            Self::Config { parse: false, .. } => ErrorCode::ConfigReadError,
            Self::Internal(_) => ErrorCode::InternalUnexpected,
        }
    }
}

/// Non-fatal failure attached to a single result instead of aborting the query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: String,
    pub message: String,
}

impl Diagnostic {
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code().to_string(),
            message: message.into(),
        }
    }

    /// Build from any error, keeping its full cause chain (`{:#}`).
    #[must_use]
    pub fn from_error(code: ErrorCode, err: &impl fmt::Display) -> Self {
        Self::new(code, format!("{err:#}"))
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}
