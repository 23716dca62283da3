//! Query-scoped types: retrieval mode, classification and fusion weights.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which retrieval sources a query uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    #[default]
    Hybrid,
    Lexical,
    Semantic,
}

impl SearchMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hybrid => "hybrid",
            Self::Lexical => "lexical",
            Self::Semantic => "semantic",
        }
    }

    #[must_use]
    pub const fn uses_lexical(self) -> bool {
        matches!(self, Self::Hybrid | Self::Lexical)
    }

    #[must_use]
    pub const fn uses_semantic(self) -> bool {
        matches!(self, Self::Hybrid | Self::Semantic)
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hybrid" => Ok(Self::Hybrid),
            "lexical" | "bm25" | "keyword" => Ok(Self::Lexical),
            "semantic" | "vector" => Ok(Self::Semantic),
            other => Err(format!("unknown search mode: {other}")),
        }
    }
}

/// Per-source RRF weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    pub lexical: f64,
    pub semantic: f64,
}

impl FusionWeights {
    #[must_use]
    pub const fn new(lexical: f64, semantic: f64) -> Self {
        Self { lexical, semantic }
    }
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self::new(1.0, 1.0)
    }
}

/// Lexical shape of a query, used to route fusion weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    Exact,
    Semantic,
    Mixed,
}

impl QueryKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Semantic => "semantic",
            Self::Mixed => "mixed",
        }
    }

    /// Weight pair implied by the classification.
    #[must_use]
    pub const fn weights(self) -> FusionWeights {
        match self {
            Self::Exact => FusionWeights::new(1.5, 0.5),
            Self::Semantic => FusionWeights::new(0.5, 1.5),
            Self::Mixed => FusionWeights::new(1.0, 1.0),
        }
    }
}

/// Classification of one query plus the signals that decided it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryClassification {
    pub kind: QueryKind,
    pub weights: FusionWeights,
    #[serde(default)]
    pub signals: Vec<String>,
}

/// Where the fusion weights actually used came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightSource {
    Default,
    AutoRoute,
    Explicit,
}

impl WeightSource {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::AutoRoute => "auto_route",
            Self::Explicit => "explicit",
        }
    }
}
