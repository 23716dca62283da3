//! Query preprocessing: synonym expansion and weight routing.

pub mod classify;
pub mod expand;

pub use classify::classify_query;
pub use expand::{Expansion, OR_SEPARATOR, SynonymTable, expand_query};

use docsift_core::{FusionWeights, QueryClassification, SearchConfig, WeightSource};

/// Output of preprocessing one query.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedQuery {
    /// Unexpanded text; the only input ever embedded.
    pub original: String,
    /// Text sent to the lexical index.
    pub lexical: String,
    pub expansion_applied: bool,
    pub classification: QueryClassification,
    pub weights: FusionWeights,
    pub weight_source: WeightSource,
}

/// Expands and classifies queries with a fixed synonym table.
#[derive(Debug, Clone)]
pub struct QueryPreprocessor {
    synonyms: SynonymTable,
    default_weights: FusionWeights,
}

impl QueryPreprocessor {
    #[must_use]
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            synonyms: SynonymTable::with_extra(&config.synonyms),
            default_weights: FusionWeights::new(config.lexical_weight, config.semantic_weight),
        }
    }

    /// Prepare `query`.
    ///
    /// Weight precedence: `explicit` always wins, then the classification
    /// when `auto_route` is set, then the configured defaults.
    #[must_use]
    pub fn prepare(
        &self,
        query: &str,
        expand: bool,
        auto_route: bool,
        explicit: Option<FusionWeights>,
    ) -> PreparedQuery {
        let original = query.trim().to_string();
        let (lexical, expansion_applied) = if expand {
            let exp = expand_query(&original, &self.synonyms);
            let applied = exp.applied();
            (exp.query, applied)
        } else {
            (original.clone(), false)
        };

        let classification = classify_query(&original);
        let (weights, weight_source) = match explicit {
            Some(w) => (w, WeightSource::Explicit),
            None if auto_route => (classification.weights, WeightSource::AutoRoute),
            None => (self.default_weights, WeightSource::Default),
        };

        PreparedQuery {
            original,
            lexical,
            expansion_applied,
            classification,
            weights,
            weight_source,
        }
    }
}
