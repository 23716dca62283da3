//! Search configuration loaded from `<corpus-dir>/.docsift/config.toml`.

use crate::error::SearchError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Location of the config file relative to the corpus directory.
pub const CONFIG_RELATIVE_PATH: &str = ".docsift/config.toml";

/// Tunables for retrieval, fusion and post-processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// RRF constant `k`.
    #[serde(default = "default_rrf_k")]
    pub rrf_k: usize,
    #[serde(default = "default_weight")]
    pub lexical_weight: f64,
    #[serde(default = "default_weight")]
    pub semantic_weight: f64,
    /// Derive fusion weights from the query classification.
    #[serde(default = "default_true")]
    pub auto_route: bool,
    /// OR-join synonym expansions onto the lexical query.
    #[serde(default = "default_true")]
    pub expand_queries: bool,
    /// Per-source over-fetch multiple of the final limit.
    #[serde(default = "default_overfetch_factor")]
    pub overfetch_factor: usize,
    /// Floor of the intermediate fusion limit.
    #[serde(default = "default_min_fusion_pool")]
    pub min_fusion_pool: usize,
    #[serde(default = "default_adaptive_threshold_floor")]
    pub adaptive_threshold_floor: f64,
    #[serde(default = "default_adaptive_threshold_ceiling")]
    pub adaptive_threshold_ceiling: f64,
    /// Floor of the candidate pool used for the adaptive threshold.
    #[serde(default = "default_adaptive_pool_floor")]
    pub adaptive_pool_floor: usize,
    #[serde(default)]
    pub dedup_by_content_hash: bool,
    /// Known repeated header/footer strings penalised by scoring.
    #[serde(default)]
    pub boilerplate: Vec<String>,
    /// Extra expansion terms merged over the built-in synonym table.
    #[serde(default)]
    pub synonyms: BTreeMap<String, Vec<String>>,
    /// Neighbor chunks attached on each side of a result.
    #[serde(default = "default_context_window")]
    pub context_window: u32,
    #[serde(default = "default_max_query_chars")]
    pub max_query_chars: usize,
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
    #[serde(default)]
    pub workers: WorkerConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            rrf_k: default_rrf_k(),
            lexical_weight: default_weight(),
            semantic_weight: default_weight(),
            auto_route: default_true(),
            expand_queries: default_true(),
            overfetch_factor: default_overfetch_factor(),
            min_fusion_pool: default_min_fusion_pool(),
            adaptive_threshold_floor: default_adaptive_threshold_floor(),
            adaptive_threshold_ceiling: default_adaptive_threshold_ceiling(),
            adaptive_pool_floor: default_adaptive_pool_floor(),
            dedup_by_content_hash: false,
            boilerplate: Vec::new(),
            synonyms: BTreeMap::new(),
            context_window: default_context_window(),
            max_query_chars: default_max_query_chars(),
            max_limit: default_max_limit(),
            workers: WorkerConfig::default(),
        }
    }
}

impl SearchConfig {
    /// Reject values that would make fusion or thresholding meaningless.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Validation`] naming the offending key.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.rrf_k == 0 {
            return Err(SearchError::validation("rrf_k", "must be positive"));
        }
        for (field, w) in [
            ("lexical_weight", self.lexical_weight),
            ("semantic_weight", self.semantic_weight),
        ] {
            if !w.is_finite() || w < 0.0 {
                return Err(SearchError::validation(
                    field,
                    format!("{w} is not a non-negative number"),
                ));
            }
        }
        if self.adaptive_threshold_floor > self.adaptive_threshold_ceiling {
            return Err(SearchError::validation(
                "adaptive_threshold_floor",
                "floor is above ceiling",
            ));
        }
        if self.max_limit == 0 {
            return Err(SearchError::validation("max_limit", "must be positive"));
        }
        Ok(())
    }
}

/// Command lines of worker processes, program first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default)]
    pub embedder: Option<Vec<String>>,
    #[serde(default)]
    pub reranker: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    search: Option<SearchConfig>,
}

/// Load the search config for a corpus directory.
///
/// A missing file yields defaults. The file may hold the keys at top level
/// or under a `[search]` table.
///
/// # Errors
///
/// Returns [`SearchError::Config`] when the file cannot be read or parsed.
pub fn load_search_config(corpus_dir: &Path) -> Result<SearchConfig, SearchError> {
    let path = corpus_dir.join(CONFIG_RELATIVE_PATH);
    if !path.exists() {
        debug!(path = %path.display(), "no search config, using defaults");
        return Ok(SearchConfig::default());
    }

    let content = std::fs::read_to_string(&path).map_err(|e| config_error(&path, &e, false))?;
    parse_config(&content).map_err(|e| config_error(&path, &e, true))
}

fn parse_config(content: &str) -> Result<SearchConfig, toml::de::Error> {
    let file: ConfigFile = toml::from_str(content)?;
    match file.search {
        Some(search) => Ok(search),
        None => toml::from_str(content),
    }
}

fn config_error(path: &Path, err: &impl std::fmt::Display, parse: bool) -> SearchError {
    SearchError::Config {
        path: PathBuf::from(path),
        detail: err.to_string(),
        parse,
    }
}

const fn default_true() -> bool {
    true
}

const fn default_rrf_k() -> usize {
    60
}

const fn default_weight() -> f64 {
    1.0
}

const fn default_overfetch_factor() -> usize {
    3
}

const fn default_min_fusion_pool() -> usize {
    20
}

const fn default_adaptive_threshold_floor() -> f64 {
    0.15
}

const fn default_adaptive_threshold_ceiling() -> f64 {
    0.5
}

const fn default_adaptive_pool_floor() -> usize {
    30
}

const fn default_context_window() -> u32 {
    1
}

const fn default_max_query_chars() -> usize {
    2000
}

const fn default_max_limit() -> usize {
    100
}
