//! Lexical adapter: per-class full-text lookups merged into one ranked list.

use super::{LexicalIndex, rank_hits};
use anyhow::{Context, Result};
use docsift_core::{RankedResult, SearchFilters};
use tracing::debug;

/// Query every requested content class and return one best-first list.
///
/// Native scores are sign-normalised so that higher is always better, and
/// `filters` is re-applied to whatever the index returns so every source
/// yields the same candidate population.
///
/// # Errors
///
/// Returns the first index error, annotated with the failing content class.
pub fn lexical_search(
    index: &dyn LexicalIndex,
    query: &str,
    limit: usize,
    filters: &SearchFilters,
) -> Result<Vec<RankedResult>> {
    if limit == 0 {
        return Ok(Vec::new());
    }

    let polarity = index.polarity();
    let mut hits = Vec::new();
    for kind in filters.kinds() {
        let found = index
            .search(kind, query, limit, filters)
            .with_context(|| format!("full-text lookup over {kind} units"))?;
        let before = found.len();
        hits.extend(
            found
                .into_iter()
                .filter(|hit| filters.admits(&hit.unit))
                .map(|mut hit| {
                    hit.score = polarity.normalize(hit.score);
                    hit
                }),
        );
        debug!(%kind, returned = before, "lexical class lookup");
    }

    Ok(rank_hits(hits, limit))
}
