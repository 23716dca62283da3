//! Document-level filter resolution.

use anyhow::Result;
use docsift_core::{DocumentFilter, MetadataFilter};
use tracing::debug;

/// Store that can answer document-level predicates.
pub trait MetadataStore: Send + Sync {
    /// Resolve `filter` into a document allow-list.
    ///
    /// An empty filter resolves to [`DocumentFilter::Unset`]; a filter that
    /// matched no document resolves to [`DocumentFilter::MatchesNone`].
    ///
    /// # Errors
    ///
    /// Returns an error when the store cannot be queried.
    fn resolve_documents(&self, filter: &MetadataFilter) -> Result<DocumentFilter>;
}

/// Combine the caller's explicit allow-list with a metadata filter.
///
/// The store is not consulted when the metadata filter is empty or the
/// explicit list already matches nothing.
///
/// # Errors
///
/// Propagates store failures.
pub fn resolve_document_filter(
    store: Option<&dyn MetadataStore>,
    explicit: DocumentFilter,
    metadata: &MetadataFilter,
) -> Result<DocumentFilter> {
    if metadata.is_empty() || explicit.matches_none() {
        return Ok(explicit);
    }
    let Some(store) = store else {
        anyhow::bail!("metadata filter given but no metadata store is configured");
    };
    let resolved = store.resolve_documents(metadata)?;
    debug!(%resolved, %explicit, "metadata filter resolved");
    Ok(explicit.intersect(resolved))
}
