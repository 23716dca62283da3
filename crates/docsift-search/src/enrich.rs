//! Result enrichment.
//!
//! Every enrichment is opt-in and fails on its own: a lookup error becomes a
//! [`Diagnostic`] on the results it would have decorated, and the rest of the
//! response is untouched.
//!
//! Neighbor context is fetched with one call per document covering every
//! wanted chunk index, and never repeats a unit that is already a primary
//! result. Cluster and relation lookups are made once per document.

use anyhow::Result;
use docsift_core::{
    ClusterRef, ContentTag, ContextChunk, Diagnostic, DocumentRelation, ErrorCode, ImageMeta,
    ScoredResult, TableMeta,
};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, warn};

/// Read access to the data enrichments attach.
pub trait EnrichmentSource: Send + Sync {
    /// Chunks of `document_id` at the given chunk indices; missing indices
    /// are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error when the lookup fails.
    fn neighbor_chunks(&self, document_id: &str, indices: &BTreeSet<u32>)
    -> Result<Vec<ContextChunk>>;

    /// # Errors
    ///
    /// Returns an error when the lookup fails.
    fn clusters(&self, document_id: &str) -> Result<Vec<ClusterRef>>;

    /// # Errors
    ///
    /// Returns an error when the lookup fails.
    fn relations(&self, document_id: &str) -> Result<Vec<DocumentRelation>>;

    /// # Errors
    ///
    /// Returns an error when the lookup fails.
    fn table_meta(&self, unit_id: &str) -> Result<Option<TableMeta>>;

    /// # Errors
    ///
    /// Returns an error when the lookup fails.
    fn image_meta(&self, image_id: &str) -> Result<Option<ImageMeta>>;
}

/// Which enrichments to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichOptions {
    /// Neighbor chunks on each side of a chunk result; 0 disables context.
    pub context_window: u32,
    pub clusters: bool,
    pub relations: bool,
    pub tables: bool,
    pub images: bool,
}

impl EnrichOptions {
    #[must_use]
    pub const fn any(&self) -> bool {
        self.context_window > 0 || self.clusters || self.relations || self.tables || self.images
    }
}

/// Attach the requested enrichments to `results`, preserving order.
#[must_use]
pub fn enrich_results(
    mut results: Vec<ScoredResult>,
    source: &dyn EnrichmentSource,
    opts: &EnrichOptions,
) -> Vec<ScoredResult> {
    if results.is_empty() || !opts.any() {
        return results;
    }
    if opts.context_window > 0 {
        attach_context(&mut results, source, opts.context_window);
    }
    if opts.clusters {
        attach_per_document(&mut results, "cluster", |doc| source.clusters(doc), |r, v| {
            r.enrichment.clusters = Some(v);
        });
    }
    if opts.relations {
        attach_per_document(&mut results, "relation", |doc| source.relations(doc), |r, v| {
            r.enrichment.relations = Some(v);
        });
    }
    if opts.tables {
        attach_tables(&mut results, source);
    }
    if opts.images {
        attach_images(&mut results, source);
    }
    let failures: usize = results.iter().map(|r| r.enrichment.diagnostics().len()).sum();
    debug!(results = results.len(), failures, "enrichment complete");
    results
}

fn enrichment_diagnostic(what: &str, target: &str, err: &anyhow::Error) -> Diagnostic {
    warn!("{what} enrichment failed for {target}: {err:#}");
    Diagnostic::new(
        ErrorCode::EnrichmentFailed,
        format!("{what} lookup failed for {target}: {err:#}"),
    )
}

/// Chunk indices within `window` of `index`, the index itself excluded.
fn window_around(index: u32, window: u32) -> impl Iterator<Item = u32> {
    let lo = index.saturating_sub(window);
    let hi = index.saturating_add(window);
    (lo..=hi).filter(move |i| *i != index)
}

fn attach_context(results: &mut [ScoredResult], source: &dyn EnrichmentSource, window: u32) {
    let primary_ids: HashSet<String> = results.iter().map(|r| r.unit.unit_id.clone()).collect();

    let mut primary_indices: HashMap<String, BTreeSet<u32>> = HashMap::new();
    for r in results.iter() {
        if let Some(idx) = r.unit.chunk_index() {
            primary_indices
                .entry(r.unit.document_id().to_string())
                .or_default()
                .insert(idx);
        }
    }

    let mut fetched: HashMap<String, Result<Vec<ContextChunk>, Diagnostic>> = HashMap::new();
    for (doc, primaries) in &primary_indices {
        let wanted: BTreeSet<u32> = primaries
            .iter()
            .flat_map(|idx| window_around(*idx, window))
            .filter(|i| !primaries.contains(i))
            .collect();
        let outcome = if wanted.is_empty() {
            Ok(Vec::new())
        } else {
            source
                .neighbor_chunks(doc, &wanted)
                .map(|chunks| {
                    chunks
                        .into_iter()
                        .filter(|c| !primary_ids.contains(&c.unit_id))
                        .collect()
                })
                .map_err(|err| enrichment_diagnostic("context", doc, &err))
        };
        fetched.insert(doc.clone(), outcome);
    }

    for r in results.iter_mut() {
        let Some(idx) = r.unit.chunk_index() else {
            continue;
        };
        let Some(outcome) = fetched.get(r.unit.document_id()) else {
            continue;
        };
        r.enrichment.context = Some(outcome.clone().map(|chunks| {
            let mut near: Vec<ContextChunk> = chunks
                .into_iter()
                .filter(|c| c.chunk_index.abs_diff(idx) <= window)
                .collect();
            near.sort_by_key(|c| c.chunk_index);
            near
        }));
    }
}

fn attach_per_document<T, F, S>(results: &mut [ScoredResult], what: &str, lookup: F, mut set: S)
where
    T: Clone,
    F: Fn(&str) -> Result<Vec<T>>,
    S: FnMut(&mut ScoredResult, Result<Vec<T>, Diagnostic>),
{
    let mut cache: HashMap<String, Result<Vec<T>, Diagnostic>> = HashMap::new();
    for r in results.iter_mut() {
        let doc = r.unit.document_id().to_string();
        let outcome = cache
            .entry(doc)
            .or_insert_with_key(|doc| {
                lookup(doc).map_err(|err| enrichment_diagnostic(what, doc, &err))
            })
            .clone();
        set(r, outcome);
    }
}

fn is_table(r: &ScoredResult) -> bool {
    r.unit
        .structure
        .content_tags()
        .is_ok_and(|tags| tags.contains(&ContentTag::Table))
}

fn attach_tables(results: &mut [ScoredResult], source: &dyn EnrichmentSource) {
    for r in results.iter_mut().filter(|r| is_table(r)) {
        let outcome = source
            .table_meta(&r.unit.unit_id)
            .map_err(|err| enrichment_diagnostic("table", &r.unit.unit_id, &err));
        r.enrichment.table = Some(outcome);
    }
}

fn attach_images(results: &mut [ScoredResult], source: &dyn EnrichmentSource) {
    for r in results.iter_mut() {
        let Some(image_id) = r.unit.image_id().map(str::to_string) else {
            continue;
        };
        let outcome = source
            .image_meta(&image_id)
            .map_err(|err| enrichment_diagnostic("image", &image_id, &err));
        r.enrichment.image = Some(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::test_support::scored;
    use docsift_core::{StructuralMetadata, UnitDetail};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Fake {
        neighbor_calls: Mutex<Vec<(String, BTreeSet<u32>)>>,
        cluster_calls: Mutex<usize>,
        fail_clusters_for: Option<&'static str>,
    }

    impl EnrichmentSource for Fake {
        fn neighbor_chunks(
            &self,
            document_id: &str,
            indices: &BTreeSet<u32>,
        ) -> Result<Vec<ContextChunk>> {
            self.neighbor_calls
                .lock()
                .expect("lock")
                .push((document_id.to_string(), indices.clone()));
            Ok(indices
                .iter()
                .map(|i| ContextChunk {
                    unit_id: format!("{document_id}-c{i}"),
                    chunk_index: *i,
                    text: format!("chunk {i}"),
                    page_number: Some(1),
                })
                .collect())
        }

        fn clusters(&self, document_id: &str) -> Result<Vec<ClusterRef>> {
            *self.cluster_calls.lock().expect("lock") += 1;
            if self.fail_clusters_for == Some(document_id) {
                anyhow::bail!("cluster table missing");
            }
            Ok(vec![ClusterRef {
                cluster_id: "k1".into(),
                label: Some("invoices".into()),
                similarity: Some(0.8),
            }])
        }

        fn relations(&self, _: &str) -> Result<Vec<DocumentRelation>> {
            Ok(Vec::new())
        }

        fn table_meta(&self, unit_id: &str) -> Result<Option<TableMeta>> {
            Ok(Some(TableMeta {
                caption: Some(format!("table of {unit_id}")),
                row_count: Some(3),
                column_count: Some(2),
                headers: vec!["item".into(), "amount".into()],
            }))
        }

        fn image_meta(&self, _: &str) -> Result<Option<ImageMeta>> {
            anyhow::bail!("images table missing")
        }
    }

    #[test]
    fn context_is_batched_and_excludes_primaries() {
        let source = Fake::default();
        let results = vec![scored("d1-c5", "d1", 5, 1.0), scored("d1-c6", "d1", 6, 0.9)];
        let opts = EnrichOptions {
            context_window: 1,
            ..EnrichOptions::default()
        };
        let out = enrich_results(results, &source, &opts);

        let calls = source.neighbor_calls.lock().expect("lock");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, BTreeSet::from([4, 7]));

        let ctx = out[0].enrichment.context.as_ref().expect("ran").as_ref().expect("ok");
        let idx: Vec<u32> = ctx.iter().map(|c| c.chunk_index).collect();
        assert_eq!(idx, vec![4]);
        let ctx = out[1].enrichment.context.as_ref().expect("ran").as_ref().expect("ok");
        let idx: Vec<u32> = ctx.iter().map(|c| c.chunk_index).collect();
        assert_eq!(idx, vec![7]);
    }

    #[test]
    fn cluster_lookup_cached_per_document() {
        let source = Fake::default();
        let results = vec![
            scored("a", "d1", 0, 1.0),
            scored("b", "d1", 9, 0.9),
            scored("c", "d2", 0, 0.8),
        ];
        let opts = EnrichOptions {
            clusters: true,
            ..EnrichOptions::default()
        };
        let out = enrich_results(results, &source, &opts);
        assert_eq!(*source.cluster_calls.lock().expect("lock"), 2);
        assert!(out.iter().all(|r| matches!(r.enrichment.clusters, Some(Ok(_)))));
    }

    #[test]
    fn failure_is_scoped_to_affected_results() {
        let source = Fake {
            fail_clusters_for: Some("d2"),
            ..Fake::default()
        };
        let results = vec![scored("a", "d1", 0, 1.0), scored("c", "d2", 0, 0.8)];
        let opts = EnrichOptions {
            clusters: true,
            ..EnrichOptions::default()
        };
        let out = enrich_results(results, &source, &opts);
        assert!(matches!(out[0].enrichment.clusters, Some(Ok(_))));
        let Some(Err(diag)) = &out[1].enrichment.clusters else {
            panic!("expected diagnostic");
        };
        assert_eq!(diag.code, ErrorCode::EnrichmentFailed.code());
        assert!(diag.message.contains("cluster table missing"));
    }

    #[test]
    fn table_and_image_lookups_target_matching_units() {
        let source = Fake::default();
        let mut table = scored("t", "d1", 0, 1.0);
        table.unit.structure = StructuralMetadata {
            content_types: Some(r#"["table"]"#.into()),
            ..StructuralMetadata::default()
        };
        let mut image = scored("i", "d1", 0, 0.9);
        image.unit.detail = UnitDetail::VlmDescription {
            image_id: "img-1".into(),
            image_type: Some("chart".into()),
            confidence: None,
        };
        let plain = scored("p", "d1", 3, 0.8);
        let opts = EnrichOptions {
            tables: true,
            images: true,
            ..EnrichOptions::default()
        };
        let out = enrich_results(vec![table, image, plain], &source, &opts);
        assert!(matches!(out[0].enrichment.table, Some(Ok(Some(_)))));
        assert!(out[0].enrichment.image.is_none());
        assert!(matches!(out[1].enrichment.image, Some(Err(_))));
        assert!(out[2].enrichment.is_empty());
    }

    #[test]
    fn disabled_options_leave_results_untouched() {
        let results = vec![scored("a", "d1", 0, 1.0)];
        let out = enrich_results(results.clone(), &Fake::default(), &EnrichOptions::default());
        assert_eq!(out, results);
    }
}
