//! Regroup a flat ranked list by document.

use docsift_core::{DocumentGroup, ScoredResult};
use std::collections::HashMap;

/// Group results by document id.
///
/// Document metadata is taken from the first result seen for each document.
/// Groups are ordered by result count, descending; equal counts keep the
/// order in which their documents first appeared. Results keep their
/// relative order inside each group.
#[must_use]
pub fn group_by_document(results: Vec<ScoredResult>) -> Vec<DocumentGroup> {
    let mut slot: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<DocumentGroup> = Vec::new();

    for r in results {
        let doc_id = r.unit.document_id().to_string();
        let idx = *slot.entry(doc_id.clone()).or_insert_with(|| {
            let doc = &r.unit.document;
            groups.push(DocumentGroup {
                document_id: doc_id,
                file_name: doc.file_name.clone(),
                file_path: doc.file_path.clone(),
                file_type: doc.file_type.clone(),
                quality_score: doc.quality_score,
                result_count: 0,
                results: Vec::new(),
            });
            groups.len() - 1
        });
        let group = &mut groups[idx];
        group.result_count += 1;
        group.results.push(r);
    }

    groups.sort_by(|a, b| b.result_count.cmp(&a.result_count));
    groups
}
