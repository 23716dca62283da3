//! End-to-end search over a real SQLite corpus.
//!
//! Builds a small corpus (a service contract and an operator manual) through
//! the published schema and drives [`SearchEngine`] with [`CorpusStore`] as
//! every collaborator, plus a fixed-vector embedder.

use anyhow::Result;
use docsift_core::{MetadataFilter, SearchConfig, SearchMode};
use docsift_search::sqlite::CORPUS_SCHEMA_SQL;
use docsift_search::{
    Collaborators, CorpusStore, Embedder, EnrichOptions, ResultSet, SearchEngine, SearchRequest,
};
use rusqlite::{Connection, params};
use std::path::Path;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

struct FixedEmbedder(Vec<f32>);

impl Embedder for FixedEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(self.0.clone())
    }
}

fn seed(conn: &Connection) {
    conn.execute_batch(CORPUS_SCHEMA_SQL)
        .expect("install schema");
    conn.execute_batch(
        "INSERT INTO documents VALUES
            ('contract', 'contract.pdf', '/corpus/contract.pdf', 'pdf', 'Master Services Agreement', 12, 4.5),
            ('manual', 'manual.docx', '/corpus/manual.docx', 'docx', 'Operator Manual', 40, NULL);",
    )
    .expect("insert documents");

    let chunks = [
        ("c0", "contract", 0, "Payment terms are net 30 days from invoice date.", "[1.0, 0.0, 0.0]"),
        ("c1", "contract", 1, "Late payment accrues interest at 1.5 percent monthly.", "[0.8, 0.6, 0.0]"),
        ("c2", "contract", 2, "Either party may terminate with thirty days notice.", "[0.0, 1.0, 0.0]"),
        ("m0", "manual", 0, "Reset the controller before replacing the fuse.", "[0.0, 0.0, 1.0]"),
        ("m1", "manual", 1, "Payment for spare parts is due on delivery.", "[0.6, 0.0, 0.8]"),
    ];
    for (id, doc, index, text, vector) in chunks {
        let start = index * 60;
        conn.execute(
            "INSERT INTO chunks (chunk_id, document_id, chunk_index, text, page_number,
                 char_start, char_end, content_hash, section_path)
             VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6, ?7, ?8)",
            params![id, doc, index, text, start, start + 55, format!("sha:{id}"), format!("{doc}/terms")],
        )
        .expect("insert chunk");
        conn.execute(
            "INSERT INTO embeddings VALUES (?1, 'chunk', ?2)",
            params![id, vector],
        )
        .expect("insert embedding");
    }
}

fn corpus() -> CorpusStore {
    let store = CorpusStore::open_in_memory().expect("open corpus");
    store
        .with_connection(|conn| {
            seed(conn);
            Ok(())
        })
        .expect("seed corpus");
    store
}

fn collaborators<'a>(store: &'a CorpusStore, embedder: Option<&'a dyn Embedder>) -> Collaborators<'a> {
    Collaborators {
        lexical: store,
        vector: Some(store),
        embedder,
        reranker: None,
        metadata: Some(store),
        enrichment: Some(store),
    }
}

fn ids(results: &ResultSet) -> Vec<String> {
    results
        .iter_results()
        .into_iter()
        .map(|r| r.unit.unit_id.clone())
        .collect()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn hybrid_search_prefers_units_found_by_both_sources() {
    let store = corpus();
    let embedder = FixedEmbedder(vec![1.0, 0.0, 0.0]);
    let engine = SearchEngine::new(collaborators(&store, Some(&embedder)), SearchConfig::default())
        .expect("engine");

    let response = engine
        .search(&SearchRequest::new("payment"))
        .expect("search");

    assert_eq!(response.decisions.effective_mode, SearchMode::Hybrid);
    assert!(response.decisions.degraded.is_none());
    assert!(response.counts.lexical >= 3);
    assert!(response.counts.semantic >= 3);

    let results = response.results.iter_results();
    let top = results.first().expect("at least one result");
    assert!(top.lexical.is_some() && top.semantic.is_some());
    assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    assert!(response.decisions.threshold.is_some());
}

#[test]
fn lexical_mode_never_calls_the_embedder() {
    struct Panics;
    impl Embedder for Panics {
        fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            panic!("embedder must not run in lexical mode")
        }
    }

    let store = corpus();
    let engine =
        SearchEngine::new(collaborators(&store, Some(&Panics)), SearchConfig::default()).expect("engine");
    let response = engine
        .search(&SearchRequest::new("payment").with_mode(SearchMode::Lexical))
        .expect("search");
    let found = ids(&response.results);
    assert!(found.contains(&"c0".to_string()));
    assert!(found.contains(&"m1".to_string()));
    assert_eq!(response.counts.semantic, 0);
}

#[test]
fn hybrid_without_embedder_degrades_to_lexical() {
    let store = corpus();
    let engine = SearchEngine::new(collaborators(&store, None), SearchConfig::default()).expect("engine");
    let response = engine
        .search(&SearchRequest::new("payment"))
        .expect("search");
    assert_eq!(response.mode, SearchMode::Hybrid);
    assert_eq!(response.decisions.effective_mode, SearchMode::Lexical);
    assert!(response.decisions.degraded.is_some());
    assert!(!response.results.is_empty());
}

#[test]
fn metadata_filter_restricts_documents() {
    let store = corpus();
    let engine = SearchEngine::new(collaborators(&store, None), SearchConfig::default()).expect("engine");
    let mut request = SearchRequest::new("payment").with_mode(SearchMode::Lexical);
    request.metadata = MetadataFilter {
        file_types: vec!["docx".into()],
        ..MetadataFilter::default()
    };
    let response = engine.search(&request).expect("search");
    assert_eq!(ids(&response.results), vec!["m1".to_string()]);

    request.metadata.min_quality = Some(4.0);
    let response = engine.search(&request).expect("search");
    assert!(response.results.is_empty());
    assert!(response.guidance.is_some());
}

#[test]
fn grouped_results_carry_neighbor_context() {
    let store = corpus();
    let engine = SearchEngine::new(collaborators(&store, None), SearchConfig::default()).expect("engine");
    let mut request = SearchRequest::new("payment").with_mode(SearchMode::Lexical);
    request.group = true;
    request.enrich = EnrichOptions {
        context_window: 1,
        ..EnrichOptions::default()
    };

    let response = engine.search(&request).expect("search");
    let ResultSet::Grouped(groups) = &response.results else {
        panic!("expected grouped layout");
    };
    assert_eq!(groups[0].document_id, "contract");
    assert_eq!(groups[0].result_count, 2);

    let c1 = groups[0]
        .results
        .iter()
        .find(|r| r.unit.unit_id == "c1")
        .expect("c1 present");
    let context = c1
        .enrichment
        .context
        .as_ref()
        .expect("context requested")
        .as_ref()
        .expect("context loaded");
    // c0 is itself a result, so only the following chunk is attached.
    let neighbors: Vec<&str> = context.iter().map(|c| c.unit_id.as_str()).collect();
    assert_eq!(neighbors, vec!["c2"]);
}

#[test]
fn context_respects_character_budget() {
    let store = corpus();
    let engine = SearchEngine::new(collaborators(&store, None), SearchConfig::default()).expect("engine");
    let request = SearchRequest::new("payment").with_mode(SearchMode::Lexical);
    let response = engine.context(&request, 60).expect("context");
    assert!(response.context.total_chars <= 60);
    assert!(!response.context.passages.is_empty());
    assert!(response.context.truncated);
}

#[test]
fn file_backed_corpus_opens_read_only() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("corpus.db");
    seed(&Connection::open(&path).expect("create corpus"));

    let store = CorpusStore::open(Path::new(&path)).expect("open corpus");
    let engine = SearchEngine::new(Collaborators::lexical(&store), SearchConfig::default())
        .expect("engine");
    let response = engine
        .search(&SearchRequest::new("controller fuse").with_mode(SearchMode::Lexical))
        .expect("search");
    assert_eq!(ids(&response.results), vec!["m0".to_string()]);

    let write = store.with_connection(|conn| {
        conn.execute("DELETE FROM chunks", [])?;
        Ok(())
    });
    assert!(write.is_err(), "corpus must be opened read-only");
}
