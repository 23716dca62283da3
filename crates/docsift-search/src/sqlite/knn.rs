//! Cosine KNN over stored unit embeddings.
//!
//! When sqlite-vec is loaded the distance is computed in SQL with
//! `vec_distance_cosine`; otherwise, or if that query fails, every candidate
//! vector is decoded and scored in process. Both paths report cosine
//! similarity in `[-1, 1]` and apply the threshold identically.

use super::{CorpusStore, FilterSql, UNIT_COLUMN_COUNT, kind_table, read_unit, unit_columns};
use crate::retrieval::{IndexHit, VectorIndex};
use anyhow::{Context, Result};
use docsift_core::{SearchFilters, SearchableUnit, UnitKind};
use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};
use std::cmp::Ordering;
use tracing::debug;

struct KnnQuery<'a> {
    kind: UnitKind,
    vector: &'a [f32],
    limit: usize,
    threshold: Option<f64>,
    filters: &'a SearchFilters,
}

impl KnnQuery<'_> {
    fn keeps(&self, unit: &SearchableUnit, similarity: f64) -> bool {
        self.threshold.is_none_or(|t| similarity >= t) && self.filters.admits(unit)
    }

    fn from_clause(&self, filter_sql: &FilterSql) -> String {
        let t = kind_table(self.kind);
        format!(
            "FROM embeddings e \
             INNER JOIN {table} u ON u.{id} = e.unit_id \
             INNER JOIN documents d ON d.document_id = u.document_id \
             WHERE e.unit_kind = ?{and}",
            table = t.table,
            id = t.id_column,
            and = filter_sql.and_clause(),
        )
    }
}

impl VectorIndex for CorpusStore {
    fn search_similar(
        &self,
        kind: UnitKind,
        vector: &[f32],
        limit: usize,
        threshold: Option<f64>,
        filters: &SearchFilters,
    ) -> Result<Vec<IndexHit>> {
        if vector.is_empty() {
            anyhow::bail!("query embedding is empty");
        }
        if limit == 0 || filters.documents.matches_none() {
            return Ok(Vec::new());
        }
        let query = KnnQuery {
            kind,
            vector,
            limit,
            threshold,
            filters,
        };

        self.with_connection(|conn| {
            if self.vec_enabled() {
                if let Some(hits) = knn_sqlite_vec(conn, &query) {
                    return Ok(hits);
                }
            }
            knn_in_process(conn, &query)
        })
    }
}

fn bind(query: &KnnQuery<'_>, filter_sql: &FilterSql) -> Vec<Value> {
    let mut params = Vec::with_capacity(filter_sql.params.len() + 3);
    params.push(Value::Text(query.kind.as_str().to_string()));
    params.extend(filter_sql.params.iter().cloned());
    params
}

/// `None` when sqlite-vec cannot answer, so the caller falls back.
fn knn_sqlite_vec(conn: &Connection, query: &KnnQuery<'_>) -> Option<Vec<IndexHit>> {
    let filter_sql = FilterSql::build(query.filters);
    let mut sql = format!(
        "SELECT {cols}, \
                vec_distance_cosine(vec_f32(e.embedding_json), vec_f32(?)) AS distance \
         {from} \
         ORDER BY distance ASC",
        cols = unit_columns(query.kind),
        from = query.from_clause(&filter_sql),
    );
    let mut params = vec![Value::Text(encode_embedding_json(query.vector))];
    params.extend(bind(query, &filter_sql));
    if !filter_sql.needs_post_filter && query.threshold.is_none() {
        sql.push_str(" LIMIT ?");
        params.push(Value::Integer(i64::try_from(query.limit).unwrap_or(i64::MAX)));
    }

    let attempt = || -> rusqlite::Result<Vec<IndexHit>> {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
            let distance: f64 = row.get(UNIT_COLUMN_COUNT)?;
            Ok(IndexHit {
                unit: read_unit(query.kind, row)?,
                score: (1.0 - distance).clamp(-1.0, 1.0),
            })
        })?;
        let mut hits = Vec::new();
        for row in rows {
            let hit = row?;
            if query.keeps(&hit.unit, hit.score) {
                hits.push(hit);
            }
            if hits.len() == query.limit {
                break;
            }
        }
        Ok(hits)
    };

    match attempt() {
        Ok(hits) => Some(hits),
        Err(err) => {
            debug!("sqlite-vec KNN failed, falling back to in-process KNN: {err}");
            None
        }
    }
}

fn knn_in_process(conn: &Connection, query: &KnnQuery<'_>) -> Result<Vec<IndexHit>> {
    let filter_sql = FilterSql::build(query.filters);
    let sql = format!(
        "SELECT {cols}, e.embedding_json {from}",
        cols = unit_columns(query.kind),
        from = query.from_clause(&filter_sql),
    );
    let mut stmt = conn
        .prepare(&sql)
        .context("failed to prepare KNN query (embeddings table missing?)")?;
    let rows = stmt
        .query_map(params_from_iter(bind(query, &filter_sql).iter()), |row| {
            Ok((
                read_unit(query.kind, row)?,
                row.get::<_, String>(UNIT_COLUMN_COUNT)?,
            ))
        })
        .context("failed to execute KNN query")?;

    let mut scanned = 0_usize;
    let mut mismatched = 0_usize;
    let mut hits = Vec::new();
    for row in rows {
        let (unit, embedding_json) = row.context("failed to read KNN row")?;
        scanned += 1;
        let embedding: Vec<f32> = match serde_json::from_str(&embedding_json) {
            Ok(value) => value,
            Err(err) => {
                debug!("skipping malformed embedding row for {}: {err}", unit.unit_id);
                continue;
            }
        };
        if embedding.len() != query.vector.len() {
            mismatched += 1;
            debug!(
                "skipping embedding row for {} due to dimension {}",
                unit.unit_id,
                embedding.len()
            );
            continue;
        }
        let Some(similarity) = cosine_similarity(query.vector, &embedding) else {
            continue;
        };
        let similarity = f64::from(similarity);
        if query.keeps(&unit, similarity) {
            hits.push(IndexHit {
                unit,
                score: similarity,
            });
        }
    }

    if scanned > 0 && mismatched == scanned {
        anyhow::bail!(
            "query embedding dimension mismatch: got {}, no stored {} embedding has that size",
            query.vector.len(),
            query.kind
        );
    }

    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.unit.unit_id.cmp(&b.unit.unit_id))
    });
    hits.truncate(query.limit);
    Ok(hits)
}

fn encode_embedding_json(embedding: &[f32]) -> String {
    serde_json::to_string(embedding).unwrap_or_else(|_| "[]".to_string())
}

fn cosine_similarity(left: &[f32], right: &[f32]) -> Option<f32> {
    if left.len() != right.len() || left.is_empty() {
        return None;
    }

    let mut dot = 0.0_f32;
    let mut left_norm_sq = 0.0_f32;
    let mut right_norm_sq = 0.0_f32;
    for (a, b) in left.iter().zip(right) {
        dot += a * b;
        left_norm_sq += a * a;
        right_norm_sq += b * b;
    }

    let denom = left_norm_sq.sqrt() * right_norm_sq.sqrt();
    if denom <= f32::EPSILON {
        return None;
    }
    Some((dot / denom).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::fixture::corpus;
    use docsift_core::DocumentFilter;

    fn ids(hits: &[IndexHit]) -> Vec<&str> {
        hits.iter().map(|h| h.unit.unit_id.as_str()).collect()
    }

    #[test]
    fn cosine_similarity_handles_degenerate_vectors() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]), Some(1.0));
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), None);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), None);
    }

    #[test]
    fn knn_orders_by_similarity_and_applies_threshold() {
        let store = corpus();
        let hits = store
            .search_similar(UnitKind::Chunk, &[1.0, 0.0, 0.0], 10, Some(0.5), &SearchFilters::default())
            .expect("knn");
        assert_eq!(ids(&hits), vec!["c0", "c1", "m1"]);
        assert!((hits[0].score - 1.0).abs() < 1e-5);
        assert!((hits[1].score - 0.8).abs() < 1e-5);
    }

    #[test]
    fn knn_without_threshold_respects_limit() {
        let store = corpus();
        let hits = store
            .search_similar(UnitKind::Chunk, &[0.0, 0.0, 1.0], 2, None, &SearchFilters::default())
            .expect("knn");
        assert_eq!(ids(&hits), vec!["m0", "m1"]);
    }

    #[test]
    fn knn_is_scoped_to_kind_and_documents() {
        let store = corpus();
        let vlm = store
            .search_similar(UnitKind::VlmDescription, &[0.0, 0.6, 0.8], 10, None, &SearchFilters::default())
            .expect("knn");
        assert_eq!(ids(&vlm), vec!["v0"]);

        let contract_only = SearchFilters {
            documents: DocumentFilter::resolved(["contract"]),
            ..SearchFilters::default()
        };
        let hits = store
            .search_similar(UnitKind::Chunk, &[0.0, 0.0, 1.0], 10, Some(0.0), &contract_only)
            .expect("knn");
        assert!(hits.iter().all(|h| h.unit.document_id() == "contract"));
    }

    #[test]
    fn dimension_mismatch_is_an_error() {
        let store = corpus();
        let err = store
            .search_similar(UnitKind::Chunk, &[1.0, 0.0], 10, None, &SearchFilters::default())
            .expect_err("wrong dimension");
        assert!(err.to_string().contains("dimension"));
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let store = corpus();
        store
            .with_connection(|conn| {
                conn.execute(
                    "INSERT INTO embeddings VALUES ('c3', 'chunk', 'not a vector')",
                    [],
                )?;
                Ok(())
            })
            .expect("insert");
        let hits = store
            .search_similar(UnitKind::Chunk, &[1.0, 0.0, 0.0], 10, None, &SearchFilters::default())
            .expect("knn");
        assert!(!ids(&hits).contains(&"c3"));
        assert_eq!(hits.len(), 5);
    }

    #[test]
    fn empty_vector_is_rejected() {
        let store = corpus();
        assert!(
            store
                .search_similar(UnitKind::Chunk, &[], 10, None, &SearchFilters::default())
                .is_err()
        );
    }
}
