//! Document metadata resolution and enrichment lookups.

use super::CorpusStore;
use crate::enrich::EnrichmentSource;
use crate::metadata::MetadataStore;
use anyhow::{Context, Result};
use docsift_core::{
    ClusterRef, ContextChunk, DocumentFilter, DocumentRelation, ImageMeta, MetadataFilter,
    TableMeta,
};
use rusqlite::types::Value;
use rusqlite::{OptionalExtension, params, params_from_iter};
use std::collections::BTreeSet;

fn like_contains(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn normalize_file_type(raw: &str) -> String {
    raw.trim().trim_start_matches('.').to_lowercase()
}

fn to_u32(value: Option<i64>) -> Option<u32> {
    value.and_then(|v| u32::try_from(v).ok())
}

impl MetadataStore for CorpusStore {
    fn resolve_documents(&self, filter: &MetadataFilter) -> Result<DocumentFilter> {
        if filter.is_empty() {
            return Ok(DocumentFilter::Unset);
        }

        let mut clauses = Vec::new();
        let mut params = Vec::new();
        if !filter.file_types.is_empty() {
            let marks = vec!["?"; filter.file_types.len()].join(", ");
            clauses.push(format!(
                "lower(ltrim(COALESCE(d.file_type, ''), '.')) IN ({marks})"
            ));
            params.extend(
                filter
                    .file_types
                    .iter()
                    .map(|t| Value::Text(normalize_file_type(t))),
            );
        }
        if let Some(title) = filter.title_contains.as_deref() {
            clauses.push("d.title LIKE ? ESCAPE '\\'".to_string());
            params.push(Value::Text(like_contains(title)));
        }
        if let Some(min) = filter.min_quality {
            clauses.push("d.quality_score >= ?".to_string());
            params.push(Value::Real(min));
        }
        if let Some(cluster) = filter.cluster_id.as_deref() {
            clauses.push(
                "EXISTS (SELECT 1 FROM document_clusters dc \
                 WHERE dc.document_id = d.document_id AND dc.cluster_id = ?)"
                    .to_string(),
            );
            params.push(Value::Text(cluster.to_string()));
        }

        let sql = format!(
            "SELECT d.document_id FROM documents d WHERE {}",
            clauses.join(" AND ")
        );
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare(&sql)
                .context("prepare document metadata query")?;
            let ids = stmt
                .query_map(params_from_iter(params.iter()), |row| row.get::<_, String>(0))
                .context("execute document metadata query")?
                .collect::<rusqlite::Result<Vec<_>>>()
                .context("read document id")?;
            Ok(DocumentFilter::resolved(ids))
        })
    }
}

impl EnrichmentSource for CorpusStore {
    fn neighbor_chunks(
        &self,
        document_id: &str,
        indices: &BTreeSet<u32>,
    ) -> Result<Vec<ContextChunk>> {
        if indices.is_empty() {
            return Ok(Vec::new());
        }
        let marks = vec!["?"; indices.len()].join(", ");
        let sql = format!(
            "SELECT chunk_id, chunk_index, text, page_number FROM chunks \
             WHERE document_id = ? AND chunk_index IN ({marks}) \
             ORDER BY chunk_index"
        );
        let mut params = vec![Value::Text(document_id.to_string())];
        params.extend(indices.iter().map(|i| Value::Integer(i64::from(*i))));

        self.with_connection(|conn| {
            let mut stmt = conn.prepare(&sql).context("prepare neighbor chunk query")?;
            let rows = stmt
                .query_map(params_from_iter(params.iter()), |row| {
                    Ok(ContextChunk {
                        unit_id: row.get(0)?,
                        chunk_index: to_u32(row.get(1)?).unwrap_or(0),
                        text: row.get(2)?,
                        page_number: to_u32(row.get(3)?),
                    })
                })
                .with_context(|| format!("load neighbor chunks of {document_id}"))?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    fn clusters(&self, document_id: &str) -> Result<Vec<ClusterRef>> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT dc.cluster_id, c.label, dc.similarity \
                     FROM document_clusters dc \
                     LEFT JOIN clusters c ON c.cluster_id = dc.cluster_id \
                     WHERE dc.document_id = ?1 \
                     ORDER BY dc.similarity DESC, dc.cluster_id",
                )
                .context("prepare cluster query")?;
            let rows = stmt
                .query_map(params![document_id], |row| {
                    Ok(ClusterRef {
                        cluster_id: row.get(0)?,
                        label: row.get(1)?,
                        similarity: row.get(2)?,
                    })
                })
                .with_context(|| format!("load clusters of {document_id}"))?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    fn relations(&self, document_id: &str) -> Result<Vec<DocumentRelation>> {
        // Relations are stored once; report them from either end.
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT target_document_id AS other, relation_type, score \
                     FROM document_relations WHERE source_document_id = ?1 \
                     UNION ALL \
                     SELECT source_document_id AS other, relation_type, score \
                     FROM document_relations WHERE target_document_id = ?1 \
                     ORDER BY score DESC, other",
                )
                .context("prepare relation query")?;
            let rows = stmt
                .query_map(params![document_id], |row| {
                    Ok(DocumentRelation {
                        target_document_id: row.get(0)?,
                        relation_type: row.get(1)?,
                        score: row.get(2)?,
                    })
                })
                .with_context(|| format!("load relations of {document_id}"))?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    fn table_meta(&self, unit_id: &str) -> Result<Option<TableMeta>> {
        let row = self.with_connection(|conn| {
            conn.query_row(
                "SELECT caption, row_count, column_count, headers_json \
                 FROM table_metadata WHERE chunk_id = ?1",
                params![unit_id],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, Option<i64>>(1)?,
                        row.get::<_, Option<i64>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                    ))
                },
            )
            .optional()
            .with_context(|| format!("load table metadata of {unit_id}"))
        })?;

        let Some((caption, rows, columns, headers_json)) = row else {
            return Ok(None);
        };
        let headers = match headers_json.as_deref().map(str::trim) {
            None | Some("") => Vec::new(),
            Some(raw) => serde_json::from_str(raw)
                .with_context(|| format!("table headers of {unit_id} are not a JSON array"))?,
        };
        Ok(Some(TableMeta {
            caption,
            row_count: to_u32(rows),
            column_count: to_u32(columns),
            headers,
        }))
    }

    fn image_meta(&self, image_id: &str) -> Result<Option<ImageMeta>> {
        self.with_connection(|conn| {
            conn.query_row(
                "SELECT image_id, format, width, height, page_number \
                 FROM images WHERE image_id = ?1",
                params![image_id],
                |row| {
                    Ok(ImageMeta {
                        image_id: row.get(0)?,
                        format: row.get(1)?,
                        width: to_u32(row.get(2)?),
                        height: to_u32(row.get(3)?),
                        page_number: to_u32(row.get(4)?),
                    })
                },
            )
            .optional()
            .with_context(|| format!("load image metadata of {image_id}"))
        })
    }
}
