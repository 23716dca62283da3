//! FTS5 lookups with BM25 ranking.
//!
//! Queries arrive as plain text, optionally expanded into ` OR ` segments.
//! [`match_expression`] turns that into a safe FTS5 `MATCH` expression:
//! every term is quoted so user punctuation never reaches the FTS5 parser,
//! terms within a segment are ANDed and segments are ORed.
//!
//! `bm25()` is negative with more negative meaning a better match, so the
//! store reports [`ScorePolarity::LowerIsBetter`].
//!
//! # Column Weights (BM25)
//!
//! | Table                  | Column          | Weight |
//! |------------------------|-----------------|--------|
//! | `chunks_fts`           | text            | 1.0    |
//! | `chunks_fts`           | heading_context | 2.0    |
//! | `vlm_descriptions_fts` | text            | 1.0    |
//! | `extractions_fts`      | text            | 1.0    |

use super::{CorpusStore, FilterSql, kind_table, read_unit, unit_columns, UNIT_COLUMN_COUNT};
use crate::query::OR_SEPARATOR;
use crate::retrieval::{IndexHit, LexicalIndex, ScorePolarity};
use anyhow::{Context, Result};
use docsift_core::{SearchFilters, UnitKind};
use rusqlite::params_from_iter;
use rusqlite::types::Value;
use tracing::debug;

pub const BM25_WEIGHT_TEXT: f64 = 1.0;
pub const BM25_WEIGHT_HEADING: f64 = 2.0;

/// Build an FTS5 `MATCH` expression, or `None` when `query` has no terms.
#[must_use]
pub fn match_expression(query: &str) -> Option<String> {
    let segments: Vec<String> = query
        .split(OR_SEPARATOR)
        .filter_map(segment_expression)
        .collect();
    if segments.is_empty() {
        None
    } else {
        Some(segments.join(" OR "))
    }
}

fn segment_expression(segment: &str) -> Option<String> {
    let mut parts = Vec::new();
    let mut rest = segment;
    while let Some(open) = rest.find('"') {
        parts.extend(rest[..open].split_whitespace().filter_map(quote_term));
        let after = &rest[open + 1..];
        if let Some(close) = after.find('"') {
            parts.extend(quote_phrase(&after[..close]));
            rest = &after[close + 1..];
        } else {
            rest = after;
        }
    }
    parts.extend(rest.split_whitespace().filter_map(quote_term));

    match parts.len() {
        0 => None,
        1 => parts.pop(),
        _ => Some(format!("({})", parts.join(" AND "))),
    }
}

/// `"term"`, keeping a trailing `*` as an FTS5 prefix query.
fn quote_term(raw: &str) -> Option<String> {
    let (body, prefix) = raw
        .strip_suffix('*')
        .map_or((raw, false), |body| (body, true));
    let body = body.replace('"', "");
    if !body.chars().any(char::is_alphanumeric) {
        return None;
    }
    Some(if prefix {
        format!("\"{body}\"*")
    } else {
        format!("\"{body}\"")
    })
}

fn quote_phrase(raw: &str) -> Option<String> {
    let words: Vec<&str> = raw.split_whitespace().collect();
    if words.iter().any(|w| w.chars().any(char::is_alphanumeric)) {
        Some(format!("\"{}\"", words.join(" ")))
    } else {
        None
    }
}

fn rank_expression(kind: UnitKind) -> String {
    let t = kind_table(kind);
    match kind {
        UnitKind::Chunk => format!(
            "bm25({}, {BM25_WEIGHT_TEXT:.1}, {BM25_WEIGHT_HEADING:.1})",
            t.fts
        ),
        UnitKind::VlmDescription | UnitKind::Extraction => {
            format!("bm25({}, {BM25_WEIGHT_TEXT:.1})", t.fts)
        }
    }
}

impl LexicalIndex for CorpusStore {
    fn polarity(&self) -> ScorePolarity {
        ScorePolarity::LowerIsBetter
    }

    fn search(
        &self,
        kind: UnitKind,
        query: &str,
        limit: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<IndexHit>> {
        if limit == 0 || filters.documents.matches_none() {
            return Ok(Vec::new());
        }
        let Some(expression) = match_expression(query) else {
            debug!(query, "no searchable terms");
            return Ok(Vec::new());
        };

        let t = kind_table(kind);
        let filter_sql = FilterSql::build(filters);
        let mut sql = format!(
            "SELECT {cols}, {rank} AS score \
             FROM {fts} f \
             INNER JOIN {table} u ON u.{id} = f.unit_id \
             INNER JOIN documents d ON d.document_id = u.document_id \
             WHERE {fts} MATCH ?{and} \
             ORDER BY score",
            cols = unit_columns(kind),
            rank = rank_expression(kind),
            fts = t.fts,
            table = t.table,
            id = t.id_column,
            and = filter_sql.and_clause(),
        );

        let mut params = Vec::with_capacity(filter_sql.params.len() + 2);
        params.push(Value::Text(expression.clone()));
        params.extend(filter_sql.params.iter().cloned());
        if !filter_sql.needs_post_filter {
            sql.push_str(" LIMIT ?");
            params.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
        }

        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare(&sql)
                .with_context(|| format!("prepare FTS5 search over {}", t.fts))?;
            let rows = stmt
                .query_map(params_from_iter(params.iter()), |row| {
                    Ok(IndexHit {
                        unit: read_unit(kind, row)?,
                        score: row.get(UNIT_COLUMN_COUNT)?,
                    })
                })
                .with_context(|| format!("execute FTS5 search for '{expression}'"))?;

            let mut hits = Vec::new();
            for row in rows {
                let hit = row.context("read FTS5 search hit")?;
                if filters.admits(&hit.unit) {
                    hits.push(hit);
                }
                if hits.len() == limit {
                    break;
                }
            }
            Ok(hits)
        })
    }
}
