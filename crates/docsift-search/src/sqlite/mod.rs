//! SQLite-backed corpus store.
//!
//! [`CorpusStore`] reads a corpus database written by ingestion and serves
//! every collaborator contract the engine needs: full-text lookups over the
//! FTS5 tables ([`fts`]), cosine KNN over stored embeddings ([`knn`]), and
//! metadata filter resolution plus enrichment lookups ([`lookup`]).
//!
//! The connection sits behind a mutex so lexical and semantic retrieval can
//! share one store from the two retrieval threads.

pub mod fts;
pub mod knn;
pub mod lookup;
pub mod schema;

pub use schema::{CORPUS_SCHEMA_SQL, REQUIRED_TABLES};

use anyhow::{Context, Result};
use docsift_core::{
    DocumentInfo, SearchFilters, SearchableUnit, StructuralMetadata, UnitDetail, UnitKind,
};
use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Read access to a corpus database.
#[derive(Debug)]
pub struct CorpusStore {
    conn: Mutex<Connection>,
    vec_enabled: bool,
}

impl CorpusStore {
    /// Open an existing corpus database read-only.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be opened or lacks a required
    /// table.
    pub fn open(path: &Path) -> Result<Self> {
        register_vec_extension();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI,
        )
        .with_context(|| format!("open corpus database {}", path.display()))?;
        let store = Self::from_connection(conn);
        store.check_schema()?;
        Ok(store)
    }

    /// Empty in-memory corpus with the full schema installed.
    ///
    /// # Errors
    ///
    /// Returns an error when the schema cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        register_vec_extension();
        let conn = Connection::open_in_memory().context("open in-memory corpus")?;
        let store = Self::from_connection(conn);
        store.install_schema()?;
        Ok(store)
    }

    /// Wrap an already open connection.
    #[must_use]
    pub fn from_connection(conn: Connection) -> Self {
        let vec_enabled = docsift_sqlite_vec::is_available(&conn);
        debug!(vec_enabled, "corpus store ready");
        Self {
            conn: Mutex::new(conn),
            vec_enabled,
        }
    }

    /// Create the corpus tables if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns an error when the DDL fails.
    pub fn install_schema(&self) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute_batch(CORPUS_SCHEMA_SQL)
                .context("install corpus schema")
        })
    }

    /// Fail unless every table search reads is present.
    ///
    /// # Errors
    ///
    /// Names the first missing table.
    pub fn check_schema(&self) -> Result<()> {
        self.with_connection(|conn| {
            for table in REQUIRED_TABLES {
                let present: bool = conn
                    .query_row(
                        "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE name = ?1)",
                        [table],
                        |row| row.get(0),
                    )
                    .with_context(|| format!("look up table {table}"))?;
                if !present {
                    anyhow::bail!("corpus database has no {table} table");
                }
            }
            Ok(())
        })
    }

    /// Whether KNN lookups run through sqlite-vec.
    #[must_use]
    pub const fn vec_enabled(&self) -> bool {
        self.vec_enabled
    }

    /// Run `f` with the connection locked.
    ///
    /// # Errors
    ///
    /// Returns `f`'s error, or an error when the lock is poisoned.
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        f(&*self.lock()?)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("corpus connection lock poisoned"))
    }
}

fn register_vec_extension() {
    if let Err(err) = docsift_sqlite_vec::register_auto_extension() {
        debug!("sqlite-vec unavailable, KNN falls back to in-process cosine: {err}");
    }
}

/// Table layout of one content class.
#[derive(Debug, Clone, Copy)]
pub(crate) struct KindTable {
    pub table: &'static str,
    pub fts: &'static str,
    pub id_column: &'static str,
    /// `chunk_index, image_id, image_type, confidence, schema_name`.
    detail_columns: &'static str,
}

pub(crate) const fn kind_table(kind: UnitKind) -> KindTable {
    match kind {
        UnitKind::Chunk => KindTable {
            table: "chunks",
            fts: "chunks_fts",
            id_column: "chunk_id",
            detail_columns: "u.chunk_index, NULL, NULL, NULL, NULL",
        },
        UnitKind::VlmDescription => KindTable {
            table: "vlm_descriptions",
            fts: "vlm_descriptions_fts",
            id_column: "description_id",
            detail_columns: "NULL, u.image_id, u.image_type, u.confidence, NULL",
        },
        UnitKind::Extraction => KindTable {
            table: "extractions",
            fts: "extractions_fts",
            id_column: "extraction_id",
            detail_columns: "NULL, NULL, NULL, NULL, u.schema_name",
        },
    }
}

/// Number of columns produced by [`unit_columns`]; extra columns follow.
pub(crate) const UNIT_COLUMN_COUNT: usize = 24;

/// Select list for one unit joined with its document (`u` and `d`).
pub(crate) fn unit_columns(kind: UnitKind) -> String {
    let t = kind_table(kind);
    format!(
        "u.{id} AS unit_id, u.document_id, u.text, u.page_number, u.char_start, u.char_end, \
         u.content_hash, u.heading_context, u.heading_level, u.section_path, u.content_types, \
         u.is_atomic, {detail}, \
         d.file_name, d.file_path, d.file_type, d.title, d.page_count, d.quality_score, \
         (SELECT COUNT(*) FROM chunks cc WHERE cc.document_id = d.document_id) AS chunk_count",
        id = t.id_column,
        detail = t.detail_columns,
    )
}

fn to_u32(value: Option<i64>) -> Option<u32> {
    value.and_then(|v| u32::try_from(v).ok())
}

fn to_usize(value: Option<i64>) -> Option<usize> {
    value.and_then(|v| usize::try_from(v).ok())
}

/// Decode the leading [`unit_columns`] of a row.
pub(crate) fn read_unit(kind: UnitKind, row: &Row<'_>) -> rusqlite::Result<SearchableUnit> {
    let detail = match kind {
        UnitKind::Chunk => UnitDetail::Chunk {
            chunk_index: to_u32(row.get(12)?).unwrap_or(0),
        },
        UnitKind::VlmDescription => UnitDetail::VlmDescription {
            image_id: row.get::<_, Option<String>>(13)?.unwrap_or_default(),
            image_type: row.get(14)?,
            confidence: row.get(15)?,
        },
        UnitKind::Extraction => UnitDetail::Extraction {
            schema_name: row.get(16)?,
        },
    };
    let chunk_count = to_u32(row.get(23)?).filter(|c| *c > 0);

    Ok(SearchableUnit {
        unit_id: row.get(0)?,
        document: DocumentInfo {
            document_id: row.get(1)?,
            file_name: row.get(17)?,
            file_path: row.get(18)?,
            file_type: row.get(19)?,
            title: row.get(20)?,
            page_count: to_u32(row.get(21)?),
            chunk_count,
            quality_score: row.get(22)?,
        },
        text: row.get(2)?,
        page_number: to_u32(row.get(3)?),
        char_start: to_usize(row.get(4)?),
        char_end: to_usize(row.get(5)?),
        content_hash: row.get(6)?,
        structure: StructuralMetadata {
            heading_context: row.get(7)?,
            heading_level: row.get(8)?,
            section_path: row.get(9)?,
            content_types: row.get(10)?,
            is_atomic: row.get(11)?,
        },
        detail,
    })
}

/// SQL predicates for the filters SQLite can evaluate on `u`.
///
/// Content-type tags are matched in Rust after the fetch because the stored
/// JSON may be malformed; `needs_post_filter` reports when that happens so
/// callers do not cut the fetch short with a `LIMIT`.
#[derive(Debug, Default)]
pub(crate) struct FilterSql {
    pub clauses: Vec<String>,
    pub params: Vec<Value>,
    pub needs_post_filter: bool,
}

impl FilterSql {
    pub fn build(filters: &SearchFilters) -> Self {
        let mut out = Self::default();
        if let Some(ids) = filters.documents.ids() {
            let marks = vec!["?"; ids.len()].join(", ");
            out.clauses.push(format!("u.document_id IN ({marks})"));
            out.params
                .extend(ids.iter().map(|id| Value::Text(id.clone())));
        }
        if let Some(pages) = filters.pages {
            out.clauses.push("u.page_number BETWEEN ? AND ?".to_string());
            out.params.push(Value::Integer(i64::from(pages.start)));
            out.params.push(Value::Integer(i64::from(pages.end)));
        }
        if let Some(levels) = filters.heading_levels {
            out.clauses.push("u.heading_level BETWEEN ? AND ?".to_string());
            out.params.push(Value::Integer(i64::from(levels.min)));
            out.params.push(Value::Integer(i64::from(levels.max)));
        }
        if filters.atomic_only {
            out.clauses.push("u.is_atomic = 1".to_string());
        }
        if let Some(prefix) = filters.section_prefix.as_deref() {
            // substr/length compare case-sensitively, unlike LIKE.
            out.clauses
                .push("substr(u.section_path, 1, length(?)) = ?".to_string());
            out.params.push(Value::Text(prefix.to_string()));
            out.params.push(Value::Text(prefix.to_string()));
        }
        out.needs_post_filter = !filters.content_types.is_empty();
        out
    }

    /// ` AND ...` suffix, empty when there are no clauses.
    pub fn and_clause(&self) -> String {
        self.clauses
            .iter()
            .map(|c| format!(" AND {c}"))
            .collect()
    }
}
