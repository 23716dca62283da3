//! Corpus schema as read by [`super::CorpusStore`].
//!
//! Ingestion owns these tables; search only reads them. The definition is
//! exported so fixtures and tests can build a corpus in memory:
//! - `documents` carries per-document metadata and the OCR quality score
//! - `chunks`, `vlm_descriptions` and `extractions` are the three retrievable
//!   content classes and share the same structural columns
//! - `*_fts` tables are FTS5 indexes kept in sync by triggers
//! - `embeddings` stores one JSON-encoded vector per unit
//! - cluster, relation, table and image tables back result enrichment

/// Full corpus schema.
pub const CORPUS_SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS documents (
    document_id TEXT PRIMARY KEY,
    file_name TEXT NOT NULL,
    file_path TEXT NOT NULL,
    file_type TEXT,
    title TEXT,
    page_count INTEGER,
    quality_score REAL CHECK (quality_score IS NULL OR (quality_score >= 0 AND quality_score <= 5))
);

CREATE TABLE IF NOT EXISTS chunks (
    chunk_id TEXT PRIMARY KEY,
    document_id TEXT NOT NULL REFERENCES documents(document_id) ON DELETE CASCADE,
    chunk_index INTEGER NOT NULL,
    text TEXT NOT NULL,
    page_number INTEGER,
    char_start INTEGER,
    char_end INTEGER,
    content_hash TEXT,
    heading_context TEXT,
    heading_level INTEGER CHECK (heading_level IS NULL OR heading_level BETWEEN 1 AND 6),
    section_path TEXT,
    content_types TEXT,
    is_atomic INTEGER NOT NULL DEFAULT 0 CHECK (is_atomic IN (0, 1)),
    UNIQUE (document_id, chunk_index)
);

CREATE TABLE IF NOT EXISTS images (
    image_id TEXT PRIMARY KEY,
    document_id TEXT NOT NULL REFERENCES documents(document_id) ON DELETE CASCADE,
    page_number INTEGER,
    format TEXT,
    width INTEGER,
    height INTEGER
);

CREATE TABLE IF NOT EXISTS vlm_descriptions (
    description_id TEXT PRIMARY KEY,
    image_id TEXT NOT NULL REFERENCES images(image_id) ON DELETE CASCADE,
    document_id TEXT NOT NULL REFERENCES documents(document_id) ON DELETE CASCADE,
    text TEXT NOT NULL,
    image_type TEXT,
    confidence REAL,
    page_number INTEGER,
    char_start INTEGER,
    char_end INTEGER,
    content_hash TEXT,
    heading_context TEXT,
    heading_level INTEGER,
    section_path TEXT,
    content_types TEXT,
    is_atomic INTEGER NOT NULL DEFAULT 1 CHECK (is_atomic IN (0, 1))
);

CREATE TABLE IF NOT EXISTS extractions (
    extraction_id TEXT PRIMARY KEY,
    document_id TEXT NOT NULL REFERENCES documents(document_id) ON DELETE CASCADE,
    schema_name TEXT,
    text TEXT NOT NULL,
    page_number INTEGER,
    char_start INTEGER,
    char_end INTEGER,
    content_hash TEXT,
    heading_context TEXT,
    heading_level INTEGER,
    section_path TEXT,
    content_types TEXT,
    is_atomic INTEGER NOT NULL DEFAULT 0 CHECK (is_atomic IN (0, 1))
);

CREATE TABLE IF NOT EXISTS embeddings (
    unit_id TEXT PRIMARY KEY,
    unit_kind TEXT NOT NULL CHECK (unit_kind IN ('chunk', 'vlm_description', 'extraction')),
    embedding_json TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS clusters (
    cluster_id TEXT PRIMARY KEY,
    label TEXT
);

CREATE TABLE IF NOT EXISTS document_clusters (
    document_id TEXT NOT NULL REFERENCES documents(document_id) ON DELETE CASCADE,
    cluster_id TEXT NOT NULL REFERENCES clusters(cluster_id) ON DELETE CASCADE,
    similarity REAL,
    PRIMARY KEY (document_id, cluster_id)
);

CREATE TABLE IF NOT EXISTS document_relations (
    source_document_id TEXT NOT NULL REFERENCES documents(document_id) ON DELETE CASCADE,
    target_document_id TEXT NOT NULL REFERENCES documents(document_id) ON DELETE CASCADE,
    relation_type TEXT NOT NULL,
    score REAL,
    PRIMARY KEY (source_document_id, target_document_id, relation_type)
);

CREATE TABLE IF NOT EXISTS table_metadata (
    chunk_id TEXT PRIMARY KEY REFERENCES chunks(chunk_id) ON DELETE CASCADE,
    caption TEXT,
    row_count INTEGER,
    column_count INTEGER,
    headers_json TEXT
);

CREATE INDEX IF NOT EXISTS idx_chunks_document_index
    ON chunks(document_id, chunk_index);

CREATE INDEX IF NOT EXISTS idx_embeddings_kind
    ON embeddings(unit_kind);

CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(
    text,
    heading_context,
    unit_id UNINDEXED,
    tokenize='porter unicode61'
);

CREATE VIRTUAL TABLE IF NOT EXISTS vlm_descriptions_fts USING fts5(
    text,
    unit_id UNINDEXED,
    tokenize='porter unicode61'
);

CREATE VIRTUAL TABLE IF NOT EXISTS extractions_fts USING fts5(
    text,
    unit_id UNINDEXED,
    tokenize='porter unicode61'
);

CREATE TRIGGER IF NOT EXISTS chunks_ai
AFTER INSERT ON chunks
BEGIN
    INSERT INTO chunks_fts(rowid, text, heading_context, unit_id)
    VALUES (new.rowid, new.text, COALESCE(new.heading_context, ''), new.chunk_id);
END;

CREATE TRIGGER IF NOT EXISTS chunks_ad
AFTER DELETE ON chunks
BEGIN
    DELETE FROM chunks_fts WHERE rowid = old.rowid;
END;

CREATE TRIGGER IF NOT EXISTS vlm_descriptions_ai
AFTER INSERT ON vlm_descriptions
BEGIN
    INSERT INTO vlm_descriptions_fts(rowid, text, unit_id)
    VALUES (new.rowid, new.text, new.description_id);
END;

CREATE TRIGGER IF NOT EXISTS vlm_descriptions_ad
AFTER DELETE ON vlm_descriptions
BEGIN
    DELETE FROM vlm_descriptions_fts WHERE rowid = old.rowid;
END;

CREATE TRIGGER IF NOT EXISTS extractions_ai
AFTER INSERT ON extractions
BEGIN
    INSERT INTO extractions_fts(rowid, text, unit_id)
    VALUES (new.rowid, new.text, new.extraction_id);
END;

CREATE TRIGGER IF NOT EXISTS extractions_ad
AFTER DELETE ON extractions
BEGIN
    DELETE FROM extractions_fts WHERE rowid = old.rowid;
END;
";

/// Tables the store requires before it will serve queries.
pub const REQUIRED_TABLES: &[&str] = &[
    "documents",
    "chunks",
    "vlm_descriptions",
    "extractions",
    "embeddings",
    "chunks_fts",
    "vlm_descriptions_fts",
    "extractions_fts",
];
