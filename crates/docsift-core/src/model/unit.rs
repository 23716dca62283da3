//! Retrievable units: OCR text chunks, image (VLM) descriptions and
//! structured extractions.
//!
//! Units are produced by upstream ingestion and are read-only here. The
//! kind-specific fields live in [`UnitDetail`]; everything the ranking
//! pipeline reads is on the shared [`SearchableUnit`] base.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Content class a unit was retrieved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Chunk,
    VlmDescription,
    Extraction,
}

impl UnitKind {
    pub const ALL: [Self; 3] = [Self::Chunk, Self::VlmDescription, Self::Extraction];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Chunk => "chunk",
            Self::VlmDescription => "vlm_description",
            Self::Extraction => "extraction",
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown unit kind: {0}")]
pub struct ParseUnitKindError(pub String);

impl FromStr for UnitKind {
    type Err = ParseUnitKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chunk" | "chunks" | "text" => Ok(Self::Chunk),
            "vlm_description" | "vlm" | "image" | "images" => Ok(Self::VlmDescription),
            "extraction" | "extractions" => Ok(Self::Extraction),
            other => Err(ParseUnitKindError(other.to_string())),
        }
    }
}

/// Content-type tag attached to a unit by the layout extractor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ContentTag {
    Text,
    Heading,
    Table,
    Code,
    List,
    Figure,
    Equation,
    Form,
    Other(String),
}

impl ContentTag {
    /// Parse a raw tag; unknown tags are preserved as [`ContentTag::Other`].
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "text" | "paragraph" | "body" => Self::Text,
            "heading" | "title" | "section_header" | "sectionheader" => Self::Heading,
            "table" | "table_of_contents" => Self::Table,
            "code" | "code_block" => Self::Code,
            "list" | "list_item" | "listitem" => Self::List,
            "figure" | "image" | "picture" | "chart" => Self::Figure,
            "equation" | "formula" => Self::Equation,
            "form" | "form_field" => Self::Form,
            other => Self::Other(other.to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text => "text",
            Self::Heading => "heading",
            Self::Table => "table",
            Self::Code => "code",
            Self::List => "list",
            Self::Figure => "figure",
            Self::Equation => "equation",
            Self::Form => "form",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for ContentTag {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<ContentTag> for String {
    fn from(value: ContentTag) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ContentTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Layout-derived structure of a unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralMetadata {
    /// Text of the nearest enclosing heading.
    #[serde(default)]
    pub heading_context: Option<String>,
    /// Heading depth 1–6 of the enclosing heading.
    #[serde(default)]
    pub heading_level: Option<u8>,
    /// Slash-separated path of section headings, outermost first.
    #[serde(default)]
    pub section_path: Option<String>,
    /// Content-type tags as stored upstream: a JSON array of strings.
    ///
    /// Kept raw so that a malformed value degrades a single multiplier instead
    /// of failing the whole query.
    #[serde(default)]
    pub content_types: Option<String>,
    /// The unit must not be split across chunk boundaries (tables, figures).
    #[serde(default)]
    pub is_atomic: bool,
}

impl StructuralMetadata {
    /// Decode the content-type tag set.
    ///
    /// # Errors
    ///
    /// Returns the JSON error when the stored value is not an array of strings.
    pub fn content_tags(&self) -> Result<Vec<ContentTag>, serde_json::Error> {
        match self.content_types.as_deref().map(str::trim) {
            None | Some("") => Ok(Vec::new()),
            Some(raw) => {
                let tags: Vec<String> = serde_json::from_str(raw)?;
                Ok(tags.iter().map(|t| ContentTag::parse(t)).collect())
            }
        }
    }

    /// Encode a tag set in the stored representation.
    #[must_use]
    pub fn encode_tags(tags: &[ContentTag]) -> String {
        let raw: Vec<&str> = tags.iter().map(ContentTag::as_str).collect();
        serde_json::to_string(&raw).unwrap_or_else(|_| "[]".to_string())
    }
}

/// Denormalized metadata of the document a unit belongs to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub document_id: String,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub page_count: Option<u32>,
    /// Number of text chunks the document was split into.
    #[serde(default)]
    pub chunk_count: Option<u32>,
    /// OCR quality score of the whole document, 0.0–5.0.
    #[serde(default)]
    pub quality_score: Option<f64>,
}

/// Kind-specific fields of a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnitDetail {
    Chunk {
        chunk_index: u32,
    },
    VlmDescription {
        image_id: String,
        #[serde(default)]
        image_type: Option<String>,
        #[serde(default)]
        confidence: Option<f64>,
    },
    Extraction {
        #[serde(default)]
        schema_name: Option<String>,
    },
}

/// Immutable reference to one retrievable item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchableUnit {
    pub unit_id: String,
    pub document: DocumentInfo,
    pub text: String,
    #[serde(default)]
    pub page_number: Option<u32>,
    #[serde(default)]
    pub char_start: Option<usize>,
    #[serde(default)]
    pub char_end: Option<usize>,
    #[serde(default)]
    pub content_hash: Option<String>,
    #[serde(default)]
    pub structure: StructuralMetadata,
    #[serde(flatten)]
    pub detail: UnitDetail,
}

impl SearchableUnit {
    #[must_use]
    pub const fn kind(&self) -> UnitKind {
        match self.detail {
            UnitDetail::Chunk { .. } => UnitKind::Chunk,
            UnitDetail::VlmDescription { .. } => UnitKind::VlmDescription,
            UnitDetail::Extraction { .. } => UnitKind::Extraction,
        }
    }

    #[must_use]
    pub fn document_id(&self) -> &str {
        &self.document.document_id
    }

    #[must_use]
    pub const fn chunk_index(&self) -> Option<u32> {
        match self.detail {
            UnitDetail::Chunk { chunk_index } => Some(chunk_index),
            _ => None,
        }
    }

    #[must_use]
    pub fn image_id(&self) -> Option<&str> {
        match &self.detail {
            UnitDetail::VlmDescription { image_id, .. } => Some(image_id),
            _ => None,
        }
    }

    /// Character span within the document, when known and non-empty.
    #[must_use]
    pub fn char_range(&self) -> Option<(usize, usize)> {
        match (self.char_start, self.char_end) {
            (Some(start), Some(end)) if end > start => Some((start, end)),
            _ => None,
        }
    }

    #[must_use]
    pub const fn quality_score(&self) -> Option<f64> {
        self.document.quality_score
    }
}
