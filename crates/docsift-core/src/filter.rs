//! Structured search filters.
//!
//! Filters are orthogonal predicates applied identically by every retrieval
//! adapter so that fusion compares like-for-like candidate pools.
//!
//! The document allow-list is three-state: no restriction, a restriction that
//! matched nothing, or an explicit set. Keeping "matched nothing" distinct
//! from "no restriction" is what makes intersection of several document
//! filters correct.

use crate::error::SearchError;
use crate::model::{ContentTag, SearchableUnit, UnitKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Document allow-list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFilter {
    #[default]
    Unset,
    MatchesNone,
    Ids(BTreeSet<String>),
}

impl DocumentFilter {
    /// Build from the ids a filter resolved to; an empty set matches nothing.
    pub fn resolved<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: BTreeSet<String> = ids.into_iter().map(Into::into).collect();
        if ids.is_empty() {
            Self::MatchesNone
        } else {
            Self::Ids(ids)
        }
    }

    #[must_use]
    pub const fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    #[must_use]
    pub const fn matches_none(&self) -> bool {
        matches!(self, Self::MatchesNone)
    }

    #[must_use]
    pub fn admits(&self, document_id: &str) -> bool {
        match self {
            Self::Unset => true,
            Self::MatchesNone => false,
            Self::Ids(ids) => ids.contains(document_id),
        }
    }

    /// Combine two restrictions; the result admits only what both admit.
    #[must_use]
    pub fn intersect(self, other: Self) -> Self {
        match (self, other) {
            (Self::Unset, x) | (x, Self::Unset) => x,
            (Self::MatchesNone, _) | (_, Self::MatchesNone) => Self::MatchesNone,
            (Self::Ids(a), Self::Ids(b)) => {
                Self::resolved(a.intersection(&b).cloned().collect::<Vec<_>>())
            }
        }
    }

    /// Ids when the filter is an explicit set.
    #[must_use]
    pub const fn ids(&self) -> Option<&BTreeSet<String>> {
        match self {
            Self::Ids(ids) => Some(ids),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unset => f.write_str("unset"),
            Self::MatchesNone => f.write_str("none"),
            Self::Ids(ids) => write!(f, "{} ids", ids.len()),
        }
    }
}

/// Inclusive page range, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl PageRange {
    #[must_use]
    pub const fn contains(self, page: u32) -> bool {
        page >= self.start && page <= self.end
    }
}

/// Inclusive heading-level range within 1–6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingRange {
    pub min: u8,
    pub max: u8,
}

impl HeadingRange {
    #[must_use]
    pub const fn contains(self, level: u8) -> bool {
        level >= self.min && level <= self.max
    }
}

/// Predicates every retrieval adapter applies to candidates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchFilters {
    pub documents: DocumentFilter,
    /// Allowed content tags; empty admits any.
    pub content_types: Vec<ContentTag>,
    /// Allowed content classes; empty searches all of them.
    pub unit_kinds: Vec<UnitKind>,
    pub pages: Option<PageRange>,
    pub heading_levels: Option<HeadingRange>,
    pub atomic_only: bool,
    pub section_prefix: Option<String>,
}

impl SearchFilters {
    /// Content classes to query.
    #[must_use]
    pub fn kinds(&self) -> Vec<UnitKind> {
        if self.unit_kinds.is_empty() {
            UnitKind::ALL.to_vec()
        } else {
            let mut kinds = self.unit_kinds.clone();
            kinds.sort();
            kinds.dedup();
            kinds
        }
    }

    /// Whether a candidate passes every predicate.
    #[must_use]
    pub fn admits(&self, unit: &SearchableUnit) -> bool {
        if !self.documents.admits(unit.document_id()) {
            return false;
        }
        if !self.unit_kinds.is_empty() && !self.unit_kinds.contains(&unit.kind()) {
            return false;
        }
        if !self.content_types.is_empty() {
            // Malformed tags cannot prove a match.
            let Ok(tags) = unit.structure.content_tags() else {
                return false;
            };
            if !tags.iter().any(|t| self.content_types.contains(t)) {
                return false;
            }
        }
        if let Some(pages) = self.pages {
            match unit.page_number {
                Some(page) if pages.contains(page) => {}
                _ => return false,
            }
        }
        if let Some(levels) = self.heading_levels {
            match unit.structure.heading_level {
                Some(level) if levels.contains(level) => {}
                _ => return false,
            }
        }
        if self.atomic_only && !unit.structure.is_atomic {
            return false;
        }
        if let Some(prefix) = self.section_prefix.as_deref() {
            match unit.structure.section_path.as_deref() {
                Some(path) if path.starts_with(prefix) => {}
                _ => return false,
            }
        }
        true
    }

    /// Reject malformed filter input before any retrieval.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Validation`] naming the offending field.
    pub fn validate(&self) -> Result<(), SearchError> {
        if let Some(pages) = self.pages {
            if pages.start == 0 {
                return Err(SearchError::validation("page_range", "pages are 1-based"));
            }
            if pages.start > pages.end {
                return Err(SearchError::validation(
                    "page_range",
                    format!("start {} is after end {}", pages.start, pages.end),
                ));
            }
        }
        if let Some(levels) = self.heading_levels {
            if !(1..=6).contains(&levels.min) || !(1..=6).contains(&levels.max) {
                return Err(SearchError::validation(
                    "heading_levels",
                    "levels must be within 1..=6",
                ));
            }
            if levels.min > levels.max {
                return Err(SearchError::validation(
                    "heading_levels",
                    format!("min {} is above max {}", levels.min, levels.max),
                ));
            }
        }
        if self
            .section_prefix
            .as_deref()
            .is_some_and(|p| p.trim().is_empty())
        {
            return Err(SearchError::validation(
                "section_prefix",
                "prefix must not be blank",
            ));
        }
        Ok(())
    }

    /// Compact summary for error context and logs.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut parts = vec![format!("documents={}", self.documents)];
        if !self.content_types.is_empty() {
            let tags: Vec<&str> = self.content_types.iter().map(ContentTag::as_str).collect();
            parts.push(format!("content_types={}", tags.join("|")));
        }
        if !self.unit_kinds.is_empty() {
            let kinds: Vec<&str> = self.unit_kinds.iter().map(|k| k.as_str()).collect();
            parts.push(format!("kinds={}", kinds.join("|")));
        }
        if let Some(p) = self.pages {
            parts.push(format!("pages={}-{}", p.start, p.end));
        }
        if let Some(h) = self.heading_levels {
            parts.push(format!("headings={}-{}", h.min, h.max));
        }
        if self.atomic_only {
            parts.push("atomic_only".to_string());
        }
        if let Some(prefix) = &self.section_prefix {
            parts.push(format!("section={prefix}"));
        }
        parts.join(",")
    }
}

/// Document-level predicates resolved by the metadata store into a
/// [`DocumentFilter`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataFilter {
    pub file_types: Vec<String>,
    pub title_contains: Option<String>,
    pub min_quality: Option<f64>,
    pub cluster_id: Option<String>,
}

impl MetadataFilter {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.file_types.is_empty()
            && self.title_contains.is_none()
            && self.min_quality.is_none()
            && self.cluster_id.is_none()
    }

    /// # Errors
    ///
    /// Returns [`SearchError::Validation`] when `min_quality` is outside `[0, 5]`.
    pub fn validate(&self) -> Result<(), SearchError> {
        if let Some(q) = self.min_quality {
            if !q.is_finite() || !(0.0..=5.0).contains(&q) {
                return Err(SearchError::validation(
                    "min_quality",
                    format!("{q} is outside 0..=5"),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DocumentInfo, StructuralMetadata, UnitDetail};

    fn unit(doc: &str) -> SearchableUnit {
        SearchableUnit {
            unit_id: format!("{doc}-c0"),
            document: DocumentInfo {
                document_id: doc.into(),
                ..DocumentInfo::default()
            },
            text: "Quarterly revenue table".into(),
            page_number: Some(3),
            char_start: None,
            char_end: None,
            content_hash: None,
            structure: StructuralMetadata {
                heading_context: Some("Revenue".into()),
                heading_level: Some(2),
                section_path: Some("Financials/Revenue".into()),
                content_types: Some(r#"["table"]"#.into()),
                is_atomic: true,
            },
            detail: UnitDetail::Chunk { chunk_index: 0 },
        }
    }

    #[test]
    fn unset_admits_everything() {
        assert!(DocumentFilter::Unset.admits("anything"));
    }

    #[test]
    fn resolved_empty_set_matches_none() {
        let filter = DocumentFilter::resolved(Vec::<String>::new());
        assert!(filter.matches_none());
        assert!(!filter.admits("doc-1"));
    }

    #[test]
    fn intersect_unset_is_identity() {
        let ids = DocumentFilter::resolved(["a", "b"]);
        assert_eq!(DocumentFilter::Unset.intersect(ids.clone()), ids);
        assert_eq!(ids.clone().intersect(DocumentFilter::Unset), ids);
    }

    #[test]
    fn intersect_disjoint_sets_matches_none() {
        let a = DocumentFilter::resolved(["a"]);
        let b = DocumentFilter::resolved(["b"]);
        assert_eq!(a.intersect(b), DocumentFilter::MatchesNone);
    }

    #[test]
    fn intersect_with_matches_none_stays_none() {
        let a = DocumentFilter::resolved(["a"]);
        assert_eq!(
            a.intersect(DocumentFilter::MatchesNone),
            DocumentFilter::MatchesNone
        );
    }

    #[test]
    fn intersect_overlapping_sets() {
        let a = DocumentFilter::resolved(["a", "b", "c"]);
        let b = DocumentFilter::resolved(["b", "c", "d"]);
        assert_eq!(a.intersect(b), DocumentFilter::resolved(["b", "c"]));
    }

    #[test]
    fn admits_applies_every_predicate() {
        let u = unit("doc-1");
        let mut filters = SearchFilters {
            documents: DocumentFilter::resolved(["doc-1"]),
            content_types: vec![ContentTag::Table],
            unit_kinds: vec![UnitKind::Chunk],
            pages: Some(PageRange { start: 1, end: 3 }),
            heading_levels: Some(HeadingRange { min: 1, max: 2 }),
            atomic_only: true,
            section_prefix: Some("Financials".into()),
        };
        assert!(filters.admits(&u));

        filters.section_prefix = Some("Legal".into());
        assert!(!filters.admits(&u));
        filters.section_prefix = None;

        filters.pages = Some(PageRange { start: 4, end: 9 });
        assert!(!filters.admits(&u));
        filters.pages = None;

        filters.content_types = vec![ContentTag::Code];
        assert!(!filters.admits(&u));
        filters.content_types.clear();

        filters.unit_kinds = vec![UnitKind::Extraction];
        assert!(!filters.admits(&u));
    }

    #[test]
    fn malformed_tags_fail_content_type_filter_only() {
        let mut u = unit("doc-1");
        u.structure.content_types = Some("not json".into());
        let filters = SearchFilters::default();
        assert!(filters.admits(&u));
        let filters = SearchFilters {
            content_types: vec![ContentTag::Table],
            ..SearchFilters::default()
        };
        assert!(!filters.admits(&u));
    }

    #[test]
    fn validate_rejects_inverted_page_range() {
        let filters = SearchFilters {
            pages: Some(PageRange { start: 5, end: 2 }),
            ..SearchFilters::default()
        };
        assert!(filters.validate().is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_heading_levels() {
        let filters = SearchFilters {
            heading_levels: Some(HeadingRange { min: 0, max: 7 }),
            ..SearchFilters::default()
        };
        assert!(filters.validate().is_err());
    }

    #[test]
    fn kinds_defaults_to_all_classes() {
        assert_eq!(SearchFilters::default().kinds(), UnitKind::ALL.to_vec());
    }

    #[test]
    fn metadata_filter_quality_bounds() {
        let ok = MetadataFilter {
            min_quality: Some(3.5),
            ..MetadataFilter::default()
        };
        assert!(ok.validate().is_ok());
        let bad = MetadataFilter {
            min_quality: Some(7.0),
            ..MetadataFilter::default()
        };
        assert!(bad.validate().is_err());
    }
}
