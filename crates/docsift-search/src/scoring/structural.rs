//! Structure-aware multipliers: heading depth, atomic units, content-type
//! query match and block confidence.

use docsift_core::ContentTag;

/// Heading level assumed when a unit has none; suppresses the boost.
const NO_HEADING_LEVEL: u8 = 5;

const ATOMIC_BOOST: f64 = 1.1;
const TABLE_BOOST: f64 = 1.2;
const CODE_BOOST: f64 = 1.2;
const LIST_BOOST: f64 = 1.15;

const TABLE_KEYWORDS: &[&str] = &[
    "table", "tables", "data", "figure", "figures", "chart", "statistics", "stats", "column",
    "columns", "row", "rows", "spreadsheet", "tabular",
];
const CODE_KEYWORDS: &[&str] = &[
    "code", "function", "script", "snippet", "program", "syntax", "api", "query", "sql",
    "command",
];
const LIST_KEYWORDS: &[&str] = &[
    "list", "lists", "steps", "items", "bullet", "bullets", "checklist", "enumerate",
    "requirements",
];

/// `1 + 0.1 × (4 − clamp(level, 1, 4))`: H1 1.3, H2 1.2, H3 1.1, deeper 1.0.
#[must_use]
pub fn heading_multiplier(level: Option<u8>) -> f64 {
    let level = level.unwrap_or(NO_HEADING_LEVEL).clamp(1, 4);
    0.1_f64.mul_add(f64::from(4 - level), 1.0)
}

#[must_use]
pub const fn atomic_multiplier(is_atomic: bool) -> f64 {
    if is_atomic { ATOMIC_BOOST } else { 1.0 }
}

/// Content classes a query asks about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryIntent {
    pub table: bool,
    pub code: bool,
    pub list: bool,
}

impl QueryIntent {
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        let words: Vec<String> = query
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .collect();
        let any = |keys: &[&str]| words.iter().any(|w| keys.contains(&w.as_str()));
        Self {
            table: any(TABLE_KEYWORDS),
            code: any(CODE_KEYWORDS),
            list: any(LIST_KEYWORDS),
        }
    }

    /// At most one boost fires, in table, code, list priority.
    #[must_use]
    pub fn content_type_multiplier(self, tags: &[ContentTag]) -> f64 {
        if self.table && tags.contains(&ContentTag::Table) {
            TABLE_BOOST
        } else if self.code && tags.contains(&ContentTag::Code) {
            CODE_BOOST
        } else if self.list && tags.contains(&ContentTag::List) {
            LIST_BOOST
        } else {
            1.0
        }
    }
}

/// Extraction reliability of one content tag, 0.0–1.0.
#[must_use]
pub const fn tag_reliability(tag: &ContentTag) -> f64 {
    match tag {
        ContentTag::Text | ContentTag::Heading => 1.0,
        ContentTag::List => 0.95,
        ContentTag::Code => 0.9,
        ContentTag::Table | ContentTag::Other(_) => 0.8,
        ContentTag::Form => 0.75,
        ContentTag::Equation => 0.7,
        ContentTag::Figure => 0.6,
    }
}

/// Confidence that a block was extracted faithfully, 0.0–0.9.
///
/// Mean tag reliability scaled by 0.9; an untagged unit counts as plain text.
#[must_use]
pub fn block_confidence(tags: &[ContentTag]) -> f64 {
    if tags.is_empty() {
        return 0.9;
    }
    #[allow(clippy::cast_precision_loss)]
    let mean = tags.iter().map(tag_reliability).sum::<f64>() / tags.len() as f64;
    0.9 * mean
}

/// `0.8 + 0.4 × confidence`, within `[0.8, 1.16]`.
#[must_use]
pub fn block_confidence_multiplier(tags: &[ContentTag]) -> f64 {
    0.4_f64.mul_add(block_confidence(tags), 0.8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn heading_levels() {
        assert!(approx(heading_multiplier(Some(1)), 1.3));
        assert!(approx(heading_multiplier(Some(2)), 1.2));
        assert!(approx(heading_multiplier(Some(3)), 1.1));
        assert!(approx(heading_multiplier(Some(4)), 1.0));
        assert!(approx(heading_multiplier(Some(6)), 1.0));
        assert!(approx(heading_multiplier(None), 1.0));
        assert!(approx(heading_multiplier(Some(0)), 1.3));
    }

    #[test]
    fn atomic_boost() {
        assert!(approx(atomic_multiplier(true), 1.1));
        assert!(approx(atomic_multiplier(false), 1.0));
    }

    #[test]
    fn intent_detects_keywords() {
        let intent = QueryIntent::from_query("revenue table for Q3");
        assert!(intent.table && !intent.code && !intent.list);
        let intent = QueryIntent::from_query("installation steps");
        assert!(intent.list);
    }

    #[test]
    fn first_matching_content_boost_wins() {
        let intent = QueryIntent {
            table: true,
            code: true,
            list: true,
        };
        let tags = [ContentTag::List, ContentTag::Code, ContentTag::Table];
        assert!(approx(intent.content_type_multiplier(&tags), 1.2));
        assert!(approx(intent.content_type_multiplier(&[ContentTag::List]), 1.15));
    }

    #[test]
    fn content_boost_needs_both_query_and_tag() {
        let intent = QueryIntent::from_query("quarterly data");
        assert!(approx(intent.content_type_multiplier(&[ContentTag::Code]), 1.0));
        assert!(approx(intent.content_type_multiplier(&[ContentTag::Table]), 1.2));
        let none = QueryIntent::default();
        assert!(approx(none.content_type_multiplier(&[ContentTag::Table]), 1.0));
    }

    #[test]
    fn block_confidence_range() {
        assert!(approx(block_confidence_multiplier(&[]), 1.16));
        assert!(approx(block_confidence_multiplier(&[ContentTag::Text]), 1.16));
        assert!(approx(block_confidence_multiplier(&[ContentTag::Figure]), 0.4f64.mul_add(0.54, 0.8)));
        let mixed = [ContentTag::Text, ContentTag::Table];
        assert!(approx(block_confidence(&mixed), 0.81));
    }
}
