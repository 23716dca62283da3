//! Repeated header/footer detection.
//!
//! Two independent checks, either of which applies the same single
//! penalty: an exact (whitespace- and case-normalised) match against known
//! boilerplate strings, and pattern heuristics for short text.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Multiplier applied to boilerplate units.
pub const BOILERPLATE_PENALTY: f64 = 0.5;

/// Heuristics only run on text shorter than this (trimmed, in chars).
const SHORT_TEXT_CHARS: usize = 80;

#[allow(clippy::expect_used, reason = "patterns are compile-time constants covered by tests")]
static HEURISTICS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("page_number", r"^(?i:page\s*)?[-–—]?\s*\d{1,4}\s*[-–—]?$"),
        ("page_n_of_m", r"(?i)^page\s+\d+\s*(?:of|/)\s*\d+$"),
        ("copyright", r"(?i)(?:©|\(c\)|\bcopyright\b|\ball rights reserved\b)"),
        (
            "confidentiality",
            r"(?i)\b(?:confidential|proprietary|internal use only|do not distribute)\b",
        ),
    ]
    .into_iter()
    .map(|(name, pattern)| (name, Regex::new(pattern).expect("valid boilerplate pattern")))
    .collect()
});

/// Why a unit was considered boilerplate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoilerplateMatch {
    Known,
    Heuristic(&'static str),
}

/// Matcher over a fixed list of known repeated strings.
#[derive(Debug, Clone, Default)]
pub struct BoilerplateMatcher {
    known: HashSet<String>,
}

impl BoilerplateMatcher {
    pub fn new<I, S>(known: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            known: known
                .into_iter()
                .map(|s| normalize(s.as_ref()))
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// First check that fires for `text`, known strings first.
    #[must_use]
    pub fn detect(&self, text: &str) -> Option<BoilerplateMatch> {
        if !self.known.is_empty() && self.known.contains(&normalize(text)) {
            return Some(BoilerplateMatch::Known);
        }
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed.chars().count() >= SHORT_TEXT_CHARS {
            return None;
        }
        HEURISTICS
            .iter()
            .find(|(_, re)| re.is_match(trimmed))
            .map(|(name, _)| BoilerplateMatch::Heuristic(name))
    }

    /// [`BOILERPLATE_PENALTY`] when any check fires, else 1.0. Never compounds.
    #[must_use]
    pub fn penalty(&self, text: &str) -> f64 {
        if self.detect(text).is_some() {
            BOILERPLATE_PENALTY
        } else {
            1.0
        }
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_numbers_are_boilerplate() {
        let m = BoilerplateMatcher::default();
        assert_eq!(m.detect("12"), Some(BoilerplateMatch::Heuristic("page_number")));
        assert_eq!(m.detect("- 7 -"), Some(BoilerplateMatch::Heuristic("page_number")));
        assert_eq!(m.detect("Page 4"), Some(BoilerplateMatch::Heuristic("page_number")));
        assert_eq!(
            m.detect("Page 3 of 10"),
            Some(BoilerplateMatch::Heuristic("page_n_of_m"))
        );
    }

    #[test]
    fn legal_footers_are_boilerplate() {
        let m = BoilerplateMatcher::default();
        assert!(m.detect("© 2023 Acme Holdings").is_some());
        assert!(m.detect("CONFIDENTIAL - internal").is_some());
    }

    #[test]
    fn long_text_skips_heuristics() {
        let m = BoilerplateMatcher::default();
        let long = format!("Confidential {}", "payment obligations ".repeat(6));
        assert!(long.trim().chars().count() >= 80);
        assert_eq!(m.detect(&long), None);
    }

    #[test]
    fn known_strings_match_after_normalisation() {
        let m = BoilerplateMatcher::new(["ACME Corp   Quarterly Report"]);
        assert_eq!(
            m.detect("  acme corp quarterly\nreport "),
            Some(BoilerplateMatch::Known)
        );
        assert_eq!(m.detect("ACME Corp Quarterly Report appendix"), None);
    }

    #[test]
    fn penalty_does_not_compound() {
        let m = BoilerplateMatcher::new(["Page 3 of 10"]);
        assert!((m.penalty("Page 3 of 10") - 0.5).abs() < f64::EPSILON);
        assert!((m.penalty("Net 30 payment terms apply") - 1.0).abs() < f64::EPSILON);
    }
}
