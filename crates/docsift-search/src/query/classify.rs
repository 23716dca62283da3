//! Lexical-shape classification used to route fusion weights.

use docsift_core::{QueryClassification, QueryKind};
use regex::Regex;
use std::sync::LazyLock;

struct Signal {
    name: &'static str,
    pattern: Regex,
}

#[allow(clippy::expect_used, reason = "patterns are compile-time constants covered by tests")]
fn signal(name: &'static str, pattern: &str) -> Signal {
    Signal {
        name,
        pattern: Regex::new(pattern).expect("valid classifier pattern"),
    }
}

static EXACT_SIGNALS: LazyLock<Vec<Signal>> = LazyLock::new(|| {
    vec![
        signal("quoted_phrase", r#""[^"]+""#),
        signal("field_token", r"\b[A-Za-z_]+:[^\s:]+"),
        signal("code_identifier", r"\b[A-Z]{2,}[-_]?\d+[A-Za-z0-9-]*\b"),
        signal("long_number", r"\b\d{3,}\b"),
        signal("dotted_number", r"\b\d+(?:[./-]\d+)+\b"),
        signal("currency_amount", r"[$€£]\s?\d"),
        signal("snake_or_camel", r"\b[a-z]+(?:_[a-z0-9]+)+\b|\b[a-z]+[A-Z][A-Za-z]*\b"),
    ]
});

static SEMANTIC_SIGNALS: LazyLock<Vec<Signal>> = LazyLock::new(|| {
    vec![
        signal(
            "question",
            r"(?i)^\s*(?:how|what|why|when|where|which|who|can|does|is|are|should)\b|\?\s*$",
        ),
        signal(
            "conceptual_phrase",
            r"(?i)\b(?:explain|describe|summari[sz]e|overview|similar to|related to|examples? of|meaning of|about)\b",
        ),
    ]
});

/// Word count at which an unmarked query reads as natural language.
const NATURAL_LANGUAGE_WORDS: usize = 6;

/// Classify a raw (unexpanded) query.
///
/// Exact-only signals give [`QueryKind::Exact`], semantic-only signals give
/// [`QueryKind::Semantic`], and anything else is [`QueryKind::Mixed`].
#[must_use]
pub fn classify_query(query: &str) -> QueryClassification {
    let mut signals = Vec::new();

    let exact = collect(&EXACT_SIGNALS, query, &mut signals);
    let mut semantic = collect(&SEMANTIC_SIGNALS, query, &mut signals);
    if !exact && query.split_whitespace().count() >= NATURAL_LANGUAGE_WORDS {
        signals.push("long_natural_language".to_string());
        semantic = true;
    }

    let kind = match (exact, semantic) {
        (true, false) => QueryKind::Exact,
        (false, true) => QueryKind::Semantic,
        _ => QueryKind::Mixed,
    };

    QueryClassification {
        kind,
        weights: kind.weights(),
        signals,
    }
}

fn collect(set: &[Signal], query: &str, out: &mut Vec<String>) -> bool {
    let before = out.len();
    out.extend(
        set.iter()
            .filter(|s| s.pattern.is_match(query))
            .map(|s| s.name.to_string()),
    );
    out.len() > before
}
