//! Context assembly: a character-budgeted, overlap-free passage set.

use crate::dedup::dedup_overlapping;
use docsift_core::ScoredResult;
use serde::Serialize;

/// Passages chosen for a reading context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssembledContext {
    pub passages: Vec<ScoredResult>,
    pub total_chars: usize,
    pub dropped_overlaps: usize,
    /// The budget cut off at least one passage.
    pub truncated: bool,
}

impl AssembledContext {
    /// Passages joined with their source location, best first.
    #[must_use]
    pub fn render(&self) -> String {
        self.passages
            .iter()
            .map(|p| {
                let page = p
                    .unit
                    .page_number
                    .map_or_else(String::new, |n| format!(" p.{n}"));
                format!("[{}{}]\n{}", p.unit.document.file_name, page, p.unit.text)
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Sort best-first, drop overlapping passages, then take passages until the
/// next one would exceed `max_chars`.
#[must_use]
pub fn assemble_context(results: Vec<ScoredResult>, max_chars: usize) -> AssembledContext {
    let (deduped, dropped_overlaps) = dedup_overlapping(results);

    let mut passages = Vec::new();
    let mut total_chars = 0;
    let mut truncated = false;
    for r in deduped {
        let len = r.unit.text.chars().count();
        if total_chars + len > max_chars {
            truncated = true;
            break;
        }
        total_chars += len;
        passages.push(r);
    }

    AssembledContext {
        passages,
        total_chars,
        dropped_overlaps,
        truncated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::test_support::scored;

    fn passage(id: &str, score: f64, text: &str, span: (usize, usize)) -> ScoredResult {
        let mut r = scored(id, "d1", 0, score);
        r.unit.text = text.to_string();
        r.unit.char_start = Some(span.0);
        r.unit.char_end = Some(span.1);
        r
    }

    #[test]
    fn budget_stops_accumulation() {
        let ctx = assemble_context(
            vec![
                passage("a", 0.9, &"x".repeat(60), (0, 60)),
                passage("b", 0.8, &"y".repeat(60), (100, 160)),
            ],
            100,
        );
        assert_eq!(ctx.passages.len(), 1);
        assert_eq!(ctx.total_chars, 60);
        assert!(ctx.truncated);
    }

    #[test]
    fn overlaps_are_removed_before_budgeting() {
        let ctx = assemble_context(
            vec![
                passage("b", 0.5, "later", (0, 10)),
                passage("a", 0.9, "first", (0, 10)),
            ],
            1_000,
        );
        assert_eq!(ctx.passages.len(), 1);
        assert_eq!(ctx.passages[0].unit.unit_id, "a");
        assert_eq!(ctx.dropped_overlaps, 1);
        assert!(!ctx.truncated);
    }

    #[test]
    fn render_labels_source() {
        let ctx = assemble_context(vec![passage("a", 0.9, "Net 30 applies.", (0, 15))], 100);
        assert_eq!(ctx.render(), "[d1.pdf p.1]\nNet 30 applies.");
    }
}
