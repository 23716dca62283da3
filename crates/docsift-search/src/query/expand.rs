//! Synonym expansion for the lexical query.
//!
//! The expanded form is the original text followed by ` OR `-joined
//! alternates. Only the lexical index ever sees it; embeddings are always
//! computed from the unexpanded text.

use std::collections::{BTreeMap, BTreeSet};

/// Separator between the original query and its alternates.
pub const OR_SEPARATOR: &str = " OR ";

/// Built-in domain synonyms (legal, medical, financial).
const BUILTIN_SYNONYMS: &[(&str, &[&str])] = &[
    // legal
    ("contract", &["agreement"]),
    ("agreement", &["contract"]),
    ("plaintiff", &["claimant"]),
    ("defendant", &["respondent"]),
    ("liability", &["obligation"]),
    ("terminate", &["cancel"]),
    ("termination", &["cancellation"]),
    ("clause", &["provision"]),
    ("indemnify", &["indemnification"]),
    // medical
    ("diagnosis", &["assessment"]),
    ("medication", &["drug", "prescription"]),
    ("physician", &["doctor"]),
    ("patient", &["client"]),
    ("surgery", &["procedure", "operation"]),
    ("symptom", &["complaint"]),
    ("hypertension", &["high blood pressure"]),
    // financial
    ("payment", &["remittance"]),
    ("invoice", &["bill"]),
    ("revenue", &["income", "sales"]),
    ("expense", &["cost", "expenditure"]),
    ("profit", &["earnings"]),
    ("balance", &["account balance"]),
    ("fee", &["charge"]),
];

/// Expansion table: built-ins merged with configured extras.
#[derive(Debug, Clone, Default)]
pub struct SynonymTable {
    entries: BTreeMap<String, Vec<String>>,
}

impl SynonymTable {
    /// Built-in entries only.
    #[must_use]
    pub fn builtin() -> Self {
        let entries = BUILTIN_SYNONYMS
            .iter()
            .map(|(term, alts)| {
                (
                    (*term).to_string(),
                    alts.iter().map(|a| (*a).to_string()).collect(),
                )
            })
            .collect();
        Self { entries }
    }

    /// Built-ins with `extra` merged on top; extra alternates are appended
    /// after the built-in ones for the same term.
    #[must_use]
    pub fn with_extra(extra: &BTreeMap<String, Vec<String>>) -> Self {
        let mut table = Self::builtin();
        for (term, alts) in extra {
            let slot = table.entries.entry(term.to_lowercase()).or_default();
            for alt in alts {
                let alt = alt.trim().to_lowercase();
                if !alt.is_empty() && !slot.contains(&alt) {
                    slot.push(alt);
                }
            }
        }
        table
    }

    #[must_use]
    pub fn alternates(&self, term: &str) -> Option<&[String]> {
        self.entries.get(term).map(Vec::as_slice)
    }
}

/// Result of expanding one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    /// Text for the lexical index.
    pub query: String,
    /// Alternates added by this call.
    pub added: Vec<String>,
}

impl Expansion {
    #[must_use]
    pub fn applied(&self) -> bool {
        !self.added.is_empty()
    }
}

/// Expand `query` with alternates for each of its base-segment terms.
///
/// Re-expanding an already-expanded query adds nothing: alternates already
/// present as ` OR ` segments are skipped.
#[must_use]
pub fn expand_query(query: &str, table: &SynonymTable) -> Expansion {
    let mut segments = query.split(OR_SEPARATOR);
    let base = segments.next().unwrap_or_default();

    let mut present: BTreeSet<String> = BTreeSet::new();
    present.insert(base.trim().to_lowercase());
    present.extend(terms(base));
    present.extend(segments.map(|s| s.trim().to_lowercase()));

    let mut added = Vec::new();
    for term in terms(base) {
        let Some(alts) = table.alternates(&term) else {
            continue;
        };
        for alt in alts {
            if present.insert(alt.clone()) {
                added.push(alt.clone());
            }
        }
    }

    let mut expanded = query.trim_end().to_string();
    for alt in &added {
        expanded.push_str(OR_SEPARATOR);
        expanded.push_str(alt);
    }
    Expansion {
        query: expanded,
        added,
    }
}

/// Lowercased word terms of a segment.
fn terms(segment: &str) -> impl Iterator<Item = String> + '_ {
    segment
        .split(|c: char| !c.is_alphanumeric() && c != '-' && c != '\'')
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_alternates_for_known_terms() {
        let exp = expand_query("payment terms net 30", &SynonymTable::builtin());
        assert_eq!(exp.query, "payment terms net 30 OR remittance");
        assert_eq!(exp.added, vec!["remittance".to_string()]);
        assert!(exp.applied());
    }

    #[test]
    fn unknown_terms_leave_query_untouched() {
        let exp = expand_query("quarterly widgets", &SynonymTable::builtin());
        assert_eq!(exp.query, "quarterly widgets");
        assert!(!exp.applied());
    }

    #[test]
    fn expansion_is_idempotent() {
        let table = SynonymTable::builtin();
        let once = expand_query("Contract termination fee", &table);
        let twice = expand_query(&once.query, &table);
        assert_eq!(once.query, twice.query);
        assert!(twice.added.is_empty());
    }

    #[test]
    fn alternate_already_in_base_is_not_repeated() {
        let exp = expand_query("contract agreement", &SynonymTable::builtin());
        assert_eq!(exp.query, "contract agreement");
        assert!(!exp.applied());
    }

    #[test]
    fn configured_synonyms_merge_over_builtins() {
        let mut extra = BTreeMap::new();
        extra.insert("invoice".to_string(), vec!["Statement".to_string()]);
        extra.insert("nda".to_string(), vec!["non-disclosure agreement".to_string()]);
        let table = SynonymTable::with_extra(&extra);
        assert_eq!(
            table.alternates("invoice"),
            Some(&["bill".to_string(), "statement".to_string()][..])
        );
        let exp = expand_query("NDA scope", &table);
        assert_eq!(exp.query, "NDA scope OR non-disclosure agreement");
    }
}
