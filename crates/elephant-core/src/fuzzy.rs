//! Generic fuzzy scoring.
//!
//! Two modes share one entry point: subsequence matching (the default,
//! backed by the skim algorithm) and exact substring matching. A score of
//! zero means "no match" and is represented as `None`. Positions always
//! index characters of the candidate, not bytes, so front-ends can
//! highlight multi-byte text correctly.

use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

/// Score base for exact substring hits. High enough to outrank any fuzzy
/// score, below the 1_000_000 band providers use for pinned items.
pub const EXACT_BASE: i32 = 100_000;

/// A successful match of a query against one candidate string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub score: i32,
    /// Char indices of the matched characters in the candidate.
    pub positions: Vec<i32>,
    /// Char index of the first matched character.
    pub start: i32,
}

/// A successful match across several candidate fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMatch {
    /// Index into the field slice handed to [`score_fields`].
    pub field_index: usize,
    pub score: i32,
    pub positions: Vec<i32>,
    pub start: i32,
}

/// Score `query` against `candidate`.
///
/// Exact mode falls back to case-insensitive substring matching: the
/// score is [`EXACT_BASE`] minus the start offset and the positions cover
/// the matched span. Fuzzy mode rewards consecutive hits, word starts and
/// short candidates, and penalizes wide gaps.
#[must_use]
pub fn score(query: &str, candidate: &str, exact: bool) -> Option<Match> {
    if query.is_empty() || candidate.is_empty() {
        return None;
    }

    if exact {
        return exact_score(query, candidate);
    }

    let matcher = SkimMatcherV2::default();
    let (raw, indices) = matcher.fuzzy_indices(candidate, query)?;

    let positions: Vec<i32> = indices.iter().map(|&i| i as i32).collect();
    let start = positions.first().copied().unwrap_or(0);

    Some(Match {
        score: raw.clamp(1, i64::from(i32::MAX)) as i32,
        positions,
        start,
    })
}

fn exact_score(query: &str, candidate: &str) -> Option<Match> {
    let needle: Vec<char> = query.chars().flat_map(char::to_lowercase).collect();
    let haystack: Vec<char> = candidate.chars().flat_map(char::to_lowercase).collect();

    if needle.len() > haystack.len() {
        return None;
    }

    let start = haystack
        .windows(needle.len())
        .position(|window| window == needle.as_slice())?;

    let positions = (start..start + needle.len()).map(|i| i as i32).collect();

    Some(Match {
        score: (EXACT_BASE - start as i32).max(1),
        positions,
        start: start as i32,
    })
}

/// Score `query` against several fields of one item and keep the best.
///
/// Fields are ordered by priority: the winning raw score is discounted by
/// `min(field_index * 5, 50)` and by its start offset, floored at 10, so
/// later fields and matches far from the start rank lower. Ties keep the
/// earlier field.
#[must_use]
pub fn score_fields(query: &str, fields: &[&str], exact: bool) -> Option<FieldMatch> {
    let mut best: Option<FieldMatch> = None;

    for (index, field) in fields.iter().enumerate() {
        let Some(m) = score(query, field, exact) else {
            continue;
        };

        if best.as_ref().is_none_or(|b| m.score > b.score) {
            best = Some(FieldMatch {
                field_index: index,
                score: m.score,
                positions: m.positions,
                start: m.start,
            });
        }
    }

    best.map(|mut b| {
        let discount = (b.field_index as i32 * 5).min(50);
        b.score = (b.score - discount - b.start).max(10);
        b
    })
}
