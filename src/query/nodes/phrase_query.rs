//! Phrase query - matches exact phrases with optional proximity/slop
//!
//! A phrase query matches documents containing a sequence of terms,
//! optionally allowing for a number of intervening terms (slop). Each
//! position may list alternative terms, which is how a plural-insensitive
//! last word ("burger" or "burgers") is expressed. Positions carry an
//! offset relative to the first one, so a phrase can skip words that the
//! query dropped ("mac and cheese" expects `cheese` two words after `mac`).
//!
//! # Example
//!
//! ```rust
//! use dishdex::query::nodes::PhraseQuery;
//! use dishdex::schema::Field;
//!
//! // Exact phrase match
//! let query = PhraseQuery::new(Field::Name, ["cheese", "burger"]);
//!
//! // Last word may be singular or plural
//! let query = PhraseQuery::new(Field::Name, ["cheese"]).with_alternatives(["burger", "burgers"]);
//!
//! // `cheese` two words after `mac`
//! let query = PhraseQuery::new(Field::Name, ["mac"]).with_term_at(2, ["cheese"]);
//! ```

use std::collections::HashMap;

use crate::query::ast::QueryNode;
use crate::query::context::QueryContext;
use crate::query::types::DocScores;
use crate::schema::Field;
use crate::segment::{DocId, Posting};
use crate::Result;

/// Query that matches a phrase of terms
///
/// All positions must appear in the document in the specified order. The
/// `slop` parameter allows for intervening terms between positions.
#[derive(Clone, Debug)]
pub struct PhraseQuery {
    /// Field to search in
    pub field: Field,
    /// Accepted terms for each phrase position
    pub positions: Vec<Vec<String>>,
    /// Word offset of each position relative to the first, non-decreasing
    pub offsets: Vec<u32>,
    /// Maximum number of positions between terms (default: 0 for exact phrase)
    pub slop: u32,
    /// Boost factor for scoring
    pub boost: f32,
}

impl PhraseQuery {
    /// Create a new phrase query with exact matching (slop=0)
    pub fn new<I, S>(field: Field, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let positions: Vec<Vec<String>> = terms.into_iter().map(|t| vec![t.into()]).collect();
        Self {
            field,
            offsets: (0..positions.len() as u32).collect(),
            positions,
            slop: 0,
            boost: 1.0,
        }
    }

    /// Append a position, directly after the last one, matched by any of `terms`
    pub fn with_alternatives<I, S>(self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let next = self.offsets.last().map_or(0, |last| last + 1);
        self.with_term_at(next, terms)
    }

    /// Append a position at word `offset` from the first, matched by any of `terms`
    ///
    /// Offsets below the previous position's are raised to it.
    pub fn with_term_at<I, S>(mut self, offset: u32, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let alternatives: Vec<String> = terms.into_iter().map(Into::into).collect();
        if alternatives.is_empty() {
            return self;
        }
        let offset = match self.offsets.last() {
            Some(&last) => offset.max(last),
            None => 0,
        };
        self.positions.push(alternatives);
        self.offsets.push(offset);
        self
    }

    /// Set the slop (maximum positions between terms)
    ///
    /// - slop=0: exact phrase match (terms must be adjacent)
    /// - slop=1: one term can appear between phrase terms
    pub fn with_slop(mut self, slop: u32) -> Self {
        self.slop = slop;
        self
    }

    /// Set the boost factor
    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    /// Number of phrase positions
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Live postings of each alternative at one phrase position, by document
struct PositionPostings<'a> {
    by_doc: HashMap<DocId, Vec<(&'a Posting, u32)>>,
}

impl<'a> PositionPostings<'a> {
    fn collect(ctx: &QueryContext<'a>, field: Field, alternatives: &'a [String]) -> Self {
        let mut by_doc: HashMap<DocId, Vec<(&'a Posting, u32)>> = HashMap::new();
        for term in alternatives {
            let df = ctx.doc_frequency(field, term);
            for posting in ctx.snapshot().postings(field, term) {
                by_doc.entry(posting.doc).or_default().push((posting, df));
            }
        }
        Self { by_doc }
    }

    /// Sorted positions of any alternative in `doc`, with the rarest matching df
    fn positions(&self, doc: DocId) -> Option<(Vec<u32>, u32)> {
        let postings = self.by_doc.get(&doc)?;
        let mut positions: Vec<u32> = postings
            .iter()
            .flat_map(|(p, _)| p.positions.iter().copied())
            .collect();
        positions.sort_unstable();
        positions.dedup();
        let df = postings.iter().map(|(_, df)| *df).min().unwrap_or(0);
        Some((positions, df))
    }
}

impl QueryNode for PhraseQuery {
    fn execute(&self, ctx: &QueryContext) -> Result<DocScores> {
        if self.positions.is_empty() {
            return Ok(DocScores::new());
        }

        let slots: Vec<PositionPostings> = self
            .positions
            .iter()
            .map(|alts| PositionPostings::collect(ctx, self.field, alts))
            .collect();

        // Documents containing every position, driven by the rarest slot
        let Some(driver) = slots.iter().min_by_key(|s| s.by_doc.len()) else {
            return Ok(DocScores::new());
        };
        let mut candidates: Vec<DocId> = driver
            .by_doc
            .keys()
            .copied()
            .filter(|doc| slots.iter().all(|s| s.by_doc.contains_key(doc)))
            .collect();
        candidates.sort_unstable();

        let mut scores = DocScores::with_capacity(candidates.len());
        for doc in candidates {
            ctx.check_deadline()?;

            let mut term_positions = Vec::with_capacity(slots.len());
            let mut dfs = Vec::with_capacity(slots.len());
            for slot in &slots {
                if let Some((positions, df)) = slot.positions(doc) {
                    term_positions.push(positions);
                    dfs.push(df);
                }
            }

            let freq = phrase_frequency(&term_positions, &self.offsets, self.slop);
            if freq == 0 {
                continue;
            }

            let doc_len = ctx.snapshot().field_length(self.field, doc);
            let score: f32 = dfs
                .iter()
                .map(|&df| ctx.score_occurrences(self.field, doc_len, freq, df))
                .sum();
            scores.add(doc, score * self.boost);
        }

        Ok(scores)
    }

    fn query_type(&self) -> &'static str {
        "phrase"
    }

    fn boost(&self) -> f32 {
        self.boost
    }

    fn clone_box(&self) -> Box<dyn QueryNode> {
        Box::new(self.clone())
    }
}

/// Number of start positions from which the phrase matches
///
/// `offsets[i]` is where slot `i` sits relative to slot 0.
fn phrase_frequency(term_positions: &[Vec<u32>], offsets: &[u32], slop: u32) -> u32 {
    let Some((first, rest)) = term_positions.split_first() else {
        return 0;
    };
    let offset = offsets.first().copied().unwrap_or(0);
    let rest_offsets = offsets.get(1..).unwrap_or(&[]);
    first
        .iter()
        .filter(|&&start| check_phrase_from(start, offset, rest, rest_offsets, slop))
        .count() as u32
}

/// Helper function to check if positions form a valid phrase
///
/// Returns true if the positions in `term_positions` can form a phrase of
/// adjacent slots with the given slop tolerance.
#[cfg(test)]
fn positions_form_phrase(term_positions: &[Vec<u32>], slop: u32) -> bool {
    let offsets: Vec<u32> = (0..term_positions.len() as u32).collect();
    term_positions.is_empty() || phrase_frequency(term_positions, &offsets, slop) > 0
}

/// Recursively check if remaining terms can form a phrase from given position
fn check_phrase_from(
    current_pos: u32,
    current_offset: u32,
    remaining: &[Vec<u32>],
    offsets: &[u32],
    slop: u32,
) -> bool {
    let (Some((next, rest)), Some((&next_offset, rest_offsets))) =
        (remaining.split_first(), offsets.split_first())
    else {
        return true;
    };

    // A same-offset slot may share the word; later slots must move forward
    let step = next_offset.saturating_sub(current_offset);
    let expected_pos = current_pos + step;
    let max_pos = expected_pos + slop;

    next.iter()
        .filter(|&&pos| pos >= expected_pos && pos <= max_pos)
        .any(|&pos| check_phrase_from(pos, next_offset, rest, rest_offsets, slop))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::nodes::test_support::catalog;

    #[test]
    fn test_phrase_query_creation() {
        let query = PhraseQuery::new(Field::Name, ["cheese", "burger"])
            .with_slop(1)
            .with_boost(3.0);
        assert_eq!(query.len(), 2);
        assert_eq!(query.slop, 1);
        assert_eq!(query.boost, 3.0);
        assert_eq!(query.offsets, vec![0, 1]);
        assert_eq!(query.query_type(), "phrase");
    }

    #[test]
    fn test_alternatives_follow_last_position() {
        let query = PhraseQuery::new(Field::Name, ["mac"])
            .with_term_at(2, ["cheese"])
            .with_alternatives(["bite", "bites"]);
        assert_eq!(query.offsets, vec![0, 2, 3]);
        assert_eq!(query.positions[2], vec!["bite".to_string(), "bites".to_string()]);

        // an empty phrase always starts at offset zero
        let query = PhraseQuery::new(Field::Name, Vec::<String>::new()).with_term_at(4, ["soup"]);
        assert_eq!(query.offsets, vec![0]);
    }

    #[test]
    fn test_offsets_skip_dropped_words() {
        let positions = vec![vec![0], vec![2]];
        assert_eq!(phrase_frequency(&positions, &[0, 2], 0), 1);
        assert_eq!(phrase_frequency(&positions, &[0, 1], 0), 0);

        let adjacent = vec![vec![0], vec![1]];
        assert_eq!(phrase_frequency(&adjacent, &[0, 2], 0), 0);
    }

    #[test]
    fn test_positions_form_phrase_exact() {
        let positions = vec![vec![0, 5], vec![1, 8]];
        assert!(positions_form_phrase(&positions, 0));
    }

    #[test]
    fn test_positions_form_phrase_with_slop() {
        let positions = vec![vec![0], vec![2]];
        assert!(!positions_form_phrase(&positions, 0));
        assert!(positions_form_phrase(&positions, 1));
    }

    #[test]
    fn test_positions_no_match() {
        let positions = vec![vec![0], vec![10]];
        assert!(!positions_form_phrase(&positions, 2));
    }

    #[test]
    fn test_phrase_frequency_counts_occurrences() {
        let positions = vec![vec![0, 4], vec![1, 5]];
        assert_eq!(phrase_frequency(&positions, &[0, 1], 0), 2);
    }

    #[test]
    fn test_gapped_phrase_prefers_exact_name() {
        let snapshot = catalog(&["Mac Cheese Bites", "Mac and Cheese"]);
        let ctx = QueryContext::new(&snapshot);

        let scores = PhraseQuery::new(Field::Name, ["mac"])
            .with_term_at(2, ["cheese"])
            .execute(&ctx)
            .unwrap();
        assert_eq!(scores.len(), 1);
        assert!(scores.get(DocId(1)).is_some());
    }

    #[test]
    fn test_order_matters() {
        let snapshot = catalog(&["Cheese Burger", "Burger Cheese", "Cheese Pizza"]);
        let ctx = QueryContext::new(&snapshot);

        let scores = PhraseQuery::new(Field::Name, ["cheese", "burger"])
            .execute(&ctx)
            .unwrap();
        assert_eq!(scores.len(), 1);
        assert!(scores.get(DocId(0)).is_some());
    }

    #[test]
    fn test_plural_alternative() {
        let snapshot = catalog(&["Cheese Burgers", "Cheese Burger", "Cheese Fries"]);
        let ctx = QueryContext::new(&snapshot);

        let scores = PhraseQuery::new(Field::Name, ["cheese"])
            .with_alternatives(["burger", "burgers"])
            .execute(&ctx)
            .unwrap();
        assert_eq!(scores.len(), 2);
        assert!(scores.get(DocId(2)).is_none());
    }

    #[test]
    fn test_single_term_phrase() {
        let snapshot = catalog(&["Pizza", "Pad Thai"]);
        let ctx = QueryContext::new(&snapshot);

        let scores = PhraseQuery::new(Field::Name, ["pizza"]).execute(&ctx).unwrap();
        let term = ctx.score_term(Field::Name, "pizza", 1.0);
        assert_eq!(scores.len(), 1);
        assert!((scores.get(DocId(0)).unwrap() - term.get(DocId(0)).unwrap()).abs() < 1e-5);
    }
}
