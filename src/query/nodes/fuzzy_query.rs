//! Fuzzy query - matches terms within an edit distance
//!
//! Uses Damerau-Levenshtein distance to find indexed terms that are similar
//! to the query term, so that "burgar" still finds "burger".
//!
//! # Example
//!
//! ```rust
//! use dishdex::query::nodes::FuzzyQuery;
//! use dishdex::schema::Field;
//!
//! // Find terms within edit distance 2 of "burgar" (matches "burger")
//! let query = FuzzyQuery::new(Field::Name, "burgar").with_fuzziness(2);
//! ```

use crate::query::ast::QueryNode;
use crate::query::context::QueryContext;
use crate::query::types::DocScores;
use crate::schema::Field;
use crate::Result;

/// Query that matches terms within an edit distance of the query term
///
/// The edit distance counts insertions, deletions, substitutions and
/// transpositions of adjacent characters. Each expansion is scored with
/// BM25+ weighted by its similarity to the query term; a document keeps
/// the best of its expansions.
#[derive(Clone, Debug)]
pub struct FuzzyQuery {
    /// Field to search in
    pub field: Field,
    /// Term to match approximately
    pub term: String,
    /// Maximum edit distance (default: 2)
    pub fuzziness: u32,
    /// Maximum number of terms to consider (default: 50)
    pub max_expansions: usize,
    /// Boost factor for scoring
    pub boost: f32,
}

impl FuzzyQuery {
    /// Create a new fuzzy query with default fuzziness of 2
    pub fn new(field: Field, term: impl Into<String>) -> Self {
        Self {
            field,
            term: term.into(),
            fuzziness: 2,
            max_expansions: 50,
            boost: 1.0,
        }
    }

    /// Set the maximum edit distance
    pub fn with_fuzziness(mut self, fuzziness: u32) -> Self {
        self.fuzziness = fuzziness;
        self
    }

    /// Set the maximum number of terms to consider
    pub fn with_max_expansions(mut self, max_expansions: usize) -> Self {
        self.max_expansions = max_expansions;
        self
    }

    /// Set the boost factor
    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    /// Indexed terms within the edit distance, closest first
    ///
    /// Returns `(term, similarity)` pairs, where similarity is
    /// `1 - distance / min(len(term), len(query))`. Terms with no positive
    /// similarity are left out.
    pub fn expand(&self, ctx: &QueryContext) -> Result<Vec<(String, f32)>> {
        let query_len = self.term.chars().count();
        let max_edits = self.fuzziness as usize;
        let mut candidates: Vec<(usize, String)> = Vec::new();

        for term in ctx.snapshot().all_terms(self.field) {
            ctx.check_deadline()?;
            let term_len = term.chars().count();
            if term_len.abs_diff(query_len) > max_edits {
                continue;
            }
            let distance = damerau_levenshtein_distance(&self.term, &term);
            if distance <= max_edits {
                candidates.push((distance, term));
            }
        }

        candidates.sort();
        candidates.truncate(self.max_expansions);

        Ok(candidates
            .into_iter()
            .filter_map(|(distance, term)| {
                let shortest = term.chars().count().min(query_len);
                if shortest == 0 {
                    return None;
                }
                let similarity = 1.0 - distance as f32 / shortest as f32;
                (similarity > 0.0).then_some((term, similarity))
            })
            .collect())
    }
}

impl QueryNode for FuzzyQuery {
    fn execute(&self, ctx: &QueryContext) -> Result<DocScores> {
        // If fuzziness is 0, this is just an exact match
        if self.fuzziness == 0 {
            return Ok(ctx.score_term(self.field, &self.term, self.boost));
        }

        let mut scores = DocScores::new();
        for (term, similarity) in self.expand(ctx)? {
            for (doc, score) in ctx.score_term(self.field, &term, self.boost * similarity) {
                scores.insert_max(doc, score);
            }
        }
        Ok(scores)
    }

    fn query_type(&self) -> &'static str {
        "fuzzy"
    }

    fn boost(&self) -> f32 {
        self.boost
    }

    fn clone_box(&self) -> Box<dyn QueryNode> {
        Box::new(self.clone())
    }
}

/// Calculate Damerau-Levenshtein distance (includes transpositions)
///
/// This allows adjacent character swaps as a single operation
/// (optimal string alignment variant).
pub fn damerau_levenshtein_distance(s1: &str, s2: &str) -> usize {
    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut matrix = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=b.len() {
        matrix[0][j] = j;
    }

    for i in 1..=a.len() {
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);

            matrix[i][j] = (matrix[i - 1][j] + 1)
                .min(matrix[i][j - 1] + 1)
                .min(matrix[i - 1][j - 1] + cost);

            // Transposition
            if i > 1 && j > 1 && a[i - 1] == b[j - 2] && a[i - 2] == b[j - 1] {
                matrix[i][j] = matrix[i][j].min(matrix[i - 2][j - 2] + 1);
            }
        }
    }

    matrix[a.len()][b.len()]
}
