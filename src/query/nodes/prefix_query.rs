//! Prefix query - matches terms starting with a prefix
//!
//! A prefix query matches all terms that begin with the specified prefix.
//! This is more efficient than a wildcard query with a trailing `*`.
//!
//! # Example
//!
//! ```rust
//! use dishdex::query::nodes::PrefixQuery;
//! use dishdex::schema::Field;
//!
//! // Match terms starting with "marg" (margherita, margarita, etc.)
//! let query = PrefixQuery::new(Field::Name, "marg").with_boost(1.5);
//! ```

use crate::query::ast::QueryNode;
use crate::query::context::QueryContext;
use crate::query::types::DocScores;
use crate::schema::Field;
use crate::Result;

/// Query that matches terms starting with a prefix
///
/// Every matching document scores the query's boost, however many of its
/// terms share the prefix.
#[derive(Clone, Debug)]
pub struct PrefixQuery {
    /// Field to search in
    pub field: Field,
    /// Prefix to match
    pub prefix: String,
    /// Boost factor for scoring
    pub boost: f32,
}

impl PrefixQuery {
    /// Create a new prefix query
    pub fn new(field: Field, prefix: impl Into<String>) -> Self {
        Self {
            field,
            prefix: prefix.into(),
            boost: 1.0,
        }
    }

    /// Set the boost factor
    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }
}

impl QueryNode for PrefixQuery {
    fn execute(&self, ctx: &QueryContext) -> Result<DocScores> {
        let snapshot = ctx.snapshot();
        let mut scores = DocScores::new();

        for term in snapshot.terms_with_prefix(self.field, &self.prefix) {
            ctx.check_deadline()?;
            for posting in snapshot.postings(self.field, &term) {
                scores.insert_max(posting.doc, self.boost);
            }
        }

        Ok(scores)
    }

    fn query_type(&self) -> &'static str {
        "prefix"
    }

    fn boost(&self) -> f32 {
        self.boost
    }

    fn clone_box(&self) -> Box<dyn QueryNode> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::nodes::test_support::catalog;
    use crate::segment::DocId;

    #[test]
    fn test_prefix_query_creation() {
        let query = PrefixQuery::new(Field::Category, "des");
        assert_eq!(query.field, Field::Category);
        assert_eq!(query.prefix, "des");
        assert_eq!(query.boost, 1.0);
    }

    #[test]
    fn test_prefix_matches_with_constant_score() {
        let snapshot = catalog(&["Pizza", "Pizzetta Pizza", "Pad Thai"]);
        let ctx = QueryContext::new(&snapshot);

        let scores = PrefixQuery::new(Field::Name, "piz")
            .with_boost(1.5)
            .execute(&ctx)
            .unwrap();
        assert_eq!(scores.len(), 2);
        assert_eq!(scores.get(DocId(0)), Some(1.5));
        assert_eq!(scores.get(DocId(1)), Some(1.5));
    }

    #[test]
    fn test_no_matching_prefix() {
        let snapshot = catalog(&["Pizza"]);
        let ctx = QueryContext::new(&snapshot);
        assert!(PrefixQuery::new(Field::Name, "sus").execute(&ctx).unwrap().is_empty());
    }
}
