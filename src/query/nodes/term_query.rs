//! Term query - exact match on a field

use crate::query::ast::QueryNode;
use crate::query::context::QueryContext;
use crate::query::types::DocScores;
use crate::schema::Field;
use crate::Result;

/// Query that matches documents containing an exact term in a field
///
/// Each match is scored with BM25+ over the snapshot's live documents.
#[derive(Clone, Debug)]
pub struct TermQuery {
    /// Field to search in
    pub field: Field,
    /// Exact term to match
    pub term: String,
    /// Boost factor for scoring
    pub boost: f32,
}

impl TermQuery {
    /// Create a new term query
    pub fn new(field: Field, term: impl Into<String>) -> Self {
        Self {
            field,
            term: term.into(),
            boost: 1.0,
        }
    }

    /// Set the boost factor
    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }
}

impl QueryNode for TermQuery {
    fn execute(&self, ctx: &QueryContext) -> Result<DocScores> {
        ctx.check_deadline()?;
        Ok(ctx.score_term(self.field, &self.term, self.boost))
    }

    fn query_type(&self) -> &'static str {
        "term"
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
    fn test_term_query_creation() {
        let query = TermQuery::new(Field::Name, "pizza").with_boost(2.0);
        assert_eq!(query.field, Field::Name);
        assert_eq!(query.term, "pizza");
        assert_eq!(query.boost, 2.0);
        assert_eq!(query.query_type(), "term");
    }

    #[test]
    fn test_shorter_field_scores_higher() {
        let snapshot = catalog(&["Pizza", "Spicy Pizza", "Pad Thai"]);
        let ctx = QueryContext::new(&snapshot);

        let scores = TermQuery::new(Field::Name, "pizza").execute(&ctx).unwrap();
        assert_eq!(scores.len(), 2);
        assert!(scores.get(DocId(0)).unwrap() > scores.get(DocId(1)).unwrap());
        assert!(scores.get(DocId(2)).is_none());
    }

    #[test]
    fn test_boost_multiplies_score() {
        let snapshot = catalog(&["Pizza", "Pad Thai"]);
        let ctx = QueryContext::new(&snapshot);

        let plain = TermQuery::new(Field::Name, "pizza").execute(&ctx).unwrap();
        let boosted = TermQuery::new(Field::Name, "pizza")
            .with_boost(2.0)
            .execute(&ctx)
            .unwrap();
        let (a, b) = (plain.get(DocId(0)).unwrap(), boosted.get(DocId(0)).unwrap());
        assert!((b - 2.0 * a).abs() < 1e-5);
    }

    #[test]
    fn test_unknown_term() {
        let snapshot = catalog(&["Pizza"]);
        let ctx = QueryContext::new(&snapshot);
        assert!(TermQuery::new(Field::Name, "sushi").execute(&ctx).unwrap().is_empty());
    }
}
