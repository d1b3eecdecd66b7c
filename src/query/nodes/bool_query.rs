//! Boolean query - disjunction of scoring clauses

use crate::query::ast::QueryNode;
use crate::query::context::QueryContext;
use crate::query::types::DocScores;
use crate::Result;

/// Boolean query combining `should` clauses
///
/// A document matches when at least one clause matches it. Its score is
/// the sum of the scores of every clause it matches, times the boost.
#[derive(Clone, Debug)]
pub struct BoolQuery {
    /// Clauses where at least one should match (OR, scoring)
    pub should: Vec<Box<dyn QueryNode>>,
    /// Boost factor for scoring
    pub boost: f32,
}

impl Default for BoolQuery {
    fn default() -> Self {
        Self::new()
    }
}

impl BoolQuery {
    /// Create a new empty boolean query
    pub fn new() -> Self {
        Self {
            should: Vec::new(),
            boost: 1.0,
        }
    }

    /// Add a should clause
    pub fn should(mut self, query: impl QueryNode + 'static) -> Self {
        self.should.push(Box::new(query));
        self
    }

    /// Set boost factor
    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    /// Check if this is an empty query
    pub fn is_empty(&self) -> bool {
        self.should.is_empty()
    }
}

impl QueryNode for BoolQuery {
    fn execute(&self, ctx: &QueryContext) -> Result<DocScores> {
        // An empty disjunction matches nothing
        let mut result = DocScores::new();
        for query in &self.should {
            ctx.check_deadline()?;
            result.union_sum(query.execute(ctx)?);
        }
        result.scale(self.boost);
        Ok(result)
    }

    fn query_type(&self) -> &'static str {
        "bool"
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
    use crate::query::nodes::{PrefixQuery, TermQuery};
    use crate::schema::Field;
    use crate::segment::DocId;

    #[test]
    fn test_empty_bool_matches_nothing() {
        let snapshot = catalog(&["Pizza"]);
        let ctx = QueryContext::new(&snapshot);
        let query = BoolQuery::new();
        assert!(query.is_empty());
        assert!(query.execute(&ctx).unwrap().is_empty());
    }

    #[test]
    fn test_should_sums_clause_scores() {
        let snapshot = catalog(&["Pizza", "Pad Thai"]);
        let ctx = QueryContext::new(&snapshot);

        let query = BoolQuery::new()
            .should(TermQuery::new(Field::Name, "pizza"))
            .should(PrefixQuery::new(Field::Name, "pi").with_boost(1.5))
            .should(PrefixQuery::new(Field::Name, "pa"));
        assert_eq!(query.should.len(), 3);

        let term = ctx.score_term(Field::Name, "pizza", 1.0).get(DocId(0)).unwrap();
        let scores = query.execute(&ctx).unwrap();
        assert_eq!(scores.len(), 2);
        assert!((scores.get(DocId(0)).unwrap() - (term + 1.5)).abs() < 1e-5);
        assert_eq!(scores.get(DocId(1)), Some(1.0));
    }

    #[test]
    fn test_boost_applies_to_sum() {
        let snapshot = catalog(&["Pad Thai"]);
        let ctx = QueryContext::new(&snapshot);
        let query = BoolQuery::new()
            .should(PrefixQuery::new(Field::Name, "pa"))
            .should(PrefixQuery::new(Field::Name, "th"))
            .with_boost(2.0);
        assert_eq!(query.execute(&ctx).unwrap().get(DocId(0)), Some(4.0));
    }
}
