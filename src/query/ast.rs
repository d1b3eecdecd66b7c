//! Abstract Syntax Tree for query representation
//!
//! This module defines the `QueryNode` trait that all query types implement.
//! Nodes are evaluated against a single snapshot and produce scored matches.

use crate::Result;
use std::fmt::Debug;

use super::context::QueryContext;
use super::types::DocScores;

/// Core trait for all query nodes in the AST
///
/// Query nodes form a tree describing how a prepared query is matched
/// against the catalog. Executing a node yields every live document it
/// matches together with that node's score contribution, boost included.
pub trait QueryNode: Send + Sync + Debug {
    /// Execute the query and return matching documents with scores
    fn execute(&self, ctx: &QueryContext) -> Result<DocScores>;

    /// Get the query type name for debugging and logging
    fn query_type(&self) -> &'static str;

    /// Get the boost factor for this query
    fn boost(&self) -> f32 {
        1.0
    }

    /// Clone this query node into a boxed trait object
    fn clone_box(&self) -> Box<dyn QueryNode>;
}

impl Clone for Box<dyn QueryNode> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Scale every score of an inner query by a constant factor
#[derive(Clone, Debug)]
pub struct BoostQuery {
    pub inner: Box<dyn QueryNode>,
    pub boost: f32,
}

impl BoostQuery {
    pub fn new(inner: Box<dyn QueryNode>, boost: f32) -> Self {
        Self { inner, boost }
    }
}

impl QueryNode for BoostQuery {
    fn execute(&self, ctx: &QueryContext) -> Result<DocScores> {
        let mut scores = self.inner.execute(ctx)?;
        scores.scale(self.boost);
        Ok(scores)
    }

    fn query_type(&self) -> &'static str {
        "boost"
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
    use crate::index::Snapshot;
    use crate::segment::DocId;

    #[derive(Clone, Debug)]
    struct Fixed(Vec<(DocId, f32)>);

    impl QueryNode for Fixed {
        fn execute(&self, _ctx: &QueryContext) -> Result<DocScores> {
            Ok(self.0.iter().copied().collect())
        }

        fn query_type(&self) -> &'static str {
            "fixed"
        }

        fn clone_box(&self) -> Box<dyn QueryNode> {
            Box::new(self.clone())
        }
    }

    #[test]
    fn test_boost_scales_scores() {
        let snapshot = Snapshot::empty();
        let ctx = QueryContext::new(&snapshot);
        let query = BoostQuery::new(Box::new(Fixed(vec![(DocId(4), 2.0)])), 2.0);

        let scores = query.execute(&ctx).unwrap();
        assert_eq!(scores.get(DocId(4)), Some(4.0));
        assert_eq!(query.query_type(), "boost");
        assert_eq!(query.clone_box().boost(), 2.0);
    }
}
