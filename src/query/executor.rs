//! Query executor for running queries against a snapshot
//!
//! The executor evaluates a query tree and keeps the best `top_k` matches,
//! ordered by descending score with ties broken by ascending document id.

use crate::query::ast::QueryNode;
use crate::query::context::QueryContext;
use crate::query::types::{DocScores, QueryStats, ScoredDoc};
use crate::segment::DocId;
use crate::Result;
use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Instant;

/// Query execution result
#[derive(Debug)]
pub struct QueryResult {
    /// Best matching documents, best first
    pub hits: Vec<ScoredDoc>,
    /// Total number of matching documents
    pub total_hits: u64,
    /// Execution statistics
    pub stats: QueryStats,
}

/// Ranking key: higher score first, then lower document id
type RankKey = (OrderedFloat<f32>, Reverse<DocId>);

/// Query executor for running queries
pub struct QueryExecutor;

impl QueryExecutor {
    /// Execute a query and return the top `top_k` results
    pub fn execute(query: &dyn QueryNode, ctx: &QueryContext, top_k: usize) -> Result<QueryResult> {
        let start = Instant::now();

        let matches = query.execute(ctx)?;
        ctx.check_deadline()?;
        let total_hits = matches.len() as u64;
        let hits = Self::collect_top_k(matches, top_k);

        let stats = QueryStats {
            docs_matched: total_hits,
            execution_time_us: start.elapsed().as_micros() as u64,
        };

        Ok(QueryResult {
            hits,
            total_hits,
            stats,
        })
    }

    /// Keep the `top_k` best scored documents, best first
    pub fn collect_top_k(matches: DocScores, top_k: usize) -> Vec<ScoredDoc> {
        if matches.is_empty() || top_k == 0 {
            return Vec::new();
        }

        // Min-heap on the ranking key: the weakest kept hit is at the top
        let mut heap: BinaryHeap<Reverse<RankKey>> = BinaryHeap::with_capacity(top_k + 1);

        for (doc, score) in matches {
            let key = (OrderedFloat(score), Reverse(doc));
            if heap.len() < top_k {
                heap.push(Reverse(key));
            } else if let Some(Reverse(weakest)) = heap.peek() {
                if key > *weakest {
                    heap.pop();
                    heap.push(Reverse(key));
                }
            }
        }

        // Ascending order of Reverse<key> is descending rank
        heap.into_sorted_vec()
            .into_iter()
            .map(|Reverse((OrderedFloat(score), Reverse(doc)))| ScoredDoc { doc, score })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Snapshot;
    use crate::query::nodes::test_support::catalog;
    use crate::query::nodes::{PrefixQuery, TermQuery};
    use crate::schema::Field;

    fn scores(pairs: &[(u32, f32)]) -> DocScores {
        pairs.iter().map(|&(d, s)| (DocId(d), s)).collect()
    }

    #[test]
    fn test_descending_score() {
        let hits = QueryExecutor::collect_top_k(scores(&[(1, 0.5), (2, 3.0), (3, 1.0)]), 10);
        let docs: Vec<u32> = hits.iter().map(|h| h.doc.as_u32()).collect();
        assert_eq!(docs, vec![2, 3, 1]);
    }

    #[test]
    fn test_ties_break_on_doc_id() {
        let hits = QueryExecutor::collect_top_k(scores(&[(9, 1.0), (4, 1.0), (7, 1.0), (1, 0.1)]), 3);
        let docs: Vec<u32> = hits.iter().map(|h| h.doc.as_u32()).collect();
        assert_eq!(docs, vec![4, 7, 9]);
    }

    #[test]
    fn test_top_k_cap() {
        let many: DocScores = (0..60).map(|d| (DocId(d), d as f32)).collect();
        let hits = QueryExecutor::collect_top_k(many, 50);
        assert_eq!(hits.len(), 50);
        assert_eq!(hits[0].doc, DocId(59));
        assert_eq!(hits[49].doc, DocId(10));
    }

    #[test]
    fn test_execute_empty_result() {
        let snapshot = Snapshot::empty();
        let ctx = QueryContext::new(&snapshot);
        let query = TermQuery::new(Field::Name, "nonexistent");

        let result = QueryExecutor::execute(&query, &ctx, 10).unwrap();
        assert_eq!(result.total_hits, 0);
        assert!(result.hits.is_empty());
    }

    #[test]
    fn test_execute_with_stats() {
        let snapshot = catalog(&["Pizza", "Pad Thai", "Pho"]);
        let ctx = QueryContext::new(&snapshot);
        let query = PrefixQuery::new(Field::Name, "p");

        let result = QueryExecutor::execute(&query, &ctx, 2).unwrap();
        assert_eq!(result.total_hits, 3);
        assert_eq!(result.stats.docs_matched, 3);
        let docs: Vec<u32> = result.hits.iter().map(|h| h.doc.as_u32()).collect();
        assert_eq!(docs, vec![0, 1]);
    }
}
