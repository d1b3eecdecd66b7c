//! Query construction and execution engine
//!
//! Catalog queries are trees of scoring nodes:
//! - Term queries (exact match, BM25+)
//! - Fuzzy queries (edit distance expansion)
//! - Prefix and wildcard queries (constant score)
//! - Phrase queries (positional match)
//! - Boolean `should` disjunctions and boosts
//!
//! The [`QueryBuilder`] assembles the tree for a prepared query and the
//! [`QueryExecutor`] ranks its matches against one snapshot.

pub mod ast;
pub mod builder;
pub mod context;
pub mod executor;
pub mod nodes;
pub mod types;

pub use ast::{BoostQuery, QueryNode};
pub use builder::{escape_query_text, QueryBuilder};
pub use context::QueryContext;
pub use executor::{QueryExecutor, QueryResult};
pub use nodes::{BoolQuery, FuzzyQuery, PhraseQuery, PrefixQuery, TermQuery, WildcardQuery};
pub use types::*;
