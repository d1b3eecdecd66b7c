//! Wildcard query - matches terms using wildcards
//!
//! Supports:
//! - `*` - matches any sequence of characters
//! - `?` - matches any single character
//! - `\` - makes the next character literal
//!
//! # Example
//!
//! ```rust
//! use dishdex::query::nodes::WildcardQuery;
//! use dishdex::schema::Field;
//!
//! let query = WildcardQuery::new(Field::Name, "*izz*");
//! ```

use crate::error::DishdexError;
use crate::query::ast::QueryNode;
use crate::query::context::QueryContext;
use crate::query::types::DocScores;
use crate::schema::Field;
use crate::Result;
use regex::Regex;

/// Query that matches terms using wildcard patterns
///
/// The pattern must match the whole term. Matching documents score the
/// query's boost.
#[derive(Clone, Debug)]
pub struct WildcardQuery {
    /// Field to search in
    pub field: Field,
    /// Wildcard pattern
    pub pattern: String,
    /// Boost factor for scoring
    pub boost: f32,
}

impl WildcardQuery {
    /// Create a new wildcard query
    pub fn new(field: Field, pattern: impl Into<String>) -> Self {
        Self {
            field,
            pattern: pattern.into(),
            boost: 1.0,
        }
    }

    /// Set the boost factor
    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    /// Convert wildcard pattern to a compiled regex
    pub fn pattern_to_regex(&self) -> Result<Regex> {
        let mut regex_pattern = String::from("^");
        let mut chars = self.pattern.chars();

        while let Some(ch) = chars.next() {
            match ch {
                '*' => regex_pattern.push_str(".*"),
                '?' => regex_pattern.push('.'),
                '\\' => {
                    let escaped = chars.next().ok_or_else(|| {
                        DishdexError::QueryParse(format!(
                            "Invalid wildcard pattern '{}': dangling escape",
                            self.pattern
                        ))
                    })?;
                    regex_pattern.push_str(&regex::escape(escaped.encode_utf8(&mut [0; 4])));
                }
                _ => regex_pattern.push_str(&regex::escape(ch.encode_utf8(&mut [0; 4]))),
            }
        }

        regex_pattern.push('$');

        Regex::new(&regex_pattern).map_err(|e| {
            DishdexError::QueryParse(format!("Invalid wildcard pattern '{}': {}", self.pattern, e))
        })
    }

    /// Extract the literal prefix from the pattern
    ///
    /// Returns the longest literal prefix before the first wildcard character,
    /// used to narrow down the terms to scan.
    pub fn extract_prefix(&self) -> Option<String> {
        let mut prefix = String::new();
        let mut chars = self.pattern.chars();
        while let Some(ch) = chars.next() {
            match ch {
                '*' | '?' => break,
                '\\' => match chars.next() {
                    Some(escaped) => prefix.push(escaped),
                    None => break,
                },
                _ => prefix.push(ch),
            }
        }

        if prefix.is_empty() {
            None
        } else {
            Some(prefix)
        }
    }
}

impl QueryNode for WildcardQuery {
    fn execute(&self, ctx: &QueryContext) -> Result<DocScores> {
        let regex = self.pattern_to_regex()?;
        let snapshot = ctx.snapshot();
        let prefix = self.extract_prefix().unwrap_or_default();
        let mut scores = DocScores::new();

        for term in snapshot.terms_with_prefix(self.field, &prefix) {
            ctx.check_deadline()?;
            if !regex.is_match(&term) {
                continue;
            }
            for posting in snapshot.postings(self.field, &term) {
                scores.insert_max(posting.doc, self.boost);
            }
        }

        Ok(scores)
    }

    fn query_type(&self) -> &'static str {
        "wildcard"
    }

    fn boost(&self) -> f32 {
        self.boost
    }

    fn clone_box(&self) -> Box<dyn QueryNode> {
        Box::new(self.clone())
    }
}
