//! Builds the ranked catalog query from prepared query tokens
//!
//! For every searchable field each token becomes a disjunction of fuzzy,
//! infix-wildcard and boosted prefix matches; the field's tokens are
//! combined and scaled by the field boost. A phrase over the name field is
//! added on top so exact name hits rank first; it keeps each token's word
//! position so words dropped from the query still count as gaps.

use crate::config::SearchConfig;
use crate::error::DishdexError;
use crate::schema::{searchable_fields, Field};
use crate::Result;

use super::ast::{BoostQuery, QueryNode};
use super::nodes::{BoolQuery, FuzzyQuery, PhraseQuery, PrefixQuery, WildcardQuery};

/// Characters with meaning in query syntax
const RESERVED: &[char] = &[
    '\\', '+', '-', '!', '(', ')', ':', '^', '[', ']', '"', '{', '}', '~', '*', '?', '|', '&', '/',
];

/// Escape reserved query characters so `text` is matched literally
pub fn escape_query_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if RESERVED.contains(&ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Turns analyzed query tokens into a query tree
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    config: SearchConfig,
}

impl QueryBuilder {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Build the query for `tokens`, each paired with its word position in the query
    ///
    /// With `optional_plural` the last phrase position also accepts the
    /// token followed by `s`.
    pub fn build(&self, tokens: &[(String, u32)], optional_plural: bool) -> Result<Box<dyn QueryNode>> {
        if tokens.is_empty() {
            return Err(DishdexError::QueryParse("query has no terms".to_string()));
        }

        let mut root = BoolQuery::new();
        for mapping in searchable_fields() {
            let group = self.field_group(mapping.field, tokens)?;
            root = root.should(BoostQuery::new(Box::new(group), mapping.boost));
        }

        if Field::Name.mapping().phrase {
            root = root.should(self.name_phrase(tokens, optional_plural));
        }

        Ok(Box::new(root))
    }

    fn field_group(&self, field: Field, tokens: &[(String, u32)]) -> Result<BoolQuery> {
        let mut group = BoolQuery::new();
        for (token, _) in tokens {
            let wildcard = WildcardQuery::new(field, format!("*{}*", escape_query_text(token)));
            // Reject malformed patterns before any scanning happens
            wildcard.pattern_to_regex()?;

            let per_token = BoolQuery::new()
                .should(
                    FuzzyQuery::new(field, token.as_str())
                        .with_fuzziness(self.config.fuzzy_max_edits)
                        .with_max_expansions(self.config.fuzzy_max_expansions),
                )
                .should(wildcard)
                .should(PrefixQuery::new(field, token.as_str()).with_boost(self.config.prefix_boost));
            group = group.should(per_token);
        }
        Ok(group)
    }

    fn name_phrase(&self, tokens: &[(String, u32)], optional_plural: bool) -> PhraseQuery {
        let start = tokens.first().map_or(0, |(_, pos)| *pos);
        let last = tokens.len().saturating_sub(1);

        let mut phrase = PhraseQuery::new(Field::Name, Vec::<String>::new());
        for (i, (token, pos)) in tokens.iter().enumerate() {
            let offset = pos.saturating_sub(start);
            phrase = if optional_plural && i == last {
                phrase.with_term_at(offset, [token.clone(), format!("{token}s")])
            } else {
                phrase.with_term_at(offset, [token.clone()])
            };
        }

        phrase
            .with_slop(self.config.phrase_slop)
            .with_boost(self.config.phrase_boost)
    }
}
