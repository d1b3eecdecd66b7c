//! Query text normalization
//!
//! Raw query text goes through a fixed pipeline before it reaches the query
//! builder:
//!
//! 1. trim, collapse whitespace runs, lowercase
//! 2. strip everything except letters, digits, apostrophes and hyphens
//! 3. literal substitutions (`&` → `and`, `vs` → `versus`, `w/` → `with`, `w/o` → `without`)
//! 4. stopword removal
//! 5. depluralization of the trailing word
//!
//! Steps 2 and 3 work on whitespace-separated tokens: a token that is exactly
//! a substitution key is replaced, every other token is stripped. Steps 1-4
//! are idempotent and exposed as [`QueryPreprocessor::normalize`].
//!
//! Dropped tokens still occupy word positions in catalog text ("mac and
//! cheese" indexes `cheese` two slots after `mac`), so the prepared query
//! records how many words were dropped before each kept word.

use std::collections::HashSet;
use unicode_segmentation::UnicodeSegmentation;

const SUBSTITUTIONS: [(&str, &str); 4] = [
    ("&", "and"),
    ("vs", "versus"),
    ("w/", "with"),
    ("w/o", "without"),
];

const STOPWORDS: [&str; 8] = ["a", "an", "the", "and", "or", "in", "on", "at"];

/// Query text after the full pipeline
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PreparedQuery {
    /// Normalized text, with the trailing plural `s` removed when `optional_plural` is set
    pub text: String,
    /// The last word should match both `text`'s final word and that word plus `s`
    pub optional_plural: bool,
    /// Words dropped immediately before each word of `text`
    pub gaps: Vec<u32>,
}

impl PreparedQuery {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Words of `text` paired with the number of dropped words preceding them
    pub fn words(&self) -> impl Iterator<Item = (&str, u32)> + '_ {
        self.text
            .split_whitespace()
            .zip(self.gaps.iter().copied().chain(std::iter::repeat(0)))
    }
}

/// Pure, total query text preprocessor
#[derive(Clone, Debug)]
pub struct QueryPreprocessor {
    stopwords: HashSet<&'static str>,
}

impl Default for QueryPreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryPreprocessor {
    pub fn new() -> Self {
        Self {
            stopwords: STOPWORDS.into_iter().collect(),
        }
    }

    fn substitute(token: &str) -> Option<&'static str> {
        SUBSTITUTIONS
            .iter()
            .find(|(from, _)| *from == token)
            .map(|(_, to)| *to)
    }

    fn strip(token: &str) -> String {
        token
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '\'' || *c == '-')
            .collect()
    }

    /// Steps 1-4: case, whitespace, punctuation, substitutions and stopwords
    pub fn normalize(&self, raw: &str) -> String {
        self.normalize_words(raw)
            .into_iter()
            .map(|(word, _)| word)
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn normalize_words(&self, raw: &str) -> Vec<(String, u32)> {
        let lowered = raw.to_lowercase();
        let mut words: Vec<(String, u32)> = Vec::new();
        let mut gap = 0u32;

        for token in lowered.split_whitespace() {
            let word = match Self::substitute(token) {
                Some(replacement) => replacement.to_string(),
                None => {
                    let stripped = Self::strip(token);
                    match Self::substitute(&stripped) {
                        Some(replacement) => replacement.to_string(),
                        None => stripped,
                    }
                }
            };

            if word.is_empty() || self.stopwords.contains(word.as_str()) {
                gap += token.unicode_words().count() as u32;
                continue;
            }
            words.push((word, gap));
            gap = 0;
        }

        words
    }

    /// Full pipeline including depluralization
    pub fn prepare(&self, raw: &str) -> PreparedQuery {
        let (words, gaps): (Vec<String>, Vec<u32>) = self.normalize_words(raw).into_iter().unzip();
        let text = words.join(" ");
        let chars: Vec<char> = text.chars().collect();

        let plural = chars.len() > 3
            && chars[chars.len() - 1] == 's'
            && chars[chars.len() - 2].is_alphanumeric();

        if plural {
            PreparedQuery {
                text: chars[..chars.len() - 1].iter().collect(),
                optional_plural: true,
                gaps,
            }
        } else {
            PreparedQuery {
                text,
                optional_plural: false,
                gaps,
            }
        }
    }
}
