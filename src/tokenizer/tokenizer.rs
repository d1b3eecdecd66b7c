use std::collections::HashMap;
use unicode_segmentation::UnicodeSegmentation;

use crate::config::TokenizerConfig;

/// Field text tokenizer
///
/// Splits on Unicode word boundaries and lowercases. Used both at index time
/// and to turn preprocessed query text into query tokens, so both sides of a
/// match agree on what a term is.
#[derive(Clone, Debug)]
pub struct Tokenizer {
    config: TokenizerConfig,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(&TokenizerConfig::default())
    }
}

impl Tokenizer {
    /// Create a new tokenizer from configuration
    pub fn new(config: &TokenizerConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn normalize_word(&self, word: &str) -> Option<String> {
        let token = if self.config.lowercase {
            word.to_lowercase()
        } else {
            word.to_string()
        };

        let len = token.chars().count();
        if len < self.config.min_token_length || len > self.config.max_token_length {
            return None;
        }
        Some(token)
    }

    /// Tokenize text into a vector of terms
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        text.unicode_words()
            .filter_map(|word| self.normalize_word(word))
            .collect()
    }

    /// Tokenize text and track positions for phrase queries
    ///
    /// Returns a map from each term to its positions in the text.
    /// Positions are 0-indexed and count every word, including ones dropped
    /// by the length filter.
    ///
    /// # Example
    ///
    /// ```
    /// use dishdex::tokenizer::Tokenizer;
    /// use dishdex::config::TokenizerConfig;
    ///
    /// let tokenizer = Tokenizer::new(&TokenizerConfig::default());
    /// let positions = tokenizer.tokenize_with_positions("pad thai pad");
    /// assert_eq!(positions.get("pad"), Some(&vec![0, 2]));
    /// ```
    pub fn tokenize_with_positions(&self, text: &str) -> HashMap<String, Vec<u32>> {
        let mut positions: HashMap<String, Vec<u32>> = HashMap::new();
        for (token, pos) in self.tokenize_with_positions_ordered(text) {
            positions.entry(token).or_default().push(pos);
        }
        positions
    }

    /// Tokenize and return (term, position) pairs in order
    pub fn tokenize_with_positions_ordered(&self, text: &str) -> Vec<(String, u32)> {
        let mut results = Vec::new();

        for (pos, word) in text.unicode_words().enumerate() {
            if let Some(token) = self.normalize_word(word) {
                results.push((token, pos as u32));
            }
        }

        results
    }

    /// Number of position slots the text occupies, filtered words included
    pub fn word_count(&self, text: &str) -> u32 {
        text.unicode_words().count() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(min: usize, max: usize) -> TokenizerConfig {
        TokenizerConfig {
            lowercase: true,
            min_token_length: min,
            max_token_length: max,
        }
    }

    #[test]
    fn test_basic_tokenization() {
        let tokenizer = Tokenizer::new(&config(1, 64));
        let tokens = tokenizer.tokenize("Veggie Burger, extra-Cheese!");

        assert_eq!(tokens, vec!["veggie", "burger", "extra", "cheese"]);
    }

    #[test]
    fn test_unicode_words() {
        let tokenizer = Tokenizer::default();
        let tokens = tokenizer.tokenize("Crème Brûlée & Café");

        assert_eq!(tokens, vec!["crème", "brûlée", "café"]);
    }

    #[test]
    fn test_apostrophes_stay_in_word() {
        let tokenizer = Tokenizer::default();
        assert_eq!(tokenizer.tokenize("General Tso's"), vec!["general", "tso's"]);
    }

    #[test]
    fn test_min_max_token_length() {
        let tokenizer = Tokenizer::new(&config(3, 5));
        let tokens = tokenizer.tokenize("a ab abc abcd abcde abcdef");

        assert_eq!(tokens, vec!["abc", "abcd", "abcde"]);
    }

    #[test]
    fn test_tokenize_with_positions() {
        let tokenizer = Tokenizer::default();
        let positions = tokenizer.tokenize_with_positions("hello world hello again");

        assert_eq!(positions.get("hello"), Some(&vec![0, 2]));
        assert_eq!(positions.get("world"), Some(&vec![1]));
        assert_eq!(positions.get("again"), Some(&vec![3]));
    }

    #[test]
    fn test_filtered_words_keep_their_position() {
        let tokenizer = Tokenizer::new(&config(2, 64));
        let ordered = tokenizer.tokenize_with_positions_ordered("pizza a la mode");

        assert_eq!(
            ordered,
            vec![
                ("pizza".to_string(), 0),
                ("la".to_string(), 2),
                ("mode".to_string(), 3)
            ]
        );
    }

    #[test]
    fn test_empty_text() {
        let tokenizer = Tokenizer::default();
        assert!(tokenizer.tokenize("").is_empty());
        assert!(tokenizer.tokenize("  !!  ").is_empty());
        assert_eq!(tokenizer.word_count("Pizza Margherita"), 2);
        assert_eq!(Tokenizer::new(&config(3, 64)).word_count("mac n cheese"), 3);
    }
}
