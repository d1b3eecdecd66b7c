//! Term dictionary using FST (Finite State Transducer)
//!
//! Maps each term of a field to the ordinal of its posting list. Keys are
//! byte-ordered, so a prefix scan is a range scan over the automaton and
//! full iteration yields terms lexicographically.

use std::io;

use fst::automaton::{Automaton, Str};
use fst::{IntoStreamer, Map, MapBuilder, Streamer};

/// Term dictionary backed by FST
pub struct TermDictionary {
    /// FST mapping term -> posting list ordinal
    fst: Map<Vec<u8>>,
}

impl std::fmt::Debug for TermDictionary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TermDictionary")
            .field("terms", &self.len())
            .finish()
    }
}

impl TermDictionary {
    /// Create a term dictionary from FST data
    pub fn new(fst_data: Vec<u8>) -> io::Result<Self> {
        let fst = Map::new(fst_data).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(Self { fst })
    }

    /// Dictionary with no terms
    pub fn empty() -> io::Result<Self> {
        TermDictionaryBuilder::<()>::new().build().map(|(dict, _)| dict)
    }

    /// Look up a term and return its ordinal
    pub fn get(&self, term: &str) -> Option<usize> {
        self.fst.get(term.as_bytes()).map(|idx| idx as usize)
    }

    /// Check if a term exists
    pub fn contains(&self, term: &str) -> bool {
        self.fst.contains_key(term.as_bytes())
    }

    /// Get the number of terms
    pub fn len(&self) -> usize {
        self.fst.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.fst.is_empty()
    }

    /// All terms starting with `prefix`, in lexicographic order
    pub fn prefix_search(&self, prefix: &str) -> Vec<(String, usize)> {
        let matcher = Str::new(prefix).starts_with();
        let mut stream = self.fst.search(matcher).into_stream();
        let mut results = Vec::new();
        while let Some((key, idx)) = stream.next() {
            if let Ok(term) = std::str::from_utf8(key) {
                results.push((term.to_string(), idx as usize));
            }
        }
        results
    }

    /// Iterate over all terms in the dictionary
    pub fn iter_terms(&self) -> Vec<(String, usize)> {
        let mut results = Vec::with_capacity(self.len());
        let mut stream = self.fst.stream();
        while let Some((key, idx)) = stream.next() {
            if let Ok(term) = std::str::from_utf8(key) {
                results.push((term.to_string(), idx as usize));
            }
        }
        results
    }
}

/// Builder for term dictionaries
///
/// Collects `(term, value)` pairs in any order. `build` sorts them, assigns
/// ordinals in term order and returns the values as a vector indexed by
/// ordinal.
pub struct TermDictionaryBuilder<T> {
    terms: Vec<(String, T)>,
}

impl<T> TermDictionaryBuilder<T> {
    pub fn new() -> Self {
        Self { terms: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            terms: Vec::with_capacity(capacity),
        }
    }

    pub fn add(&mut self, term: String, value: T) {
        self.terms.push((term, value));
    }

    /// Build the term dictionary and the ordinal-indexed values
    pub fn build(mut self) -> io::Result<(TermDictionary, Vec<T>)> {
        // FST requires sorted, unique input
        self.terms.sort_by(|a, b| a.0.cmp(&b.0));
        self.terms.dedup_by(|a, b| a.0 == b.0);

        let mut fst_builder = MapBuilder::memory();
        let mut values = Vec::with_capacity(self.terms.len());

        for (idx, (term, value)) in self.terms.into_iter().enumerate() {
            fst_builder
                .insert(term.as_bytes(), idx as u64)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            values.push(value);
        }

        let fst_data = fst_builder
            .into_inner()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

        Ok((TermDictionary::new(fst_data)?, values))
    }
}

impl<T> Default for TermDictionaryBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}
