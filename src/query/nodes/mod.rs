//! Concrete query node implementations
//!
//! This module provides implementations of the `QueryNode` trait for
//! the query types the catalog search composes.

mod bool_query;
mod fuzzy_query;
mod phrase_query;
mod prefix_query;
mod term_query;
mod wildcard_query;

pub use bool_query::BoolQuery;
pub use fuzzy_query::{damerau_levenshtein_distance, FuzzyQuery};
pub use phrase_query::PhraseQuery;
pub use prefix_query::PrefixQuery;
pub use term_query::TermQuery;
pub use wildcard_query::WildcardQuery;

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::HashMap;
    use std::sync::Arc;

    use roaring::RoaringBitmap;

    use crate::index::Snapshot;
    use crate::models::{FieldValues, StoredDocument};
    use crate::segment::{DocId, MutableBuffer, SegmentId};
    use crate::tokenizer::Tokenizer;

    /// Single-segment snapshot holding one document per name, ids in order
    pub fn catalog(names: &[&str]) -> Snapshot {
        let entries: Vec<(&str, &str)> = names.iter().map(|n| (*n, "Mains")).collect();
        catalog_with_categories(&entries)
    }

    pub fn catalog_with_categories(entries: &[(&str, &str)]) -> Snapshot {
        let tokenizer = Tokenizer::default();
        let mut buffer = MutableBuffer::new();
        for (i, (name, category)) in entries.iter().enumerate() {
            buffer.index_document(
                DocId(i as u32),
                StoredDocument {
                    key: None,
                    fields: FieldValues::new(*name, *category),
                },
                &tokenizer,
            );
        }
        let segment = buffer.flush(SegmentId(1)).unwrap().unwrap();
        Snapshot::new(1, vec![Arc::new(segment)], RoaringBitmap::new(), Arc::new(HashMap::new()))
    }
}
