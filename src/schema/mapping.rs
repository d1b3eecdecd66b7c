//! Static field mappings
//!
//! Declares, per field, how it is indexed, whether it is stored and the
//! weight its matches carry at query time.

use super::field::Field;

/// How a field's text is indexed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexOptions {
    /// Not searchable
    None,
    /// Terms and term frequencies
    Freqs,
    /// Terms, frequencies and token positions (required for phrase queries)
    Positions,
}

impl IndexOptions {
    pub fn is_indexed(self) -> bool {
        !matches!(self, IndexOptions::None)
    }

    pub fn has_positions(self) -> bool {
        matches!(self, IndexOptions::Positions)
    }
}

/// Field mapping configuration
#[derive(Clone, Copy, Debug)]
pub struct FieldMapping {
    pub field: Field,
    /// Document is rejected (silently skipped) when this field is blank
    pub required: bool,
    pub store: bool,
    pub index: IndexOptions,
    /// Multiplier applied to every sub-query on this field
    pub boost: f32,
    /// Field receives the phrase sub-query
    pub phrase: bool,
}

/// The catalog schema
pub const SCHEMA: [FieldMapping; Field::COUNT] = [
    FieldMapping {
        field: Field::Name,
        required: true,
        store: true,
        index: IndexOptions::Positions,
        boost: 2.0,
        phrase: true,
    },
    FieldMapping {
        field: Field::Category,
        required: false,
        store: true,
        index: IndexOptions::Positions,
        boost: 1.0,
        phrase: false,
    },
];

impl Field {
    /// Mapping declared for this field
    #[inline]
    pub fn mapping(self) -> &'static FieldMapping {
        &SCHEMA[self.ordinal()]
    }

    /// Query-time weight of this field
    #[inline]
    pub fn boost(self) -> f32 {
        self.mapping().boost
    }
}

/// Fields that are searchable, in declaration order
pub fn searchable_fields() -> impl Iterator<Item = &'static FieldMapping> {
    SCHEMA.iter().filter(|m| m.index.is_indexed())
}
