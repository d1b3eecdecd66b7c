//! Field identifiers
//!
//! The catalog schema is closed: every field a document can carry is a
//! variant here, so writer, store and query builder index arrays by
//! [`Field::ordinal`] instead of looking names up at runtime.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A catalog document field
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Name,
    Category,
}

impl Field {
    /// All fields in ordinal order
    pub const ALL: [Field; 2] = [Field::Name, Field::Category];

    /// Number of declared fields
    pub const COUNT: usize = Self::ALL.len();

    /// Dense index of this field, usable for per-field arrays
    #[inline]
    pub const fn ordinal(self) -> usize {
        match self {
            Field::Name => 0,
            Field::Category => 1,
        }
    }

    /// Field name as it appears in records
    pub const fn name(self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Category => "category",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
