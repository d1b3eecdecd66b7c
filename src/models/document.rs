use serde::{Deserialize, Serialize};

use crate::schema::{Field, SCHEMA};

/// External identifier supplied by the caller, used for update and delete
pub type ExternalKey = String;

/// Field values of a catalog document
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValues {
    pub name: String,
    #[serde(default)]
    pub category: String,
}

impl FieldValues {
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
        }
    }

    /// Value of a schema field
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Name => &self.name,
            Field::Category => &self.category,
        }
    }

    /// True when every required field carries non-blank text
    pub fn has_required_fields(&self) -> bool {
        SCHEMA
            .iter()
            .filter(|m| m.required)
            .all(|m| !self.get(m.field).trim().is_empty())
    }
}

/// Record accepted by the indexing contract
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CatalogRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, alias = "external_key")]
    pub key: Option<ExternalKey>,
}

impl CatalogRecord {
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            category: Some(category.into()),
            key: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<ExternalKey>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Field values with absent fields mapped to empty text
    pub fn fields(&self) -> FieldValues {
        FieldValues {
            name: self.name.clone().unwrap_or_default(),
            category: self.category.clone().unwrap_or_default(),
        }
    }
}

/// A document as held by the document store
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub key: Option<ExternalKey>,
    pub fields: FieldValues,
}
