pub mod document;
pub mod search;

pub use document::{CatalogRecord, ExternalKey, FieldValues, StoredDocument};
pub use search::{BatchReceipt, IndexReceipt, SearchHit, SearchResponse};
