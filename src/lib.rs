//! Dishdex: an embedded catalog search index
//!
//! Records with a name and a category are indexed into an inverted index of
//! immutable segments. Commits are durable and atomic, published to readers
//! as snapshots, and searched with a blend of fuzzy, prefix, wildcard and
//! phrase matching weighted per field.
//!
//! ```rust
//! use dishdex::{CatalogRecord, IndexConfig, IndexManager};
//!
//! let index = IndexManager::open(IndexConfig::in_memory()).unwrap();
//! index.index(&CatalogRecord::new("Veggie Burger", "Mains")).unwrap();
//!
//! let response = index.search("burgar").unwrap();
//! assert_eq!(response.names(), vec!["Veggie Burger"]);
//! ```

pub mod config;
pub mod error;
pub mod index;
pub mod models;
pub mod persistence;
pub mod query;
pub mod schema;
pub mod segment;
pub mod tokenizer;

pub use config::{IndexConfig, SearchConfig, TokenizerConfig, WriterConfig};
pub use error::{DishdexError, Result};
pub use index::{IndexManager, IndexStats, SnapshotHandle};
pub use models::*;
pub use tokenizer::{QueryPreprocessor, Tokenizer};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
