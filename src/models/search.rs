use serde::{Deserialize, Serialize};

use super::document::ExternalKey;
use crate::segment::DocId;

/// Outcome of indexing a single record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexReceipt {
    pub accepted: bool,
    pub doc_id: Option<DocId>,
}

impl IndexReceipt {
    pub fn accepted(doc_id: DocId) -> Self {
        Self {
            accepted: true,
            doc_id: Some(doc_id),
        }
    }

    pub fn skipped() -> Self {
        Self {
            accepted: false,
            doc_id: None,
        }
    }
}

/// Outcome of indexing a batch of records under one commit
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BatchReceipt {
    pub accepted: usize,
    pub skipped: usize,
    pub generation: u64,
}

/// A ranked search hit
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<ExternalKey>,
    pub name: String,
    pub category: String,
    pub score: f32,
}

/// Search response
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    pub count: usize,
    pub results: Vec<SearchHit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub took_ms: u64,
}

impl SearchResponse {
    /// Response with no hits
    pub fn empty() -> Self {
        Self::default()
    }

    /// Response with no hits and a query error detail
    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            error: Some(detail.into()),
            ..Self::default()
        }
    }

    pub fn new(results: Vec<SearchHit>, took_ms: u64) -> Self {
        Self {
            count: results.len(),
            results,
            error: None,
            took_ms,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Names of the hits in rank order
    pub fn names(&self) -> Vec<&str> {
        self.results.iter().map(|h| h.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_response() {
        let resp = SearchResponse::empty();
        assert_eq!(resp.count, 0);
        assert!(resp.results.is_empty());
        assert!(resp.error.is_none());

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["count"], 0);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_failed_response_carries_detail() {
        let resp = SearchResponse::failed("dangling escape");
        assert!(resp.is_empty());
        assert_eq!(resp.error.as_deref(), Some("dangling escape"));
    }

    #[test]
    fn test_receipts() {
        assert!(IndexReceipt::accepted(DocId::new(3)).accepted);
        assert_eq!(IndexReceipt::skipped().doc_id, None);
    }
}
