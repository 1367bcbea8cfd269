//! Documents consumed by the retrieval core
//!
//! Documents are owned by the ingestion side and only ever read here. The
//! store abstraction lets callers hand the pipeline whatever backs their
//! documents (a directory, a database, an in-memory fixture).

mod store;

pub use store::{DirectoryDocumentStore, DocumentStore, InMemoryDocumentStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Known document metadata plus an open extension map
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,

    /// Upload time, drives the recency signal during reranking
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,

    /// Anything else the ingestion side attached
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

/// A source document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub filename: String,
    pub content: String,
    #[serde(default)]
    pub metadata: DocumentMetadata,
}

impl Document {
    pub fn new(id: impl Into<String>, filename: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            filename: filename.into(),
            content: content.into(),
            metadata: DocumentMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: DocumentMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn uploaded_at(mut self, at: DateTime<Utc>) -> Self {
        self.metadata.uploaded_at = Some(at);
        self
    }
}
