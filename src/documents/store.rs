//! Document store collaborators

use super::{Document, DocumentMetadata};
use crate::error::{RagError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Read-only access to an agent's documents
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// All documents belonging to an agent, in a stable order
    async fn list_documents(&self, agent_id: &str) -> Result<Vec<Document>>;

    /// A single document, if the agent owns it
    async fn get_document(&self, agent_id: &str, document_id: &str) -> Result<Option<Document>>;
}

/// Document store held entirely in memory
#[derive(Debug, Default, Clone)]
pub struct InMemoryDocumentStore {
    documents: HashMap<String, Vec<Document>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a document to an agent
    pub fn insert(&mut self, agent_id: impl Into<String>, document: Document) {
        self.documents
            .entry(agent_id.into())
            .or_default()
            .push(document);
    }

    pub fn with_document(mut self, agent_id: impl Into<String>, document: Document) -> Self {
        self.insert(agent_id, document);
        self
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn list_documents(&self, agent_id: &str) -> Result<Vec<Document>> {
        Ok(self.documents.get(agent_id).cloned().unwrap_or_default())
    }

    async fn get_document(&self, agent_id: &str, document_id: &str) -> Result<Option<Document>> {
        Ok(self
            .documents
            .get(agent_id)
            .and_then(|docs| docs.iter().find(|d| d.id == document_id))
            .cloned())
    }
}

/// Documents laid out on disk as `<root>/<agent_id>/*.{txt,md}`
pub struct DirectoryDocumentStore {
    root: PathBuf,
}

impl DirectoryDocumentStore {
    const EXTENSIONS: [&'static str; 3] = ["txt", "md", "markdown"];

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn agent_dir(&self, agent_id: &str) -> Result<PathBuf> {
        if agent_id.is_empty() || agent_id.contains(['/', '\\']) || agent_id == ".." {
            return Err(RagError::DocumentStore(format!(
                "Invalid agent id: {:?}",
                agent_id
            )));
        }
        Ok(self.root.join(agent_id))
    }

    fn is_document(path: &Path) -> bool {
        path.is_file()
            && path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| Self::EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
    }

    async fn read_document(agent_id: &str, path: &Path) -> Result<Document> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| RagError::Io {
                source: e,
                context: format!("Failed to read document: {}", path.display()),
            })?;

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| String::from("Unknown"));

        let uploaded_at = tokio::fs::metadata(path)
            .await
            .ok()
            .and_then(|m| m.modified().ok())
            .map(DateTime::<Utc>::from);

        Ok(Document {
            id: format!("{}/{}", agent_id, filename),
            filename,
            content,
            metadata: DocumentMetadata {
                uploaded_at,
                ..DocumentMetadata::default()
            },
        })
    }
}

#[async_trait]
impl DocumentStore for DirectoryDocumentStore {
    async fn list_documents(&self, agent_id: &str) -> Result<Vec<Document>> {
        let dir = self.agent_dir(agent_id)?;
        if !dir.exists() {
            tracing::debug!("No document directory for agent {}: {}", agent_id, dir.display());
            return Ok(Vec::new());
        }

        let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| RagError::Io {
            source: e,
            context: format!("Failed to list documents in {}", dir.display()),
        })?;

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| RagError::Io {
            source: e,
            context: format!("Failed to list documents in {}", dir.display()),
        })? {
            let path = entry.path();
            if Self::is_document(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut documents = Vec::with_capacity(paths.len());
        for path in paths {
            documents.push(Self::read_document(agent_id, &path).await?);
        }
        Ok(documents)
    }

    async fn get_document(&self, agent_id: &str, document_id: &str) -> Result<Option<Document>> {
        let Some(filename) = document_id.strip_prefix(&format!("{}/", agent_id)) else {
            return Ok(None);
        };
        if filename.contains(['/', '\\']) {
            return Ok(None);
        }

        let path = self.agent_dir(agent_id)?.join(filename);
        if !Self::is_document(&path) {
            return Ok(None);
        }
        Self::read_document(agent_id, &path).await.map(Some)
    }
}
