//! Per-document memoization of chunker output

use super::{chunk_document, Chunk, ChunkOptions};
use crate::documents::Document;
use crate::error::{RagError, Result};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

type EntryKey = (String, String);

struct Entry {
    fingerprint: blake3::Hash,
    options: ChunkOptions,
    chunks: Arc<Vec<Chunk>>,
}

/// Chunks are produced once per document and reused across queries.
///
/// Entries are keyed by agent and document id. An entry is invalidated when
/// the document's fingerprint (BLAKE3 over content, filename and metadata) or
/// the chunking options change, so a re-ingested document is re-chunked on its
/// next lookup even when only its metadata moved.
#[derive(Default)]
pub struct ChunkCache {
    entries: Mutex<HashMap<EntryKey, Entry>>,
}

impl ChunkCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return cached chunks for `document`, chunking it on a miss
    pub fn get_or_chunk(
        &self,
        agent_id: &str,
        document: &Document,
        options: &ChunkOptions,
    ) -> Result<Arc<Vec<Chunk>>> {
        let key = (agent_id.to_string(), document.id.clone());
        let fingerprint = fingerprint(document)?;

        if let Some(chunks) = self.lookup(&key, &fingerprint, options) {
            tracing::debug!("Chunk cache hit for {}", document.id);
            return Ok(chunks);
        }

        let chunks = Arc::new(chunk_document(document, options)?);

        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                key,
                Entry {
                    fingerprint,
                    options: options.clone(),
                    chunks: Arc::clone(&chunks),
                },
            );
        }

        Ok(chunks)
    }

    fn lookup(
        &self,
        key: &EntryKey,
        fingerprint: &blake3::Hash,
        options: &ChunkOptions,
    ) -> Option<Arc<Vec<Chunk>>> {
        let entries = self.entries.lock().ok()?;
        let entry = entries.get(key)?;
        (entry.fingerprint == *fingerprint && entry.options == *options)
            .then(|| Arc::clone(&entry.chunks))
    }

    /// Drop the agent's entries for documents no longer in `live_ids`.
    ///
    /// Returns the number of entries removed.
    pub fn retain_documents(&self, agent_id: &str, live_ids: &HashSet<&str>) -> usize {
        let Ok(mut entries) = self.entries.lock() else {
            return 0;
        };
        let before = entries.len();
        entries.retain(|(agent, document_id), _| {
            agent != agent_id || live_ids.contains(document_id.as_str())
        });
        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!("Evicted {} cached documents for agent {}", removed, agent_id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// BLAKE3 over everything chunk output is derived from
fn fingerprint(document: &Document) -> Result<blake3::Hash> {
    let metadata = serde_json::to_vec(&document.metadata).map_err(|e| RagError::Json {
        source: e,
        context: format!("Failed to fingerprint metadata of {}", document.id),
    })?;

    let mut hasher = blake3::Hasher::new();
    for part in [
        document.content.as_bytes(),
        document.filename.as_bytes(),
        metadata.as_slice(),
    ] {
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    Ok(hasher.finalize())
}
