//! Content-addressed memo of chunk embeddings
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Embeddings memoized by BLAKE3 hash of (model, text).
///
/// Repeated queries against unchanged chunks reuse the stored vector instead
/// of calling the provider again. Including the model name in the key keeps a
/// model swap from serving stale vectors.
pub struct EmbeddingCache {
    entries: RwLock<HashMap<blake3::Hash, Arc<Vec<f32>>>>,
    max_entries: usize,
}

impl EmbeddingCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries,
        }
    }

    fn key(model: &str, text: &str) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(model.as_bytes());
        hasher.update(&[0]);
        hasher.update(text.as_bytes());
        hasher.finalize()
    }

    pub fn get(&self, model: &str, text: &str) -> Option<Arc<Vec<f32>>> {
        let entries = self.entries.read().ok()?;
        entries.get(&Self::key(model, text)).cloned()
    }

    /// Store an embedding; ignored once the cache is full
    pub fn insert(&self, model: &str, text: &str, embedding: Arc<Vec<f32>>) {
        let Ok(mut entries) = self.entries.write() else {
            return;
        };
        let key = Self::key(model, text);
        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            tracing::debug!("Embedding cache full ({} entries), not storing", self.max_entries);
            return;
        }
        entries.insert(key, embedding);
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new(100_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyed_by_model_and_text() {
        let cache = EmbeddingCache::new(10);
        cache.insert("model-a", "hello", Arc::new(vec![1.0, 0.0]));

        assert_eq!(cache.get("model-a", "hello").as_deref(), Some(&vec![1.0, 0.0]));
        assert!(cache.get("model-b", "hello").is_none());
        assert!(cache.get("model-a", "hello!").is_none());
    }

    #[test]
    fn test_capacity_limit() {
        let cache = EmbeddingCache::new(1);
        cache.insert("m", "one", Arc::new(vec![1.0]));
        cache.insert("m", "two", Arc::new(vec![2.0]));

        assert_eq!(cache.len(), 1);
        assert!(cache.get("m", "two").is_none());

        cache.clear();
        assert!(cache.is_empty());
    }
}
