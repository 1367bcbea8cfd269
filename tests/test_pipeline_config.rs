//! Configuration-driven pipeline over documents on disk

use async_trait::async_trait;
use ragrank::citation::CitationFormat;
use ragrank::config::Config;
use ragrank::documents::DirectoryDocumentStore;
use ragrank::embedding::{EmbeddingError, EmbeddingProvider};
use ragrank::pipeline::{QueryRequest, RagPipeline};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Embeds text by its length and vowel count
struct ShapeProvider {
    calls: AtomicUsize,
}

#[async_trait]
impl EmbeddingProvider for ShapeProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let vowels = text.chars().filter(|c| "aeiou".contains(*c)).count();
        Ok(vec![text.len() as f32, vowels as f32, 1.0])
    }

    fn dimension(&self) -> usize {
        3
    }

    fn model_name(&self) -> &str {
        "shape"
    }
}

const CONFIG: &str = r#"
[_meta]
schema_version = "1.0.0"

[chunking]
max_chunk_size = 80
min_chunk_size = 10
overlap_size = 0
split_by = "paragraph"

[retrieval]
top_k = 2
semantic_weight = 0.4
normalization = "min_max"

[citation]
format = "simple"
excerpt_chars = 20

[profiles.scholar]
citation_format = "apa"
semantic_weight = 0.2
"#;

fn write_corpus(root: &std::path::Path) {
    let agent = root.join("support");
    std::fs::create_dir_all(&agent).unwrap();
    std::fs::write(
        agent.join("refunds.md"),
        "# Refunds\n\nRefunds are issued to the original payment method.\n\n\
         ## Timing\n\nRefund requests are accepted within 30 days of delivery.",
    )
    .unwrap();
    std::fs::write(
        agent.join("hours.txt"),
        "The support office is open from nine to five on weekdays.",
    )
    .unwrap();
}

#[tokio::test]
async fn test_pipeline_from_config_file() {
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("config.toml");
    std::fs::write(&config_path, CONFIG).unwrap();
    write_corpus(temp.path());

    let config = Config::load_with_profile(&config_path, "scholar").unwrap();
    assert_eq!(config.citation.format, CitationFormat::Apa);
    assert_eq!(config.retrieval.semantic_weight, 0.2);

    let provider = Arc::new(ShapeProvider {
        calls: AtomicUsize::new(0),
    });
    let store = Arc::new(DirectoryDocumentStore::new(temp.path()));
    let pipeline = RagPipeline::from_config(&config, store, provider.clone()).unwrap();

    let request = QueryRequest::from_config(&config, "refund requests", "support");
    assert_eq!(request.top_k, 2);

    let response = pipeline.query(&request).await.unwrap();
    assert_eq!(response.stats.total_documents, 2);
    assert!(response.stats.total_chunks >= 3);
    assert_eq!(response.stats.returned_chunks, 2);
    assert_eq!(response.citations.len(), 2);

    let top = &response.citations[0];
    assert_eq!(top.filename, "refunds.md");
    assert!(!top.format.starts_with('['));
    assert_eq!(top.text.chars().count(), 23);
    assert!(response.context.starts_with("[1] "));

    // Chunks and their embeddings are reused by the next query
    let first_calls = provider.calls.load(Ordering::SeqCst);
    assert_eq!(first_calls, response.stats.total_chunks + 1);
    assert_eq!(pipeline.chunk_cache().len(), 2);

    pipeline
        .query(&QueryRequest::from_config(&config, "office hours", "support"))
        .await
        .unwrap();
    assert_eq!(provider.calls.load(Ordering::SeqCst), first_calls + 1);
}

#[tokio::test]
async fn test_deleted_document_leaves_chunk_cache() {
    let temp = TempDir::new().unwrap();
    write_corpus(temp.path());
    let config = Config::default();
    let provider = Arc::new(ShapeProvider {
        calls: AtomicUsize::new(0),
    });
    let store = Arc::new(DirectoryDocumentStore::new(temp.path()));
    let pipeline = RagPipeline::from_config(&config, store, provider).unwrap();

    let (documents, _) = pipeline.agent_chunks("support").await.unwrap();
    assert_eq!(documents, 2);
    assert_eq!(pipeline.chunk_cache().len(), 2);

    std::fs::remove_file(temp.path().join("support").join("hours.txt")).unwrap();

    let (documents, chunks) = pipeline.agent_chunks("support").await.unwrap();
    assert_eq!(documents, 1);
    assert!(chunks.iter().all(|c| c.metadata.filename == "refunds.md"));
    assert_eq!(pipeline.chunk_cache().len(), 1);
}

#[tokio::test]
async fn test_missing_agent_directory_is_empty() {
    let temp = TempDir::new().unwrap();
    let config = Config::default();
    let provider = Arc::new(ShapeProvider {
        calls: AtomicUsize::new(0),
    });
    let store = Arc::new(DirectoryDocumentStore::new(temp.path()));
    let pipeline = RagPipeline::from_config(&config, store, provider.clone()).unwrap();

    let response = pipeline
        .query(&QueryRequest::from_config(&config, "anything", "nobody"))
        .await
        .unwrap();

    assert!(response.is_empty());
    assert!(response.message.is_some());
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_invalid_config_file_reports_all_problems() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(
        &path,
        "[_meta]\nschema_version = \"1.0.0\"\n\n[retrieval]\ntop_k = 0\nsemantic_weight = 3.0\n",
    )
    .unwrap();

    match Config::load(&path) {
        Err(ragrank::RagError::ConfigValidation { errors }) => assert_eq!(errors.len(), 2),
        other => panic!("expected validation failure, got {:?}", other.map(|_| ())),
    }
}
