//! Retrieval orchestration.
//!
//! [`RagService`] ties the three adapters together:
//!
//! ```text
//! ingest:  file ──▶ extract ──▶ embed ──▶ store.add
//! query:   text ──────────────▶ embed ──▶ store.query ──▶ hits / context
//! ```
//!
//! The service is constructed once at startup and shared (behind an `Arc`)
//! by every request handler.

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::embedding::{self, EmbeddingProvider};
use crate::extract::{extension_of, ExtractorRegistry};
use crate::models::{timestamp_metadata, validate_metadata, DocumentRecord, Metadata, SearchHit};
use crate::store::{self, VectorStore};

/// Separator placed between documents in a context block.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

const DEFAULT_MAX_RESULTS: usize = 100;

pub struct RagService {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    extractors: Arc<ExtractorRegistry>,
    max_results: usize,
}

impl RagService {
    /// Creates a service with the built-in extractors.
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            embedder,
            store,
            extractors: Arc::new(ExtractorRegistry::with_builtins()),
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    /// Builds the embedding provider and store named in `config`.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let embedder = embedding::create_provider(&config.embedding).await?;
        let store = store::open_store(&config.store).await?;
        tracing::info!(
            model = embedder.model_name(),
            dims = embedder.dims(),
            backend = %config.store.backend,
            "retrieval service ready"
        );
        Ok(Self::new(embedder, store).with_max_results(config.retrieval.max_results))
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.max(1);
        self
    }

    /// Embeds `text` and stores it under a fresh id, which is returned.
    ///
    /// Without `metadata`, a `{timestamp}` map is attached.
    pub async fn add_document(&self, text: &str, metadata: Option<Metadata>) -> Result<String> {
        let metadata = metadata.unwrap_or_else(timestamp_metadata);
        if let Err(message) = validate_metadata(&metadata) {
            bail!(message);
        }

        let embedding = embedding::embed_one(self.embedder.as_ref(), text)
            .await
            .context("Failed to embed document")?;

        let id = new_document_id();
        self.store
            .add(DocumentRecord {
                id: id.clone(),
                text: text.to_string(),
                metadata,
                embedding,
            })
            .await?;

        tracing::debug!(%id, chars = text.len(), "document added");
        Ok(id)
    }

    /// Extracts plain text from the file at `path` on the blocking pool.
    pub async fn extract_file(&self, path: &Path) -> Result<String> {
        let extractors = self.extractors.clone();
        let owned = path.to_path_buf();
        let text = tokio::task::spawn_blocking(move || extractors.extract(&owned))
            .await
            .context("Extraction task failed")??;
        Ok(text)
    }

    /// Extracts, embeds, and stores a file with `{file_path, timestamp, file_type}` metadata.
    pub async fn add_file(&self, path: &Path) -> Result<String> {
        let text = self.extract_file(path).await?;

        let mut metadata = Metadata::new();
        metadata.insert("file_path".to_string(), path.display().to_string().into());
        metadata.insert("timestamp".to_string(), crate::models::now_iso().into());
        metadata.insert("file_type".to_string(), extension_of(path).into());

        tracing::debug!(path = %path.display(), chars = text.len(), "file extracted");
        self.add_document(&text, Some(metadata)).await
    }

    /// Returns up to `n` stored documents closest to `query`, closest first.
    ///
    /// `n` is clamped to `1..=max_results`.
    pub async fn search(&self, query: &str, n: usize) -> Result<Vec<SearchHit>> {
        let k = n.clamp(1, self.max_results);
        let vector = embedding::embed_one(self.embedder.as_ref(), query)
            .await
            .context("Failed to embed query")?;
        let hits = self.store.query(&vector, k).await?;
        tracing::debug!(k, hits = hits.len(), "search complete");
        Ok(hits)
    }

    /// Joins the text of the top `n` hits with a blank line, in rank order.
    ///
    /// An empty store yields an empty string.
    pub async fn get_context(&self, query: &str, n: usize) -> Result<String> {
        let hits = self.search(query, n).await?;
        Ok(join_context(&hits))
    }

    pub async fn document_count(&self) -> Result<usize> {
        self.store.count().await
    }

    /// Looks up one stored document by the id `add_document` returned.
    pub async fn get_document(&self, id: &str) -> Result<Option<DocumentRecord>> {
        self.store.get(id).await
    }
}

/// Collision-free document id.
fn new_document_id() -> String {
    format!("doc_{}", Uuid::new_v4())
}

pub fn join_context(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|h| h.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}
