//! Knowledge store abstraction.
//!
//! The [`VectorStore`] trait is the only surface the orchestrator sees:
//! insert one record, rank records against a query vector, and count.
//! Two backends implement it:
//!
//! | Backend | Module | Persistence |
//! |---------|--------|-------------|
//! | `memory` | [`memory`] | none (process lifetime) |
//! | `sqlite` | [`sqlite`] | SQLite file under the configured data directory |
//!
//! Ranking is brute-force cosine distance in both backends.

pub mod memory;
pub mod sqlite;

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::StoreConfig;
use crate::embedding::cosine_distance;
use crate::models::{DocumentRecord, SearchHit};

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// Abstract vector store.
///
/// Implementations must be `Send + Sync`; a single instance is shared by
/// every request handler.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Inserts one record. Fails if a record with the same id exists, or if
    /// its embedding length differs from the vectors already stored.
    async fn add(&self, record: DocumentRecord) -> Result<()>;

    /// Returns up to `k` records nearest to `vector`, closest first.
    ///
    /// An empty store yields an empty list, never an error. A query vector
    /// whose length differs from the stored vectors is an error.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<SearchHit>>;

    /// Fetches one record by id.
    async fn get(&self, id: &str) -> Result<Option<DocumentRecord>>;

    /// Number of stored records.
    async fn count(&self) -> Result<usize>;
}

/// Opens the backend selected by `[store].backend`.
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn VectorStore>> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(InMemoryStore::new())),
        "sqlite" => Ok(Arc::new(SqliteStore::open(config).await?)),
        other => bail!("Unknown store backend: {}", other),
    }
}

/// Fails unless a vector of length `actual` fits a collection whose
/// vectors have length `expected` (`None` for an empty collection).
pub(crate) fn check_dims(expected: Option<usize>, actual: usize) -> Result<()> {
    match expected {
        Some(expected) if expected != actual => bail!(
            "Embedding has {} dimensions but the collection holds {}-dimensional vectors",
            actual,
            expected
        ),
        _ => Ok(()),
    }
}

/// Scores every candidate against `query` and keeps the `k` closest.
pub(crate) fn rank<I>(query: &[f32], candidates: I, k: usize) -> Vec<SearchHit>
where
    I: IntoIterator<Item = DocumentRecord>,
{
    let mut hits: Vec<SearchHit> = candidates
        .into_iter()
        .map(|record| SearchHit {
            score: cosine_distance(query, &record.embedding),
            id: record.id,
            text: record.text,
            metadata: record.metadata,
        })
        .collect();
    hits.sort_by(|a, b| {
        a.score
            .partial_cmp(&b.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(k);
    hits
}
