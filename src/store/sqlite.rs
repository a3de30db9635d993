//! SQLite-backed [`VectorStore`].
//!
//! One `documents` table holds every collection; vectors are stored as
//! little-endian `f32` BLOBs and ranked in process.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::config::StoreConfig;
use crate::db;
use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::migrate;
use crate::models::{DocumentRecord, Metadata, SearchHit};

use super::{check_dims, rank, VectorStore};

pub struct SqliteStore {
    pool: SqlitePool,
    collection: String,
}

impl SqliteStore {
    /// Connects to the configured database file and ensures the schema.
    pub async fn open(config: &StoreConfig) -> Result<Self> {
        let pool = db::connect(&config.path)
            .await
            .with_context(|| format!("Failed to open store at {}", config.path.display()))?;
        migrate::run_migrations(&pool).await?;
        tracing::debug!(path = %config.path.display(), collection = %config.collection, "sqlite store ready");
        Ok(Self::new(pool, &config.collection))
    }

    pub fn new(pool: SqlitePool, collection: &str) -> Self {
        Self {
            pool,
            collection: collection.to_string(),
        }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Dimensionality of the vectors already in this collection.
    async fn collection_dims(&self) -> Result<Option<usize>> {
        let dims: Option<i64> =
            sqlx::query_scalar("SELECT dims FROM documents WHERE collection = ? LIMIT 1")
                .bind(&self.collection)
                .fetch_optional(&self.pool)
                .await?;
        Ok(dims.map(|d| d as usize))
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<DocumentRecord> {
    let metadata_json: String = row.try_get("metadata_json")?;
    let metadata: Metadata = serde_json::from_str(&metadata_json)
        .with_context(|| "Stored metadata is not a JSON object")?;
    let blob: Vec<u8> = row.try_get("embedding")?;
    Ok(DocumentRecord {
        id: row.try_get("id")?,
        text: row.try_get("text")?,
        metadata,
        embedding: blob_to_vec(&blob),
    })
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn add(&self, record: DocumentRecord) -> Result<()> {
        check_dims(self.collection_dims().await?, record.embedding.len())?;
        let metadata_json = serde_json::to_string(&record.metadata)?;
        sqlx::query(
            r#"
            INSERT INTO documents (id, collection, text, metadata_json, embedding, dims, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&self.collection)
        .bind(&record.text)
        .bind(&metadata_json)
        .bind(vec_to_blob(&record.embedding))
        .bind(record.embedding.len() as i64)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to insert document {}", record.id))?;

        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        check_dims(self.collection_dims().await?, vector.len())?;
        let rows = sqlx::query(
            "SELECT id, text, metadata_json, embedding FROM documents WHERE collection = ?",
        )
        .bind(&self.collection)
        .fetch_all(&self.pool)
        .await?;

        let records = rows
            .iter()
            .map(row_to_record)
            .collect::<Result<Vec<_>>>()?;
        Ok(rank(vector, records, k))
    }

    async fn get(&self, id: &str) -> Result<Option<DocumentRecord>> {
        let row = sqlx::query(
            "SELECT id, text, metadata_json, embedding FROM documents WHERE collection = ? AND id = ?",
        )
        .bind(&self.collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE collection = ?")
            .bind(&self.collection)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}
