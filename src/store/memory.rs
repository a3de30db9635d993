//! In-memory [`VectorStore`] for tests and throwaway sessions.
//!
//! Records live in a `Vec` behind `std::sync::RwLock`; nothing survives a
//! restart.

use std::sync::RwLock;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::models::{DocumentRecord, SearchHit};

use super::{check_dims, rank, VectorStore};

pub struct InMemoryStore {
    records: RwLock<Vec<DocumentRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn add(&self, record: DocumentRecord) -> Result<()> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        if records.iter().any(|r| r.id == record.id) {
            bail!("document id already exists: {}", record.id);
        }
        check_dims(records.first().map(|r| r.embedding.len()), record.embedding.len())?;
        records.push(record);
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let records = self.records.read().map_err(|_| poisoned())?;
        check_dims(records.first().map(|r| r.embedding.len()), vector.len())?;
        Ok(rank(vector, records.iter().cloned(), k))
    }

    async fn get(&self, id: &str) -> Result<Option<DocumentRecord>> {
        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().map_err(|_| poisoned())?.len())
    }
}
