//! Feature-hashing embedder.
//!
//! Each lower-cased alphanumeric token is hashed with SHA-256 into one of
//! `dims` buckets with a ±1 sign, and the accumulated vector is
//! L2-normalised. Texts sharing vocabulary land close together, which is
//! enough for offline use and for tests; it carries no semantics beyond
//! word overlap.

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::EmbeddingProvider;

pub(super) const DEFAULT_DIMS: usize = 384;

pub struct HashProvider {
    dims: usize,
}

impl HashProvider {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dims];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dims as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

impl Default for HashProvider {
    fn default() -> Self {
        Self::new(DEFAULT_DIMS)
    }
}

#[async_trait]
impl EmbeddingProvider for HashProvider {
    fn model_name(&self) -> &str {
        "hash"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::cosine_similarity;

    #[test]
    fn deterministic_and_normalised() {
        let provider = HashProvider::default();
        let a = provider.embed_text("Rust ownership and borrowing");
        let b = provider.embed_text("Rust ownership and borrowing");
        assert_eq!(a, b);
        assert_eq!(a.len(), 384);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn case_and_punctuation_insensitive() {
        let provider = HashProvider::new(128);
        assert_eq!(
            provider.embed_text("Hello, World!"),
            provider.embed_text("hello world")
        );
    }

    #[test]
    fn shared_vocabulary_scores_higher() {
        let provider = HashProvider::new(256);
        let doc = provider.embed_text("kubernetes deployment rollout strategy");
        let near = provider.embed_text("kubernetes rollout");
        let far = provider.embed_text("sourdough bread hydration");
        assert!(cosine_similarity(&doc, &near) > cosine_similarity(&doc, &far));
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let provider = HashProvider::new(8);
        assert!(provider.embed_text("  ,, ").iter().all(|x| *x == 0.0));
    }
}
