//! Deterministic hash-seeded pseudo-embeddings.
//!
//! The `mock` provider, also used as the graceful fallback when the real
//! model cannot load. Preserves the L2-norm and determinism contracts but
//! carries no semantic signal; callers treat both variants identically.

use crate::embeddings::provider::{l2_normalize, EmbeddingProvider, ProviderInfo};
use crate::error::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};

/// Hash-seeded pseudo-embedding provider.
pub struct HashEmbedding {
    dimensions: usize,
}

impl HashEmbedding {
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl EmbeddingProvider for HashEmbedding {
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: "mock".to_string(),
            model: "hash-seeded".to_string(),
            dimensions: self.dimensions,
            semantic: false,
        }
    }

    fn is_available(&self) -> bool {
        true
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let seed: [u8; 32] = Sha256::digest(text.as_bytes()).into();
        let mut rng = StdRng::from_seed(seed);
        let mut vector: Vec<f32> = (0..self.dimensions)
            .map(|_| rng.gen_range(-1.0f32..1.0f32))
            .collect();
        l2_normalize(&mut vector);
        Ok(vector)
    }
}
