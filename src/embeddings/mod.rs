//! Embedding providers for semantic recall.
//!
//! Two providers ship:
//! - `local_onnx` — MiniLM-class ONNX model run locally (no network after
//!   the first model fetch).
//! - `mock` — deterministic hash-seeded vectors, also the fallback when the
//!   real model cannot load.
//!
//! Unknown provider names fall back to `mock` with a warning; an unusable
//! `local_onnx` install does the same, so recall always has *some* vector
//! leg unless the store itself lacks vector support.

pub mod mock;
pub mod onnx;
pub mod provider;

pub use mock::HashEmbedding;
pub use onnx::LocalOnnxEmbedding;
pub use provider::{EmbeddingProvider, ProviderInfo};

use crate::config::EmbeddingConfig;
use std::sync::Arc;

/// Build the provider selected by the configuration.
///
/// Never fails: every error path degrades to the deterministic hash
/// provider so callers can treat the result uniformly.
#[must_use]
pub fn create_provider(config: &EmbeddingConfig) -> Arc<dyn EmbeddingProvider> {
    match config.provider.as_str() {
        "local_onnx" => {
            match LocalOnnxEmbedding::new(crate::config::models_dir(), config.batch_size) {
                Ok(onnx) => {
                    if config.dimensions != onnx::MINILM_DIMENSIONS {
                        tracing::warn!(
                            "embedding.dimensions = {} does not match the MiniLM model ({}); \
                             using the model's dimension",
                            config.dimensions,
                            onnx::MINILM_DIMENSIONS
                        );
                    }
                    Arc::new(onnx)
                }
                Err(e) => {
                    tracing::warn!("local_onnx unavailable ({e}); falling back to mock embeddings");
                    Arc::new(HashEmbedding::new(config.dimensions))
                }
            }
        }
        "mock" => Arc::new(HashEmbedding::new(config.dimensions)),
        other => {
            tracing::warn!("unknown embedding provider '{other}'; falling back to mock");
            Arc::new(HashEmbedding::new(config.dimensions))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_provider_is_selected_by_name() {
        let config = EmbeddingConfig {
            provider: "mock".to_string(),
            ..EmbeddingConfig::default()
        };
        let provider = create_provider(&config);
        assert_eq!(provider.info().name, "mock");
        assert!(!provider.info().semantic);
    }

    #[test]
    fn unknown_provider_falls_back_to_mock() {
        let config = EmbeddingConfig {
            provider: "quantum".to_string(),
            dimensions: 128,
            ..EmbeddingConfig::default()
        };
        let provider = create_provider(&config);
        assert_eq!(provider.info().name, "mock");
        assert_eq!(provider.info().dimensions, 128);
    }
}
