//! Local ONNX embedding provider.
//!
//! Runs a MiniLM-class sentence transformer (all-MiniLM-L6-v2, 384-dim)
//! fully offline through fastembed: canonical WordPiece tokenization,
//! mean-pooling over the attention mask, L2 normalization. The model is
//! fetched into `<config_root>/models` on first use.

use crate::embeddings::provider::{l2_normalize, EmbeddingProvider, ProviderInfo};
use crate::error::{Error, Result};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::path::PathBuf;
use std::sync::Mutex;

/// Output dimension of all-MiniLM-L6-v2.
pub const MINILM_DIMENSIONS: usize = 384;

/// Local ONNX MiniLM provider.
pub struct LocalOnnxEmbedding {
    model: Mutex<TextEmbedding>,
    batch_size: usize,
}

impl LocalOnnxEmbedding {
    /// Load the model, downloading it into the cache directory if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be fetched or initialized;
    /// callers fall back to the hash provider.
    pub fn new(cache_dir: Option<PathBuf>, batch_size: usize) -> Result<Self> {
        let mut options = InitOptions::new(EmbeddingModel::AllMiniLML6V2)
            .with_show_download_progress(false);
        if let Some(dir) = cache_dir {
            options = options.with_cache_dir(dir);
        }
        let model = TextEmbedding::try_new(options)
            .map_err(|e| Error::Embedding(format!("failed to load MiniLM model: {e}")))?;
        Ok(Self {
            model: Mutex::new(model),
            batch_size: batch_size.max(1),
        })
    }
}

impl EmbeddingProvider for LocalOnnxEmbedding {
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: "local_onnx".to_string(),
            model: "all-MiniLM-L6-v2".to_string(),
            dimensions: MINILM_DIMENSIONS,
            semantic: true,
        }
    }

    fn is_available(&self) -> bool {
        true
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut batch = self.embed_batch(&[text])?;
        batch
            .pop()
            .ok_or_else(|| Error::Embedding("model returned no embeddings".to_string()))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let documents: Vec<String> = texts.iter().map(|s| (*s).to_string()).collect();
        let mut model = self.model.lock().expect("embedding model lock poisoned");
        let mut embeddings = model
            .embed(documents, Some(self.batch_size))
            .map_err(|e| Error::Embedding(format!("inference failed: {e}")))?;
        // The model already normalizes; guard the contract anyway.
        for vector in &mut embeddings {
            l2_normalize(vector);
        }
        Ok(embeddings)
    }
}
