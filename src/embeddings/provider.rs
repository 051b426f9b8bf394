//! Embedding provider trait.
//!
//! Providers are synchronous and shared immutable after load; callers on
//! any thread may embed concurrently. Output vectors are L2-normalized and
//! deterministic for a given model: `embed(t) == embed(t)`.

use crate::error::Result;

/// Provider metadata.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProviderInfo {
    /// Provider kind (`local_onnx` or `mock`).
    pub name: String,
    /// Model identifier.
    pub model: String,
    /// Output dimension `D`.
    pub dimensions: usize,
    /// Whether this provider carries real semantic signal.
    pub semantic: bool,
}

/// Trait for embedding providers.
///
/// `embed_batch` preserves input order and makes bounded progress per item;
/// the default implementation embeds one text at a time.
pub trait EmbeddingProvider: Send + Sync {
    /// Get provider metadata.
    fn info(&self) -> ProviderInfo;

    /// Check if the provider is ready to embed.
    fn is_available(&self) -> bool;

    /// Embed a single text into a unit-length vector of dimension `D`.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed multiple texts; output order matches input order.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails for any text.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Rescale a vector to unit L2 norm in place. Zero vectors are left alone.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| f64::from(*v).powi(2)).sum::<f64>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v = ((f64::from(*v)) / norm) as f32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_produces_unit_norm() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn normalize_leaves_zero_vector() {
        let mut v = vec![0.0, 0.0];
        l2_normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0]);
    }
}
