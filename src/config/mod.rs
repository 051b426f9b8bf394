//! Configuration management.
//!
//! All persistent state lives under a single configuration root:
//!
//! ```text
//! <config_root>/
//!   memory/
//!     config.json            main configuration document
//!     memory.db              SQLite store (relational + FTS + vectors)
//!     recall_settings.json   ui-layer auto-recall flags
//!     last_recall.json       most recent recall results (for recall-apply)
//!   sessions/                legacy wire logs consumed by `mnemo import`
//!   models/                  embedding model cache
//! ```
//!
//! `<config_root>` is `$MNEMO_HOME` when set (tests use this for isolation),
//! otherwise `~/.mnemo`. A malformed config file is never fatal: defaults are
//! used and a warning is logged.

use crate::error::{Error, Result};
use crate::model::RecallResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Storage backend selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend selector; only `sqlite` is shipped.
    pub backend: String,
    /// Absolute or `~`-expanded path to the data file. Unset means
    /// `<config_root>/memory/memory.db`.
    pub db_path: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "sqlite".to_string(),
            db_path: None,
        }
    }
}

/// Embedding provider selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `local_onnx`, `mock`, or other (unknown falls back to mock).
    pub provider: String,
    /// Vector dimension `D`; must match the provider.
    pub dimensions: usize,
    pub model_name: String,
    /// `cpu` | `cuda` | `mps`.
    pub device: String,
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "local_onnx".to_string(),
            dimensions: 384,
            model_name: "all-MiniLM-L6-v2".to_string(),
            device: "cpu".to_string(),
            batch_size: 32,
        }
    }
}

/// Recall defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecallConfig {
    /// Pre-decay combined-score threshold. 0.0 relies on `max_results`
    /// alone; BM25-mapped scores rarely clear higher cutoffs.
    pub min_similarity: f64,
    pub max_results: usize,
    pub vector_weight: f64,
    pub keyword_weight: f64,
    /// λ in `exp(-λ · age_days)`.
    pub time_decay_factor: f64,
    /// Context messages attached per recalled session.
    pub max_messages_per_session: usize,
}

impl Default for RecallConfig {
    fn default() -> Self {
        Self {
            min_similarity: 0.0,
            max_results: 5,
            vector_weight: 0.6,
            keyword_weight: 0.4,
            time_decay_factor: 0.001,
            max_messages_per_session: 3,
        }
    }
}

/// Complete configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub recall: RecallConfig,
}

impl MemoryConfig {
    /// Load the configuration from `<config_root>/memory/config.json`.
    ///
    /// Missing or malformed files yield the defaults; malformed files also
    /// log a warning (the file is left untouched for the user to inspect).
    #[must_use]
    pub fn load() -> Self {
        let Some(path) = memory_dir().map(|d| d.join("config.json")) else {
            return Self::default();
        };
        Self::load_from(&path)
    }

    /// Load from an explicit path, falling back to defaults on any error.
    #[must_use]
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match std::fs::read_to_string(path)
            .map_err(Error::from)
            .and_then(|raw| serde_json::from_str::<Self>(&raw).map_err(Error::from))
        {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("malformed config at {}: {e}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Persist to `<config_root>/memory/config.json`, creating directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or written.
    pub fn save(&self) -> Result<PathBuf> {
        let dir = memory_dir()
            .ok_or_else(|| Error::Config("could not determine config root".to_string()))?;
        std::fs::create_dir_all(&dir)?;
        let path = dir.join("config.json");
        let payload = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, payload)?;
        Ok(path)
    }

    /// Resolve the database path: explicit flag, else the configured path,
    /// else `<config_root>/memory/memory.db`.
    #[must_use]
    pub fn resolve_db_path(&self, explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        if let Some(configured) = self.storage.db_path.as_deref() {
            if !configured.trim().is_empty() {
                return expand_tilde(configured);
            }
        }
        memory_dir()
            .map(|d| d.join("memory.db"))
            .unwrap_or_else(|| PathBuf::from("memory.db"))
    }
}

/// Recall mode toggled by `recall --mode`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum RecallMode {
    /// List results and emit the context block.
    #[default]
    Auto,
    /// List results only; apply explicitly with `recall-apply`.
    Manual,
    /// Emit only the context block (for piping into a prompt).
    Inject,
}

/// UI-layer auto-recall flags, persisted separately from the main config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecallSettings {
    pub mode: RecallMode,
    pub enabled: bool,
}

impl Default for RecallSettings {
    fn default() -> Self {
        Self {
            mode: RecallMode::Auto,
            enabled: true,
        }
    }
}

impl RecallSettings {
    #[must_use]
    pub fn load() -> Self {
        let Some(path) = memory_dir().map(|d| d.join("recall_settings.json")) else {
            return Self::default();
        };
        std::fs::read_to_string(&path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    /// # Errors
    ///
    /// Returns an error if the settings file cannot be written.
    pub fn save(&self) -> Result<()> {
        let dir = memory_dir()
            .ok_or_else(|| Error::Config("could not determine config root".to_string()))?;
        std::fs::create_dir_all(&dir)?;
        std::fs::write(
            dir.join("recall_settings.json"),
            serde_json::to_string_pretty(self)?,
        )?;
        Ok(())
    }
}

/// Get the configuration root (`$MNEMO_HOME` or `~/.mnemo`).
#[must_use]
pub fn config_root() -> Option<PathBuf> {
    if let Ok(home) = std::env::var("MNEMO_HOME") {
        if !home.trim().is_empty() {
            return Some(PathBuf::from(home));
        }
    }
    directories::BaseDirs::new().map(|b| b.home_dir().join(".mnemo"))
}

/// Get the memory data directory (`<config_root>/memory`).
#[must_use]
pub fn memory_dir() -> Option<PathBuf> {
    config_root().map(|r| r.join("memory"))
}

/// Legacy session logs consumed by the importer.
#[must_use]
pub fn sessions_dir() -> Option<PathBuf> {
    config_root().map(|r| r.join("sessions"))
}

/// Embedding model cache directory.
#[must_use]
pub fn models_dir() -> Option<PathBuf> {
    config_root().map(|r| r.join("models"))
}

/// Expand a leading `~` to the user's home directory.
#[must_use]
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(base) = directories::BaseDirs::new() {
            return base.home_dir().join(rest);
        }
    }
    PathBuf::from(path)
}

/// Persist the latest recall results so `recall-apply` can select from them.
///
/// # Errors
///
/// Returns an error if the cache file cannot be written.
pub fn save_last_recall(results: &[RecallResult]) -> Result<()> {
    let dir =
        memory_dir().ok_or_else(|| Error::Config("could not determine config root".to_string()))?;
    std::fs::create_dir_all(&dir)?;
    std::fs::write(
        dir.join("last_recall.json"),
        serde_json::to_string(results)?,
    )?;
    Ok(())
}

/// Load the results cached by the most recent `recall` run.
///
/// # Errors
///
/// Returns `InvalidArgument` when no recall has been run yet.
pub fn load_last_recall() -> Result<Vec<RecallResult>> {
    let path = memory_dir()
        .map(|d| d.join("last_recall.json"))
        .filter(|p| p.exists())
        .ok_or_else(|| {
            Error::InvalidArgument("no cached recall results; run `mnemo recall` first".to_string())
        })?;
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_complete() {
        let config = MemoryConfig::default();
        assert_eq!(config.storage.backend, "sqlite");
        assert!(config.storage.db_path.is_none());
        assert_eq!(config.embedding.provider, "local_onnx");
        assert_eq!(config.embedding.dimensions, 384);
        assert!((config.recall.vector_weight - 0.6).abs() < f64::EPSILON);
        assert_eq!(config.recall.max_results, 5);
        assert!((config.recall.min_similarity).abs() < f64::EPSILON);
    }

    #[test]
    fn partial_document_fills_in_defaults() {
        let config: MemoryConfig =
            serde_json::from_str(r#"{"embedding": {"provider": "mock"}}"#).unwrap();
        assert_eq!(config.embedding.provider, "mock");
        assert_eq!(config.embedding.dimensions, 384);
        assert_eq!(config.storage.backend, "sqlite");
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();

        let config = MemoryConfig::load_from(&path);
        assert_eq!(config.storage.backend, "sqlite");
    }

    #[test]
    fn explicit_db_path_wins() {
        let config = MemoryConfig::default();
        let explicit = PathBuf::from("/tmp/custom.db");
        assert_eq!(config.resolve_db_path(Some(&explicit)), explicit);
    }

    #[test]
    fn configured_db_path_beats_the_layout_default() {
        let config: MemoryConfig =
            serde_json::from_str(r#"{"storage": {"db_path": "/var/data/m.db"}}"#).unwrap();
        assert_eq!(config.resolve_db_path(None), PathBuf::from("/var/data/m.db"));
    }

    #[test]
    fn tilde_expansion_leaves_absolute_paths_alone() {
        assert_eq!(expand_tilde("/var/data/x.db"), PathBuf::from("/var/data/x.db"));
        let expanded = expand_tilde("~/x.db");
        assert!(expanded.ends_with("x.db"));
        assert!(!expanded.to_string_lossy().contains('~'));
    }

    #[test]
    fn recall_settings_round_trip() {
        let settings: RecallSettings =
            serde_json::from_str(r#"{"mode": "inject", "enabled": false}"#).unwrap();
        assert_eq!(settings.mode, RecallMode::Inject);
        assert!(!settings.enabled);
    }
}
