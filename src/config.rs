use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::ConfigError;
use crate::memory::score::ScoringWeights;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChroniclerConfig {
    pub session: SessionConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub generation: GenerationConfig,
    pub scoring: ScoringWeights,
    pub retrieval: RetrievalConfig,
    pub window: WindowConfig,
    pub external: ExternalConfig,
    pub maintenance: MaintenanceConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SessionConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub dimensions: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GenerationConfig {
    pub provider: String,
    pub max_tokens: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Results kept per scope after scoring.
    pub top_k: usize,
    /// Candidate pool fetched per scope before scoring.
    pub candidate_pool: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WindowConfig {
    /// Working-memory capacity in turns.
    pub capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ExternalConfig {
    /// Bounded wait for each embed/generate call, per attempt.
    pub call_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MaintenanceConfig {
    pub enabled: bool,
    /// Run maintenance every N committed turns.
    pub summary_interval: u64,
    /// Summarize once the active world partition exceeds this many facts.
    pub old_threshold: usize,
}

impl Default for ChroniclerConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            storage: StorageConfig::default(),
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
            scoring: ScoringWeights::default(),
            retrieval: RetrievalConfig::default(),
            window: WindowConfig::default(),
            external: ExternalConfig::default(),
            maintenance: MaintenanceConfig::default(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_chronicler_dir()
            .join("chronicle.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "hashed".into(),
            dimensions: 384,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: "improv".into(),
            max_tokens: 600,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            candidate_pool: 100,
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { capacity: 5 }
    }
}

impl Default for ExternalConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: 10_000,
        }
    }
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            summary_interval: 10,
            old_threshold: 50,
        }
    }
}

/// Returns `~/.chronicler/`
pub fn default_chronicler_dir() -> PathBuf {
    dirs::home_dir()
        .expect("home directory must exist")
        .join(".chronicler")
}

/// Returns the default config file path: `~/.chronicler/config.toml`
pub fn default_config_path() -> PathBuf {
    default_chronicler_dir().join("config.toml")
}

impl ChroniclerConfig {
    /// Load config from TOML file (if it exists), apply env var overrides,
    /// and validate.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides and validate.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            ChroniclerConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the scorer and pipeline cannot honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scoring.validate()?;
        if self.retrieval.top_k == 0 {
            return Err(ConfigError::InvalidTopK(self.retrieval.top_k));
        }
        if self.window.capacity == 0 {
            return Err(ConfigError::InvalidWindowCapacity(self.window.capacity));
        }
        if self.maintenance.summary_interval == 0 {
            return Err(ConfigError::InvalidSummaryInterval);
        }
        Ok(())
    }

    /// Apply environment variable overrides (CHRONICLER_DB, CHRONICLER_LOG_LEVEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("CHRONICLER_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("CHRONICLER_LOG_LEVEL") {
            self.session.log_level = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    /// Bounded wait for one external call attempt.
    pub fn call_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.external.call_timeout_ms)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .expect("home directory must exist")
            .join(rest)
    } else {
        PathBuf::from(path)
    }
}
