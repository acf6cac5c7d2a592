use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::store::FilterMode;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct HalseyConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub generation: GenerationConfig,
    pub retrieval: RetrievalConfig,
    pub prompt: PromptConfig,
    pub telegram: TelegramConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
    pub collection: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub cache_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GenerationConfig {
    pub endpoint: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Request timeout in seconds. `None` waits until the server answers.
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub default_top_k: usize,
    pub answer_task_k: usize,
    pub answer_reflection_k: usize,
    pub filter_mode: FilterMode,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PromptConfig {
    pub plan_max_tasks_per_priority: usize,
    pub plan_recent_reflections: usize,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token. Normally supplied through `TELEGRAM_TOKEN` rather than the file.
    pub token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_halsey_dir()
            .join("halsey.db")
            .to_string_lossy()
            .into_owned();
        Self {
            db_path,
            collection: "personal_assistant".into(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let cache_dir = default_halsey_dir()
            .join("models")
            .to_string_lossy()
            .into_owned();
        Self {
            provider: "local".into(),
            model: "all-MiniLM-L6-v2".into(),
            cache_dir,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".into(),
            model: "gemma3:1b".into(),
            max_tokens: 1000,
            temperature: 0.7,
            timeout_secs: None,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: 5,
            answer_task_k: 3,
            answer_reflection_k: 2,
            filter_mode: FilterMode::Combined,
        }
    }
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            plan_max_tasks_per_priority: 10,
            plan_recent_reflections: 3,
        }
    }
}

/// Returns `~/.halsey/`
pub fn default_halsey_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".halsey")
}

/// Returns the default config file path: `~/.halsey/config.toml`
pub fn default_config_path() -> PathBuf {
    default_halsey_dir().join("config.toml")
}

impl HalseyConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            HalseyConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (TELEGRAM_TOKEN, HALSEY_DB,
    /// HALSEY_LOG_LEVEL, HALSEY_OLLAMA_URL, HALSEY_OLLAMA_MODEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("TELEGRAM_TOKEN") {
            self.telegram.token = Some(val);
        }
        if let Ok(val) = std::env::var("HALSEY_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("HALSEY_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("HALSEY_OLLAMA_URL") {
            self.generation.endpoint = val;
        }
        if let Ok(val) = std::env::var("HALSEY_OLLAMA_MODEL") {
            self.generation.model = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    /// The Telegram token, treating an empty string as unset.
    pub fn telegram_token(&self) -> Option<&str> {
        self.telegram
            .token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
