//! Runtime configuration.
//!
//! Values are resolved in three layers: built-in defaults, an optional
//! `config.toml` next to the binary, then environment variables. A `.env`
//! file is honored so the Anthropic key can live outside the shell profile.

use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::core::errors::ApiError;

const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text-v1.5";
const DEFAULT_EMBEDDING_BASE_URL: &str = "http://127.0.0.1:1234";

#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub anthropic_model: String,
    pub embedding_base_url: String,
    pub embedding_model: String,
    /// Maximum characters per content chunk.
    pub chunk_size: usize,
    /// Characters of trailing context carried into the next chunk.
    pub chunk_overlap: usize,
    /// Maximum search results returned by the vector store.
    pub max_results: usize,
    /// Conversation exchanges kept in prompt context.
    pub max_history: usize,
    pub data_dir: PathBuf,
    pub docs_dir: PathBuf,
    pub log_dir: PathBuf,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            anthropic_api_key: String::new(),
            anthropic_model: DEFAULT_ANTHROPIC_MODEL.to_string(),
            embedding_base_url: DEFAULT_EMBEDDING_BASE_URL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            chunk_size: 800,
            chunk_overlap: 100,
            max_results: 5,
            max_history: 2,
            data_dir: PathBuf::from("./data"),
            docs_dir: PathBuf::from("./docs"),
            log_dir: PathBuf::from("./logs"),
            port: 8000,
            cors_allowed_origins: default_local_origins(),
        }
    }
}

/// Optional overrides read from `config.toml`. Every field is optional so a
/// partial file only touches what it names.
#[derive(Debug, Default, Deserialize)]
struct FileOverrides {
    anthropic_model: Option<String>,
    embedding_base_url: Option<String>,
    embedding_model: Option<String>,
    chunk_size: Option<usize>,
    chunk_overlap: Option<usize>,
    max_results: Option<usize>,
    max_history: Option<usize>,
    data_dir: Option<PathBuf>,
    docs_dir: Option<PathBuf>,
    log_dir: Option<PathBuf>,
    port: Option<u16>,
    cors_allowed_origins: Option<Vec<String>>,
}

impl Config {
    pub fn load() -> Result<Self, ApiError> {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();
        config.apply_file(Path::new("config.toml"))?;
        config.apply_env();

        if config.chunk_overlap >= config.chunk_size {
            return Err(ApiError::BadRequest(
                "chunk_overlap must be smaller than chunk_size".to_string(),
            ));
        }

        Ok(config)
    }

    fn apply_file(&mut self, path: &Path) -> Result<(), ApiError> {
        if !path.exists() {
            return Ok(());
        }

        let raw = std::fs::read_to_string(path).map_err(ApiError::internal)?;
        let overrides: FileOverrides = toml::from_str(&raw)
            .map_err(|e| ApiError::BadRequest(format!("invalid config.toml: {}", e)))?;

        if let Some(v) = overrides.anthropic_model {
            self.anthropic_model = v;
        }
        if let Some(v) = overrides.embedding_base_url {
            self.embedding_base_url = v;
        }
        if let Some(v) = overrides.embedding_model {
            self.embedding_model = v;
        }
        if let Some(v) = overrides.chunk_size {
            self.chunk_size = v;
        }
        if let Some(v) = overrides.chunk_overlap {
            self.chunk_overlap = v;
        }
        if let Some(v) = overrides.max_results {
            self.max_results = v;
        }
        if let Some(v) = overrides.max_history {
            self.max_history = v;
        }
        if let Some(v) = overrides.data_dir {
            self.data_dir = v;
        }
        if let Some(v) = overrides.docs_dir {
            self.docs_dir = v;
        }
        if let Some(v) = overrides.log_dir {
            self.log_dir = v;
        }
        if let Some(v) = overrides.port {
            self.port = v;
        }
        if let Some(v) = overrides.cors_allowed_origins {
            self.cors_allowed_origins = v;
        }

        Ok(())
    }

    fn apply_env(&mut self) {
        if let Ok(v) = env::var("ANTHROPIC_API_KEY") {
            self.anthropic_api_key = v;
        }
        if let Ok(v) = env::var("ANTHROPIC_MODEL") {
            self.anthropic_model = v;
        }
        if let Ok(v) = env::var("EMBEDDING_BASE_URL") {
            self.embedding_base_url = v;
        }
        if let Ok(v) = env::var("EMBEDDING_MODEL") {
            self.embedding_model = v;
        }
        if let Some(v) = env_parse::<usize>("CHUNK_SIZE") {
            self.chunk_size = v;
        }
        if let Some(v) = env_parse::<usize>("CHUNK_OVERLAP") {
            self.chunk_overlap = v;
        }
        if let Some(v) = env_parse::<usize>("MAX_RESULTS") {
            self.max_results = v;
        }
        if let Some(v) = env_parse::<usize>("MAX_HISTORY") {
            self.max_history = v;
        }
        if let Ok(v) = env::var("DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = env::var("DOCS_DIR") {
            self.docs_dir = PathBuf::from(v);
        }
        if let Ok(v) = env::var("LOG_DIR") {
            self.log_dir = PathBuf::from(v);
        }
        if let Some(v) = env_parse::<u16>("PORT") {
            self.port = v;
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

fn default_local_origins() -> Vec<String> {
    vec![
        "http://localhost".to_string(),
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
        "http://127.0.0.1".to_string(),
        "http://127.0.0.1:3000".to_string(),
        "http://127.0.0.1:5173".to_string(),
        "http://127.0.0.1:8000".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.max_results, 5);
        assert_eq!(config.max_history, 2);
        assert!(config.chunk_overlap < config.chunk_size);
    }

    #[test]
    fn file_overrides_only_touch_named_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "max_results = 10\nchunk_size = 400\n").unwrap();

        let mut config = Config::default();
        config.apply_file(&path).unwrap();

        assert_eq!(config.max_results, 10);
        assert_eq!(config.chunk_size, 400);
        assert_eq!(config.max_history, 2);
    }

    #[test]
    fn rejects_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "max_results = \"many\"").unwrap();

        let mut config = Config::default();
        assert!(config.apply_file(&path).is_err());
    }
}
