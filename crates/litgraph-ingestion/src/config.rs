//! Configuration loading for litgraph.
//! Reads litgraph.toml from the current directory or the path in the
//! LITGRAPH_CONFIG env var; a missing file means defaults. Credentials are
//! resolved from the environment once, in main, and threaded through
//! constructors; components never read the environment themselves.

use std::path::{Path, PathBuf};

use litgraph_common::LitgraphError;
use serde::{Deserialize, Serialize};

use crate::pipeline::TxScope;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub ingestion: IngestionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection string; falls back to the DATABASE_URL env var when unset.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: None, max_connections: default_max_connections() }
    }
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_model")]
    pub model: String,
    /// When set, requests go to `{base_url}/v1/chat/completions` instead of
    /// the OpenAI API (LMStudio, vLLM, OpenRouter, …).
    #[serde(default)]
    pub base_url: Option<String>,
    /// Name of the env var holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: None,
            api_key_env: default_api_key_env(),
        }
    }
}

fn default_model()       -> String { "gpt-4o-mini".to_string() }
fn default_api_key_env() -> String { "LITGRAPH_OPENAI_API_KEY".to_string() }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub tx_scope: TxScope,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            max_pages: default_max_pages(),
            batch_size: default_batch_size(),
            tx_scope: TxScope::default(),
        }
    }
}

fn default_input_dir()  -> PathBuf { PathBuf::from("data/raw") }
fn default_max_pages()  -> usize   { crate::pdf::DEFAULT_MAX_PAGES }
fn default_batch_size() -> usize   { 10 }

impl Config {
    /// Load configuration from litgraph.toml.
    /// Checks LITGRAPH_CONFIG first, then the current directory; a missing
    /// file yields the defaults.
    pub fn load() -> Result<Self, LitgraphError> {
        let path = std::env::var("LITGRAPH_CONFIG")
            .unwrap_or_else(|_| "litgraph.toml".to_string());
        Self::load_from(Path::new(&path))
    }

    pub fn load_from(path: &Path) -> Result<Self, LitgraphError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| LitgraphError::Config(format!("{}: {e}", path.display())))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| LitgraphError::Config(format!("{}: {e}", path.display())))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_is_all_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.ingestion.batch_size, 10);
        assert_eq!(config.ingestion.max_pages, 10);
        assert_eq!(config.ingestion.tx_scope, TxScope::PerPaper);
    }

    #[test]
    fn test_partial_config_overrides() {
        let config: Config = toml::from_str(
            r#"
            [llm]
            model = "local-model"
            base_url = "http://localhost:1234"

            [ingestion]
            input_dir = "papers"
            tx_scope = "per_batch"
            "#,
        )
        .unwrap();
        assert_eq!(config.llm.model, "local-model");
        assert_eq!(config.llm.base_url.as_deref(), Some("http://localhost:1234"));
        assert_eq!(config.ingestion.input_dir, PathBuf::from("papers"));
        assert_eq!(config.ingestion.tx_scope, TxScope::PerBatch);
        // untouched sections keep their defaults
        assert_eq!(config.database.max_connections, 5);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = Config::load_from(Path::new("/nonexistent/litgraph.toml")).unwrap();
        assert_eq!(config.ingestion.batch_size, 10);
    }
}
