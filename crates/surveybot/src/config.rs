//! Configuration file support for surveybot.
//!
//! Loads `surveybot.toml`. Every section and key is optional; the API key is
//! only ever read from `OPENAI_API_KEY`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use surveybot_completion::{CompletionOptions, OpenAiClient, OpenAiConfig};
use surveybot_db::Database;
use surveybot_documents::{FileSource, HttpSource, RoutingSource};
use surveybot_logging::LogFormat;

/// The config file name
pub const CONFIG_FILE_NAME: &str = "surveybot.toml";

/// Top-level configuration loaded from `surveybot.toml`
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    pub server: ServerConfig,
    pub completion: CompletionConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub documents: DocumentsConfig,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins; empty means permissive
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CompletionConfig {
    pub model: String,
    /// OpenAI-compatible endpoint; defaults to api.openai.com
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        let options = CompletionOptions::default();
        Self {
            model: "gpt-4o".to_string(),
            base_url: None,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            timeout: Duration::from_secs(60),
            max_retries: 2,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields, default)]
pub struct DatabaseConfig {
    /// SQLite file; defaults to the platform data directory
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    /// Directory for a daily-rotated JSON log file
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            dir: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DocumentsConfig {
    /// Base directory for document references that are not URLs
    pub root: PathBuf,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Returns:
    /// - `Ok(Some(config))` if file exists and parses successfully
    /// - `Ok(None)` if file does not exist
    /// - `Err(...)` if file exists but fails to parse (hard error)
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        Ok(Some(config))
    }

    pub fn load_or_default(path: &Path) -> Result<Self> {
        Ok(Self::load(path)?.unwrap_or_default())
    }

    pub fn completion_options(&self) -> CompletionOptions {
        CompletionOptions::default()
            .with_temperature(self.completion.temperature)
            .with_max_tokens(self.completion.max_tokens)
    }

    /// Build the completion client, reading the API key from the environment.
    pub fn completion_client(&self) -> Result<OpenAiClient> {
        let mut config = OpenAiConfig::from_env()?
            .with_model(self.completion.model.as_str())
            .with_timeout(self.completion.timeout)
            .with_max_retries(self.completion.max_retries);
        if let Some(ref base_url) = self.completion.base_url {
            config = config.with_base_url(base_url.as_str());
        }
        Ok(OpenAiClient::new(config)?)
    }

    pub fn database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(Database::default_path)
    }

    /// Document source serving URLs over HTTP and everything else from `documents.root`
    pub fn document_source(&self) -> Result<RoutingSource> {
        let remote = HttpSource::new(self.documents.timeout)?;
        let local = FileSource::new(self.documents.root.clone());
        Ok(RoutingSource::new(Box::new(remote), Box::new(local)))
    }
}
