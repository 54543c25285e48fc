use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::classifier::bert::DEFAULT_MODEL_ID;

/// Environment variable that overrides `server.port`.
pub const PORT_ENV: &str = "URL_RISK_PORT";

/// Root configuration structure, deserialized from `.url-risk/config.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub text: TextConfig,
    pub logging: LoggingConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origins allowed by CORS. Empty means any origin.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 5000,
            allowed_origins: Vec::new(),
        }
    }
}

/// Structural model persistence and training parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Where the trained model artifact is read from and written to.
    pub path: PathBuf,
    pub n_estimators: usize,
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            path: PathBuf::from("rf_model.json"),
            n_estimators: 10,
            seed: 42,
        }
    }
}

/// Text classifier settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TextConfig {
    /// When false the text score is always neutral.
    pub enabled: bool,
    /// Text is truncated to this many characters before classification.
    pub max_chars: usize,
    /// Try the pretrained BERT classifier before the lexicon.
    pub transformer: bool,
    /// Hugging Face model id looked up in the local HF cache.
    pub model_id: String,
    /// Local model snapshot; takes precedence over the HF cache.
    pub model_dir: Option<PathBuf>,
    /// Optional lexicon TOML replacing the built-in one.
    pub lexicon: Option<PathBuf>,
}

impl Default for TextConfig {
    fn default() -> Self {
        TextConfig {
            enabled: true,
            max_chars: 512,
            transformer: true,
            model_id: DEFAULT_MODEL_ID.to_string(),
            model_dir: None,
            lexicon: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Reject settings no model could be built from.
    pub fn validate(&self) -> Result<()> {
        if self.model.n_estimators == 0 {
            anyhow::bail!("model.n_estimators must be at least 1");
        }
        if self.text.max_chars == 0 {
            anyhow::bail!("text.max_chars must be at least 1");
        }
        Ok(())
    }
}

/// Load the configuration, searching in order:
///
/// 1. `config_override`: path passed via `--config`
/// 2. `<base_dir>/.url-risk/config.toml`
/// 3. `~/.config/url-risk/config.toml`
/// 4. Built-in [`Config::default`]
///
/// `URL_RISK_PORT`, when set to a valid port, overrides `server.port`.
pub fn load_config(base_dir: &Path, config_override: Option<&Path>) -> Result<Config> {
    let mut config = find_config(base_dir, config_override)?;

    if let Some(port) = std::env::var(PORT_ENV)
        .ok()
        .and_then(|v| v.parse::<u16>().ok())
    {
        config.server.port = port;
    }

    config.validate()?;
    Ok(config)
}

fn find_config(base_dir: &Path, config_override: Option<&Path>) -> Result<Config> {
    if let Some(path) = config_override {
        return read_config(path);
    }

    let project_config = base_dir.join(".url-risk").join("config.toml");
    if project_config.exists() {
        return read_config(&project_config);
    }

    if let Some(home) = dirs::home_dir() {
        let home_config = home.join(".config").join("url-risk").join("config.toml");
        if home_config.exists() {
            return read_config(&home_config);
        }
    }

    Ok(Config::default())
}

fn read_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("parsing config {}", path.display()))
}
