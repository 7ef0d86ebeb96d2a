use crate::config::Config;
use crate::utils::errors::{GateError, GateResult};
use figment::providers::{Env, Format, Json, Toml, Yaml};
use figment::Figment;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Environment variables with this prefix override file values,
/// `__` separating nested keys (`GATEKEEP_SERVER__PORT=9000`).
pub const ENV_PREFIX: &str = "GATEKEEP_";

/// Supported config file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
    Yaml,
}

impl ConfigFormat {
    /// Detect format from file extension and content
    pub fn detect(path: &Path, content: &str) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => ConfigFormat::Toml,
            Some("json") => ConfigFormat::Json,
            Some("yml") | Some("yaml") => ConfigFormat::Yaml,
            _ => {
                if content.trim_start().starts_with('{') {
                    ConfigFormat::Json
                } else {
                    ConfigFormat::Toml
                }
            }
        }
    }

    /// Detect format from file extension only
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => ConfigFormat::Json,
            Some("yml") | Some("yaml") => ConfigFormat::Yaml,
            _ => ConfigFormat::Toml,
        }
    }
}

/// Loads configuration once; the result is immutable for the life of the process
pub struct ConfigManager {
    path: Option<PathBuf>,
    format: ConfigFormat,
    config: Arc<Config>,
}

impl ConfigManager {
    pub async fn new(path: impl Into<PathBuf>) -> GateResult<Self> {
        let path = path.into();
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| GateError::ConfigError(format!("Failed to read config: {}", e)))?;

        let format = ConfigFormat::detect(&path, &content);
        debug!("Detected config format: {:?}", format);

        let config = Self::parse_content(&content, format)?;
        info!(path = %path.display(), "configuration loaded");

        Ok(Self {
            path: Some(path),
            format,
            config: Arc::new(config),
        })
    }

    /// Defaults plus environment overrides, no file
    pub fn from_env() -> GateResult<Self> {
        let config = Self::extract(Figment::from(figment::providers::Serialized::defaults(
            Config::default(),
        )))?;
        Ok(Self {
            path: None,
            format: ConfigFormat::Toml,
            config: Arc::new(config),
        })
    }

    pub fn parse_content(content: &str, format: ConfigFormat) -> GateResult<Config> {
        let figment = match format {
            ConfigFormat::Toml => Figment::from(Toml::string(content)),
            ConfigFormat::Json => Figment::from(Json::string(content)),
            ConfigFormat::Yaml => Figment::from(Yaml::string(content)),
        };
        Self::extract(figment)
    }

    fn extract(figment: Figment) -> GateResult<Config> {
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| GateError::ConfigError(format!("Failed to parse config: {}", e)))
    }

    pub fn get_config(&self) -> Arc<Config> {
        self.config.clone()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn format(&self) -> ConfigFormat {
        self.format
    }
}
