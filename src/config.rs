use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default request timeout for the section API
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// Section API configuration
#[derive(Debug, Clone, Serialize)]
pub struct ApiConfig {
    /// Base URL of the course API (e.g., "https://api.example.com/v1")
    pub base_url: Option<String>,
    /// Bearer token sent with every request
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ApiConfig {
    /// Returns true if a base URL is set
    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    /// API key with all but the last four characters hidden
    pub fn masked_api_key(&self) -> Option<String> {
        self.api_key.as_ref().map(|key| {
            let visible: String = key
                .chars()
                .rev()
                .take(4)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            if key.chars().count() <= 4 {
                "****".to_string()
            } else {
                format!("****{}", visible)
            }
        })
    }
}

/// Where each `api` value came from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiSources {
    pub base_url: ConfigSource,
    pub api_key: ConfigSource,
    pub timeout_secs: ConfigSource,
}

impl Default for ApiSources {
    fn default() -> Self {
        Self {
            base_url: ConfigSource::Default,
            api_key: ConfigSource::Default,
            timeout_secs: ConfigSource::Default,
        }
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Path to the SQLite draft database
    pub database_path: ConfigValue<PathBuf>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
    /// Section API configuration
    pub api: ApiConfig,
    pub api_sources: ApiSources,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    database_path: Option<PathBuf>,
    api: Option<ApiFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ApiFile {
    base_url: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let default_db_path = Self::default_data_dir().join("drafts.db");

        // Start with defaults
        let mut database_path = ConfigValue::new(default_db_path, ConfigSource::Default);
        let mut config_file = None;
        let mut api = ApiConfig::default();
        let mut api_sources = ApiSources::default();

        // Try to load from config file
        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(db_path) = file_config.database_path {
                // Resolve relative paths against config file's directory
                let resolved_path = if db_path.is_relative() {
                    path.parent().map(|p| p.join(&db_path)).unwrap_or(db_path)
                } else {
                    db_path
                };
                database_path = ConfigValue::new(resolved_path, ConfigSource::File);
            }
            if let Some(api_file) = file_config.api {
                if let Some(url) = api_file.base_url {
                    api.base_url = Some(url);
                    api_sources.base_url = ConfigSource::File;
                }
                if let Some(key) = api_file.api_key {
                    api.api_key = Some(key);
                    api_sources.api_key = ConfigSource::File;
                }
                if let Some(timeout) = api_file.timeout_secs {
                    api.timeout_secs = timeout;
                    api_sources.timeout_secs = ConfigSource::File;
                }
            }
        }

        // Apply environment variable overrides
        if let Ok(db_path) = std::env::var("COURSEDECK_DATABASE_PATH") {
            database_path = ConfigValue::new(PathBuf::from(db_path), ConfigSource::Environment);
        }
        if let Ok(url) = std::env::var("COURSEDECK_API_URL") {
            api.base_url = Some(url);
            api_sources.base_url = ConfigSource::Environment;
        }
        if let Ok(key) = std::env::var("COURSEDECK_API_KEY") {
            api.api_key = Some(key);
            api_sources.api_key = ConfigSource::Environment;
        }
        if let Ok(timeout) = std::env::var("COURSEDECK_API_TIMEOUT") {
            api.timeout_secs = timeout
                .parse()
                .map_err(|_| ConfigError::InvalidEnv("COURSEDECK_API_TIMEOUT", timeout))?;
            api_sources.timeout_secs = ConfigSource::Environment;
        }

        Ok(Self {
            database_path,
            config_file,
            api,
            api_sources,
        })
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/coursedeck/
    /// - macOS: ~/Library/Application Support/coursedeck/
    /// - Windows: %APPDATA%/coursedeck/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("coursedeck")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/coursedeck/
    /// - macOS: ~/Library/Application Support/coursedeck/
    /// - Windows: %APPDATA%/coursedeck/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("coursedeck")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    InvalidEnv(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::InvalidEnv(name, value) => {
                write!(f, "Invalid value for {}: '{}'", name, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
