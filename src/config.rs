use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::common::constants::{
    DEFAULT_DATABASE_PATH, DEFAULT_LOG_DIR, DEFAULT_MAX_NUMBER_ATTEMPTS, DEFAULT_PORT,
    DEFAULT_REGISTRY_TIMEOUT_SECS, DEFAULT_REGISTRY_URL,
};
use crate::common::error::{Result, RevizeError};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub numbering: NumberingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the registry listing comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryMode {
    #[default]
    Live,
    /// Read a saved copy of the listing from disk instead of the network.
    Snapshot,
}

/// How the listing page is searched for a holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    #[default]
    FullText,
    Table,
}

impl FromStr for RegistryMode {
    type Err = RevizeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "live" => Ok(RegistryMode::Live),
            "snapshot" => Ok(RegistryMode::Snapshot),
            other => Err(RevizeError::Config(format!("unknown registry mode '{}'", other))),
        }
    }
}

impl FromStr for MatchStrategy {
    type Err = RevizeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "full_text" | "fulltext" | "text" => Ok(MatchStrategy::FullText),
            "table" | "tabular" => Ok(MatchStrategy::Table),
            other => Err(RevizeError::Config(format!("unknown match strategy '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub url: String,
    pub timeout_seconds: u64,
    pub mode: RegistryMode,
    pub snapshot_path: Option<PathBuf>,
    pub strategy: MatchStrategy,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REGISTRY_URL.to_string(),
            timeout_seconds: DEFAULT_REGISTRY_TIMEOUT_SECS,
            mode: RegistryMode::Live,
            snapshot_path: None,
            strategy: MatchStrategy::FullText,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: DEFAULT_PORT }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NumberingConfig {
    pub max_attempts: u32,
}

impl Default for NumberingConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_NUMBER_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(DEFAULT_LOG_DIR),
        }
    }
}

impl Config {
    /// Load the TOML file named by `REVIZE_CONFIG` (or `config.toml` when present),
    /// then apply environment overrides.
    pub fn load() -> Result<Self> {
        let explicit = std::env::var("REVIZE_CONFIG").ok();
        let config_path = explicit.clone().unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

        let mut config = if Path::new(&config_path).exists() {
            Self::from_file(&config_path)?
        } else if let Some(path) = explicit {
            return Err(RevizeError::Config(format!("Config file '{}' does not exist", path)));
        } else {
            Config::default()
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config_content = fs::read_to_string(path).map_err(|e| {
            RevizeError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&config_content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Overlay values from a variable lookup (the process environment in production).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("REVIZE_REGISTRY_URL") {
            self.registry.url = url;
        }
        if let Some(raw) = lookup("REVIZE_REGISTRY_TIMEOUT_SECS") {
            self.registry.timeout_seconds = parse_number("REVIZE_REGISTRY_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = lookup("REVIZE_REGISTRY_MODE") {
            self.registry.mode = raw.parse()?;
        }
        if let Some(path) = lookup("REVIZE_REGISTRY_SNAPSHOT") {
            self.registry.snapshot_path = Some(PathBuf::from(path));
        }
        if let Some(raw) = lookup("REVIZE_REGISTRY_STRATEGY") {
            self.registry.strategy = raw.parse()?;
        }
        if let Some(path) = lookup("REVIZE_DB_PATH") {
            self.storage.database_path = PathBuf::from(path);
        }
        if let Some(dir) = lookup("REVIZE_LOG_DIR") {
            self.logging.directory = PathBuf::from(dir);
        }
        if let Some(raw) = lookup("PORT") {
            self.server.port = parse_number("PORT", &raw)?;
        }
        if let Some(raw) = lookup("REVIZE_NUMBER_ATTEMPTS") {
            self.numbering.max_attempts = parse_number("REVIZE_NUMBER_ATTEMPTS", &raw)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.registry.timeout_seconds == 0 {
            return Err(RevizeError::Config("registry timeout must be positive".into()));
        }
        if self.registry.mode == RegistryMode::Snapshot && self.registry.snapshot_path.is_none() {
            return Err(RevizeError::Config(
                "registry mode 'snapshot' requires a snapshot_path".into(),
            ));
        }
        if self.numbering.max_attempts == 0 {
            return Err(RevizeError::Config("numbering.max_attempts must be at least 1".into()));
        }
        Ok(())
    }
}

fn parse_number<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| RevizeError::Config(format!("{} must be a number, got '{}'", key, raw)))
}
