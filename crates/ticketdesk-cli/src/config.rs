use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use ticketdesk_client_core::auth::{
    AuthInputError, DEFAULT_API_BASE_URL, ENV_API_BASE_URL, normalize_base_url,
};

const APP_DIR: &str = "ticketdesk";
const CONFIG_FILE_NAME: &str = "config.toml";
const SESSION_FILE_NAME: &str = "session.json";
const DEFAULT_TIMEOUT_MS: u64 = ticketdesk_api_client::DEFAULT_TIMEOUT_MS;
const DEFAULT_LOG_FILTER: &str = "info";

const ENV_SESSION_FILE: &str = "TICKETDESK_SESSION_FILE";
const ENV_TIMEOUT_MS: &str = "TICKETDESK_TIMEOUT_MS";
const ENV_LOG_FILTER: &str = "TICKETDESK_LOG_FILTER";

/// Optional settings file; every key may be omitted.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    api_base_url: Option<String>,
    session_file: Option<PathBuf>,
    timeout_ms: Option<u64>,
    log_filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliConfig {
    pub api_base_url: String,
    pub session_file: PathBuf,
    pub timeout_ms: u64,
    pub log_filter: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid api base url '{value}': {source}")]
    BaseUrl {
        value: String,
        source: AuthInputError,
    },
    #[error("invalid {key} value '{value}'")]
    InvalidNumber { key: &'static str, value: String },
    #[error("no config directory on this system; set TICKETDESK_SESSION_FILE or session_file")]
    NoConfigDir,
}

impl CliConfig {
    /// Settings from the environment, then the config file (`explicit_path`
    /// or the per-user default), then built-in defaults.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match explicit_path {
            Some(path) => read_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => read_file(&path)?,
                _ => FileConfig::default(),
            },
        };
        Self::resolve(file, |key| env::var(key).ok(), dirs::config_dir())
    }

    fn resolve(
        file: FileConfig,
        env_lookup: impl Fn(&str) -> Option<String>,
        config_dir: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let lookup = |key: &str| {
            env_lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let raw_base_url = lookup(ENV_API_BASE_URL)
            .or(file.api_base_url)
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let api_base_url =
            normalize_base_url(&raw_base_url).map_err(|source| ConfigError::BaseUrl {
                value: raw_base_url.clone(),
                source,
            })?;

        let session_file = match lookup(ENV_SESSION_FILE)
            .map(PathBuf::from)
            .or(file.session_file)
        {
            Some(path) => path,
            None => config_dir
                .map(|dir| dir.join(APP_DIR).join(SESSION_FILE_NAME))
                .ok_or(ConfigError::NoConfigDir)?,
        };

        let timeout_ms = match lookup(ENV_TIMEOUT_MS) {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidNumber {
                key: ENV_TIMEOUT_MS,
                value: raw,
            })?,
            None => file.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS),
        };

        let log_filter = lookup(ENV_LOG_FILTER)
            .or(file.log_filter)
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Ok(Self {
            api_base_url,
            session_file,
            timeout_ms,
            log_filter,
        })
    }
}

#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE_NAME))
}

fn read_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
