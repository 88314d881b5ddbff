//! Server configuration
//!
//! Values come from, in increasing precedence: built-in defaults, a TOML
//! file, `STUDYDECK_*` environment variables and command-line flags (applied
//! by the binary).

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const APP_DIR: &str = "studydeck";
const ENV_PREFIX: &str = "STUDYDECK_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid value for {key}: {value}")]
    InvalidEnv { key: String, value: String },

    #[error("Invalid bind address: {0}")]
    InvalidAddress(String),
}

/// Admin account created at startup when no admin exists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapAdmin {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub database_path: PathBuf,
    /// Random per process when unset, which invalidates tokens on restart
    pub jwt_secret: Option<String>,
    pub token_ttl_hours: u32,
    /// Allowed CORS origins; empty allows any origin
    pub cors_origins: Vec<String>,
    pub max_image_bytes: u64,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8080,
            database_path: default_database_path(),
            jwt_secret: None,
            token_ttl_hours: 24,
            cors_origins: Vec::new(),
            max_image_bytes: 5 * 1024 * 1024,
            bootstrap_admin: None,
        }
    }
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("config.toml")
}

pub fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("studydeck.db")
}

impl ServerConfig {
    /// Load the TOML file at `path` (or the default location) and apply the
    /// environment. A missing file at the default location is not an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let explicit = path.is_some();
        let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);

        let mut config = if path.exists() || explicit {
            Self::from_file(&path)?
        } else {
            log::debug!("No config file at {}, using defaults", path.display());
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Override fields from `STUDYDECK_*` variables looked up through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        let get = |name: &str| {
            let key = format!("{}{}", ENV_PREFIX, name);
            lookup(&key).map(|value| (key, value))
        };

        if let Some((_, v)) = get("BIND_ADDRESS") {
            self.bind_address = v;
        }
        if let Some((key, v)) = get("PORT") {
            self.port = v.parse().map_err(|_| ConfigError::InvalidEnv { key, value: v })?;
        }
        if let Some((_, v)) = get("DATABASE_PATH") {
            self.database_path = PathBuf::from(v);
        }
        if let Some((_, v)) = get("JWT_SECRET") {
            self.jwt_secret = Some(v);
        }
        if let Some((key, v)) = get("TOKEN_TTL_HOURS") {
            self.token_ttl_hours = v.parse().map_err(|_| ConfigError::InvalidEnv { key, value: v })?;
        }
        if let Some((_, v)) = get("CORS_ORIGINS") {
            self.cors_origins = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some((key, v)) = get("MAX_IMAGE_BYTES") {
            self.max_image_bytes = v.parse().map_err(|_| ConfigError::InvalidEnv { key, value: v })?;
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(format!("{}:{}", self.bind_address, self.port)))
    }

    /// The configured signing secret, or a random one with a warning.
    pub fn signing_secret(&self) -> Vec<u8> {
        match &self.jwt_secret {
            Some(secret) if !secret.is_empty() => secret.as_bytes().to_vec(),
            _ => {
                log::warn!("No jwt_secret configured; using a random secret, tokens will not survive a restart");
                let mut secret = vec![0u8; 32];
                rand::thread_rng().fill_bytes(&mut secret);
                secret
            }
        }
    }
}
