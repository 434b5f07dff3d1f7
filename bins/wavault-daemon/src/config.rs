use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Clone, Debug, Deserialize)]
pub struct WavaultConfig {
    pub data_dir: PathBuf,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_halt_when_logged_out")]
    pub halt_when_logged_out: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: default_reconnect_delay_ms(),
            halt_when_logged_out: default_halt_when_logged_out(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_enabled")]
    pub enabled: bool,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: default_http_enabled(),
            port: default_port(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

impl WavaultConfig {
    pub fn auth_dir(&self) -> PathBuf {
        self.data_dir.join("auth_info")
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.data_dir.join("saved")
    }

    pub fn pairing_file(&self) -> PathBuf {
        self.data_dir.join("qr.txt")
    }
}

fn default_reconnect_delay_ms() -> u64 {
    2000
}

fn default_halt_when_logged_out() -> bool {
    true
}

fn default_http_enabled() -> bool {
    true
}

fn default_port() -> u16 {
    10000
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io")]
    Io,
    #[error("parse")]
    Parse,
}

pub fn load_config(path: &Path) -> Result<WavaultConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|_| ConfigError::Io)?;
    toml::from_str(&content).map_err(|_| ConfigError::Parse)
}
