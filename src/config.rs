use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub bucket: BucketConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub admin_token: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Timing of the per-key attempt counters.
#[derive(Clone, Debug, Deserialize)]
pub struct BucketConfig {
    /// Each increment decays by one after this many seconds.
    #[serde(default = "default_expiry_period")]
    pub expiry_period_secs: u64,
    /// Backstop TTL put on a key when it is first created.
    #[serde(default = "default_safety_ttl")]
    pub safety_ttl_secs: u64,
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Also append plain-text logs to this file.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_expiry_period() -> u64 {
    60
}

fn default_safety_ttl() -> u64 {
    3600
}

fn default_cleanup_interval() -> u64 {
    300
}

fn default_log_filter() -> String {
    "info,anti_bruteforce=debug".to_string()
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            expiry_period_secs: default_expiry_period(),
            safety_ttl_secs: default_safety_ttl(),
            cleanup_interval_secs: default_cleanup_interval(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            file: None,
        }
    }
}

impl BucketConfig {
    pub fn expiry_period(&self) -> Duration {
        Duration::from_secs(self.expiry_period_secs)
    }

    pub fn safety_ttl(&self) -> Duration {
        Duration::from_secs(self.safety_ttl_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs.max(1))
    }
}

impl Config {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config =
            serde_yaml::from_str(content).context("Failed to parse config file")?;
        Ok(config)
    }
}
