use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::events::ConfigError;
use crate::retry::RetryPolicy;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per transfer (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff.
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 1.0,
            max_delay_secs: 30,
        }
    }
}

/// Global configuration loaded from `~/.config/dlhost/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Worker pool size: maximum jobs downloading at once.
    pub max_workers: usize,
    /// Directory downloads are stored in (default: current directory).
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
    /// Optional retry policy; built-in defaults when missing.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    /// Seconds before an unanswered captcha task times out.
    pub captcha_timeout_secs: u64,
    /// Default interval for addon periodical tasks that don't declare one.
    pub periodical_interval_secs: u64,
    /// Optional script run by the reconnect command.
    #[serde(default)]
    pub reconnect_script: Option<PathBuf>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            max_workers: 3,
            download_dir: None,
            retry: None,
            captcha_timeout_secs: 120,
            periodical_interval_secs: 60,
            reconnect_script: None,
        }
    }
}

impl HostConfig {
    /// Effective retry policy (config section or defaults).
    pub fn retry_policy(&self) -> RetryPolicy {
        match &self.retry {
            Some(r) => RetryPolicy {
                max_attempts: r.max_attempts.max(1),
                base_delay: Duration::from_secs_f64(r.base_delay_secs.max(0.0)),
                max_delay: Duration::from_secs(r.max_delay_secs),
            },
            None => RetryPolicy::default(),
        }
    }

    pub fn captcha_timeout(&self) -> Duration {
        Duration::from_secs(self.captcha_timeout_secs)
    }

    /// Apply a runtime update for one of the mutable keys. Used by the remote
    /// backend's set_config command; unknown keys and unparsable values fail.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let bad = |reason: &str| ConfigError::BadValue {
            key: key.to_string(),
            reason: reason.to_string(),
        };
        match key {
            "max_workers" => {
                self.max_workers = value
                    .parse::<usize>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| bad("expected a positive integer"))?;
            }
            "captcha_timeout_secs" => {
                self.captcha_timeout_secs =
                    value.parse().map_err(|_| bad("expected an integer"))?;
            }
            "periodical_interval_secs" => {
                self.periodical_interval_secs =
                    value.parse().map_err(|_| bad("expected an integer"))?;
            }
            "download_dir" => {
                self.download_dir = Some(PathBuf::from(value));
            }
            _ => return Err(bad("unknown config key")),
        }
        Ok(())
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("dlhost")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<HostConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = HostConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: HostConfig = toml::from_str(&data)?;
    Ok(cfg)
}

/// Persist the configuration (used after remote set_config).
pub fn save(cfg: &HostConfig) -> Result<()> {
    let path = config_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, toml::to_string_pretty(cfg)?)?;
    Ok(())
}
