//! Configuration loading.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.heimdall/config.toml` (user)
//! 3. `/etc/heimdall/config.toml` (system)
//!
//! Without an explicit path and without either file, built-in defaults
//! apply. The actor API token is never read from the config file; it comes
//! from the `HEIMDALL_ACTOR_TOKEN` environment variable.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::admission::{AdmissionConfig, WaitEstimate};
use crate::cache::CacheConfig;
use crate::{HeimdallError, Result};

/// Environment variable holding the actor API token.
pub const ACTOR_TOKEN_ENV: &str = "HEIMDALL_ACTOR_TOKEN";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub admission: AdmissionSection,
    #[serde(default)]
    pub actor: ActorSection,
    #[serde(default)]
    pub server: ServerSection,
}

/// Result cache settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    /// Entry time-to-live in seconds (default: 3600).
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
    /// Maximum cached entries (default: 10000).
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl(),
            max_entries: default_cache_max_entries(),
        }
    }
}

fn default_cache_ttl() -> u64 {
    3600
}

fn default_cache_max_entries() -> u64 {
    10_000
}

/// How the advisory wait is derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitStrategy {
    #[default]
    Fixed,
    AverageHold,
}

/// Admission controller settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AdmissionSection {
    /// Maximum concurrent slots (default: 32).
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Age in seconds after which a slot is reclaimed (default: 300).
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: u64,
    /// Background sweep period in seconds; 0 disables it (default: 60).
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// Advisory wait in seconds, or the fallback for `average_hold` (default: 30).
    #[serde(default = "default_wait_estimate")]
    pub wait_estimate_secs: u64,
    #[serde(default)]
    pub wait_strategy: WaitStrategy,
}

impl Default for AdmissionSection {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            stale_after_secs: default_stale_after(),
            sweep_interval_secs: default_sweep_interval(),
            wait_estimate_secs: default_wait_estimate(),
            wait_strategy: WaitStrategy::default(),
        }
    }
}

fn default_capacity() -> usize {
    32
}

fn default_stale_after() -> u64 {
    300
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_wait_estimate() -> u64 {
    30
}

/// External actor settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ActorSection {
    /// Hard timeout per external invocation in seconds (default: 120).
    #[serde(default = "default_actor_timeout")]
    pub timeout_secs: u64,
    /// Actor API base URL (default: https://api.apify.com).
    #[serde(default = "default_actor_base_url")]
    pub base_url: String,
}

impl Default for ActorSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_actor_timeout(),
            base_url: default_actor_base_url(),
        }
    }
}

fn default_actor_timeout() -> u64 {
    120
}

fn default_actor_base_url() -> String {
    "https://api.apify.com".to_string()
}

/// Admission daemon network settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    /// Address the daemon binds to and clients connect to (default: 127.0.0.1:9742).
    #[serde(default = "default_address")]
    pub address: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            address: default_address(),
        }
    }
}

fn default_address() -> String {
    "127.0.0.1:9742".to_string()
}

impl Config {
    /// Load and validate configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided; must exist)
    /// 2. `~/.heimdall/config.toml`
    /// 3. `/etc/heimdall/config.toml`
    /// 4. Built-in defaults
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let config = match Self::resolve_config_path(explicit_path)? {
            Some(path) => {
                let content = fs::read_to_string(&path).map_err(|e| {
                    HeimdallError::Configuration(format!(
                        "Failed to read config file {path:?}: {e}"
                    ))
                })?;
                Self::from_toml(&content).map_err(|e| {
                    HeimdallError::Configuration(format!("{path:?}: {e}"))
                })?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string. Does not validate.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            HeimdallError::Configuration(format!("Failed to parse config: {e}"))
        })
    }

    /// Resolve the config file path. `None` means "use defaults".
    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(HeimdallError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".heimdall").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/heimdall/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }

    /// Reject settings the core cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.admission.capacity == 0 {
            return Err(HeimdallError::Configuration(
                "admission.capacity must be at least 1".into(),
            ));
        }
        if self.cache.ttl_secs == 0 {
            return Err(HeimdallError::Configuration(
                "cache.ttl_secs must be greater than zero".into(),
            ));
        }
        if self.actor.timeout_secs == 0 {
            return Err(HeimdallError::Configuration(
                "actor.timeout_secs must be greater than zero".into(),
            ));
        }
        if self.admission.stale_after_secs <= self.actor.timeout_secs {
            return Err(HeimdallError::Configuration(format!(
                "admission.stale_after_secs ({}) must exceed actor.timeout_secs ({})",
                self.admission.stale_after_secs, self.actor.timeout_secs
            )));
        }
        Ok(())
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .max_entries(self.cache.max_entries)
            .ttl(Duration::from_secs(self.cache.ttl_secs))
    }

    pub fn actor_timeout(&self) -> Duration {
        Duration::from_secs(self.actor.timeout_secs)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.admission.stale_after_secs)
    }

    pub fn admission_config(&self) -> AdmissionConfig {
        let estimate = Duration::from_secs(self.admission.wait_estimate_secs);
        let wait = match self.admission.wait_strategy {
            WaitStrategy::Fixed => WaitEstimate::Fixed(estimate),
            WaitStrategy::AverageHold => WaitEstimate::AverageHold { fallback: estimate },
        };
        let mut config = AdmissionConfig::new()
            .capacity(self.admission.capacity)
            .stale_after(self.stale_after())
            .wait_estimate(wait);
        if self.admission.sweep_interval_secs > 0 {
            config = config.sweep_interval(Duration::from_secs(self.admission.sweep_interval_secs));
        }
        config
    }

    /// Actor API token from [`ACTOR_TOKEN_ENV`], if set and non-empty.
    pub fn actor_token() -> Option<String> {
        std::env::var(ACTOR_TOKEN_ENV)
            .ok()
            .filter(|token| !token.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.cache.ttl_secs, 3600);
        assert_eq!(config.admission.capacity, 32);
        assert_eq!(config.admission.stale_after_secs, 300);
        assert_eq!(config.actor.timeout_secs, 120);
        assert_eq!(config.server.address, "127.0.0.1:9742");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_minimal_config() {
        let config = Config::from_toml(
            r#"
            [admission]
            capacity = 8
        "#,
        )
        .unwrap();
        assert_eq!(config.admission.capacity, 8);
        // Defaults preserved
        assert_eq!(config.admission.stale_after_secs, 300);
        assert_eq!(config.cache.max_entries, 10_000);
    }

    #[test]
    fn parse_full_config() {
        let config = Config::from_toml(
            r#"
            [cache]
            ttl_secs = 600
            max_entries = 500

            [admission]
            capacity = 4
            stale_after_secs = 900
            sweep_interval_secs = 0
            wait_estimate_secs = 20
            wait_strategy = "average_hold"

            [actor]
            timeout_secs = 90
            base_url = "http://localhost:8080"

            [server]
            address = "0.0.0.0:9742"
        "#,
        )
        .unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache_config().ttl, Duration::from_secs(600));
        assert_eq!(config.cache_config().max_entries, 500);
        assert_eq!(config.actor_timeout(), Duration::from_secs(90));
        assert_eq!(config.actor.base_url, "http://localhost:8080");

        let admission = config.admission_config();
        assert_eq!(admission.capacity, 4);
        assert_eq!(admission.stale_after, Duration::from_secs(900));
        assert_eq!(admission.sweep_interval, None);
        assert_eq!(
            admission.wait,
            WaitEstimate::AverageHold {
                fallback: Duration::from_secs(20)
            }
        );
    }

    #[test]
    fn rejects_zero_capacity() {
        let config = Config::from_toml("[admission]\ncapacity = 0").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_stale_threshold_within_timeout() {
        let config = Config::from_toml(
            r#"
            [admission]
            stale_after_secs = 60
            [actor]
            timeout_secs = 60
        "#,
        )
        .unwrap();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("stale_after_secs"), "{err}");
    }

    #[test]
    fn rejects_unknown_wait_strategy() {
        assert!(Config::from_toml("[admission]\nwait_strategy = \"fifo\"").is_err());
    }

    #[test]
    fn config_not_found_returns_error() {
        let result = Config::load(Some(Path::new("/nonexistent/config.toml")));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Config file not found"));
    }

    #[test]
    fn load_reads_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[admission]\ncapacity = 3\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.admission.capacity, 3);
    }

    #[test]
    fn load_validates_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[cache]\nttl_secs = 0\n").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }
}
