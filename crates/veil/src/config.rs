use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use veil_guard::{CapacityPolicy, EscalationPolicy};
use zeroize::Zeroizing;

use crate::error::{VeilError, VeilResult};

/// Tuning of the resolution engine and its stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum accepted request age in milliseconds.
    #[serde(default = "default_max_age_ms")]
    pub max_age_ms: u64,

    /// Seal failures tolerated (as Mirror) before a caller is shown Shadow.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    #[serde(default = "default_window_ms")]
    pub failure_window_ms: u64,

    /// How long a consumed nonce is remembered.
    #[serde(default = "default_window_ms")]
    pub nonce_ttl_ms: u64,

    #[serde(default = "default_capacity")]
    pub nonce_capacity: usize,

    #[serde(default = "default_capacity")]
    pub failure_capacity: usize,

    #[serde(default)]
    pub capacity_policy: CapacityPolicy,

    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_max_age_ms() -> u64 {
    300_000
}

fn default_failure_threshold() -> u32 {
    10
}

fn default_window_ms() -> u64 {
    3_600_000
}

fn default_capacity() -> usize {
    100_000
}

fn default_sweep_interval_secs() -> u64 {
    60
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_age_ms: default_max_age_ms(),
            failure_threshold: default_failure_threshold(),
            failure_window_ms: default_window_ms(),
            nonce_ttl_ms: default_window_ms(),
            nonce_capacity: default_capacity(),
            failure_capacity: default_capacity(),
            capacity_policy: CapacityPolicy::default(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl EngineConfig {
    pub fn escalation_policy(&self) -> EscalationPolicy {
        EscalationPolicy {
            threshold: self.failure_threshold,
            window_ms: self.failure_window_ms,
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// HTTP adapter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Lower bound of the artificial delay added to Shadow responses.
    #[serde(default = "default_jitter_min_ms")]
    pub jitter_min_ms: u64,

    #[serde(default = "default_jitter_max_ms")]
    pub jitter_max_ms: u64,
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_jitter_min_ms() -> u64 {
    20
}

fn default_jitter_max_ms() -> u64 {
    60
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            jitter_min_ms: default_jitter_min_ms(),
            jitter_max_ms: default_jitter_max_ms(),
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

/// Top-level configuration for the Veil binary.
///
/// Loaded from a TOML file (typically `~/.veil/config.toml`). The shared
/// secret is never stored here; only the name of the environment variable
/// holding it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VeilConfig {
    #[serde(default = "default_secret_env")]
    pub secret_env: String,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

fn default_secret_env() -> String {
    "VEIL_SECRET".to_string()
}

/// Returns `$HOME/<suffix>` if HOME is available, otherwise `./<suffix>`.
fn dirs_or_default(suffix: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(suffix))
        .unwrap_or_else(|_| PathBuf::from(suffix))
}

impl Default for VeilConfig {
    fn default() -> Self {
        Self {
            secret_env: default_secret_env(),
            engine: EngineConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl VeilConfig {
    /// Load configuration from a TOML file. If the file does not exist,
    /// returns a default configuration.
    pub fn load(path: &Path) -> VeilResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(VeilError::Io)?;
        let config: VeilConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> VeilResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| VeilError::Config(format!("TOML serialize error: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(VeilError::Io)?;
        }
        std::fs::write(path, contents).map_err(VeilError::Io)?;
        Ok(())
    }

    pub fn validate(&self) -> VeilResult<()> {
        let engine = &self.engine;
        let positive = [
            ("max_age_ms", engine.max_age_ms),
            ("failure_window_ms", engine.failure_window_ms),
            ("nonce_ttl_ms", engine.nonce_ttl_ms),
            ("nonce_capacity", engine.nonce_capacity as u64),
            ("failure_capacity", engine.failure_capacity as u64),
            ("sweep_interval_secs", engine.sweep_interval_secs),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(VeilError::Config(format!("{} must be > 0", name)));
            }
        }
        if self.server.jitter_min_ms > self.server.jitter_max_ms {
            return Err(VeilError::Config(format!(
                "jitter_min_ms ({}) must not exceed jitter_max_ms ({})",
                self.server.jitter_min_ms, self.server.jitter_max_ms
            )));
        }
        if self.secret_env.trim().is_empty() {
            return Err(VeilError::Config("secret_env must not be empty".into()));
        }
        Ok(())
    }

    /// Read the shared secret from the configured environment variable.
    pub fn load_secret(&self) -> VeilResult<Zeroizing<String>> {
        self.secret_from(std::env::var(&self.secret_env).ok())
    }

    fn secret_from(&self, value: Option<String>) -> VeilResult<Zeroizing<String>> {
        match value {
            Some(v) if !v.is_empty() => Ok(Zeroizing::new(v)),
            _ => Err(VeilError::MissingSecret(self.secret_env.clone())),
        }
    }

    /// Return the path to the default config file location.
    pub fn default_config_path() -> PathBuf {
        dirs_or_default(".veil/config.toml")
    }
}
