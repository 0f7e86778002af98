use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{HeraldError, Result};

/// Top-level configuration for Herald.
///
/// Loaded from `~/.herald/config.toml` by default. Every section falls back
/// to its defaults when absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeraldConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

impl HeraldConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: HeraldConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    ///
    /// A missing file is the normal first-run case and is not warned about.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Reject values that would make the retry window meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.retry.retention_secs == 0 {
            return Err(HeraldError::Config(
                "retry.retention_secs must be greater than zero".to_string(),
            ));
        }
        if self.engine.delivery_actions.iter().any(|a| a.is_empty()) {
            return Err(HeraldError::Config(
                "engine.delivery_actions must not contain empty names".to_string(),
            ));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Delivery retry budget, shared per conversation context.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries a single context may consume inside the retention window.
    pub max_attempts: u32,
    /// Seconds an idle retry record is kept before it is treated as absent.
    pub retention_secs: u64,
    /// Base delay between retries; the n-th retry waits `n * backoff_ms`.
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            retention_secs: 300,
            backoff_ms: 250,
        }
    }
}

impl RetryConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    /// Delay before the given (1-based) retry.
    pub fn backoff(&self, retry: u32) -> Duration {
        Duration::from_millis(self.backoff_ms.saturating_mul(u64::from(retry)))
    }
}

/// What the engine does with the rest of a message once an action fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnError {
    /// Keep dispatching the remaining actions and collect every failure.
    #[default]
    Continue,
    /// Report the remaining actions as skipped.
    Stop,
}

/// Protocol engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub on_error: OnError,
    /// Action names treated as outbound deliveries (eligible for retry).
    pub delivery_actions: Vec<String>,
    /// Per-invocation deadline in seconds; 0 disables it.
    pub handler_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            on_error: OnError::Continue,
            delivery_actions: vec!["message".to_string()],
            handler_timeout_secs: 0,
        }
    }
}

impl EngineConfig {
    pub fn handler_timeout(&self) -> Option<Duration> {
        (self.handler_timeout_secs > 0).then(|| Duration::from_secs(self.handler_timeout_secs))
    }

    pub fn is_delivery(&self, action: &str) -> bool {
        self.delivery_actions.iter().any(|a| a == action)
    }
}
