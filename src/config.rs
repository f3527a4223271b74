//! Configuration types for the reminder bot.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NudgeConfig {
    /// Telegram Bot API transport.
    pub telegram: TelegramConfig,
    /// Liveness HTTP endpoint.
    pub health: HealthConfig,
    /// What the scheduler does when a notification cannot be delivered.
    pub delivery: DeliveryConfig,
    /// Log output settings.
    pub logging: LoggingConfig,
}

/// Telegram Bot API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token issued by BotFather. Empty disables the channel.
    pub bot_token: String,
    /// API base URL (overridable for self-hosted Bot API servers and tests).
    pub api_base: String,
    /// Long-poll timeout for `getUpdates`, in seconds.
    pub poll_timeout_secs: u64,
    /// Chats allowed to use the bot. Empty allows every chat.
    pub allowed_chat_ids: Vec<String>,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_base: "https://api.telegram.org".to_owned(),
            poll_timeout_secs: 30,
            allowed_chat_ids: Vec::new(),
        }
    }
}

/// Liveness probe settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_owned(),
            port: 8080,
        }
    }
}

/// Handling of a failed delivery for one occurrence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryFailurePolicy {
    /// Log the failure and carry on as if the occurrence was delivered.
    #[default]
    Skip,
    /// Retry once after `retry_delay_ms`, then behave like `Skip`.
    RetryOnce,
}

/// Delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    pub failure_policy: DeliveryFailurePolicy,
    /// Pause before the single retry under [`DeliveryFailurePolicy::RetryOnce`].
    pub retry_delay_ms: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            failure_policy: DeliveryFailurePolicy::Skip,
            retry_delay_ms: 2_000,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for daily-rotated log files. `None` logs to stderr only.
    pub directory: Option<PathBuf>,
}

impl NudgeConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::NudgeError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::NudgeError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path (see [`crate::app_dirs::config_file`]).
    pub fn default_config_path() -> PathBuf {
        crate::app_dirs::config_file()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = NudgeConfig::default();
        assert!(config.telegram.bot_token.is_empty());
        assert!(config.telegram.poll_timeout_secs > 0);
        assert!(config.health.enabled);
        assert!(config.health.port > 0);
        assert_eq!(config.delivery.failure_policy, DeliveryFailurePolicy::Skip);
        assert!(config.logging.directory.is_none());
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = NudgeConfig::default();
        config.telegram.bot_token = "123:abc".to_owned();
        config.telegram.allowed_chat_ids = vec!["42".to_owned()];
        config.health.port = 9999;
        config.delivery.failure_policy = DeliveryFailurePolicy::RetryOnce;

        config.save_to_file(&path).unwrap();
        assert!(path.exists());

        let loaded = NudgeConfig::from_file(&path).unwrap();
        assert_eq!(loaded.telegram.bot_token, "123:abc");
        assert_eq!(loaded.telegram.allowed_chat_ids, vec!["42".to_owned()]);
        assert_eq!(loaded.health.port, 9999);
        assert_eq!(loaded.delivery.failure_policy, DeliveryFailurePolicy::RetryOnce);
    }

    #[test]
    fn from_file_nonexistent_returns_error() {
        let result = NudgeConfig::from_file(std::path::Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn from_file_invalid_toml_returns_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "this is not valid toml {{{").unwrap();

        let result = NudgeConfig::from_file(&path);
        assert!(matches!(result, Err(crate::NudgeError::Config(_))));
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let toml_str = r#"
[delivery]
failure_policy = "retry_once"
"#;
        let config: NudgeConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.delivery.failure_policy, DeliveryFailurePolicy::RetryOnce);
        assert_eq!(config.delivery.retry_delay_ms, 2_000);
        assert_eq!(config.telegram.api_base, "https://api.telegram.org");
        assert_eq!(config.health.host, "127.0.0.1");
    }

    #[test]
    fn empty_toml_is_default() {
        let config: NudgeConfig = toml::from_str("").unwrap();
        assert!(config.telegram.allowed_chat_ids.is_empty());
        assert_eq!(config.health.port, 8080);
    }
}
