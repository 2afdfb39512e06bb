use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path, time::Duration};
use thiserror::Error;
use tracing::{debug, info};

use crate::engine::scope::Isolation;
use crate::eval::pending::SettlePolicy;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to open config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotConfig {
    /// User ids allowed to run administrative commands.
    #[serde(default)]
    pub sudoers: Vec<i64>,

    /// Username used to recognize `!eval@name` style commands.
    #[serde(default)]
    pub bot_username: Option<String>,

    #[serde(default = "default_client_label")]
    pub client_label: String,

    #[serde(default)]
    pub repository: RepositoryConfig,

    #[serde(default)]
    pub engine: EngineConfig,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            sudoers: Vec::new(),
            bot_username: None,
            client_label: default_client_label(),
            repository: RepositoryConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

impl BotConfig {
    /// Loads the config at `path`, or the defaults when no file exists there.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let file = File::open(path)?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        debug!(path = %path.display(), ?config, "config loaded");
        Ok(config)
    }

    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn is_sudoer(&self, user_id: i64) -> bool {
        self.sudoers.contains(&user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    #[serde(default = "default_remote")]
    pub remote: String,

    #[serde(default = "default_branch")]
    pub branch: String,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            remote: default_remote(),
            branch: default_branch(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub isolation: Isolation,

    #[serde(default)]
    pub identity: IdentityConfig,

    /// Upper bound on resolving one chain of pending values.
    #[serde(default = "default_await_timeout", with = "duration_ms")]
    pub await_timeout: Duration,

    #[serde(default = "default_max_await_depth")]
    pub max_await_depth: usize,

    /// Builtin names removed from the capability table.
    #[serde(default)]
    pub disabled_builtins: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            isolation: Isolation::default(),
            identity: IdentityConfig::default(),
            await_timeout: default_await_timeout(),
            max_await_depth: default_max_await_depth(),
            disabled_builtins: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn settle_policy(&self) -> SettlePolicy {
        SettlePolicy {
            timeout: self.await_timeout,
            max_depth: self.max_await_depth,
        }
    }
}

/// The caller identity re-applied inside every expression evaluation as
/// `__name__` / `__package__`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_identity_name")]
    pub name: String,

    #[serde(default = "default_identity_package")]
    pub package: Option<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            name: default_identity_name(),
            package: default_identity_package(),
        }
    }
}

fn default_client_label() -> String {
    "bot".to_string()
}
fn default_remote() -> String {
    "origin".to_string()
}
fn default_branch() -> String {
    "master".to_string()
}
fn default_await_timeout() -> Duration {
    Duration::from_secs(30)
}
fn default_max_await_depth() -> usize {
    8
}
fn default_identity_name() -> String {
    "admin_eval.plugins.sudo".to_string()
}
fn default_identity_package() -> Option<String> {
    Some("admin_eval.plugins".to_string())
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = BotConfig::from_str("{}").unwrap();
        assert_eq!(config, BotConfig::default());
        assert_eq!(config.engine.isolation, Isolation::Frame);
        assert_eq!(config.engine.await_timeout, Duration::from_secs(30));
        assert_eq!(config.engine.max_await_depth, 8);
        assert_eq!(config.repository.remote, "origin");
        assert_eq!(
            config.engine.identity.package.as_deref(),
            Some("admin_eval.plugins")
        );
    }

    #[test]
    fn test_overrides() {
        let config = BotConfig::from_str(
            r#"{
                "sudoers": [1, 2],
                "bot_username": "adminbot",
                "engine": {
                    "isolation": "serialized",
                    "await_timeout": 1500,
                    "disabled_builtins": ["sleep"]
                }
            }"#,
        )
        .unwrap();
        assert!(config.is_sudoer(2));
        assert!(!config.is_sudoer(3));
        assert_eq!(config.engine.isolation, Isolation::Serialized);
        assert_eq!(config.engine.await_timeout, Duration::from_millis(1500));
        assert_eq!(config.engine.disabled_builtins, vec!["sleep".to_string()]);
        assert_eq!(config.engine.settle_policy().max_depth, 8);
    }

    #[test]
    fn test_round_trip_keeps_milliseconds() {
        let config = BotConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"await_timeout\":30000"));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = BotConfig::from_file("/nonexistent/admin-eval.json").unwrap();
        assert_eq!(config, BotConfig::default());
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(matches!(
            BotConfig::from_str("{\"sudoers\": \"me\"}"),
            Err(ConfigError::Parse(_))
        ));
    }
}
