//! Configuration loading, validation, and management for Stashflow.
//!
//! Loads configuration from `~/.stashflow/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.stashflow/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Payday scheduler configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Allocation and recommendation tuning
    #[serde(default)]
    pub planner: PlannerConfig,

    /// Channel configurations
    #[serde(default)]
    pub channels_config: HashMap<String, ChannelConfig>,

    /// Identity token issuing
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Audit trail configuration
    #[serde(default)]
    pub audit: AuditConfig,

    /// Payday dialog session bounds
    #[serde(default)]
    pub session: SessionConfig,
}

fn default_true() -> bool {
    true
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// sqlx connection string, e.g. `sqlite://stashflow.db` or `sqlite::memory:`.
    #[serde(default = "default_database_url")]
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_url() -> String {
    let path = AppConfig::config_dir().join("stashflow.db");
    format!("sqlite://{}", path.display())
}
fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds between payday checks.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,

    /// Run one check immediately when the daemon starts.
    #[serde(default = "default_true")]
    pub run_on_startup: bool,
}

fn default_tick_interval() -> u64 {
    3600
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_interval_secs: default_tick_interval(),
            run_on_startup: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Goals needing at most this much are suggested in full on payday.
    #[serde(default = "default_small_goal_threshold")]
    pub small_goal_threshold: i64,

    /// Re-run allocation after a withdrawal, not only after a contribution.
    #[serde(default = "default_true")]
    pub reallocate_on_withdraw: bool,
}

fn default_small_goal_threshold() -> i64 {
    5000
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            small_goal_threshold: default_small_goal_threshold(),
            reallocate_on_withdraw: true,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Allowlist of sender IDs. Empty = deny all. ["*"] = allow all.
    #[serde(default)]
    pub allowed_users: Vec<String>,

    /// Bot token or equivalent credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl std::fmt::Debug for ChannelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelConfig")
            .field("enabled", &self.enabled)
            .field("allowed_users", &self.allowed_users)
            .field("token", &redact(&self.token))
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// HMAC secret for locally issued user tokens. Unset = placeholders only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_secret: Option<String>,
}

impl std::fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("token_secret", &redact(&self.token_secret))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Entries waiting for the background writer before new ones are dropped.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Extra attempts per sink before an entry is dropped.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_queue_capacity() -> usize {
    256
}
fn default_max_retries() -> u32 {
    2
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            queue_capacity: default_queue_capacity(),
            max_retries: default_max_retries(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Idle seconds after which a pending dialog is forgotten.
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,
}

fn default_max_sessions() -> usize {
    1024
}
fn default_session_ttl() -> u64 {
    1800
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            ttl_secs: default_session_ttl(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.stashflow/config.toml).
    ///
    /// Environment variables override the file:
    /// - `STASHFLOW_DATABASE_URL`
    /// - `TELEGRAM_BOT_TOKEN` (enables the telegram channel)
    /// - `STASHFLOW_TOKEN_SECRET`
    /// - `STASHFLOW_TICK_SECS`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup, then re-validate.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("STASHFLOW_DATABASE_URL") {
            self.database.url = url;
        }

        if let Some(token) = lookup("TELEGRAM_BOT_TOKEN") {
            let entry = self
                .channels_config
                .entry("telegram".into())
                .or_insert_with(|| ChannelConfig {
                    enabled: true,
                    allowed_users: vec!["*".into()],
                    token: None,
                });
            entry.token = Some(token);
            entry.enabled = true;
        }

        if let Some(secret) = lookup("STASHFLOW_TOKEN_SECRET") {
            self.identity.token_secret = Some(secret);
        }

        if let Some(secs) = lookup("STASHFLOW_TICK_SECS") {
            self.scheduler.tick_interval_secs = secs.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "STASHFLOW_TICK_SECS must be a whole number of seconds, got '{secs}'"
                ))
            })?;
        }

        self.validate()
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".stashflow")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "database.url must not be empty".into(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "database.max_connections must be > 0".into(),
            ));
        }

        if self.scheduler.tick_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "scheduler.tick_interval_secs must be > 0".into(),
            ));
        }

        if self.planner.small_goal_threshold < 0 {
            return Err(ConfigError::ValidationError(
                "planner.small_goal_threshold must not be negative".into(),
            ));
        }

        if self.audit.queue_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "audit.queue_capacity must be > 0".into(),
            ));
        }

        if self.session.max_sessions == 0 {
            return Err(ConfigError::ValidationError(
                "session.max_sessions must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Settings for a channel, if configured and enabled.
    pub fn channel(&self, name: &str) -> Option<&ChannelConfig> {
        self.channels_config.get(name).filter(|c| c.enabled)
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scheduler.tick_interval_secs, 3600);
        assert!(config.scheduler.run_on_startup);
        assert_eq!(config.planner.small_goal_threshold, 5000);
        assert!(config.planner.reallocate_on_withdraw);
        assert!(config.database.url.starts_with("sqlite://"));
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.database.url, config.database.url);
        assert_eq!(parsed.session.ttl_secs, config.session.ttl_secs);
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.scheduler.tick_interval_secs, 3600);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[database]
url = "sqlite::memory:"

[planner]
small_goal_threshold = 2500

[channels_config.telegram]
enabled = true
allowed_users = ["100", "200"]
token = "123:abc"
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.planner.small_goal_threshold, 2500);
        assert!(config.planner.reallocate_on_withdraw);
        let telegram = config.channel("telegram").unwrap();
        assert_eq!(telegram.allowed_users, vec!["100", "200"]);
        assert_eq!(telegram.token.as_deref(), Some("123:abc"));
    }

    #[test]
    fn invalid_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[scheduler\ntick_interval_secs = ").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn zero_tick_interval_rejected() {
        let mut config = AppConfig::default();
        config.scheduler.tick_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = AppConfig::default();
        config
            .apply_env_overrides(env(&[
                ("STASHFLOW_DATABASE_URL", "sqlite::memory:"),
                ("TELEGRAM_BOT_TOKEN", "999:xyz"),
                ("STASHFLOW_TOKEN_SECRET", "hunter2"),
                ("STASHFLOW_TICK_SECS", "60"),
            ]))
            .unwrap();

        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.scheduler.tick_interval_secs, 60);
        assert_eq!(config.identity.token_secret.as_deref(), Some("hunter2"));
        let telegram = config.channel("telegram").unwrap();
        assert_eq!(telegram.token.as_deref(), Some("999:xyz"));
    }

    #[test]
    fn bad_tick_override_rejected() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env_overrides(env(&[("STASHFLOW_TICK_SECS", "hourly")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let mut config = AppConfig::default();
        config
            .apply_env_overrides(env(&[
                ("TELEGRAM_BOT_TOKEN", "999:xyz"),
                ("STASHFLOW_TOKEN_SECRET", "hunter2"),
            ]))
            .unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("999:xyz"));
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("tick_interval_secs = 3600"));
        assert!(toml_str.contains("small_goal_threshold = 5000"));
    }
}
