//! Configuration loading, validation, and management for zulipgpt.
//!
//! Loads configuration from `zulipgpt.toml` with environment variable
//! overrides and Zulip credentials from a `.zuliprc` file. Validates all
//! settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "zulipgpt.toml";

/// The root configuration structure.
///
/// Maps directly to `zulipgpt.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Log level filter (e.g. "info", "debug")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Bot identity and role
    #[serde(default)]
    pub bot: BotConfig,

    /// Model selection
    #[serde(default)]
    pub model: ModelConfig,

    /// Completion API configuration
    #[serde(default)]
    pub openai: ProviderConfig,

    /// Zulip transport configuration
    #[serde(default)]
    pub zulip: ZulipConfig,

    /// Conversation history retrieval
    #[serde(default)]
    pub history: HistoryConfig,

    /// Named context storage
    #[serde(default)]
    pub store: StoreConfig,

    /// Who may change named contexts
    #[serde(default)]
    pub permissions: PermissionsConfig,
}

fn default_log_level() -> String {
    "info".into()
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Display name used in mentions (`@**name**`)
    #[serde(default)]
    pub name: String,

    /// System role description sent as the first turn
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    "You are a helpful assistant.".into()
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            role: default_role(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model used when no model directive is given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,

    /// Sampling temperature; unset leaves the API default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_completion_timeout")]
    pub timeout_secs: u64,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_completion_timeout() -> u64 {
    120
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            timeout_secs: default_completion_timeout(),
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ZulipConfig {
    /// Server URL, e.g. `https://chat.example.com`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,

    /// Bot account email
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Bot account API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// `.zuliprc` to read missing credentials from
    #[serde(default = "default_zuliprc")]
    pub zuliprc: PathBuf,
}

fn default_zuliprc() -> PathBuf {
    PathBuf::from(".zuliprc")
}

impl Default for ZulipConfig {
    fn default() -> Self {
        Self {
            site: None,
            email: None,
            api_key: None,
            zuliprc: default_zuliprc(),
        }
    }
}

impl std::fmt::Debug for ZulipConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZulipConfig")
            .field("site", &self.site)
            .field("email", &self.email)
            .field("api_key", &redact(&self.api_key))
            .field("zuliprc", &self.zuliprc)
            .finish()
    }
}

/// Fully resolved Zulip credentials.
#[derive(Clone)]
pub struct ZulipCredentials {
    pub site: String,
    pub email: String,
    pub api_key: String,
}

impl std::fmt::Debug for ZulipCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZulipCredentials")
            .field("site", &self.site)
            .field("email", &self.email)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl ZulipConfig {
    /// Fill missing fields from a `.zuliprc` file (`[api]` section).
    ///
    /// Values already present win. A missing file is not an error.
    pub fn merge_zuliprc(&mut self, path: &Path) -> Result<(), ConfigError> {
        if !path.exists() {
            return Ok(());
        }
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut in_api = false;
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if line.starts_with('[') && line.ends_with(']') {
                in_api = line[1..line.len() - 1].trim().eq_ignore_ascii_case("api");
                continue;
            }
            if !in_api {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::ParseError {
                    path: path.to_path_buf(),
                    reason: format!("expected key=value, got '{line}'"),
                });
            };
            let value = value.trim().to_string();
            match key.trim() {
                "site" => {
                    self.site.get_or_insert(value);
                }
                "email" => {
                    self.email.get_or_insert(value);
                }
                "key" => {
                    self.api_key.get_or_insert(value);
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Resolve credentials, failing on any missing field.
    pub fn credentials(&self) -> Result<ZulipCredentials, ConfigError> {
        let missing = |field: &str| {
            ConfigError::ValidationError(format!(
                "zulip.{field} is not set (config, environment, or {})",
                self.zuliprc.display()
            ))
        };
        Ok(ZulipCredentials {
            site: self.site.clone().ok_or_else(|| missing("site"))?,
            email: self.email.clone().ok_or_else(|| missing("email"))?,
            api_key: self.api_key.clone().ok_or_else(|| missing("api_key"))?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// How many earlier messages to look at
    #[serde(default = "default_history_messages")]
    pub max_messages: usize,

    /// Give up on history retrieval after this many seconds
    #[serde(default = "default_history_timeout")]
    pub timeout_secs: u64,
}

fn default_history_messages() -> usize {
    100
}
fn default_history_timeout() -> u64 {
    30
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_messages: default_history_messages(),
            timeout_secs: default_history_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// "sqlite" or "memory"
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// SQLite database file
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_store_backend() -> String {
    "sqlite".into()
}
fn default_store_path() -> PathBuf {
    PathBuf::from("data/data.db")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: default_store_path(),
        }
    }
}

/// Who may run `!set context` / `!unset context`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetContextPermission {
    /// Organization administrators only
    #[default]
    Admin,
    /// Every sender
    Everyone,
}

impl std::str::FromStr for SetContextPermission {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "everyone" | "all" => Ok(Self::Everyone),
            other => Err(ConfigError::ValidationError(format!(
                "unknown set-context permission '{other}' (expected 'admin' or 'everyone')"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PermissionsConfig {
    #[serde(default)]
    pub set_context: SetContextPermission,
}

impl AppConfig {
    /// Load configuration from `zulipgpt.toml` in the working directory,
    /// apply environment overrides, then merge `.zuliprc`.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(Path::new(CONFIG_FILE), |key| std::env::var(key).ok())
    }

    /// Load from an explicit path with a custom environment lookup.
    pub fn load_with(
        path: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(env)?;
        let zuliprc = config.zulip.zuliprc.clone();
        config.zulip.merge_zuliprc(&zuliprc)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path, without overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Apply environment variable overrides (highest priority).
    pub fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(name) = env("BOT_NAME") {
            self.bot.name = name;
        }
        if let Some(role) = env("BOT_ROLE") {
            self.bot.role = role;
        }
        if let Some(model) = env("DEFAULT_MODEL_NAME").filter(|m| !m.trim().is_empty()) {
            self.model.default_model = Some(model);
        }
        if let Some(key) = env("OPENAI_API_KEY") {
            self.openai.api_key = Some(key);
        }
        if let Some(url) = env("OPENAI_API_URL") {
            self.openai.api_url = url;
        }
        if let Some(site) = env("ZULIP_SITE") {
            self.zulip.site = Some(site);
        }
        if let Some(email) = env("ZULIP_EMAIL") {
            self.zulip.email = Some(email);
        }
        if let Some(key) = env("ZULIP_API_KEY") {
            self.zulip.api_key = Some(key);
        }
        if let Some(path) = env("CONTEXTS_DB") {
            self.store.path = PathBuf::from(path);
        }
        if let Some(permission) = env("PERMISSIONS_SET_CONTEXT") {
            self.permissions.set_context = permission.parse()?;
        }
        if let Some(level) = env("LOGLEVEL") {
            self.log_level = level.to_lowercase();
        }
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bot.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "bot.name (BOT_NAME) must be set".into(),
            ));
        }

        if let Some(t) = self.model.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(ConfigError::ValidationError(
                    "model.temperature must be between 0.0 and 2.0".into(),
                ));
            }
        }

        if self.history.max_messages == 0 {
            return Err(ConfigError::ValidationError(
                "history.max_messages must be > 0".into(),
            ));
        }

        if !matches!(self.store.backend.as_str(), "sqlite" | "memory") {
            return Err(ConfigError::ValidationError(format!(
                "store.backend must be 'sqlite' or 'memory', got '{}'",
                self.store.backend
            )));
        }

        Ok(())
    }

    /// The completion API key, required to answer chat turns.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.openai.api_key.as_deref().ok_or_else(|| {
            ConfigError::ValidationError("openai.api_key (OPENAI_API_KEY) must be set".into())
        })
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            bot: BotConfig::default(),
            model: ModelConfig::default(),
            openai: ProviderConfig::default(),
            zulip: ZulipConfig::default(),
            history: HistoryConfig::default(),
            store: StoreConfig::default(),
            permissions: PermissionsConfig::default(),
        }
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
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn named() -> AppConfig {
        let mut config = AppConfig::default();
        config.bot.name = "GPT".into();
        config
    }

    #[test]
    fn defaults() {
        let config = AppConfig::default();
        assert_eq!(config.history.max_messages, 100);
        assert_eq!(config.store.path, PathBuf::from("data/data.db"));
        assert_eq!(config.permissions.set_context, SetContextPermission::Admin);
        assert!(config.model.default_model.is_none());
    }

    #[test]
    fn default_config_needs_a_bot_name() {
        assert!(AppConfig::default().validate().is_err());
        assert!(named().validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = named();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.bot.name, "GPT");
        assert_eq!(parsed.history.max_messages, config.history.max_messages);
    }

    #[test]
    fn parse_full_file() {
        let toml_str = r#"
log_level = "debug"

[bot]
name = "Assistant"
role = "You answer questions about Cicada."

[model]
default_model = "gpt-4"
temperature = 0.2

[openai]
api_key = "sk-test"

[history]
max_messages = 50

[permissions]
set_context = "everyone"
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.bot.name, "Assistant");
        assert_eq!(config.model.default_model.as_deref(), Some("gpt-4"));
        assert_eq!(config.history.max_messages, 50);
        assert_eq!(config.permissions.set_context, SetContextPermission::Everyone);
        assert_eq!(config.openai.api_url, "https://api.openai.com/v1");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = named();
        config.model.temperature = Some(5.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_store_backend_rejected() {
        let mut config = named();
        config.store.backend = "postgres".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = named();
        config
            .apply_env(env_from(&[
                ("BOT_NAME", "Helper"),
                ("DEFAULT_MODEL_NAME", "gpt-3.5-turbo"),
                ("OPENAI_API_KEY", "sk-env"),
                ("PERMISSIONS_SET_CONTEXT", "everyone"),
                ("LOGLEVEL", "DEBUG"),
            ]))
            .unwrap();
        assert_eq!(config.bot.name, "Helper");
        assert_eq!(config.model.default_model.as_deref(), Some("gpt-3.5-turbo"));
        assert_eq!(config.require_api_key().unwrap(), "sk-env");
        assert_eq!(config.permissions.set_context, SetContextPermission::Everyone);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn empty_default_model_env_is_ignored() {
        let mut config = named();
        config.apply_env(env_from(&[("DEFAULT_MODEL_NAME", "")])).unwrap();
        assert!(config.model.default_model.is_none());
    }

    #[test]
    fn bad_permission_env_is_an_error() {
        let mut config = named();
        let err = config
            .apply_env(env_from(&[("PERMISSIONS_SET_CONTEXT", "root")]))
            .unwrap_err();
        assert!(err.to_string().contains("root"));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/zulipgpt.toml")).unwrap();
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn missing_api_key_is_reported() {
        let err = named().require_api_key().unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn zuliprc_fills_missing_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".zuliprc");
        std::fs::write(
            &path,
            "[api]\nemail=gpt-bot@chat.example.com\nkey = abc123\nsite=https://chat.example.com\n",
        )
        .unwrap();

        let mut zulip = ZulipConfig {
            email: Some("override@chat.example.com".into()),
            ..ZulipConfig::default()
        };
        zulip.merge_zuliprc(&path).unwrap();

        let creds = zulip.credentials().unwrap();
        assert_eq!(creds.email, "override@chat.example.com");
        assert_eq!(creds.api_key, "abc123");
        assert_eq!(creds.site, "https://chat.example.com");
        assert!(!format!("{creds:?}").contains("abc123"));
    }

    #[test]
    fn zuliprc_other_sections_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".zuliprc");
        std::fs::write(&path, "[other]\nkey=nope\n[api]\nkey=yes\n").unwrap();

        let mut zulip = ZulipConfig::default();
        zulip.merge_zuliprc(&path).unwrap();
        assert_eq!(zulip.api_key.as_deref(), Some("yes"));
        assert!(zulip.credentials().is_err());
    }

    #[test]
    fn load_with_file_env_and_zuliprc() {
        let dir = tempfile::tempdir().unwrap();
        let rc = dir.path().join("bot.zuliprc");
        std::fs::write(&rc, "[api]\nemail=bot@x.com\nkey=k\nsite=https://x.com\n").unwrap();
        let cfg = dir.path().join("zulipgpt.toml");
        std::fs::write(
            &cfg,
            format!("[bot]\nname = \"GPT\"\n[zulip]\nzuliprc = {:?}\n", rc.display().to_string()),
        )
        .unwrap();

        let config = AppConfig::load_with(&cfg, env_from(&[("BOT_ROLE", "Be brief.")])).unwrap();
        assert_eq!(config.bot.role, "Be brief.");
        assert_eq!(config.zulip.credentials().unwrap().email, "bot@x.com");
    }

    #[test]
    fn secrets_redacted_in_debug() {
        let mut config = named();
        config.openai.api_key = Some("sk-secret".into());
        config.zulip.api_key = Some("zulip-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(!debug.contains("zulip-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
