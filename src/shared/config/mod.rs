//! Application configuration module
//!
//! `AppConfig` is assembled in three layers: built-in defaults, an optional TOML
//! file, then environment overrides. The environment layer takes a lookup
//! closure so it can be exercised without touching the process environment.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Secret used when none is configured. Only suitable for local development.
pub const DEV_JWT_SECRET: &str = "crosslearn-dev-secret-change-me";
/// Longest accepted session token lifetime.
pub const MAX_TOKEN_TTL_DAYS: i64 = 3650;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseSection {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthSection {
    pub jwt_secret: String,
    pub token_ttl_days: i64,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            token_ttl_days: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CorsSection {
    pub origins: Vec<String>,
}

impl Default for CorsSection {
    fn default() -> Self {
        Self {
            origins: vec!["http://localhost:5173".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmSection {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LiveSection {
    /// Refuse socket upgrades that carry no valid token.
    pub require_auth: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSection,
    pub database: DatabaseSection,
    pub auth: AuthSection,
    pub cors: CorsSection,
    pub llm: LlmSection,
    pub live: LiveSection,
}

impl AppConfig {
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Parse a TOML document. Missing sections and keys keep their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Apply environment overrides. `lookup` returns the value of a variable if set.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("SERVER_PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                key: "SERVER_PORT",
                message: format!("'{}' is not a valid port", port),
            })?;
        }
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = Some(url);
        }
        if let Some(secret) = lookup("JWT_SECRET_KEY") {
            self.auth.jwt_secret = secret;
        }
        if let Some(days) = lookup("TOKEN_TTL_DAYS") {
            self.auth.token_ttl_days = days.parse().map_err(|_| ConfigError::InvalidValue {
                key: "TOKEN_TTL_DAYS",
                message: format!("'{}' is not a whole number of days", days),
            })?;
        }
        if let Some(origins) = lookup("CORS_ORIGINS") {
            self.cors.origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(key) = lookup("GEMINI_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(model) = lookup("LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(base_url) = lookup("LLM_BASE_URL") {
            self.llm.base_url = base_url;
        }
        if let Some(flag) = lookup("LIVE_REQUIRE_AUTH") {
            self.live.require_auth = matches!(flag.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue {
                key: "server.port",
                message: "port must be non-zero".to_string(),
            });
        }
        if self.auth.jwt_secret.is_empty() {
            return Err(ConfigError::MissingValue("auth.jwt_secret"));
        }
        if !(1..=MAX_TOKEN_TTL_DAYS).contains(&self.auth.token_ttl_days) {
            return Err(ConfigError::InvalidValue {
                key: "auth.token_ttl_days",
                message: format!("token lifetime must be between 1 and {} days", MAX_TOKEN_TTL_DAYS),
            });
        }
        if !self.llm.base_url.starts_with("http://") && !self.llm.base_url.starts_with("https://") {
            return Err(ConfigError::InvalidUrl(self.llm.base_url.clone()));
        }
        Ok(())
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.auth.jwt_secret == DEV_JWT_SECRET
    }
}

#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

impl AppConfigBuilder {
    pub fn port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.config.database.url = Some(url.into());
        self
    }

    pub fn jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.auth.jwt_secret = secret.into();
        self
    }

    pub fn token_ttl_days(mut self, days: i64) -> Self {
        self.config.auth.token_ttl_days = days;
        self
    }

    pub fn llm_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.llm.api_key = Some(key.into());
        self
    }

    pub fn llm_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.llm.base_url = url.into();
        self
    }

    pub fn require_socket_auth(mut self, require: bool) -> Self {
        self.config.live.require_auth = require;
        self
    }

    pub fn build(self) -> Result<AppConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.auth.token_ttl_days, 15);
        assert_eq!(config.cors.origins, vec!["http://localhost:5173".to_string()]);
        assert!(config.uses_dev_secret());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [server]
            port = 9100

            [llm]
            model = "gemini-2.0-flash"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.llm.model, "gemini-2.0-flash");
        assert_eq!(config.auth.token_ttl_days, 15);
    }

    #[test]
    fn test_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[live]\nrequire_auth = true").unwrap();
        let config = AppConfig::from_toml_file(file.path()).unwrap();
        assert!(config.live.require_auth);
    }

    #[test]
    fn test_invalid_toml() {
        let result = AppConfig::from_toml_str("[server\nport = ");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("SERVER_PORT", "9000"),
            ("JWT_SECRET_KEY", "s3cret"),
            ("CORS_ORIGINS", "http://a.test, http://b.test,"),
            ("GEMINI_API_KEY", "key"),
            ("LIVE_REQUIRE_AUTH", "TRUE"),
        ]);
        let config = AppConfig::default()
            .with_env_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.auth.jwt_secret, "s3cret");
        assert_eq!(config.cors.origins, vec!["http://a.test".to_string(), "http://b.test".to_string()]);
        assert_eq!(config.llm.api_key.as_deref(), Some("key"));
        assert!(config.live.require_auth);
        assert!(!config.uses_dev_secret());
    }

    #[test]
    fn test_env_token_ttl_bounds() {
        let with_ttl = |days: &'static str| {
            AppConfig::default().with_env_overrides(move |k| (k == "TOKEN_TTL_DAYS").then(|| days.to_string()))
        };
        assert_eq!(with_ttl("3650").unwrap().auth.token_ttl_days, MAX_TOKEN_TTL_DAYS);
        assert!(matches!(
            with_ttl("200000000"),
            Err(ConfigError::InvalidValue { key: "auth.token_ttl_days", .. })
        ));
        assert!(matches!(
            with_ttl("0"),
            Err(ConfigError::InvalidValue { key: "auth.token_ttl_days", .. })
        ));
    }

    #[test]
    fn test_env_bad_port() {
        let result = AppConfig::default().with_env_overrides(|k| {
            (k == "SERVER_PORT").then(|| "not-a-port".to_string())
        });
        assert!(matches!(result, Err(ConfigError::InvalidValue { key: "SERVER_PORT", .. })));
    }

    #[test]
    fn test_builder_validation() {
        assert!(matches!(
            AppConfig::builder().jwt_secret("").build(),
            Err(ConfigError::MissingValue("auth.jwt_secret"))
        ));
        assert!(matches!(
            AppConfig::builder().llm_base_url("ftp://nope").build(),
            Err(ConfigError::InvalidUrl(_))
        ));
        let config = AppConfig::builder().port(1234).token_ttl_days(1).build().unwrap();
        assert_eq!(config.server.port, 1234);
    }
}
