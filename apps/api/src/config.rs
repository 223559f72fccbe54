//! Application configuration loaded from environment variables.
//!
//! This module provides fail-fast configuration loading with validation.
//! Required variables must be present and valid, or the application will
//! exit with a clear error message.

use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default WEBHOOK_ENCRYPTION_KEY: 64 hex '4' characters.
pub const INSECURE_WEBHOOK_KEY: &str =
    "4444444444444444444444444444444444444444444444444444444444444444";

/// Application environment mode.
///
/// Controls security enforcement behavior:
/// - `Development`: Insecure defaults are allowed with WARN-level logging.
/// - `Production`: Insecure defaults cause the application to refuse startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Production,
}

impl AppEnvironment {
    /// Parse from the `APP_ENV` environment variable value.
    /// Defaults to `Development` if unset or unrecognized.
    pub fn from_env_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => {
                tracing::warn!(
                    value = other,
                    "Unrecognized APP_ENV value, defaulting to Development"
                );
                Self::Development
            }
        }
    }

    /// Returns true if this is production mode.
    #[must_use]
    pub fn is_production(&self) -> bool {
        *self == Self::Production
    }
}

impl std::fmt::Display for AppEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// Configuration errors that can occur during environment loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },

    #[error("Failed to parse port: {0}")]
    InvalidPort(#[from] std::num::ParseIntError),
}

/// Tuning for the webhook delivery dispatcher.
#[derive(Debug, Clone)]
pub struct WebhookWorkerConfig {
    /// Poll interval in seconds. Default: 5.
    pub poll_interval_secs: u64,
    /// Maximum deliveries claimed per tick. Default: 50.
    pub batch_size: i64,
    /// Concurrent sends per tick. Default: 8.
    pub concurrency: usize,
}

impl WebhookWorkerConfig {
    pub fn from_env() -> Self {
        Self {
            poll_interval_secs: env::var("WEBHOOK_POLL_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5)
                .max(1),
            batch_size: env::var("WEBHOOK_BATCH_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(50)
                .max(1),
            concurrency: env::var("WEBHOOK_CONCURRENCY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8)
                .max(1),
        }
    }
}

/// Tuning for the DTE transmission worker.
#[derive(Debug, Clone)]
pub struct TransmissionWorkerEnvConfig {
    /// Poll interval in seconds. Default: 2.
    pub poll_interval_secs: u64,
    /// Maximum jobs claimed per tick. Default: 20.
    pub batch_size: i64,
    /// Base delay of the retry schedule, in seconds. Default: 1.
    pub base_delay_secs: i64,
}

impl TransmissionWorkerEnvConfig {
    pub fn from_env() -> Self {
        Self {
            poll_interval_secs: env::var("TRANSMISSION_POLL_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2)
                .max(1),
            batch_size: env::var("TRANSMISSION_BATCH_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(20)
                .max(1),
            base_delay_secs: env::var("TRANSMISSION_BASE_DELAY_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1)
                .max(0),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    /// Application environment (development or production).
    pub app_env: AppEnvironment,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Tracing filter directive (e.g., "info,facel=debug")
    pub rust_log: String,

    /// Server bind address
    pub host: String,

    /// Server listen port
    pub port: u16,

    /// Webhook encryption key (32 bytes, hex-encoded) for encrypting endpoint secrets
    pub webhook_encryption_key: [u8; 32],

    /// Allow plain-http webhook endpoint URLs (development only)
    pub allow_http_endpoints: bool,

    /// Shared secret for the inbound purchase receiver. Receiver rejects
    /// requests when unset.
    pub inbound_webhook_secret: Option<String>,

    /// Base URL of the tax authority reception API
    pub reception_api_url: String,

    /// Bearer token for the reception API
    pub reception_api_token: String,

    /// Per-request timeout for reception API calls, in seconds. Default: 30.
    pub reception_timeout_secs: u64,

    /// Webhook dispatcher tuning
    pub webhook_worker: WebhookWorkerConfig,

    /// Transmission worker tuning
    pub transmission_worker: TransmissionWorkerEnvConfig,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("app_env", &self.app_env)
            .field("database_url", &"[redacted]")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("allow_http_endpoints", &self.allow_http_endpoints)
            .field("reception_api_url", &self.reception_api_url)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Required variables are missing
    /// - Values are invalid (e.g., invalid port number)
    ///
    /// # Required Variables
    ///
    /// - `DATABASE_URL` - PostgreSQL connection string
    /// - `RECEPTION_API_URL` - Base URL of the tax authority reception API
    ///
    /// # Optional Variables
    ///
    /// - `RUST_LOG` - Log level filter (default: "info")
    /// - `HOST` - Bind address (default: "0.0.0.0")
    /// - `PORT` - Listen port (default: 8080)
    /// - `WEBHOOK_ENCRYPTION_KEY` - 64 hex chars (insecure default in dev)
    /// - `RECEPTION_API_TOKEN` - Bearer token (empty default, flagged in prod)
    /// - `INBOUND_WEBHOOK_SECRET` - inbound receiver shared secret
    /// - `ALLOW_HTTP_ENDPOINTS` - accept http:// endpoint URLs (default: false)
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (development only)
        let _ = dotenvy::dotenv();

        let app_env = AppEnvironment::from_env_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let reception_api_url = env::var("RECEPTION_API_URL")
            .map_err(|_| ConfigError::MissingVar("RECEPTION_API_URL".to_string()))?;

        let reception_api_token = env::var("RECEPTION_API_TOKEN").unwrap_or_default();

        let reception_timeout_secs = env::var("RECEPTION_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30)
            .max(1);

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port: u16 = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()?;

        if port == 0 {
            return Err(ConfigError::InvalidValue {
                var: "PORT".to_string(),
                message: "Port must be between 1 and 65535".to_string(),
            });
        }

        // Webhook encryption key (hex-encoded 32 bytes) for endpoint secrets at rest
        let webhook_encryption_key = parse_hex_encryption_key(
            "WEBHOOK_ENCRYPTION_KEY",
            &env::var("WEBHOOK_ENCRYPTION_KEY")
                // Default for development only - must be changed in production
                .unwrap_or_else(|_| INSECURE_WEBHOOK_KEY.to_string()),
        )?;

        let allow_http_endpoints = env::var("ALLOW_HTTP_ENDPOINTS")
            .map(|s| matches!(s.to_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(false);

        let inbound_webhook_secret = env::var("INBOUND_WEBHOOK_SECRET")
            .ok()
            .filter(|s| !s.is_empty());

        Ok(Config {
            app_env,
            database_url,
            rust_log,
            host,
            port,
            webhook_encryption_key,
            allow_http_endpoints,
            inbound_webhook_secret,
            reception_api_url,
            reception_api_token,
            reception_timeout_secs,
            webhook_worker: WebhookWorkerConfig::from_env(),
            transmission_worker: TransmissionWorkerEnvConfig::from_env(),
        })
    }

    /// Get the server bind address as a socket address string.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Per-request timeout for reception API calls.
    pub fn reception_timeout(&self) -> Duration {
        Duration::from_secs(self.reception_timeout_secs)
    }

    /// Validate security configuration based on the application environment.
    ///
    /// In **production** mode: returns `Err(errors)` listing all insecure defaults found.
    /// In **development** mode: returns `Ok(warnings)` listing all insecure defaults found.
    ///
    /// This function checks:
    /// - WEBHOOK_ENCRYPTION_KEY is not the all-0x44 default
    /// - ALLOW_HTTP_ENDPOINTS is not enabled in production
    /// - RECEPTION_API_TOKEN is not empty
    pub fn validate_security_config(&self) -> Result<Vec<String>, Vec<String>> {
        let mut issues = Vec::new();

        if self.webhook_encryption_key == [0x44u8; 32] {
            issues.push(
                "WEBHOOK_ENCRYPTION_KEY is using the default insecure value (all 0x44)".to_string(),
            );
        }

        if self.allow_http_endpoints {
            issues.push(
                "ALLOW_HTTP_ENDPOINTS is enabled; webhook URLs will not be forced to https"
                    .to_string(),
            );
        }

        if self.reception_api_token.is_empty() {
            issues.push("RECEPTION_API_TOKEN is empty".to_string());
        }

        if issues.is_empty() {
            return Ok(Vec::new());
        }

        if self.app_env.is_production() {
            Err(issues)
        } else {
            Ok(issues)
        }
    }
}

/// Parse hex-encoded 32-byte encryption key
fn parse_hex_encryption_key(var_name: &str, hex_str: &str) -> Result<[u8; 32], ConfigError> {
    let bytes = hex::decode(hex_str).map_err(|_| ConfigError::InvalidValue {
        var: var_name.to_string(),
        message: "Must be 64 hex characters (32 bytes)".to_string(),
    })?;

    if bytes.len() != 32 {
        return Err(ConfigError::InvalidValue {
            var: var_name.to_string(),
            message: format!("Expected 32 bytes, got {}", bytes.len()),
        });
    }

    let mut key = [0u8; 32];
    key.copy_from_slice(&bytes);
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper: create a test Config with all secure (non-default) values.
    fn test_config_secure() -> Config {
        Config {
            app_env: AppEnvironment::Production,
            database_url: "postgres://localhost/test".to_string(),
            rust_log: "info".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8080,
            webhook_encryption_key: [0xABu8; 32],
            allow_http_endpoints: false,
            inbound_webhook_secret: Some("whsec_inbound".to_string()),
            reception_api_url: "https://recepcion.example.com".to_string(),
            reception_api_token: "token-2026".to_string(),
            reception_timeout_secs: 30,
            webhook_worker: WebhookWorkerConfig {
                poll_interval_secs: 5,
                batch_size: 50,
                concurrency: 8,
            },
            transmission_worker: TransmissionWorkerEnvConfig {
                poll_interval_secs: 2,
                batch_size: 20,
                base_delay_secs: 1,
            },
        }
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingVar("TEST_VAR".to_string());
        assert_eq!(
            err.to_string(),
            "Missing required environment variable: TEST_VAR"
        );

        let err = ConfigError::InvalidValue {
            var: "PORT".to_string(),
            message: "Must be a number".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid value for PORT: Must be a number");
    }

    #[test]
    fn test_bind_addr() {
        let mut config = test_config_secure();
        config.host = "127.0.0.1".to_string();
        config.port = 3000;
        assert_eq!(config.bind_addr(), "127.0.0.1:3000");
    }

    #[test]
    fn test_app_environment_parse() {
        assert_eq!(
            AppEnvironment::from_env_str("production"),
            AppEnvironment::Production
        );
        assert_eq!(
            AppEnvironment::from_env_str("prod"),
            AppEnvironment::Production
        );
        assert_eq!(
            AppEnvironment::from_env_str("development"),
            AppEnvironment::Development
        );
        assert_eq!(
            AppEnvironment::from_env_str("staging"),
            AppEnvironment::Development
        );
        assert_eq!(AppEnvironment::from_env_str(""), AppEnvironment::Development);
    }

    #[test]
    fn test_app_environment_display() {
        assert_eq!(AppEnvironment::Development.to_string(), "development");
        assert_eq!(AppEnvironment::Production.to_string(), "production");
    }

    #[test]
    fn test_production_rejects_default_webhook_encryption_key() {
        let mut config = test_config_secure();
        config.webhook_encryption_key = [0x44u8; 32];

        let result = config.validate_security_config();
        assert!(result.is_err());
        let errors = result.unwrap_err();
        assert!(errors.iter().any(|e| e.contains("WEBHOOK_ENCRYPTION_KEY")));
    }

    #[test]
    fn test_production_rejects_http_endpoints() {
        let mut config = test_config_secure();
        config.allow_http_endpoints = true;

        let result = config.validate_security_config();
        assert!(result.is_err());
        let errors = result.unwrap_err();
        assert!(errors.iter().any(|e| e.contains("ALLOW_HTTP_ENDPOINTS")));
    }

    #[test]
    fn test_production_rejects_empty_reception_token() {
        let mut config = test_config_secure();
        config.reception_api_token = String::new();

        let result = config.validate_security_config();
        assert!(result.is_err());
        let errors = result.unwrap_err();
        assert!(errors.iter().any(|e| e.contains("RECEPTION_API_TOKEN")));
    }

    #[test]
    fn test_development_allows_insecure_defaults_with_warnings() {
        let mut config = test_config_secure();
        config.app_env = AppEnvironment::Development;
        config.webhook_encryption_key = [0x44u8; 32];
        config.allow_http_endpoints = true;

        let result = config.validate_security_config();
        assert!(result.is_ok());
        let warnings = result.unwrap();
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn test_production_passes_with_secure_config() {
        let config = test_config_secure();

        let result = config.validate_security_config();
        assert!(result.is_ok());
        assert!(result.unwrap().is_empty());
    }

    #[test]
    fn test_parse_hex_encryption_key() {
        let key = parse_hex_encryption_key("TEST_KEY", INSECURE_WEBHOOK_KEY).unwrap();
        assert_eq!(key, [0x44u8; 32]);

        assert!(parse_hex_encryption_key("TEST_KEY", "not-hex").is_err());
        assert!(parse_hex_encryption_key("TEST_KEY", "abcd").is_err());
    }
}
