//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// HMAC secret for bearer tokens
    pub jwt_secret: String,

    /// Expected `iss` claim
    pub jwt_issuer: String,

    /// Payment processor server key (basic auth username, signature salt)
    pub midtrans_server_key: String,

    pub midtrans_base_url: String,

    /// Reject notifications whose `signature_key` does not match
    pub verify_webhook_signature: bool,

    /// Re-fetch the transaction status from the processor instead of
    /// trusting the notification body
    pub verify_webhook_status: bool,

    /// Refuse backward status moves
    pub strict_status_transitions: bool,

    /// Period of the open-deposit reconciliation; `None` disables it
    pub reconcile_interval: Option<Duration>,

    /// `json` for JSON log lines, anything else for human-readable output
    pub log_format: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::MissingEnv("DATABASE_URL"))?;

        let database_max_connections = parse_or("DATABASE_MAX_CONNECTIONS", 10)?;

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_or("PORT", 8000)?;
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let jwt_secret =
            env::var("JWT_SECRET").map_err(|_| ConfigError::MissingEnv("JWT_SECRET"))?;
        if jwt_secret.is_empty() {
            return Err(ConfigError::InvalidValue("JWT_SECRET"));
        }
        let jwt_issuer = env::var("JWT_ISSUER").unwrap_or_else(|_| "selfbank".to_string());

        let midtrans_server_key =
            env::var("MT_SERVER_KEY").map_err(|_| ConfigError::MissingEnv("MT_SERVER_KEY"))?;
        let midtrans_base_url = env::var("MT_BASE_URL")
            .unwrap_or_else(|_| "https://api.sandbox.midtrans.com".to_string());

        let verify_webhook_signature = parse_bool_or("MT_VERIFY_SIGNATURE", false)?;
        let verify_webhook_status = parse_bool_or("MT_VERIFY_STATUS", true)?;
        let strict_status_transitions = parse_bool_or("STRICT_STATUS_TRANSITIONS", false)?;
        ensure_webhook_trust(
            environment == "production",
            verify_webhook_signature,
            verify_webhook_status,
        )?;

        let reconcile_secs: u64 = parse_or("RECONCILE_INTERVAL_SECS", 0)?;
        let reconcile_interval = (reconcile_secs > 0).then(|| Duration::from_secs(reconcile_secs));

        let log_format = env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

        Ok(Self {
            database_url,
            database_max_connections,
            host,
            port,
            environment,
            jwt_secret,
            jwt_issuer,
            midtrans_server_key,
            midtrans_base_url,
            verify_webhook_signature,
            verify_webhook_status,
            strict_status_transitions,
            reconcile_interval,
            log_format,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

/// Production must authenticate notifications one way or the other
fn ensure_webhook_trust(
    production: bool,
    verify_signature: bool,
    verify_status: bool,
) -> Result<(), ConfigError> {
    if production && !verify_signature && !verify_status {
        return Err(ConfigError::UnverifiedWebhooks);
    }
    Ok(())
}

fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue(key)),
        Err(_) => Ok(default),
    }
}

fn parse_bool_or(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(key) {
        Ok(raw) => parse_flag(&raw).ok_or(ConfigError::InvalidValue(key)),
        Err(_) => Ok(default),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),

    #[error("MT_VERIFY_SIGNATURE and MT_VERIFY_STATUS cannot both be off in production")]
    UnverifiedWebhooks,
}
