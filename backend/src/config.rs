//! Application configuration loaded from environment variables.

use crate::error::{AppError, Result};
use crate::services::export_service::Language;
use std::env;

/// Relational store backend selected at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl StoreBackend {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(AppError::Config(format!(
                "Unknown STORE_BACKEND '{}', expected 'postgres' or 'memory'",
                other
            ))),
        }
    }
}

/// Longest accepted session lifetime: one year
pub const MAX_JWT_EXPIRY_MINUTES: i64 = 525_600;

/// Parse `JWT_EXPIRY_MINUTES`; the value must lie in `1..=MAX_JWT_EXPIRY_MINUTES`.
fn parse_jwt_expiry(value: &str) -> Result<i64> {
    match value.trim().parse::<i64>() {
        Ok(minutes) if (1..=MAX_JWT_EXPIRY_MINUTES).contains(&minutes) => Ok(minutes),
        _ => Err(AppError::Config(format!(
            "JWT_EXPIRY_MINUTES must be between 1 and {}, got '{}'",
            MAX_JWT_EXPIRY_MINUTES, value
        ))),
    }
}

/// Application configuration
#[derive(Clone)]
pub struct Config {
    /// Store backend: "postgres" or "memory"
    pub store_backend: StoreBackend,

    /// Database connection URL (required for the postgres backend)
    pub database_url: Option<String>,

    /// Server bind address (host:port)
    pub bind_address: String,

    /// Log level
    pub log_level: String,

    /// JWT secret key for signing session tokens
    pub jwt_secret: String,

    /// Session token lifetime in minutes
    pub jwt_expiry_minutes: i64,

    /// Language used for CSV headers and labels
    pub display_language: Language,

    /// Page size used when a list request does not specify one
    pub default_page_size: u32,

    /// Mark the session cookie `Secure`
    pub secure_cookies: bool,
}

redacted_debug!(Config {
    show store_backend,
    redact_option database_url,
    show bind_address,
    show log_level,
    redact jwt_secret,
    show jwt_expiry_minutes,
    show display_language,
    show default_page_size,
    show secure_cookies,
});

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let store_backend =
            StoreBackend::parse(&env::var("STORE_BACKEND").unwrap_or_else(|_| "postgres".into()))?;
        let database_url = env::var("DATABASE_URL").ok();
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(AppError::Config("DATABASE_URL not set".into()));
        }

        Ok(Self {
            store_backend,
            database_url,
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            jwt_secret: env::var("JWT_SECRET")
                .map_err(|_| AppError::Config("JWT_SECRET not set".into()))?,
            jwt_expiry_minutes: parse_jwt_expiry(
                &env::var("JWT_EXPIRY_MINUTES").unwrap_or_else(|_| "480".into()),
            )?,
            display_language: Language::parse(
                &env::var("DISPLAY_LANGUAGE").unwrap_or_else(|_| "bg".into()),
            )
            .unwrap_or(Language::Bulgarian),
            default_page_size: env::var("DEFAULT_PAGE_SIZE")
                .unwrap_or_else(|_| "20".into())
                .parse()
                .unwrap_or(20),
            secure_cookies: env::var("SECURE_COOKIES")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        })
    }

    /// Configuration for tests and local tooling: in-memory store, fixed secret.
    pub fn for_memory_store(jwt_secret: &str) -> Self {
        Self {
            store_backend: StoreBackend::Memory,
            database_url: None,
            bind_address: "127.0.0.1:0".into(),
            log_level: "debug".into(),
            jwt_secret: jwt_secret.to_string(),
            jwt_expiry_minutes: 60,
            display_language: Language::English,
            default_page_size: 20,
            secure_cookies: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_backend_parse() {
        assert_eq!(StoreBackend::parse("postgres").unwrap(), StoreBackend::Postgres);
        assert_eq!(StoreBackend::parse("PostgreSQL").unwrap(), StoreBackend::Postgres);
        assert_eq!(StoreBackend::parse(" memory ").unwrap(), StoreBackend::Memory);
        assert!(matches!(
            StoreBackend::parse("mysql"),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_config_debug_redacts_secrets() {
        let mut config = Config::for_memory_store("very-secret-signing-key");
        config.database_url = Some("postgresql://admin:hunter2@db/console".into());
        let output = format!("{:?}", config);
        assert!(!output.contains("very-secret-signing-key"));
        assert!(!output.contains("hunter2"));
        assert!(output.contains("[REDACTED]"));
        assert!(output.contains("bind_address"));
    }

    #[test]
    fn test_jwt_expiry_bounds() {
        assert_eq!(parse_jwt_expiry("480").unwrap(), 480);
        assert_eq!(
            parse_jwt_expiry("525600").unwrap(),
            MAX_JWT_EXPIRY_MINUTES
        );
        for bad in ["0", "-5", "525601", "9223372036854775807", "soon"] {
            assert!(
                matches!(parse_jwt_expiry(bad), Err(AppError::Config(_))),
                "accepted {}",
                bad
            );
        }
    }
}
