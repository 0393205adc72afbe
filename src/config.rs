use std::env;
use thiserror::Error;

use crate::domain::registration::DEFAULT_MAX_ATTEMPTS;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Process configuration, read once at cold start
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Explicit connection URL; takes precedence over `db_secret_name`
    pub database_url: Option<String>,
    /// Secrets Manager id holding the database credentials JSON
    pub db_secret_name: Option<String>,
    pub db_sslmode: String,
    pub kms_key_id: String,
    pub port: u16,
    /// Include internal error text in responses (debug only)
    pub expose_error_details: bool,
    pub registration_max_attempts: u8,
    pub run_migrations: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL")
            .or_else(|_| env::var("RDS_PROXY_URL"))
            .ok()
            .filter(|v| !v.is_empty());
        let db_secret_name = env::var("DB_SECRET_NAME").ok().filter(|v| !v.is_empty());

        if database_url.is_none() && db_secret_name.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL, RDS_PROXY_URL or DB_SECRET_NAME"));
        }

        let kms_key_id = env::var("KMS_KEY_ID")
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing("KMS_KEY_ID"))?;

        Ok(Self {
            database_url,
            db_secret_name,
            db_sslmode: env::var("DB_SSLMODE").unwrap_or_else(|_| "require".to_string()),
            kms_key_id,
            port: parse_var("PORT", 3000)?,
            expose_error_details: parse_var("EXPOSE_ERROR_DETAILS", false)?,
            registration_max_attempts: parse_var("REGISTRATION_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?,
            run_migrations: parse_var("RUN_MIGRATIONS", false)?,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { name, value }),
        _ => Ok(default),
    }
}
