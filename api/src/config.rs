//! Process configuration read from the environment (and `.env` when present).

use std::collections::HashMap;
use std::str::FromStr;

pub const MEMORY_DATABASE_URL: &str = "memory://";

const DEFAULT_REGION: &str = "ap-south-1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_CORS_ORIGINS: &[&str] = &["http://localhost:3000", "https://yourdomain.com"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Standalone HTTP server or function-only (serverless) operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Server,
    Function,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseConfig {
    Postgres {
        url: String,
        max_connections: u32,
        migrate: bool,
    },
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub region: String,
    pub credentials: Option<AwsCredentials>,
    pub from_email: Option<String>,
    pub queue_url: Option<String>,
    pub port: u16,
    pub mode: RunMode,
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_vars(std::env::vars().collect())
    }

    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |key: &str| vars.get(key).filter(|v| !v.is_empty()).cloned();

        let database_url = get("DB_URL").ok_or(ConfigError::Missing("DB_URL"))?;
        let database = if database_url == MEMORY_DATABASE_URL {
            DatabaseConfig::Memory
        } else {
            DatabaseConfig::Postgres {
                url: database_url,
                max_connections: parse_or(
                    "DB_MAX_CONNECTIONS",
                    get("DB_MAX_CONNECTIONS"),
                    DEFAULT_MAX_CONNECTIONS,
                )?,
                migrate: parse_or("DB_MIGRATE", get("DB_MIGRATE"), true)?,
            }
        };

        let credentials = match (get("ACCESS_KEY_ID"), get("SECRET_ACCESS_KEY")) {
            (Some(access_key_id), Some(secret_access_key)) => Some(AwsCredentials {
                access_key_id,
                secret_access_key,
            }),
            _ => None,
        };

        let mode = match get("NODE_ENV").as_deref() {
            Some("production") => RunMode::Function,
            _ => RunMode::Server,
        };

        let cors_origins = match get("CORS_ORIGINS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect(),
            None => DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect(),
        };

        Ok(Self {
            database,
            region: get("REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
            credentials,
            from_email: get("FROM_EMAIL"),
            queue_url: get("QUEUE_URL"),
            port: parse_or("PORT", get("PORT"), DEFAULT_PORT)?,
            mode,
            cors_origins,
        })
    }
}

fn parse_or<T: FromStr>(key: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError> {
    match value {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}
