//! Configuration management following 12-factor app principles
//!
//! All configuration is loaded from environment variables to ensure
//! clean separation between code and config.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::env;
use std::time::Duration;

/// Output format for the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(anyhow::anyhow!("Unknown LOG_FORMAT: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database connection URL (PostgreSQL)
    pub database_url: String,
    pub database_max_connections: u32,
    pub database_acquire_timeout_secs: u64,

    /// Upper bound for a single unit of work; unset means unbounded
    pub unit_of_work_timeout_secs: Option<u64>,

    /// Runtime configuration
    pub rust_log: String,
    pub log_format: LogFormat,
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        let config = Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL is required"))?,
            database_max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 10)?,
            database_acquire_timeout_secs: parse_or("DATABASE_ACQUIRE_TIMEOUT_SECS", 5)?,

            unit_of_work_timeout_secs: env::var("UNIT_OF_WORK_TIMEOUT_SECS")
                .ok()
                .map(|raw| {
                    raw.parse::<u64>()
                        .map_err(|e| anyhow::anyhow!("UNIT_OF_WORK_TIMEOUT_SECS: {}", e))
                })
                .transpose()?,

            rust_log: env::var("RUST_LOG")
                .unwrap_or_else(|_| "roster=debug,tower_http=info".to_string()),
            log_format: env::var("LOG_FORMAT")
                .ok()
                .map(|raw| raw.parse::<LogFormat>())
                .transpose()?
                .unwrap_or_default(),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),
        };

        Ok(config)
    }

    pub fn unit_of_work_timeout(&self) -> Option<Duration> {
        self.unit_of_work_timeout_secs.map(Duration::from_secs)
    }

    /// Build a connection pool from the database settings
    pub async fn connect_pool(&self) -> Result<PgPool> {
        let pool = PgPoolOptions::new()
            .max_connections(self.database_max_connections)
            .acquire_timeout(Duration::from_secs(self.database_acquire_timeout_secs))
            .connect(&self.database_url)
            .await
            .map_err(|e| anyhow::anyhow!("Database connection failed: {}", e))?;

        Ok(pool)
    }
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{} is invalid: {}", key, e)),
        Err(_) => Ok(default),
    }
}
