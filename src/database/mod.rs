pub mod repositories;
pub mod schema;
pub mod store;

pub use store::PgStore;

use anyhow::{Context, Result};
use serde::Deserialize;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use tracing::{info, warn};

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    /// Connection attempts before giving up, with exponential backoff in between
    pub connect_attempts: usize,
    /// Run the idempotent bootstrap DDL on startup
    pub create_schema: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/pvsite".to_string(),
            max_connections: 10,
            min_connections: 2,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,
            connect_attempts: 5,
            create_schema: false,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl DatabaseConfig {
    /// Load configuration from `DATABASE_URL` and `DB_*` variables
    pub fn from_env() -> Result<Self> {
        let url = std::env::var("DATABASE_URL")
            .context("DATABASE_URL environment variable not set")?;
        let defaults = Self::default();

        Ok(Self {
            url,
            max_connections: env_or("DB_MAX_CONNECTIONS", defaults.max_connections),
            min_connections: env_or("DB_MIN_CONNECTIONS", defaults.min_connections),
            acquire_timeout_secs: env_or("DB_ACQUIRE_TIMEOUT_SECS", defaults.acquire_timeout_secs),
            idle_timeout_secs: env_or("DB_IDLE_TIMEOUT_SECS", defaults.idle_timeout_secs),
            connect_attempts: env_or("DB_CONNECT_ATTEMPTS", defaults.connect_attempts),
            create_schema: env_or("DB_CREATE_SCHEMA", defaults.create_schema),
        })
    }
}

/// Database connection pool with retry logic and health checks
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Initializing database connection pool");

        let pool = Self::connect_with_retry(config, config.connect_attempts.max(1)).await?;
        ping(&pool).await?;

        if config.create_schema {
            schema::create_schema(&pool).await?;
        }

        info!("Database connection pool initialized");
        Ok(Self { pool })
    }

    /// Connect with exponential backoff retry logic
    async fn connect_with_retry(config: &DatabaseConfig, max_attempts: usize) -> Result<PgPool> {
        let mut attempt = 0;
        let mut delay = Duration::from_secs(1);

        loop {
            attempt += 1;
            match Self::try_connect(config).await {
                Ok(pool) => return Ok(pool),
                Err(e) if attempt >= max_attempts => {
                    return Err(e).context(format!(
                        "Failed to connect to database after {} attempts",
                        max_attempts
                    ));
                }
                Err(e) => {
                    warn!(
                        attempt,
                        max_attempts,
                        error = %e,
                        "Database connection failed, retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }

    async fn try_connect(config: &DatabaseConfig) -> Result<PgPool> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .connect(&config.url)
            .await
            .context("Failed to create database pool")?;

        Ok(pool)
    }

    pub async fn health_check(&self) -> Result<()> {
        ping(&self.pool).await
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Store backed by this pool
    pub fn store(&self) -> PgStore {
        PgStore::new(self.pool.clone())
    }

    /// Gracefully close the database connection pool
    pub async fn close(self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }
}

async fn ping(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .context("Database health check failed")?;
    Ok(())
}
