//! PostgreSQL persistence
//!
//! Connection pooling uses deadpool-postgres. [`PgStore`] implements
//! `CrmStore` on top of the pool.

mod store;

pub use store::PgStore;

use crate::config::env_parse;
use crate::error::{ApiError, ApiResult};
use deadpool_postgres::{
    Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime, Timeouts,
};
use std::time::Duration;
use tokio_postgres::NoTls;

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Wait timeout for a pooled connection
    pub timeout: Duration,
    /// Apply the bundled schema on startup
    pub migrate: bool,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "crm".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            max_size: 16,
            timeout: Duration::from_secs(30),
            migrate: true,
        }
    }
}

impl DbConfig {
    /// `None` when `CRM_DB_HOST` is unset, meaning no database is configured.
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("CRM_DB_HOST").ok()?;
        let defaults = Self::default();

        Some(Self {
            host,
            port: env_parse("CRM_DB_PORT").unwrap_or(defaults.port),
            dbname: std::env::var("CRM_DB_NAME").unwrap_or(defaults.dbname),
            user: std::env::var("CRM_DB_USER").unwrap_or(defaults.user),
            password: std::env::var("CRM_DB_PASSWORD").unwrap_or_default(),
            max_size: env_parse("CRM_DB_POOL_SIZE").unwrap_or(defaults.max_size),
            timeout: env_parse::<u64>("CRM_DB_TIMEOUT")
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            migrate: std::env::var("CRM_DB_MIGRATE")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(defaults.migrate),
        })
    }

    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(PoolConfig {
            max_size: self.max_size,
            timeouts: Timeouts::wait_millis(self.timeout.as_millis() as u64),
            ..PoolConfig::default()
        });

        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::database_error(format!("Failed to create pool: {}", e)))
    }
}
