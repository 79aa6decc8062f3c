use crate::config::AppConfig;
use crate::errors::ServiceError;
use metrics::{counter, gauge, histogram};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Configuration for database connection
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections
    pub max_connections: u32,
    /// Minimum number of connections
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
    /// Log every statement through sqlx
    pub sqlx_logging: bool,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(8),
            sqlx_logging: false,
        }
    }
}

impl From<&AppConfig> for DbConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            url: cfg.database_url.clone(),
            max_connections: cfg.db_max_connections,
            min_connections: cfg.db_min_connections,
            connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
            idle_timeout: Duration::from_secs(cfg.db_idle_timeout_secs),
            acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
            sqlx_logging: cfg.is_development(),
        }
    }
}

/// Establishes a connection pool to the database
///
/// # Errors
/// Returns a `ServiceError` if the connection cannot be established
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, ServiceError> {
    debug!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Configuring database connection"
    );

    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(config.sqlx_logging);

    gauge!("amc_db.max_connections", config.max_connections as f64);

    let pool = Database::connect(opt).await.map_err(|e| {
        error!("Database connection failed: {}", e);
        counter!("amc_db.connection_failures", 1);
        ServiceError::db_error(e)
    })?;

    info!(
        "Database connection pool established (max_connections={})",
        config.max_connections
    );
    Ok(pool)
}

/// Establish DB pool using AppConfig tuning
pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    let db_cfg: DbConfig = cfg.into();
    establish_connection_with_config(&db_cfg).await
}

/// Runs the embedded migrations against an open pool
pub async fn run_migrations(pool: &DbPool) -> Result<(), ServiceError> {
    info!("Running database migrations");
    let start = Instant::now();

    let result = crate::migrator::Migrator::up(pool, None)
        .await
        .map_err(ServiceError::db_error);

    let elapsed = start.elapsed();
    match &result {
        Ok(_) => info!("Database migrations completed in {:?}", elapsed),
        Err(e) => error!("Database migrations failed after {:?}: {}", elapsed, e),
    }

    result
}

/// Checks if the database connection is active, returning the round trip time
pub async fn check_connection(pool: &DbPool) -> Result<Duration, ServiceError> {
    let start = Instant::now();
    let result = pool.ping().await;
    let elapsed = start.elapsed();

    match result {
        Ok(()) => {
            debug!("Database ping succeeded in {:?}", elapsed);
            histogram!("amc_db.ping_seconds", elapsed.as_secs_f64());
            Ok(elapsed)
        }
        Err(e) => {
            error!("Database ping failed after {:?}: {}", elapsed, e);
            counter!("amc_db.connection_failures", 1);
            Err(ServiceError::ServiceUnavailable(
                "Database connection failed".to_string(),
            ))
        }
    }
}

/// Closes the database connection pool
pub async fn close_pool(pool: DbPool) -> Result<(), ServiceError> {
    info!("Closing database connection pool");
    pool.close().await.map_err(ServiceError::db_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config() -> DbConfig {
        DbConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn connects_migrates_and_pings_sqlite() {
        let pool = establish_connection_with_config(&memory_config())
            .await
            .expect("connect");
        run_migrations(&pool).await.expect("migrate");
        // Re-running is a no-op
        run_migrations(&pool).await.expect("migrate twice");
        assert!(check_connection(&pool).await.is_ok());
        close_pool(pool).await.expect("close");
    }

    #[test]
    fn app_config_tuning_flows_into_db_config() {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".into(),
            "x".repeat(64),
            "production".into(),
        );
        cfg.db_max_connections = 42;
        let db_cfg = DbConfig::from(&cfg);
        assert_eq!(db_cfg.max_connections, 42);
        assert!(!db_cfg.sqlx_logging);
    }
}
