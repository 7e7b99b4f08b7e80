//! PostgreSQL client
//!
//! Pooled connection handling, schema migration and named advisory locks.
//! All store adapters share one [`Db`] value; transactions are opened per
//! operation at ReadCommitted isolation.

use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use secrecy::ExposeSecret;
use std::time::Duration;
use deadpool_postgres::Transaction;
use tokio_postgres::{IsolationLevel, NoTls};

use crate::config::schema::DatabaseConfig;
use crate::domain::errors::BeaconError;
use crate::domain::result::Result;

/// Pooled PostgreSQL client for Beacon
#[derive(Clone)]
pub struct Db {
    pool: Pool,
    statement_timeout: Duration,
}

impl Db {
    /// Creates a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection string cannot be parsed or the
    /// pool cannot be created. No connection is attempted yet.
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let pg_config: tokio_postgres::Config = config
            .connection_string
            .expose_secret()
            .as_ref()
            .parse()
            .map_err(|e| {
                BeaconError::Configuration(format!("invalid PostgreSQL connection string: {e}"))
            })?;

        let manager = Manager::from_config(
            pg_config,
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );

        let timeout = Duration::from_secs(config.connection_timeout_seconds);
        let pool = Pool::builder(manager)
            .max_size(config.max_connections)
            .wait_timeout(Some(timeout))
            .create_timeout(Some(timeout))
            .recycle_timeout(Some(timeout))
            .build()
            .map_err(|e| BeaconError::Database(format!("failed to create connection pool: {e}")))?;

        Ok(Self {
            pool,
            statement_timeout: Duration::from_secs(config.statement_timeout_seconds),
        })
    }

    /// Tests the connection by running a trivial query.
    pub async fn test_connection(&self) -> Result<()> {
        let conn = self.get_connection().await?;
        conn.query_one("SELECT 1", &[])
            .await
            .map_err(|e| BeaconError::Database(format!("connection test failed: {e}")))?;
        tracing::info!("PostgreSQL connection test successful");
        Ok(())
    }

    /// Applies the schema migration, creating tables and indexes if they
    /// don't exist.
    pub async fn ensure_schema(&self) -> Result<()> {
        let conn = self.get_connection().await?;
        let migration_sql = include_str!("../../../migrations/001_initial_schema.sql");
        conn.batch_execute(migration_sql)
            .await
            .map_err(|e| BeaconError::Database(format!("failed to execute migration: {e}")))?;
        tracing::info!("PostgreSQL schema initialized");
        Ok(())
    }

    /// Gets a connection from the pool with the statement timeout applied.
    pub async fn get_connection(&self) -> Result<deadpool_postgres::Object> {
        let conn = self
            .pool
            .get()
            .await
            .map_err(|e| BeaconError::Database(format!("failed to get connection from pool: {e}")))?;
        conn.execute(
            &format!(
                "SET statement_timeout = {}",
                self.statement_timeout.as_millis()
            ),
            &[],
        )
        .await
        .map_err(|e| BeaconError::Database(format!("failed to set statement timeout: {e}")))?;
        Ok(conn)
    }

    /// Acquires the named advisory lock, stealing it if its TTL lapsed.
    ///
    /// Returns a [`LockHandle`] whose `release` must be called on every
    /// exit path; a handle that is never released frees itself only when
    /// the TTL expires, at which point another worker may assume the
    /// guarded work.
    ///
    /// # Errors
    ///
    /// [`BeaconError::AlreadyLocked`] when another worker holds a live
    /// lock of the same name.
    pub async fn try_lock(&self, lock_id: &str, ttl: Duration) -> Result<LockHandle> {
        let conn = self.get_connection().await?;
        let row = conn
            .query_opt(
                "INSERT INTO advisory_lock (lock_id, expires_at)
                 VALUES ($1, now() + make_interval(secs => $2))
                 ON CONFLICT (lock_id) DO UPDATE
                     SET expires_at = now() + make_interval(secs => $2)
                     WHERE advisory_lock.expires_at < now()
                 RETURNING lock_id",
                &[&lock_id, &ttl.as_secs_f64()],
            )
            .await
            .map_err(|e| BeaconError::Database(format!("acquiring lock {lock_id}: {e}")))?;

        if row.is_none() {
            return Err(BeaconError::AlreadyLocked(lock_id.to_string()));
        }

        tracing::debug!(lock_id, ttl_secs = ttl.as_secs(), "acquired advisory lock");
        Ok(LockHandle {
            lock_id: lock_id.to_string(),
            db: self.clone(),
        })
    }

    /// Pool statistics, for diagnostics.
    pub fn pool_status(&self) -> deadpool_postgres::Status {
        self.pool.status()
    }
}

/// Starts a ReadCommitted transaction on a pooled connection.
pub async fn read_committed(conn: &mut deadpool_postgres::Object) -> Result<Transaction<'_>> {
    conn.build_transaction()
        .isolation_level(IsolationLevel::ReadCommitted)
        .start()
        .await
        .map_err(|e| BeaconError::Database(format!("starting transaction: {e}")))
}

/// Held advisory lock
///
/// The row-backed lock stays visible to other workers until released or
/// until its TTL lapses.
pub struct LockHandle {
    lock_id: String,
    db: Db,
}

impl LockHandle {
    /// The name this lock was acquired under.
    pub fn lock_id(&self) -> &str {
        &self.lock_id
    }

    /// Releases the lock.
    pub async fn release(self) -> Result<()> {
        let conn = self.db.get_connection().await?;
        conn.execute(
            "DELETE FROM advisory_lock WHERE lock_id = $1",
            &[&self.lock_id],
        )
        .await
        .map_err(|e| BeaconError::Database(format!("releasing lock {}: {e}", self.lock_id)))?;
        tracing::debug!(lock_id = %self.lock_id, "released advisory lock");
        Ok(())
    }
}
