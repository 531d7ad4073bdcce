//! Run State Storage using SQLite

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::StateStore,
};
use chrono::Utc;
use sqlx::{sqlite::SqlitePool, Row};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::db;

/// SQLite-backed key-value store for the resumable run state.
///
/// Each write is an upsert stamped with the write time; `set_many` commits
/// all keys in one transaction so a checkpoint is never half-written.
/// Leases live in their own table and are shared by every process that opens
/// the same file.
pub struct SqliteStateStore {
    pool: SqlitePool,
}

impl SqliteStateStore {
    /// Open (or create) the store in the database file at `db_path`.
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let pool = db::connect_file(db_path.as_ref()).await?;
        Self::with_pool(pool).await
    }

    /// Create an in-memory store (for testing)
    pub async fn in_memory() -> Result<Self> {
        let pool = db::connect_memory().await?;
        Self::with_pool(pool).await
    }

    /// Use an existing pool, creating the table if needed.
    pub async fn with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS run_state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| BridgeError::DatabaseError(format!("Failed to create run_state: {}", e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS run_lease (
                name TEXT PRIMARY KEY,
                holder TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| BridgeError::DatabaseError(format!("Failed to create run_lease: {}", e)))?;

        Ok(Self { pool })
    }
}

const UPSERT: &str = r#"
    INSERT INTO run_state (key, value, updated_at)
    VALUES (?, ?, ?)
    ON CONFLICT(key) DO UPDATE SET
        value = excluded.value,
        updated_at = excluded.updated_at
"#;

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM run_state WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Failed to read {}: {}", key, e)))?;

        Ok(row.map(|row| row.get::<String, _>(0)))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(UPSERT)
            .bind(key)
            .bind(value)
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Failed to write {}: {}", key, e)))?;

        debug!(key = key, "Stored run state value");
        Ok(())
    }

    async fn set_many(&self, entries: &[(&str, String)]) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Failed to begin: {}", e)))?;

        let now = Utc::now().timestamp();
        for (key, value) in entries {
            sqlx::query(UPSERT)
                .bind(*key)
                .bind(value.as_str())
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    BridgeError::DatabaseError(format!("Failed to write {}: {}", key, e))
                })?;
        }

        tx.commit()
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Failed to commit: {}", e)))?;

        debug!(keys = entries.len(), "Stored run state batch");
        Ok(())
    }

    async fn set_many_if(&self, guard: (&str, &str), entries: &[(&str, String)]) -> Result<bool> {
        let (guard_key, expected) = guard;
        // IMMEDIATE takes the write lock up front so the guard cannot change
        // between the read and the writes.
        let mut tx = self
            .pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Failed to begin: {}", e)))?;

        let current: Option<String> = sqlx::query("SELECT value FROM run_state WHERE key = ?")
            .bind(guard_key)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Failed to read {}: {}", guard_key, e)))?
            .map(|row| row.get::<String, _>(0));

        if current.as_deref() != Some(expected) {
            debug!(key = guard_key, "Guard mismatch, batch skipped");
            return Ok(false);
        }

        let now = Utc::now().timestamp();
        for (key, value) in entries {
            sqlx::query(UPSERT)
                .bind(*key)
                .bind(value.as_str())
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    BridgeError::DatabaseError(format!("Failed to write {}: {}", key, e))
                })?;
        }

        tx.commit()
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Failed to commit: {}", e)))?;

        Ok(true)
    }

    async fn delete_all(&self) -> Result<()> {
        sqlx::query("DELETE FROM run_state")
            .execute(&self.pool)
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Failed to clear run_state: {}", e)))?;

        debug!("Cleared run state");
        Ok(())
    }

    async fn try_acquire_lease(&self, name: &str, holder: &str, ttl: Duration) -> Result<bool> {
        let now = Utc::now().timestamp_millis();
        let ttl = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = now.saturating_add(ttl);

        let result = sqlx::query(
            r#"
            INSERT INTO run_lease (name, holder, expires_at)
            VALUES (?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                holder = excluded.holder,
                expires_at = excluded.expires_at
            WHERE run_lease.holder = excluded.holder OR run_lease.expires_at <= ?
            "#,
        )
        .bind(name)
        .bind(holder)
        .bind(expires_at)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| BridgeError::DatabaseError(format!("Failed to take lease {}: {}", name, e)))?;

        let acquired = result.rows_affected() == 1;
        debug!(lease = name, acquired, "Lease attempt");
        Ok(acquired)
    }

    async fn release_lease(&self, name: &str, holder: &str) -> Result<()> {
        sqlx::query("DELETE FROM run_lease WHERE name = ? AND holder = ?")
            .bind(name)
            .bind(holder)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                BridgeError::DatabaseError(format!("Failed to release lease {}: {}", name, e))
            })?;
        Ok(())
    }
}
