//! Append-only audit log using SQLite

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{AuditCounts, AuditLog, ErrorRecord, RemovalRecord, RevocationKind},
};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePool, Row};
use std::path::Path;
use tracing::debug;

use crate::db;

/// Two append-only tables, one per record stream.
///
/// Row ids are autoincrementing so reads in id order return records in
/// append order.
pub struct SqliteAuditLog {
    pool: SqlitePool,
}

impl SqliteAuditLog {
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let pool = db::connect_file(db_path.as_ref()).await?;
        Self::with_pool(pool).await
    }

    /// Create an in-memory audit log (for testing)
    pub async fn in_memory() -> Result<Self> {
        let pool = db::connect_memory().await?;
        Self::with_pool(pool).await
    }

    pub async fn with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS removal_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                item_id TEXT NOT NULL,
                item_name TEXT NOT NULL,
                kind TEXT NOT NULL,
                detail TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| BridgeError::DatabaseError(format!("Failed to create removal_log: {}", e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS error_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                item_id TEXT NOT NULL,
                item_name TEXT NOT NULL,
                detail TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| BridgeError::DatabaseError(format!("Failed to create error_log: {}", e)))?;

        Ok(Self { pool })
    }

    async fn count(&self, table: &str) -> Result<u64> {
        let row = sqlx::query(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Failed to count {}: {}", table, e)))?;

        Ok(row.get::<i64, _>(0).max(0) as u64)
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| BridgeError::DatabaseError(format!("Bad timestamp {:?}: {}", raw, e)))
}

#[async_trait]
impl AuditLog for SqliteAuditLog {
    async fn append_removal(&self, record: &RemovalRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO removal_log (timestamp, item_id, item_name, kind, detail) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(record.timestamp.to_rfc3339())
        .bind(&record.item_id)
        .bind(&record.item_name)
        .bind(record.kind.as_str())
        .bind(&record.detail)
        .execute(&self.pool)
        .await
        .map_err(|e| BridgeError::DatabaseError(format!("Failed to append removal: {}", e)))?;

        debug!(item_id = %record.item_id, kind = %record.kind, "Logged removal");
        Ok(())
    }

    async fn append_error(&self, record: &ErrorRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO error_log (timestamp, item_id, item_name, detail) VALUES (?, ?, ?, ?)",
        )
        .bind(record.timestamp.to_rfc3339())
        .bind(&record.item_id)
        .bind(&record.item_name)
        .bind(&record.detail)
        .execute(&self.pool)
        .await
        .map_err(|e| BridgeError::DatabaseError(format!("Failed to append error: {}", e)))?;

        debug!(item_id = %record.item_id, "Logged error");
        Ok(())
    }

    async fn removals(&self) -> Result<Vec<RemovalRecord>> {
        let rows = sqlx::query(
            "SELECT timestamp, item_id, item_name, kind, detail FROM removal_log ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| BridgeError::DatabaseError(format!("Failed to read removal_log: {}", e)))?;

        rows.iter()
            .map(|row| {
                Ok(RemovalRecord {
                    timestamp: parse_timestamp(&row.get::<String, _>(0))?,
                    item_id: row.get(1),
                    item_name: row.get(2),
                    kind: row.get::<String, _>(3).parse::<RevocationKind>()?,
                    detail: row.get(4),
                })
            })
            .collect()
    }

    async fn errors(&self) -> Result<Vec<ErrorRecord>> {
        let rows =
            sqlx::query("SELECT timestamp, item_id, item_name, detail FROM error_log ORDER BY id")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    BridgeError::DatabaseError(format!("Failed to read error_log: {}", e))
                })?;

        rows.iter()
            .map(|row| {
                Ok(ErrorRecord {
                    timestamp: parse_timestamp(&row.get::<String, _>(0))?,
                    item_id: row.get(1),
                    item_name: row.get(2),
                    detail: row.get(3),
                })
            })
            .collect()
    }

    async fn counts(&self) -> Result<AuditCounts> {
        Ok(AuditCounts {
            removals: self.count("removal_log").await?,
            errors: self.count("error_log").await?,
        })
    }

    async fn clear(&self) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Failed to begin: {}", e)))?;

        for table in ["removal_log", "error_log"] {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    BridgeError::DatabaseError(format!("Failed to clear {}: {}", table, e))
                })?;
        }

        tx.commit()
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("Failed to commit: {}", e)))?;

        debug!("Cleared audit log");
        Ok(())
    }
}
