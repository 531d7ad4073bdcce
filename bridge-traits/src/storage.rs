//! Durable State and Audit Log Abstractions
//!
//! Two independent persistence concerns:
//! - [`StateStore`] is a flat key-value store holding the resumable run state.
//! - [`AuditLog`] is an append-only record of every revocation and every
//!   failure, ordered by append time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{BridgeError, Result};

/// Key-value persistence with a lifetime spanning process restarts.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::StateStore;
///
/// async fn remember(store: &dyn StateStore) -> Result<()> {
///     store.set("run.phase", "files").await?;
///     assert_eq!(store.get("run.phase").await?.as_deref(), Some("files"));
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read a value, `None` when the key was never written.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write or overwrite a value.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Write several values atomically.
    ///
    /// The default implementation writes one key at a time; stores backed by
    /// a transactional engine should override it.
    async fn set_many(&self, entries: &[(&str, String)]) -> Result<()> {
        for (key, value) in entries {
            self.set(key, value).await?;
        }
        Ok(())
    }

    /// Write `entries` atomically only if the stored value of `guard.0`
    /// equals `guard.1`. Returns whether the write happened.
    async fn set_many_if(&self, guard: (&str, &str), entries: &[(&str, String)]) -> Result<bool>;

    /// Remove every key. Leases are not keys and survive this.
    async fn delete_all(&self) -> Result<()>;

    /// Take or renew the named lease for `holder` until `ttl` from now.
    ///
    /// Fails (returns `false`) while another holder's lease is unexpired.
    /// The lease is visible to every process sharing the store.
    async fn try_acquire_lease(&self, name: &str, holder: &str, ttl: Duration) -> Result<bool>;

    /// Give up the lease if `holder` still owns it.
    async fn release_lease(&self, name: &str, holder: &str) -> Result<()>;
}

/// Kind of sharing that a removal revoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RevocationKind {
    LinkAnyone,
    LinkDomain,
    Editor,
    Viewer,
}

impl RevocationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevocationKind::LinkAnyone => "LINK_ANYONE",
            RevocationKind::LinkDomain => "LINK_DOMAIN",
            RevocationKind::Editor => "EDITOR",
            RevocationKind::Viewer => "VIEWER",
        }
    }
}

impl fmt::Display for RevocationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RevocationKind {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "LINK_ANYONE" => Ok(RevocationKind::LinkAnyone),
            "LINK_DOMAIN" => Ok(RevocationKind::LinkDomain),
            "EDITOR" => Ok(RevocationKind::Editor),
            "VIEWER" => Ok(RevocationKind::Viewer),
            other => Err(BridgeError::OperationFailed(format!(
                "Unknown revocation kind: {}",
                other
            ))),
        }
    }
}

/// One successful revocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalRecord {
    pub timestamp: DateTime<Utc>,
    pub item_id: String,
    pub item_name: String,
    pub kind: RevocationKind,
    /// Grantee identity, or a description of the link access that was disabled.
    pub detail: String,
}

/// One failure while processing an item or a phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub timestamp: DateTime<Utc>,
    pub item_id: String,
    pub item_name: String,
    pub detail: String,
}

/// Number of records held in each stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditCounts {
    pub removals: u64,
    pub errors: u64,
}

/// Append-only audit trail.
///
/// Records are never updated once appended. [`AuditLog::clear`] exists only
/// for an explicit, user-confirmed reset.
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn append_removal(&self, record: &RemovalRecord) -> Result<()>;

    async fn append_error(&self, record: &ErrorRecord) -> Result<()>;

    /// All removal records in append order.
    async fn removals(&self) -> Result<Vec<RemovalRecord>>;

    /// All error records in append order.
    async fn errors(&self) -> Result<Vec<ErrorRecord>>;

    async fn counts(&self) -> Result<AuditCounts>;

    /// Drop both streams.
    async fn clear(&self) -> Result<()>;
}
