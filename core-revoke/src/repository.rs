//! Persistence of [`RunState`] in a key-value [`StateStore`].
//!
//! Each field lives under its own `run.*` key. A store with no `run.phase`
//! key holds no run, which loads as a not-started state.
//!
//! Several processes may share one store. Writes made while a run is in
//! flight are guarded on `run.id`, so they are dropped once the run has been
//! reset, and progress saves never touch `run.stopped`, so a stop issued by
//! another process survives them. Exclusive access to the run is a lease
//! named [`LEASE_NAME`].

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use bridge_traits::storage::StateStore;
use chrono::{DateTime, Utc};

use crate::error::{Result, RevokeError};
use crate::run::{Phase, RunCounters, RunId, RunState};

pub const KEY_RUN_ID: &str = "run.id";
pub const KEY_PHASE: &str = "run.phase";
pub const KEY_STOPPED: &str = "run.stopped";
pub const KEY_RESUME_CURSOR: &str = "run.resume_cursor";
pub const KEY_ITEMS_PROCESSED: &str = "run.items_processed";
pub const KEY_PERMISSIONS_REMOVED: &str = "run.permissions_removed";
pub const KEY_ERRORS: &str = "run.errors";
pub const KEY_STARTED_AT: &str = "run.started_at";
pub const KEY_LAST_UPDATED_AT: &str = "run.last_updated_at";

pub const LEASE_NAME: &str = "run.lease";

#[derive(Clone)]
pub struct RunStateRepository {
    store: Arc<dyn StateStore>,
}

impl RunStateRepository {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Reads the current run.
    ///
    /// # Errors
    ///
    /// Returns `RevokeError::Corrupt` if a stored value cannot be parsed, or
    /// a bridge error if the store is unreachable.
    pub async fn load(&self) -> Result<RunState> {
        let Some(phase) = self.store.get(KEY_PHASE).await? else {
            return Ok(RunState::default());
        };

        let run_id = match self.store.get(KEY_RUN_ID).await? {
            Some(id) => RunId::from_string(&id)?,
            None => RunId::new(),
        };

        let stopped = self.parsed::<bool>(KEY_STOPPED).await?.unwrap_or(false);
        let resume_cursor = self
            .store
            .get(KEY_RESUME_CURSOR)
            .await?
            .filter(|cursor| !cursor.is_empty());

        let counters = RunCounters {
            items_processed: self.parsed(KEY_ITEMS_PROCESSED).await?.unwrap_or(0),
            permissions_removed: self.parsed(KEY_PERMISSIONS_REMOVED).await?.unwrap_or(0),
            errors: self.parsed(KEY_ERRORS).await?.unwrap_or(0),
        };

        Ok(RunState {
            run_id,
            phase: Phase::from_str(&phase).map_err(|e| corrupt(KEY_PHASE, e))?,
            stopped,
            resume_cursor,
            counters,
            started_at: self.timestamp(KEY_STARTED_AT).await?,
            last_updated_at: self.timestamp(KEY_LAST_UPDATED_AT).await?,
        })
    }

    /// Writes every field in one batch.
    pub async fn save(&self, state: &RunState) -> Result<()> {
        let entries = [
            (KEY_RUN_ID, state.run_id.to_string()),
            (KEY_PHASE, state.phase.as_str().to_string()),
            (KEY_STOPPED, state.stopped.to_string()),
            (
                KEY_RESUME_CURSOR,
                state.resume_cursor.clone().unwrap_or_default(),
            ),
            (
                KEY_ITEMS_PROCESSED,
                state.counters.items_processed.to_string(),
            ),
            (
                KEY_PERMISSIONS_REMOVED,
                state.counters.permissions_removed.to_string(),
            ),
            (KEY_ERRORS, state.counters.errors.to_string()),
            (KEY_STARTED_AT, rfc3339(state.started_at)),
            (KEY_LAST_UPDATED_AT, rfc3339(state.last_updated_at)),
        ];

        self.store.set_many(&entries).await?;
        Ok(())
    }

    /// Writes phase, cursor, counters and timestamps of `state` if the stored
    /// run is still `state.run_id`. Leaves the stop flag alone.
    ///
    /// Returns `false` when the run was reset or replaced in the meantime.
    pub async fn save_progress(&self, state: &RunState) -> Result<bool> {
        let run_id = state.run_id.to_string();
        let entries = [
            (KEY_PHASE, state.phase.as_str().to_string()),
            (
                KEY_RESUME_CURSOR,
                state.resume_cursor.clone().unwrap_or_default(),
            ),
            (
                KEY_ITEMS_PROCESSED,
                state.counters.items_processed.to_string(),
            ),
            (
                KEY_PERMISSIONS_REMOVED,
                state.counters.permissions_removed.to_string(),
            ),
            (KEY_ERRORS, state.counters.errors.to_string()),
            (KEY_LAST_UPDATED_AT, rfc3339(state.last_updated_at)),
        ];

        Ok(self
            .store
            .set_many_if((KEY_RUN_ID, &run_id), &entries)
            .await?)
    }

    /// Sets the stop flag of run `run_id`; `false` if that run is gone.
    pub async fn mark_stopped(&self, run_id: &RunId, at: DateTime<Utc>) -> Result<bool> {
        let run_id = run_id.to_string();
        let entries = [
            (KEY_STOPPED, true.to_string()),
            (KEY_LAST_UPDATED_AT, at.to_rfc3339()),
        ];

        Ok(self
            .store
            .set_many_if((KEY_RUN_ID, &run_id), &entries)
            .await?)
    }

    /// Whether run `run_id` should yield: it was stopped, reset or replaced.
    pub async fn stop_requested(&self, run_id: &RunId) -> Result<bool> {
        let current = self.store.get(KEY_RUN_ID).await?;
        if current.as_deref() != Some(run_id.to_string().as_str()) {
            return Ok(true);
        }
        Ok(self.parsed::<bool>(KEY_STOPPED).await?.unwrap_or(false))
    }

    /// Takes or renews the run lease for `holder`.
    pub async fn acquire_lease(&self, holder: &str, ttl: Duration) -> Result<bool> {
        Ok(self.store.try_acquire_lease(LEASE_NAME, holder, ttl).await?)
    }

    pub async fn release_lease(&self, holder: &str) -> Result<()> {
        self.store.release_lease(LEASE_NAME, holder).await?;
        Ok(())
    }

    /// Drops the run entirely.
    pub async fn clear(&self) -> Result<()> {
        self.store.delete_all().await?;
        Ok(())
    }

    async fn parsed<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.store.get(key).await? {
            Some(value) => value.parse::<T>().map(Some).map_err(|e| corrupt(key, e)),
            None => Ok(None),
        }
    }

    async fn timestamp(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        match self.store.get(key).await?.filter(|value| !value.is_empty()) {
            Some(value) => DateTime::parse_from_rfc3339(&value)
                .map(|ts| Some(ts.with_timezone(&Utc)))
                .map_err(|e| corrupt(key, e)),
            None => Ok(None),
        }
    }
}

fn rfc3339(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|ts| ts.to_rfc3339()).unwrap_or_default()
}

fn corrupt(key: &str, error: impl std::fmt::Display) -> RevokeError {
    RevokeError::Corrupt {
        key: key.to_string(),
        message: error.to_string(),
    }
}
