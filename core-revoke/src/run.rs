//! # Run State Machine
//!
//! The single durable record describing one account's revocation run.
//!
//! ## Lifecycle
//!
//! ```text
//! NotStarted ──start──▶ Files ──exhausted──▶ Folders ──exhausted──▶ Complete
//!                        │  ▲                 │  ▲                    │
//!                      stop resume          stop resume            start (fresh)
//!                        ▼  │                 ▼  │                    ▼
//!                      Stopped{Files}      Stopped{Folders}         Files
//! ```
//!
//! Phases only move forward. The stop flag is orthogonal to the phase so a
//! resumed run picks up with the same phase, cursor and counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use bridge_traits::sharing::ItemKind;

use crate::error::{Result, RevokeError};

/// Unique identifier for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self> {
        Uuid::parse_str(s).map(Self).map_err(|e| RevokeError::Corrupt {
            key: "run.id".to_string(),
            message: e.to_string(),
        })
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of the run in the files-then-folders sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    NotStarted,
    Files,
    Folders,
    Complete,
}

impl Phase {
    /// Whether items are still being walked in this phase.
    pub fn is_active(&self) -> bool {
        matches!(self, Phase::Files | Phase::Folders)
    }

    /// Listing walked during this phase.
    pub fn item_kind(&self) -> Option<ItemKind> {
        match self {
            Phase::Files => Some(ItemKind::File),
            Phase::Folders => Some(ItemKind::Folder),
            Phase::NotStarted | Phase::Complete => None,
        }
    }

    /// Phase entered once this one's listing is exhausted.
    pub fn next(&self) -> Option<Phase> {
        match self {
            Phase::Files => Some(Phase::Folders),
            Phase::Folders => Some(Phase::Complete),
            Phase::NotStarted | Phase::Complete => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::NotStarted => "not_started",
            Phase::Files => "files",
            Phase::Folders => "folders",
            Phase::Complete => "complete",
        }
    }
}

impl FromStr for Phase {
    type Err = RevokeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "not_started" => Ok(Phase::NotStarted),
            "files" => Ok(Phase::Files),
            "folders" => Ok(Phase::Folders),
            "complete" => Ok(Phase::Complete),
            _ => Err(RevokeError::InvalidPhase(s.to_string())),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Orchestrator-level state derived from phase and stop flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum RunStatus {
    NotStarted,
    Files,
    Folders,
    Complete,
    Stopped { phase: Phase },
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::NotStarted => f.write_str("not started"),
            RunStatus::Files => f.write_str("processing files"),
            RunStatus::Folders => f.write_str("processing folders"),
            RunStatus::Complete => f.write_str("complete"),
            RunStatus::Stopped { phase } => write!(f, "stopped during {}", phase),
        }
    }
}

/// Cumulative counters for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    pub items_processed: u64,
    pub permissions_removed: u64,
    pub errors: u64,
}

impl RunCounters {
    pub fn add(&mut self, items: u64, removed: u64, errors: u64) {
        self.items_processed += items;
        self.permissions_removed += removed;
        self.errors += errors;
    }
}

/// Durable run record, one per account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    pub run_id: RunId,
    pub phase: Phase,
    pub stopped: bool,
    /// Encoded [`ResumeCursor`](crate::cursor::ResumeCursor), only meaningful within `phase`
    pub resume_cursor: Option<String>,
    pub counters: RunCounters,
    pub started_at: Option<DateTime<Utc>>,
    pub last_updated_at: Option<DateTime<Utc>>,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            run_id: RunId::new(),
            phase: Phase::NotStarted,
            stopped: false,
            resume_cursor: None,
            counters: RunCounters::default(),
            started_at: None,
            last_updated_at: None,
        }
    }
}

impl RunState {
    /// A brand-new run sitting at the start of the files phase.
    pub fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            phase: Phase::Files,
            started_at: Some(now),
            last_updated_at: Some(now),
            ..Self::default()
        }
    }

    pub fn status(&self) -> RunStatus {
        match (self.phase, self.stopped) {
            (phase, true) if phase.is_active() => RunStatus::Stopped { phase },
            (Phase::NotStarted, _) => RunStatus::NotStarted,
            (Phase::Files, _) => RunStatus::Files,
            (Phase::Folders, _) => RunStatus::Folders,
            (Phase::Complete, _) => RunStatus::Complete,
        }
    }

    /// Whether `continue` has work to do.
    pub fn is_running(&self) -> bool {
        self.phase.is_active() && !self.stopped
    }

    /// Replacement record for a fresh start.
    ///
    /// # Errors
    ///
    /// Returns an error unless the run is not started or already complete.
    pub fn restart(&self, now: DateTime<Utc>) -> Result<RunState> {
        self.validate_transition(Phase::Files)?;
        Ok(RunState::fresh(now))
    }

    /// Moves to the next phase, clearing the cursor.
    ///
    /// # Errors
    ///
    /// Returns an error if the run is stopped or has no next phase.
    pub fn advance(&mut self, now: DateTime<Utc>) -> Result<Phase> {
        let next = self.phase.next().ok_or_else(|| RevokeError::InvalidStateTransition {
            from: self.phase.as_str().to_string(),
            to: "next phase".to_string(),
            reason: format!("Phase {} has no successor", self.phase),
        })?;
        self.validate_transition(next)?;

        self.phase = next;
        self.resume_cursor = None;
        self.last_updated_at = Some(now);
        Ok(next)
    }

    /// Marks the run stopped, keeping cursor and counters.
    ///
    /// # Errors
    ///
    /// Returns an error unless a phase is actively running.
    pub fn stop(&mut self, now: DateTime<Utc>) -> Result<()> {
        if !self.is_running() {
            return Err(RevokeError::InvalidStateTransition {
                from: self.status().to_string(),
                to: "stopped".to_string(),
                reason: "Only a running run can be stopped".to_string(),
            });
        }
        self.stopped = true;
        self.last_updated_at = Some(now);
        Ok(())
    }

    /// Clears the stop flag, keeping phase, cursor and counters.
    ///
    /// # Errors
    ///
    /// Returns an error unless the run is stopped.
    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<()> {
        if !matches!(self.status(), RunStatus::Stopped { .. }) {
            return Err(RevokeError::InvalidStateTransition {
                from: self.status().to_string(),
                to: "resumed".to_string(),
                reason: "Only a stopped run can be resumed".to_string(),
            });
        }
        self.stopped = false;
        self.last_updated_at = Some(now);
        Ok(())
    }

    fn validate_transition(&self, to: Phase) -> Result<()> {
        let valid = match (self.phase, to) {
            (Phase::NotStarted, Phase::Files) => true,
            (Phase::Files, Phase::Folders) => !self.stopped,
            (Phase::Folders, Phase::Complete) => !self.stopped,
            // Fresh run after completion
            (Phase::Complete, Phase::Files) => true,

            _ => false,
        };

        if !valid {
            return Err(RevokeError::InvalidStateTransition {
                from: self.phase.as_str().to_string(),
                to: to.as_str().to_string(),
                reason: format!(
                    "Cannot transition from {} to {}",
                    self.status(),
                    to.as_str()
                ),
            });
        }

        Ok(())
    }
}
