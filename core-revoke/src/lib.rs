//! # Revocation Engine
//!
//! Bulk removal of sharing permissions across every file and folder of a
//! storage account, in resumable slices bounded by a time budget.
//!
//! ## Overview
//!
//! A run walks the account's files, then its folders. For each item every
//! non-owner grant is removed and written to an append-only audit log. Run
//! progress is persisted after every slice and at regular checkpoints, so a
//! timeout, crash or manual stop never loses more than the in-flight page.
//!
//! ## Components
//!
//! - **API Caller** (`caller`): Retry with exponential backoff around every remote call
//! - **Permission Revoker** (`revoker`): Strips link sharing, editors and viewers from one item
//! - **Paginated Walker** (`walker`): Processes one phase within a time budget
//! - **Resume Cursor** (`cursor`): Item-exact position inside a paginated listing
//! - **Run State** (`run`): Phase state machine and counters
//! - **Repository** (`repository`): Key-value persistence of the run state
//! - **Run Orchestrator** (`orchestrator`): `start`, `continue`, `stop`, `reset`, `status`

pub mod caller;
pub mod cursor;
pub mod error;
pub mod orchestrator;
pub mod repository;
pub mod revoker;
pub mod run;
pub mod walker;

pub use caller::{ApiCaller, RetryPolicy};
pub use cursor::ResumeCursor;
pub use error::{Result, RevokeError};
pub use orchestrator::{
    ContinueOutcome, RunDependencies, RunOrchestrator, RunReport, RUN_TASK_ID,
};
pub use repository::RunStateRepository;
pub use revoker::{ItemAborted, RevokeOutcome, Revoker};
pub use run::{Phase, RunCounters, RunId, RunState, RunStatus};
pub use walker::{NoCheckpoint, PhaseCheckpoint, PhaseReport, Walker};
