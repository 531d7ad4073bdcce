//! # Run Orchestrator
//!
//! Sequences a revocation run through its phases and exposes the control
//! operations `start`, `continue`, `stop`, `reset` and `status`.
//!
//! ## Invocation Model
//!
//! Each call to [`RunOrchestrator::continue_run`] walks the current phase for
//! at most one time budget and persists where it stopped. `start` registers a
//! recurring scheduler task that keeps calling `continue_run` until the run
//! completes, at which point the task cancels itself.
//!
//! Invocations never overlap: the scheduler awaits each run of its handler,
//! and `continue_run` additionally holds a single-flight lock. A call that
//! loses the lock returns [`ContinueOutcome::Busy`] without touching state.
//!
//! Across processes sharing one state store, the run is guarded by a lease
//! in the store. `continue_run` returns `Busy` while another process holds
//! it, and renews its own lease at every checkpoint.
//!
//! ## Stopping
//!
//! `stop` and `reset` cancel the in-flight invocation's token, then wait for
//! the lock so that the invocation has persisted its cursor before the state
//! is changed underneath it. A stop issued from another process is a stored
//! flag; the walker polls it at every item boundary and progress saves never
//! overwrite it. `stop` then waits for the lease to be given up.
//!
//! ## Halting
//!
//! A rejected credential fails every later call the same way. The invocation
//! saves its progress, cancels the recurring task and returns
//! [`RevokeError::Halted`]; the run stays active and `continue` picks it up
//! once the credential is fixed.

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use bridge_traits::background::{Scheduler, TaskHandler, TaskId};
use bridge_traits::error::BridgeError;
use bridge_traits::notification::{Notifier, RunSummary};
use bridge_traits::sharing::{Item, ItemSource, SharingApi};
use bridge_traits::storage::{AuditCounts, AuditLog, StateStore};
use bridge_traits::time::Clock;
use core_runtime::config::RevokeConfig;
use core_runtime::events::{CoreEvent, EventBus, RunEvent};
use core_runtime::logging::redact_if_sensitive;
use futures::FutureExt;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::caller::{ApiCaller, RetryPolicy};
use crate::cursor::ResumeCursor;
use crate::error::{Result, RevokeError};
use crate::repository::RunStateRepository;
use crate::revoker::{RevokeOutcome, Revoker};
use crate::run::{Phase, RunState, RunStatus};
use crate::walker::{PhaseCheckpoint, PhaseReport, Walker};

/// Scheduler task that drives `continue_run`.
pub const RUN_TASK_ID: &str = "revoke-run";

/// Slack on top of the time budget before an unrenewed lease expires.
const LEASE_GRACE: Duration = Duration::from_secs(120);
const LEASE_POLL: Duration = Duration::from_millis(100);

/// External collaborators of a run.
#[derive(Clone)]
pub struct RunDependencies {
    pub source: Arc<dyn ItemSource>,
    pub sharing: Arc<dyn SharingApi>,
    pub state_store: Arc<dyn StateStore>,
    pub audit: Arc<dyn AuditLog>,
    pub scheduler: Arc<dyn Scheduler>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
    pub events: EventBus,
}

/// What a single `continue_run` call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContinueOutcome {
    /// Another invocation holds the run.
    Busy,
    /// No run has been started.
    Idle,
    /// The run is stopped and waits for `start`.
    Stopped,
    /// The phase was walked for one budget and is not finished yet.
    Progressed { phase: Phase, report: PhaseReport },
    /// The phase finished and the next one is queued.
    PhaseAdvanced {
        completed: Phase,
        next: Phase,
        report: PhaseReport,
    },
    /// The folders phase finished and the run is complete.
    Completed(RunSummary),
    /// Nothing left to do.
    AlreadyComplete,
}

/// Snapshot returned by `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub state: RunState,
    pub status: RunStatus,
    pub audit: AuditCounts,
    /// Whether the recurring task is alive in this process
    pub scheduled: bool,
}

pub struct RunOrchestrator {
    repository: RunStateRepository,
    walker: Walker,
    sharing: Arc<dyn SharingApi>,
    audit: Arc<dyn AuditLog>,
    scheduler: Arc<dyn Scheduler>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    events: EventBus,
    caller: ApiCaller,
    config: RevokeConfig,
    task_id: TaskId,
    /// Lease holder name of this instance
    holder: String,
    invocation: Mutex<()>,
    cancel: Mutex<CancellationToken>,
}

impl RunOrchestrator {
    pub fn new(config: RevokeConfig, deps: RunDependencies) -> Self {
        let caller = ApiCaller::new(RetryPolicy::from(&config));
        let revoker = Revoker::new(
            Arc::clone(&deps.sharing),
            Arc::clone(&deps.audit),
            caller.clone(),
            Arc::clone(&deps.clock),
        );
        let walker = Walker::new(
            deps.source,
            revoker,
            Arc::clone(&deps.audit),
            caller.clone(),
            Arc::clone(&deps.clock),
            config.checkpoint_interval,
        );

        Self {
            repository: RunStateRepository::new(deps.state_store),
            walker,
            sharing: deps.sharing,
            audit: deps.audit,
            scheduler: deps.scheduler,
            notifier: deps.notifier,
            clock: deps.clock,
            events: deps.events,
            caller,
            config,
            task_id: TaskId::new(RUN_TASK_ID),
            holder: Uuid::new_v4().to_string(),
            invocation: Mutex::new(()),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Starts a fresh run, or resumes a stopped one, and schedules `continue_run`.
    ///
    /// The sharing API is contacted before anything is written, so a bad
    /// credential never leaves a half-initialized run behind.
    ///
    /// # Errors
    ///
    /// - `RevokeError::Preflight` if the account cannot be reached
    /// - `RevokeError::InvalidStateTransition` if a run is already active
    /// - `RevokeError::RunLocked` if another process keeps the run lease
    /// - `RevokeError::Scheduler` if the recurring task cannot be registered
    #[instrument(skip(self))]
    pub async fn start(self: &Arc<Self>) -> Result<RunState> {
        self.preflight().await?;

        let (state, resumed) = {
            let _guard = self.invocation.lock().await;
            if !self.wait_for_lease().await? {
                return Err(RevokeError::RunLocked("start".to_string()));
            }
            let initialized = self.initialize().await;
            self.release_lease().await;
            initialized?
        };

        info!(run_id = %state.run_id, phase = %state.phase, resumed, "Run started");
        self.emit(RunEvent::Started {
            run_id: state.run_id.to_string(),
            resumed,
        });

        self.schedule().await?;
        Ok(state)
    }

    async fn initialize(&self) -> Result<(RunState, bool)> {
        let now = self.clock.now();
        let current = self.repository.load().await?;

        let (state, resumed) = match current.status() {
            RunStatus::Stopped { .. } => {
                let mut state = current;
                state.resume(now)?;
                (state, true)
            }
            RunStatus::NotStarted | RunStatus::Complete => (current.restart(now)?, false),
            RunStatus::Files | RunStatus::Folders => {
                return Err(RevokeError::InvalidStateTransition {
                    from: current.status().to_string(),
                    to: "started".to_string(),
                    reason: "A run is already in progress".to_string(),
                });
            }
        };

        self.repository.save(&state).await?;
        *self.cancel.lock().await = CancellationToken::new();
        Ok((state, resumed))
    }

    /// Schedules `continue_run` for a run that is already active, as after a
    /// process restart. State is left as it is.
    ///
    /// # Errors
    ///
    /// - `RevokeError::Preflight` if the account cannot be reached
    /// - `RevokeError::InvalidStateTransition` unless a phase is running
    #[instrument(skip(self))]
    pub async fn attach(self: &Arc<Self>) -> Result<RunState> {
        self.preflight().await?;

        let state = self.repository.load().await?;
        if !state.is_running() {
            return Err(RevokeError::InvalidStateTransition {
                from: state.status().to_string(),
                to: "attached".to_string(),
                reason: "Only a running run can be attached to".to_string(),
            });
        }

        info!(run_id = %state.run_id, phase = %state.phase, "Attached to running run");
        self.schedule().await?;
        Ok(state)
    }

    /// Walks the current phase for one time budget.
    ///
    /// # Errors
    ///
    /// - `RevokeError::Halted` if the credential was rejected; the recurring
    ///   task is cancelled and progress is kept
    /// - a store error if run state cannot be loaded or saved
    ///
    /// Other remote and audit failures are absorbed into the phase report.
    #[instrument(skip(self))]
    pub async fn continue_run(&self) -> Result<ContinueOutcome> {
        let Ok(_guard) = self.invocation.try_lock() else {
            debug!("Another invocation is running");
            return Ok(ContinueOutcome::Busy);
        };
        if !self
            .repository
            .acquire_lease(&self.holder, self.lease_ttl())
            .await?
        {
            debug!("Run lease held by another process");
            return Ok(ContinueOutcome::Busy);
        }

        let outcome = self.walk_once().await;
        self.release_lease().await;
        outcome
    }

    async fn walk_once(&self) -> Result<ContinueOutcome> {
        let mut state = self.repository.load().await?;
        let phase = state.phase;
        let Some(kind) = phase.item_kind() else {
            return match phase {
                Phase::Complete => {
                    self.cancel_schedule().await;
                    Ok(ContinueOutcome::AlreadyComplete)
                }
                _ => Ok(ContinueOutcome::Idle),
            };
        };
        if state.stopped {
            self.cancel_schedule().await;
            return Ok(ContinueOutcome::Stopped);
        }

        let cursor = state
            .resume_cursor
            .as_deref()
            .map(ResumeCursor::decode)
            .transpose()?;
        let cancel = self.cancel.lock().await.clone();

        self.emit(RunEvent::PhaseStarted {
            run_id: state.run_id.to_string(),
            phase: phase.to_string(),
            resumed: cursor.is_some(),
        });

        let progress = RunProgress {
            orchestrator: self,
            base: state.clone(),
        };
        let report = self
            .walker
            .process_phase(kind, cursor, self.config.time_budget, &cancel, &progress)
            .await;

        let now = self.clock.now();
        state
            .counters
            .add(report.processed, report.removed, report.errors);
        state.resume_cursor = report.next_cursor.as_ref().map(ResumeCursor::encode);
        state.last_updated_at = Some(now);

        if let Some(message) = &report.failure {
            self.emit(RunEvent::PhaseFailed {
                run_id: state.run_id.to_string(),
                phase: phase.to_string(),
                message: message.clone(),
            });
        }

        if let Some(message) = report.halted.clone() {
            self.repository.save_progress(&state).await?;
            self.cancel_schedule().await;
            error!(
                run_id = %state.run_id,
                phase = %phase,
                error = %message,
                "Run halted, fix the credential and continue"
            );
            self.emit(RunEvent::Halted {
                run_id: state.run_id.to_string(),
                phase: phase.to_string(),
                message: message.clone(),
            });
            return Err(RevokeError::Halted(message));
        }

        if !report.complete {
            if !self.repository.save_progress(&state).await? {
                warn!(run_id = %state.run_id, "Run was reset while walking, progress dropped");
                return Ok(ContinueOutcome::Idle);
            }
            info!(
                phase = %phase,
                processed = report.processed,
                total_processed = state.counters.items_processed,
                "Time budget used, progress saved"
            );
            return Ok(ContinueOutcome::Progressed { phase, report });
        }

        let next = state.advance(now)?;
        if !self.repository.save_progress(&state).await? {
            warn!(run_id = %state.run_id, "Run was reset while walking, progress dropped");
            return Ok(ContinueOutcome::Idle);
        }
        info!(completed = %phase, next = %next, "Phase completed");
        self.emit(RunEvent::PhaseCompleted {
            run_id: state.run_id.to_string(),
            phase: phase.to_string(),
        });

        if next != Phase::Complete {
            return Ok(ContinueOutcome::PhaseAdvanced {
                completed: phase,
                next,
                report,
            });
        }

        Ok(ContinueOutcome::Completed(self.complete(&state).await))
    }

    /// Stops the run at the next item boundary, keeping its progress.
    ///
    /// When another process is walking the run, this waits until it has
    /// yielded and saved, up to one lease lifetime.
    ///
    /// # Errors
    ///
    /// Returns `RevokeError::InvalidStateTransition` if no run is active.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<RunState> {
        self.cancel_schedule().await;
        self.cancel.lock().await.cancel();

        let _guard = self.invocation.lock().await;
        let mut state = self.repository.load().await?;
        let now = self.clock.now();
        state.stop(now)?;
        if !self.repository.mark_stopped(&state.run_id, now).await? {
            return Err(RevokeError::InvalidStateTransition {
                from: RunStatus::NotStarted.to_string(),
                to: "stopped".to_string(),
                reason: "The run was reset".to_string(),
            });
        }

        if self.wait_for_lease().await? {
            self.release_lease().await;
        } else {
            warn!("Another process still holds the run, it will stop at its next item boundary");
        }
        let state = self.repository.load().await?;

        info!(
            run_id = %state.run_id,
            phase = %state.phase,
            items_processed = state.counters.items_processed,
            "Run stopped"
        );
        self.emit(RunEvent::Stopped {
            run_id: state.run_id.to_string(),
            items_processed: state.counters.items_processed,
        });
        Ok(state)
    }

    /// Wipes run state and both audit streams.
    ///
    /// # Errors
    ///
    /// Returns `RevokeError::RunLocked` if another process does not give up
    /// the run within one lease lifetime.
    #[instrument(skip(self))]
    pub async fn reset(&self) -> Result<()> {
        self.cancel_schedule().await;
        self.cancel.lock().await.cancel();

        let _guard = self.invocation.lock().await;
        let state = self.repository.load().await?;
        if state.is_running() {
            self.repository
                .mark_stopped(&state.run_id, self.clock.now())
                .await?;
        }
        if !self.wait_for_lease().await? {
            return Err(RevokeError::RunLocked("reset".to_string()));
        }

        let cleared = self.clear_all().await;
        self.release_lease().await;
        cleared?;

        warn!("Run state and audit log cleared");
        self.emit(RunEvent::Reset);
        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        self.repository.clear().await?;
        self.audit.clear().await?;
        Ok(())
    }

    pub async fn status(&self) -> Result<RunReport> {
        let state = self.repository.load().await?;
        let audit = self.audit.counts().await?;
        Ok(RunReport {
            status: state.status(),
            state,
            audit,
            scheduled: self.scheduler.is_scheduled(&self.task_id).await,
        })
    }

    async fn preflight(&self) -> Result<()> {
        let owner = self
            .caller
            .call("owner_identity", || self.sharing.owner_identity())
            .await
            .map_err(|e| RevokeError::Preflight(e.to_string()))?;
        info!(owner = %redact_if_sensitive("owner", &owner), "Account reachable");
        Ok(())
    }

    fn lease_ttl(&self) -> Duration {
        self.config.time_budget + LEASE_GRACE
    }

    /// Polls for the run lease for up to one lease lifetime.
    async fn wait_for_lease(&self) -> Result<bool> {
        let ttl = self.lease_ttl();
        let deadline = Instant::now() + ttl;
        loop {
            if self.repository.acquire_lease(&self.holder, ttl).await? {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(LEASE_POLL).await;
        }
    }

    async fn release_lease(&self) {
        if let Err(e) = self.repository.release_lease(&self.holder).await {
            warn!(error = %e, "Failed to release run lease");
        }
    }

    async fn schedule(self: &Arc<Self>) -> Result<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        let handler: TaskHandler = Arc::new(move || {
            let weak = weak.clone();
            async move {
                let Some(orchestrator) = weak.upgrade() else {
                    return Ok(());
                };
                orchestrator
                    .continue_run()
                    .await
                    .map(|outcome| debug!(?outcome, "Scheduled invocation finished"))
                    .map_err(|e| BridgeError::OperationFailed(e.to_string()))
            }
            .boxed()
        });

        self.scheduler
            .schedule_recurring(&self.task_id, self.config.schedule_interval, handler)
            .await
            .map_err(|e| RevokeError::Scheduler(e.to_string()))
    }

    async fn cancel_schedule(&self) {
        if let Err(e) = self.scheduler.cancel(&self.task_id).await {
            warn!(error = %e, "Failed to cancel scheduled task");
        }
    }

    async fn complete(&self, state: &RunState) -> RunSummary {
        self.cancel_schedule().await;

        let finished_at = state.last_updated_at.unwrap_or_else(|| self.clock.now());
        let summary = RunSummary {
            run_id: state.run_id.to_string(),
            items_processed: state.counters.items_processed,
            permissions_removed: state.counters.permissions_removed,
            errors: state.counters.errors,
            started_at: state.started_at.unwrap_or(finished_at),
            finished_at,
        };

        info!(
            run_id = %summary.run_id,
            items_processed = summary.items_processed,
            permissions_removed = summary.permissions_removed,
            errors = summary.errors,
            "Run complete"
        );
        self.emit(RunEvent::Completed {
            run_id: summary.run_id.clone(),
            items_processed: summary.items_processed,
            permissions_removed: summary.permissions_removed,
            errors: summary.errors,
            duration_secs: summary.elapsed().num_seconds().max(0) as u64,
        });

        if let Err(e) = self.notifier.notify(&summary).await {
            warn!(error = %e, "Completion notification failed");
        }
        summary
    }

    fn emit(&self, event: RunEvent) {
        self.events.emit(CoreEvent::Run(event)).ok();
    }
}

/// Persists mid-phase progress on top of the state loaded at invocation start.
struct RunProgress<'a> {
    orchestrator: &'a RunOrchestrator,
    base: RunState,
}

#[async_trait]
impl<'a> PhaseCheckpoint for RunProgress<'a> {
    fn item_processed(&self, item: &Item, outcome: &RevokeOutcome) {
        self.orchestrator.emit(RunEvent::ItemProcessed {
            run_id: self.base.run_id.to_string(),
            phase: self.base.phase.to_string(),
            item_id: item.id.clone(),
            item_name: item.name.clone(),
            removed: outcome.removed,
            errors: outcome.errors,
        });
    }

    async fn stop_requested(&self) -> bool {
        match self
            .orchestrator
            .repository
            .stop_requested(&self.base.run_id)
            .await
        {
            Ok(requested) => requested,
            Err(e) => {
                warn!(error = %e, "Could not read stop flag");
                false
            }
        }
    }

    async fn checkpoint(&self, report: &PhaseReport, cursor: &ResumeCursor) -> Result<()> {
        let orchestrator = self.orchestrator;
        if !orchestrator
            .repository
            .acquire_lease(&orchestrator.holder, orchestrator.lease_ttl())
            .await?
        {
            return Err(RevokeError::RunLocked(
                "lease lost during checkpoint".to_string(),
            ));
        }

        let mut state = self.base.clone();
        state
            .counters
            .add(report.processed, report.removed, report.errors);
        state.resume_cursor = Some(cursor.encode());
        state.last_updated_at = Some(orchestrator.clock.now());
        // A reset run is noticed at the next item boundary
        if !orchestrator.repository.save_progress(&state).await? {
            return Ok(());
        }

        orchestrator.emit(RunEvent::Checkpoint {
            run_id: state.run_id.to_string(),
            phase: state.phase.to_string(),
            items_processed: state.counters.items_processed,
            permissions_removed: state.counters.permissions_removed,
            errors: state.counters.errors,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::{SqliteAuditLog, SqliteStateStore};
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::sharing::{Grantee, ItemKind, ItemPage, SharingAccess};
    use bridge_traits::time::SystemClock;
    use mockall::mock;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    mock! {
        SharingApi {}

        #[async_trait]
        impl SharingApi for SharingApi {
            async fn owner_identity(&self) -> BridgeResult<String>;
            async fn get_sharing_access(&self, item: &Item) -> BridgeResult<SharingAccess>;
            async fn set_sharing_access(&self, item: &Item, access: SharingAccess) -> BridgeResult<()>;
            async fn list_editors(&self, item: &Item) -> BridgeResult<Vec<Grantee>>;
            async fn remove_editor(&self, item: &Item, grantee: &Grantee) -> BridgeResult<()>;
            async fn list_viewers(&self, item: &Item) -> BridgeResult<Vec<Grantee>>;
            async fn remove_viewer(&self, item: &Item, grantee: &Grantee) -> BridgeResult<()>;
        }
    }

    /// Account with no items; counts listing calls.
    #[derive(Default)]
    struct EmptySource {
        fetches: AtomicU32,
    }

    #[async_trait]
    impl ItemSource for EmptySource {
        async fn fetch_page(&self, _kind: ItemKind, _page_token: Option<&str>) -> BridgeResult<ItemPage> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(ItemPage::default())
        }
    }

    mock! {
        Scheduler {}

        #[async_trait]
        impl Scheduler for Scheduler {
            async fn schedule_recurring(&self, task_id: &TaskId, interval: Duration, handler: TaskHandler) -> BridgeResult<()>;
            async fn cancel(&self, task_id: &TaskId) -> BridgeResult<()>;
            async fn is_scheduled(&self, task_id: &TaskId) -> bool;
        }
    }

    mock! {
        Notifier {}

        #[async_trait]
        impl Notifier for Notifier {
            async fn notify(&self, summary: &RunSummary) -> BridgeResult<()>;
        }
    }

    /// Listing that rejects the credential.
    struct RejectingSource;

    #[async_trait]
    impl ItemSource for RejectingSource {
        async fn fetch_page(&self, _kind: ItemKind, _page_token: Option<&str>) -> BridgeResult<ItemPage> {
            Err(BridgeError::Unauthorized("Invalid Credentials".to_string()))
        }
    }

    async fn orchestrator(
        sharing: MockSharingApi,
        source: Arc<dyn ItemSource>,
        scheduler: MockScheduler,
    ) -> Arc<RunOrchestrator> {
        let config = RevokeConfig::builder()
            .database_path("/unused/state.db")
            .success_delay(Duration::ZERO)
            .build()
            .unwrap();
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().returning(|_| Ok(()));

        let deps = RunDependencies {
            source,
            sharing: Arc::new(sharing),
            state_store: Arc::new(SqliteStateStore::in_memory().await.unwrap()),
            audit: Arc::new(SqliteAuditLog::in_memory().await.unwrap()),
            scheduler: Arc::new(scheduler),
            notifier: Arc::new(notifier),
            clock: Arc::new(SystemClock),
            events: EventBus::new(16),
        };
        Arc::new(RunOrchestrator::new(config, deps))
    }

    #[tokio::test]
    async fn test_failed_preflight_leaves_state_untouched() {
        let mut sharing = MockSharingApi::new();
        sharing
            .expect_owner_identity()
            .returning(|| Err(BridgeError::Unauthorized("Invalid Credentials".to_string())));
        let mut scheduler = MockScheduler::new();
        scheduler.expect_schedule_recurring().never();
        scheduler.expect_is_scheduled().returning(|_| false);

        let orchestrator =
            orchestrator(sharing, Arc::new(EmptySource::default()), scheduler).await;

        let result = orchestrator.start().await;
        assert!(matches!(result, Err(RevokeError::Preflight(_))));

        let report = orchestrator.status().await.unwrap();
        assert_eq!(report.status, RunStatus::NotStarted);
    }

    #[tokio::test]
    async fn test_start_rejected_while_running() {
        let mut sharing = MockSharingApi::new();
        sharing
            .expect_owner_identity()
            .returning(|| Ok("owner@example.com".to_string()));
        let mut scheduler = MockScheduler::new();
        scheduler
            .expect_schedule_recurring()
            .withf(|task_id, _, _| task_id.0 == RUN_TASK_ID)
            .times(1)
            .returning(|_, _, _| Ok(()));

        let orchestrator =
            orchestrator(sharing, Arc::new(EmptySource::default()), scheduler).await;

        let state = orchestrator.start().await.unwrap();
        assert_eq!(state.phase, Phase::Files);

        assert!(matches!(
            orchestrator.start().await,
            Err(RevokeError::InvalidStateTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_attach_requires_running_run() {
        let mut sharing = MockSharingApi::new();
        sharing
            .expect_owner_identity()
            .returning(|| Ok("owner@example.com".to_string()));
        let mut scheduler = MockScheduler::new();
        scheduler
            .expect_schedule_recurring()
            .times(2)
            .returning(|_, _, _| Ok(()));

        let orchestrator =
            orchestrator(sharing, Arc::new(EmptySource::default()), scheduler).await;

        assert!(matches!(
            orchestrator.attach().await,
            Err(RevokeError::InvalidStateTransition { .. })
        ));

        let started = orchestrator.start().await.unwrap();
        let attached = orchestrator.attach().await.unwrap();
        assert_eq!(attached.run_id, started.run_id);
    }

    #[tokio::test]
    async fn test_continue_without_run_is_idle() {
        let source = Arc::new(EmptySource::default());
        let orchestrator =
            orchestrator(MockSharingApi::new(), source.clone(), MockScheduler::new()).await;

        assert_eq!(
            orchestrator.continue_run().await.unwrap(),
            ContinueOutcome::Idle
        );
        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_account_completes_in_two_invocations() {
        let mut sharing = MockSharingApi::new();
        sharing
            .expect_owner_identity()
            .returning(|| Ok("owner@example.com".to_string()));
        let source = Arc::new(EmptySource::default());
        let mut scheduler = MockScheduler::new();
        scheduler
            .expect_schedule_recurring()
            .returning(|_, _, _| Ok(()));
        scheduler.expect_cancel().returning(|_| Ok(()));

        let orchestrator = orchestrator(sharing, source, scheduler).await;
        let mut events = orchestrator.events().subscribe();
        orchestrator.start().await.unwrap();

        assert!(matches!(
            orchestrator.continue_run().await.unwrap(),
            ContinueOutcome::PhaseAdvanced {
                completed: Phase::Files,
                next: Phase::Folders,
                ..
            }
        ));
        match orchestrator.continue_run().await.unwrap() {
            ContinueOutcome::Completed(summary) => assert_eq!(summary.items_processed, 0),
            other => panic!("expected completion, got {:?}", other),
        }
        assert_eq!(
            orchestrator.continue_run().await.unwrap(),
            ContinueOutcome::AlreadyComplete
        );

        let mut saw_completed = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, CoreEvent::Run(RunEvent::Completed { .. })) {
                saw_completed = true;
            }
        }
        assert!(saw_completed);
    }

    #[tokio::test]
    async fn test_rejected_credential_halts_and_unschedules() {
        let mut sharing = MockSharingApi::new();
        sharing
            .expect_owner_identity()
            .returning(|| Ok("owner@example.com".to_string()));
        let mut scheduler = MockScheduler::new();
        scheduler
            .expect_schedule_recurring()
            .times(1)
            .returning(|_, _, _| Ok(()));
        scheduler.expect_cancel().times(1).returning(|_| Ok(()));
        scheduler.expect_is_scheduled().returning(|_| false);

        let orchestrator = orchestrator(sharing, Arc::new(RejectingSource), scheduler).await;
        let mut events = orchestrator.events().subscribe();
        orchestrator.start().await.unwrap();

        let result = orchestrator.continue_run().await;
        assert!(matches!(result, Err(RevokeError::Halted(_))));

        let report = orchestrator.status().await.unwrap();
        assert_eq!(report.status, RunStatus::Files);
        assert_eq!(report.state.counters.items_processed, 0);
        assert_eq!(report.state.counters.errors, 0);
        assert_eq!(report.state.resume_cursor, None);
        assert_eq!(report.audit, AuditCounts::default());

        let mut halted = None;
        while let Ok(event) = events.try_recv() {
            if let CoreEvent::Run(RunEvent::Halted { message, .. }) = event {
                halted = Some(message);
            }
        }
        assert!(halted.is_some_and(|message| message.contains("Invalid Credentials")));
    }
}
