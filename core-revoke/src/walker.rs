//! # Paginated Walker
//!
//! Drives one phase of a run: pulls pages from an [`ItemSource`], feeds each
//! item to the [`Revoker`] and stops at the first item boundary after the time
//! budget runs out or a stop is requested.
//!
//! ## Resume Semantics
//!
//! The walker never interrupts an item. When it yields, the returned cursor
//! points at the first item it did not finish, so resuming from that cursor
//! processes every remaining item at least once and every finished item
//! exactly once.
//!
//! ## Failures
//!
//! Item-level failures are absorbed by the revoker. Anything that escapes it
//! ends the call with one extra error, as if the budget had run out:
//!
//! - a page that cannot be fetched: the cursor stays at that page
//! - the audit log refusing a record: the cursor stays before the item, which
//!   is retried on resume. Removals the item logged before the failure are
//!   already counted in `removed`, so the retry only counts what is left.
//! - a checkpoint that cannot be saved: the item was finished, so the cursor
//!   is after it
//!
//! A rejected credential is different. It is not counted as an error, no
//! record is written, and `halted` is set with the cursor before the item.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bridge_traits::sharing::{Item, ItemKind, ItemSource};
use bridge_traits::storage::{AuditLog, ErrorRecord};
use bridge_traits::time::Clock;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{error, field, info, instrument, warn, Span};

use crate::caller::ApiCaller;
use crate::cursor::ResumeCursor;
use crate::error::Result;
use crate::revoker::{RevokeOutcome, Revoker};

/// Result of one `process_phase` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseReport {
    pub processed: u64,
    pub removed: u64,
    pub errors: u64,
    /// Where the next call should resume, `None` for the start of the phase
    pub next_cursor: Option<ResumeCursor>,
    /// The listing is exhausted
    pub complete: bool,
    /// Display name of the last item processed
    pub last_item: Option<String>,
    /// Message of the phase-level failure that ended the call, if any
    pub failure: Option<String>,
    /// Set when the run cannot continue at all; nothing was counted for it
    pub halted: Option<String>,
}

/// Receives progress while a phase is being walked.
#[async_trait]
pub trait PhaseCheckpoint: Send + Sync {
    /// Called after every item.
    fn item_processed(&self, _item: &Item, _outcome: &RevokeOutcome) {}

    /// Polled at every item boundary for a stop issued outside this process.
    async fn stop_requested(&self) -> bool {
        false
    }

    /// Persist partial progress; `cursor` is the boundary after the last item in `report`.
    async fn checkpoint(&self, report: &PhaseReport, cursor: &ResumeCursor) -> Result<()>;
}

/// Checkpoint sink that drops everything.
#[derive(Debug, Default)]
pub struct NoCheckpoint;

#[async_trait]
impl PhaseCheckpoint for NoCheckpoint {
    async fn checkpoint(&self, _report: &PhaseReport, _cursor: &ResumeCursor) -> Result<()> {
        Ok(())
    }
}

pub struct Walker {
    source: Arc<dyn ItemSource>,
    revoker: Revoker,
    audit: Arc<dyn AuditLog>,
    caller: ApiCaller,
    clock: Arc<dyn Clock>,
    checkpoint_interval: u64,
}

impl Walker {
    pub fn new(
        source: Arc<dyn ItemSource>,
        revoker: Revoker,
        audit: Arc<dyn AuditLog>,
        caller: ApiCaller,
        clock: Arc<dyn Clock>,
        checkpoint_interval: u64,
    ) -> Self {
        Self {
            source,
            revoker,
            audit,
            caller,
            clock,
            checkpoint_interval: checkpoint_interval.max(1),
        }
    }

    /// Processes items of `kind` starting at `cursor` until the listing is
    /// exhausted, `budget` has elapsed or `cancel` fires.
    #[instrument(
        skip_all,
        fields(phase = %kind, resumed = cursor.is_some(), current_item = field::Empty)
    )]
    pub async fn process_phase(
        &self,
        kind: ItemKind,
        cursor: Option<ResumeCursor>,
        budget: Duration,
        cancel: &CancellationToken,
        progress: &dyn PhaseCheckpoint,
    ) -> PhaseReport {
        let started = self.clock.now();
        let mut report = PhaseReport {
            next_cursor: cursor.clone(),
            ..PhaseReport::default()
        };
        let mut position = cursor.unwrap_or_default();

        loop {
            if self.should_yield(started, budget, cancel, progress).await {
                report.next_cursor = boundary(position);
                return report;
            }

            let fetched = self
                .caller
                .call("fetch_page", || {
                    self.source.fetch_page(kind, position.page_token.as_deref())
                })
                .await;
            let page = match fetched {
                Ok(page) => page,
                Err(e) => {
                    let message = format!("Failed to list {}s: {}", kind, e);
                    if e.is_fatal() {
                        halt(&mut report, message);
                    } else {
                        self.phase_failed(kind, &mut report, message).await;
                    }
                    report.next_cursor = boundary(position);
                    return report;
                }
            };

            let mut offset = position.offset;
            while let Some(item) = page.items.get(offset) {
                if self.should_yield(started, budget, cancel, progress).await {
                    report.next_cursor =
                        boundary(ResumeCursor::new(position.page_token.clone(), offset));
                    return report;
                }

                Span::current().record("current_item", item.name.as_str());

                let outcome = match self.revoker.revoke(item).await {
                    Ok(outcome) => outcome,
                    Err(aborted) => {
                        report.removed += aborted.partial.removed;
                        report.errors += aborted.partial.errors;
                        report.next_cursor =
                            boundary(ResumeCursor::new(position.page_token.clone(), offset));

                        let message = format!("Item {} abandoned: {}", item.id, aborted.cause);
                        if aborted.cause.is_fatal() {
                            halt(&mut report, message);
                        } else {
                            self.phase_failed(kind, &mut report, message).await;
                        }
                        return report;
                    }
                };

                offset += 1;
                report.processed += 1;
                report.removed += outcome.removed;
                report.errors += outcome.errors;
                report.last_item = Some(item.name.clone());
                progress.item_processed(item, &outcome);

                if report.processed % self.checkpoint_interval == 0 {
                    self.log_progress(kind, &report, started);

                    let at = ResumeCursor::new(position.page_token.clone(), offset);
                    if let Err(e) = progress.checkpoint(&report, &at).await {
                        let message = format!("Failed to save progress: {}", e);
                        self.phase_failed(kind, &mut report, message).await;
                        report.next_cursor = boundary(at);
                        return report;
                    }
                }
            }

            match page.next_page_token {
                Some(token) => position = ResumeCursor::page_start(Some(token)),
                None => {
                    report.complete = true;
                    report.next_cursor = None;
                    self.log_progress(kind, &report, started);
                    return report;
                }
            }
        }
    }

    async fn should_yield(
        &self,
        started: DateTime<Utc>,
        budget: Duration,
        cancel: &CancellationToken,
        progress: &dyn PhaseCheckpoint,
    ) -> bool {
        if self.clock.elapsed_since(started) >= budget {
            return true;
        }
        if cancel.is_cancelled() || progress.stop_requested().await {
            info!("Stop requested, yielding at item boundary");
            return true;
        }
        false
    }

    async fn phase_failed(&self, kind: ItemKind, report: &mut PhaseReport, message: String) {
        warn!(phase = %kind, error = %message, "Phase interrupted");
        report.errors += 1;

        let record = ErrorRecord {
            timestamp: self.clock.now(),
            item_id: String::new(),
            item_name: format!("({}s listing)", kind),
            detail: message.clone(),
        };
        if let Err(e) = self.audit.append_error(&record).await {
            warn!(error = %e, "Could not record phase failure");
        }
        report.failure = Some(message);
    }

    fn log_progress(&self, kind: ItemKind, report: &PhaseReport, started: DateTime<Utc>) {
        let elapsed = self.clock.elapsed_since(started);
        let secs = elapsed.as_secs_f64();
        let rate = if secs > 0.0 {
            (report.processed as f64 / secs * 100.0).round() / 100.0
        } else {
            0.0
        };
        info!(
            phase = %kind,
            processed = report.processed,
            removed = report.removed,
            errors = report.errors,
            items_per_sec = rate,
            "Phase progress"
        );
    }
}

fn halt(report: &mut PhaseReport, message: String) {
    error!(error = %message, "Run cannot continue");
    report.halted = Some(message);
}

/// The start of the first page is the same position as "no cursor".
fn boundary(at: ResumeCursor) -> Option<ResumeCursor> {
    (at != ResumeCursor::default()).then_some(at)
}
