//! Run progress over a `tokio::sync::broadcast` channel.
//!
//! The orchestrator publishes [`RunEvent`]s wrapped in [`CoreEvent`]; the CLI,
//! the notifier and tests subscribe without holding a reference to it.
//! Publishing never blocks and never fails a run: with nobody listening,
//! `emit` returns an error that callers drop with `.ok()`.
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, RunEvent};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let bus = EventBus::new(64);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(CoreEvent::Run(RunEvent::Started {
//!     run_id: "run-1".to_string(),
//!     resumed: false,
//! }))
//! .ok();
//!
//! assert!(matches!(
//!     rx.recv().await.unwrap(),
//!     CoreEvent::Run(RunEvent::Started { .. })
//! ));
//! # }
//! ```
//!
//! A receiver more than `capacity` events behind gets `RecvError::Lagged`.
//! `ItemProcessed` is chatty, so that is normal for slow consumers and
//! [`EventStream`] simply moves past it. `RecvError::Closed` means every
//! sender is gone.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;
use tracing::debug;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Capacity used by `EventBus::default()`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Top-level event published through the event bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Revocation run lifecycle and progress
    Run(RunEvent),
}

impl CoreEvent {
    /// Short fixed text for log lines.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Run(e) => e.description(),
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Run(RunEvent::Halted { .. }) => EventSeverity::Error,
            CoreEvent::Run(RunEvent::PhaseFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Run(RunEvent::ItemProcessed { errors, .. }) if *errors > 0 => {
                EventSeverity::Warning
            }
            CoreEvent::Run(RunEvent::ItemProcessed { .. })
            | CoreEvent::Run(RunEvent::Checkpoint { .. }) => EventSeverity::Debug,
            CoreEvent::Run(_) => EventSeverity::Info,
        }
    }
}

/// Log level an event maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Events emitted while a revocation run advances.
///
/// `phase` values are the lowercase phase names (`files`, `folders`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum RunEvent {
    /// A run was started fresh or resumed after a stop.
    Started { run_id: String, resumed: bool },

    /// An invocation began working on a phase.
    PhaseStarted {
        run_id: String,
        phase: String,
        /// Whether the invocation picked up a saved cursor.
        resumed: bool,
    },

    /// One item went through the revoker.
    ItemProcessed {
        run_id: String,
        phase: String,
        item_id: String,
        item_name: String,
        removed: u64,
        errors: u64,
    },

    /// Mid-phase progress was persisted.
    Checkpoint {
        run_id: String,
        phase: String,
        items_processed: u64,
        permissions_removed: u64,
        errors: u64,
    },

    /// A phase-level failure ended an invocation early.
    PhaseFailed {
        run_id: String,
        phase: String,
        message: String,
    },

    /// The run cannot go on without outside help and was unscheduled.
    /// Progress up to the last finished item is saved.
    Halted {
        run_id: String,
        phase: String,
        message: String,
    },

    /// The item source for a phase is exhausted.
    PhaseCompleted { run_id: String, phase: String },

    /// The user stopped the run; it can be resumed with `start`.
    Stopped {
        run_id: String,
        items_processed: u64,
    },

    /// Both phases finished.
    Completed {
        run_id: String,
        items_processed: u64,
        permissions_removed: u64,
        errors: u64,
        duration_secs: u64,
    },

    /// State and audit log were wiped.
    Reset,
}

impl RunEvent {
    fn description(&self) -> &str {
        match self {
            RunEvent::Started { .. } => "Run started",
            RunEvent::PhaseStarted { .. } => "Phase in progress",
            RunEvent::ItemProcessed { .. } => "Item processed",
            RunEvent::Checkpoint { .. } => "Progress saved",
            RunEvent::PhaseFailed { .. } => "Phase interrupted by an error",
            RunEvent::Halted { .. } => "Run halted",
            RunEvent::PhaseCompleted { .. } => "Phase completed",
            RunEvent::Stopped { .. } => "Run stopped",
            RunEvent::Completed { .. } => "Run completed",
            RunEvent::Reset => "Run state reset",
        }
    }
}

/// Central broadcast channel. Cloning shares the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// `capacity` is how far a subscriber may fall behind before lagging.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Sends to every live subscriber and returns how many there were.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional filter.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream, RunEvent};
///
/// let event_bus = EventBus::new(100);
/// let completions = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Run(RunEvent::Completed { .. })));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter.
    ///
    /// Lagging is logged and the stream keeps going; only `Closed` is
    /// returned as an error.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = match self.receiver.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Event stream lagged");
                    continue;
                }
                Err(e) => return Err(e),
            };

            match &self.filter {
                Some(filter) if !filter(&event) => continue,
                _ => return Ok(event),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started() -> CoreEvent {
        CoreEvent::Run(RunEvent::Started {
            run_id: "run-1".to_string(),
            resumed: false,
        })
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(started()).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        assert_eq!(bus.emit(started()).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap(), started());
        assert_eq!(sub2.recv().await.unwrap(), started());
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Run(RunEvent::PhaseCompleted { .. })));

        bus.emit(started()).ok();
        bus.emit(CoreEvent::Run(RunEvent::PhaseCompleted {
            run_id: "run-1".to_string(),
            phase: "files".to_string(),
        }))
        .ok();

        let received = stream.recv().await.unwrap();
        assert!(matches!(
            received,
            CoreEvent::Run(RunEvent::PhaseCompleted { ref phase, .. }) if phase == "files"
        ));
    }

    #[tokio::test]
    async fn test_event_stream_skips_lag() {
        let bus = EventBus::new(2);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Run(RunEvent::Reset)));

        for _ in 0..5 {
            bus.emit(started()).ok();
        }
        bus.emit(CoreEvent::Run(RunEvent::Reset)).ok();

        assert_eq!(stream.recv().await.unwrap(), CoreEvent::Run(RunEvent::Reset));
    }

    #[test]
    fn test_severity() {
        let failing_item = CoreEvent::Run(RunEvent::ItemProcessed {
            run_id: "run-1".to_string(),
            phase: "files".to_string(),
            item_id: "a".to_string(),
            item_name: "a.txt".to_string(),
            removed: 0,
            errors: 1,
        });
        let phase_failed = CoreEvent::Run(RunEvent::PhaseFailed {
            run_id: "run-1".to_string(),
            phase: "folders".to_string(),
            message: "listing failed".to_string(),
        });

        let halted = CoreEvent::Run(RunEvent::Halted {
            run_id: "run-1".to_string(),
            phase: "files".to_string(),
            message: "credential rejected".to_string(),
        });

        assert_eq!(halted.severity(), EventSeverity::Error);
        assert_eq!(halted.description(), "Run halted");
        assert!(halted.severity() > failing_item.severity());
        assert_eq!(failing_item.severity(), EventSeverity::Warning);
        assert_eq!(phase_failed.severity(), EventSeverity::Warning);
        assert_eq!(started().severity(), EventSeverity::Info);
        assert_eq!(CoreEvent::Run(RunEvent::Reset).description(), "Run state reset");
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_string(&started()).unwrap();
        assert!(json.contains("\"type\":\"Run\""));
        assert!(json.contains("\"event\":\"Started\""));

        let back: CoreEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, started());
    }
}
