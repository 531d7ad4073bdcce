//! Recurring Task Scheduling
//!
//! Drives periodic re-invocation of work that must never overlap with itself.

use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// Scheduled task identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Work executed on every tick of a recurring task.
pub type TaskHandler = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Recurring task scheduler.
///
/// Implementations must never start a run of a task while a previous run of
/// the same task is still in progress. Ticks that fall due during a run are
/// delayed, not queued.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::background::{Scheduler, TaskId};
/// use futures::FutureExt;
///
/// async fn keep_going(scheduler: &dyn Scheduler) -> Result<()> {
///     let handler = Arc::new(|| async { do_one_slice().await }.boxed());
///     scheduler
///         .schedule_recurring(&TaskId::new("revoke-run"), Duration::from_secs(60), handler)
///         .await
/// }
/// ```
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Start running `handler` every `interval`, replacing any task with the same id.
    ///
    /// The first run happens immediately.
    async fn schedule_recurring(
        &self,
        task_id: &TaskId,
        interval: Duration,
        handler: TaskHandler,
    ) -> Result<()>;

    /// Stop a task. Cancelling an unknown task is not an error.
    async fn cancel(&self, task_id: &TaskId) -> Result<()>;

    async fn is_scheduled(&self, task_id: &TaskId) -> bool;
}
