//! Recurring Task Scheduling on Tokio

use async_trait::async_trait;
use bridge_traits::{
    background::{Scheduler, TaskHandler, TaskId},
    error::Result,
};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{oneshot, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Tokio-based scheduler for desktop.
///
/// Each task owns one spawned loop that awaits its handler inline, so two
/// runs of the same task can never overlap. Cancelling signals the loop; a
/// run already in progress is allowed to finish.
pub struct TokioScheduler {
    tasks: RwLock<HashMap<TaskId, TaskInfo>>,
}

struct TaskInfo {
    handle: JoinHandle<()>,
    cancel: oneshot::Sender<()>,
}

impl TokioScheduler {
    pub fn new() -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
        }
    }

    async fn run_recurring_task(
        id: TaskId,
        handler: TaskHandler,
        period: Duration,
        mut cancel_rx: oneshot::Receiver<()>,
    ) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = &mut cancel_rx => {
                    debug!(task_id = %id, "Recurring task cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    debug!(task_id = %id, "Running recurring task");
                    if let Err(err) = handler().await {
                        warn!(task_id = %id, error = %err, "Recurring task failed");
                    }
                }
            }
        }
    }
}

impl Default for TokioScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Scheduler for TokioScheduler {
    async fn schedule_recurring(
        &self,
        task_id: &TaskId,
        interval: Duration,
        handler: TaskHandler,
    ) -> Result<()> {
        let (cancel_tx, cancel_rx) = oneshot::channel();

        let mut tasks = self.tasks.write().await;
        if let Some(previous) = tasks.remove(task_id) {
            debug!(task_id = %task_id, "Replacing recurring task");
            let _ = previous.cancel.send(());
        }

        let handle = tokio::spawn(Self::run_recurring_task(
            task_id.clone(),
            handler,
            interval,
            cancel_rx,
        ));

        tasks.insert(
            task_id.clone(),
            TaskInfo {
                handle,
                cancel: cancel_tx,
            },
        );

        debug!(task_id = %task_id, interval_ms = interval.as_millis() as u64, "Scheduled recurring task");
        Ok(())
    }

    async fn cancel(&self, task_id: &TaskId) -> Result<()> {
        let removed = self.tasks.write().await.remove(task_id);
        if let Some(info) = removed {
            debug!(task_id = %task_id, "Cancelling recurring task");
            // An in-flight run finishes before the loop sees the signal.
            let _ = info.cancel.send(());
        }
        Ok(())
    }

    async fn is_scheduled(&self, task_id: &TaskId) -> bool {
        self.tasks
            .read()
            .await
            .get(task_id)
            .map(|info| !info.handle.is_finished())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    fn counting_handler(counter: Arc<AtomicUsize>, hold: Duration) -> TaskHandler {
        Arc::new(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                sleep(hold).await;
                Ok(())
            }
            .boxed()
        })
    }

    #[tokio::test]
    async fn test_first_run_is_immediate() {
        let scheduler = TokioScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let id = TaskId::new("revoke-run");

        scheduler
            .schedule_recurring(
                &id,
                Duration::from_secs(3600),
                counting_handler(Arc::clone(&counter), Duration::ZERO),
            )
            .await
            .unwrap();

        sleep(Duration::from_millis(50)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(scheduler.is_scheduled(&id).await);

        scheduler.cancel(&id).await.unwrap();
    }

    #[tokio::test]
    async fn test_runs_repeat_until_cancelled() {
        let scheduler = TokioScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let id = TaskId::new("revoke-run");

        scheduler
            .schedule_recurring(
                &id,
                Duration::from_millis(20),
                counting_handler(Arc::clone(&counter), Duration::ZERO),
            )
            .await
            .unwrap();

        sleep(Duration::from_millis(110)).await;
        scheduler.cancel(&id).await.unwrap();
        let after_cancel = counter.load(Ordering::SeqCst);
        assert!(after_cancel >= 2);
        assert!(!scheduler.is_scheduled(&id).await);

        sleep(Duration::from_millis(80)).await;
        assert_eq!(counter.load(Ordering::SeqCst), after_cancel);
    }

    #[tokio::test]
    async fn test_runs_never_overlap() {
        let scheduler = TokioScheduler::new();
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));
        let id = TaskId::new("slow");

        let handler: TaskHandler = {
            let active = Arc::clone(&active);
            let max_active = Arc::clone(&max_active);
            Arc::new(move || {
                let active = Arc::clone(&active);
                let max_active = Arc::clone(&max_active);
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    max_active.fetch_max(now, Ordering::SeqCst);
                    sleep(Duration::from_millis(40)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
                .boxed()
            })
        };

        scheduler
            .schedule_recurring(&id, Duration::from_millis(5), handler)
            .await
            .unwrap();

        sleep(Duration::from_millis(150)).await;
        scheduler.cancel(&id).await.unwrap();

        assert_eq!(max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_unknown_task_is_ok() {
        let scheduler = TokioScheduler::new();
        assert!(scheduler.cancel(&TaskId::new("missing")).await.is_ok());
        assert!(!scheduler.is_scheduled(&TaskId::new("missing")).await);
    }

    #[tokio::test]
    async fn test_failing_handler_keeps_schedule() {
        let scheduler = TokioScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let id = TaskId::new("flaky");

        let handler: TaskHandler = {
            let counter = Arc::clone(&counter);
            Arc::new(move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(bridge_traits::error::BridgeError::OperationFailed(
                        "boom".to_string(),
                    ))
                }
                .boxed()
            })
        };

        scheduler
            .schedule_recurring(&id, Duration::from_millis(20), handler)
            .await
            .unwrap();

        sleep(Duration::from_millis(90)).await;
        scheduler.cancel(&id).await.unwrap();

        assert!(counter.load(Ordering::SeqCst) >= 2);
    }
}
