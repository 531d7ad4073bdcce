//! Built-in completion notifier.
//!
//! Event subscribers already receive `RunEvent::Completed`; the notifier is
//! the hook for delivering the summary somewhere outside the process.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::notification::{Notifier, RunSummary};
use tracing::info;

/// Writes the summary to the log at info level.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, summary: &RunSummary) -> Result<()> {
        info!(
            run_id = %summary.run_id,
            items_processed = summary.items_processed,
            permissions_removed = summary.permissions_removed,
            errors = summary.errors,
            elapsed_secs = summary.elapsed().num_seconds(),
            "Revocation run complete"
        );
        Ok(())
    }
}
