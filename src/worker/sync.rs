//! Background sync of actions recorded while offline.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::portal::UserAction;

/// Sync tag that triggers a flush of the offline queue.
pub const BACKGROUND_SYNC_TAG: &str = "background-sync";

/// Source of actions that could not be delivered while offline.
#[async_trait]
pub trait OfflineQueue: Send + Sync {
    /// Returns the actions waiting to be sent.
    async fn pending(&self) -> Result<Vec<UserAction>>;

    /// Delivers the given actions and drops them from the queue.
    async fn flush(&self, actions: &[UserAction]) -> Result<()>;
}

/// A queue that never holds anything. Offline actions are not persisted yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyQueue;

#[async_trait]
impl OfflineQueue for EmptyQueue {
    async fn pending(&self) -> Result<Vec<UserAction>> {
        Ok(Vec::new())
    }

    async fn flush(&self, _actions: &[UserAction]) -> Result<()> {
        Ok(())
    }
}

/// Result of a sync event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SyncOutcome {
    /// The tag is not one the worker handles.
    Ignored,
    /// The queue was flushed.
    Completed { flushed: usize },
    /// Reading or flushing the queue failed; the error was logged.
    Failed,
}

/// Flushes the offline queue. Errors are logged, never propagated.
pub(crate) async fn run(queue: &dyn OfflineQueue) -> SyncOutcome {
    log::info!("Performing background sync");
    let result = async {
        let pending = queue.pending().await?;
        if !pending.is_empty() {
            log::info!("Syncing {} offline action(s)", pending.len());
            queue.flush(&pending).await?;
        }
        Ok::<_, crate::Error>(pending.len())
    }
    .await;

    match result {
        Ok(flushed) => {
            log::info!("Background sync completed");
            SyncOutcome::Completed { flushed }
        }
        Err(e) => {
            log::error!("Background sync failed: {e}");
            SyncOutcome::Failed
        }
    }
}
