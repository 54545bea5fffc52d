use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::RemoteSync;
use crate::model::PersistencePayload;

struct PendingSync {
    task: JoinHandle<()>,
    payload: PersistencePayload,
}

/// Coalesces rapid saves into one remote push after a quiet period. At most
/// one sync task is scheduled at a time.
pub struct SyncDebouncer {
    remote: Arc<dyn RemoteSync>,
    runtime: Handle,
    quiet_period: Duration,
    pending: Option<PendingSync>,
}

impl SyncDebouncer {
    pub fn new(remote: Arc<dyn RemoteSync>, runtime: Handle, quiet_period: Duration) -> Self {
        Self {
            remote,
            runtime,
            quiet_period,
            pending: None,
        }
    }

    pub fn remote(&self) -> &Arc<dyn RemoteSync> {
        &self.remote
    }

    pub fn schedule(&mut self, payload: PersistencePayload) {
        if let Some(previous) = self.pending.take() {
            previous.task.abort();
        }

        let remote = Arc::clone(&self.remote);
        let quiet_period = self.quiet_period;
        let sent = payload.clone();
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(quiet_period).await;
            push_best_effort(remote.as_ref(), &sent).await;
        });

        self.pending = Some(PendingSync { task, payload });
    }

    #[cfg(test)]
    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|pending| !pending.task.is_finished())
    }

    /// Cancels the timer and pushes the latest unsent payload right away.
    pub async fn flush(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        if pending.task.is_finished() {
            return;
        }
        pending.task.abort();
        push_best_effort(self.remote.as_ref(), &pending.payload).await;
    }
}

async fn push_best_effort(remote: &dyn RemoteSync, payload: &PersistencePayload) {
    match remote.push(payload).await {
        Ok(()) => debug!(
            categories = payload.categories.len(),
            annotations = payload.annotations.len(),
            "synced annotation state to remote"
        ),
        Err(err) => warn!(error = %err, "remote annotation sync failed"),
    }
}
