use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::model::PersistencePayload;

mod debounce;
mod local;
mod remote;
#[cfg(test)]
mod tests;

pub use debounce::SyncDebouncer;
pub use local::{DatasetRecord, SqliteStore};
#[cfg(test)]
pub use local::MemoryStore;
pub use remote::HttpRemote;

/// Durable store on this machine. Writes are expected to succeed.
pub trait LocalStore {
    fn read(&self) -> Result<Option<PersistencePayload>>;
    fn write(&self, payload: &PersistencePayload) -> Result<()>;
}

/// Best-effort remote copy of the annotation state.
#[async_trait]
pub trait RemoteSync: Send + Sync {
    async fn fetch(&self) -> Result<PersistencePayload>;
    async fn push(&self, payload: &PersistencePayload) -> Result<()>;
}

pub struct PersistenceGateway {
    local: Box<dyn LocalStore>,
    remote: Option<SyncDebouncer>,
}

impl PersistenceGateway {
    pub fn local_only(local: Box<dyn LocalStore>) -> Self {
        Self {
            local,
            remote: None,
        }
    }

    pub fn with_remote(local: Box<dyn LocalStore>, remote: SyncDebouncer) -> Self {
        Self {
            local,
            remote: Some(remote),
        }
    }

    pub fn load(&self) -> PersistencePayload {
        match self.local.read() {
            Ok(Some(payload)) => payload,
            Ok(None) => PersistencePayload::default(),
            Err(err) => {
                warn!(error = %err, "failed to read local annotation state, starting empty");
                PersistencePayload::default()
            }
        }
    }

    /// Local state, superseded in full by the remote copy when it is reachable.
    pub async fn load_with_remote(&self) -> PersistencePayload {
        let local = self.load();
        let Some(remote) = &self.remote else {
            return local;
        };

        match remote.remote().fetch().await {
            Ok(payload) => {
                info!(
                    categories = payload.categories.len(),
                    annotations = payload.annotations.len(),
                    "remote annotation state replaces local state"
                );
                if let Err(err) = self.local.write(&payload) {
                    warn!(error = %err, "failed to mirror remote state locally");
                }
                payload
            }
            Err(err) => {
                debug!(error = %err, "remote annotation state unreachable, using local state");
                local
            }
        }
    }

    pub fn save(&mut self, payload: &PersistencePayload) {
        if let Err(err) = self.local.write(payload) {
            warn!(error = %err, "failed to write local annotation state");
        }
        if let Some(remote) = &mut self.remote {
            remote.schedule(payload.clone());
        }
    }

    pub async fn flush(&mut self) {
        if let Some(remote) = &mut self.remote {
            remote.flush().await;
        }
    }
}
