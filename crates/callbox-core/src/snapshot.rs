//! Snapshot persistence of the session state
//!
//! The store is restored once at startup and written back after every
//! change. Persistence problems never stop the client: a snapshot that cannot
//! be read is replaced by defaults, a failed write is logged and retried on
//! the next change.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{CallboxError, CallboxResult};
use crate::state::SessionState;
use crate::store::SessionStore;

/// Where snapshots live
#[async_trait]
pub trait SnapshotStorage: Send + Sync {
    /// Read the last snapshot, `None` if there is none yet
    async fn load(&self) -> CallboxResult<Option<SessionState>>;

    /// Replace the stored snapshot
    async fn save(&self, snapshot: &SessionState) -> CallboxResult<()>;
}

/// JSON file snapshot storage
#[derive(Debug, Clone)]
pub struct FileSnapshotStorage {
    path: PathBuf,
}

impl FileSnapshotStorage {
    /// Store snapshots at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Snapshot file location
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SnapshotStorage for FileSnapshotStorage {
    async fn load(&self) -> CallboxResult<Option<SessionState>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let snapshot = serde_json::from_slice(&bytes).map_err(|e| {
            CallboxError::snapshot(format!("{}: {e}", self.path.display()))
        })?;
        Ok(Some(snapshot))
    }

    async fn save(&self, snapshot: &SessionState) -> CallboxResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        // write then rename so a crash never leaves a torn file
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// Snapshot storage kept in memory
#[derive(Debug, Default)]
pub struct MemorySnapshotStorage {
    snapshot: Mutex<Option<SessionState>>,
    saves: Mutex<usize>,
}

impl MemorySnapshotStorage {
    /// Empty storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-filled with `snapshot`
    pub fn with_snapshot(snapshot: SessionState) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
            saves: Mutex::new(0),
        }
    }

    /// Currently stored snapshot
    pub fn stored(&self) -> Option<SessionState> {
        self.snapshot.lock().clone()
    }

    /// Number of completed saves
    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }
}

#[async_trait]
impl SnapshotStorage for MemorySnapshotStorage {
    async fn load(&self) -> CallboxResult<Option<SessionState>> {
        Ok(self.snapshot.lock().clone())
    }

    async fn save(&self, snapshot: &SessionState) -> CallboxResult<()> {
        *self.snapshot.lock() = Some(snapshot.clone());
        *self.saves.lock() += 1;
        Ok(())
    }
}

/// Build the store from whatever snapshot `storage` holds
pub async fn setup_session_store(storage: &dyn SnapshotStorage) -> SessionStore {
    let state = match storage.load().await {
        Ok(Some(snapshot)) => {
            debug!("Restored session snapshot");
            SessionState::restore(snapshot)
        }
        Ok(None) => SessionState::default(),
        Err(e) => {
            warn!(error = %e, "Could not restore session snapshot, starting fresh");
            SessionState::default()
        }
    };
    SessionStore::new(state)
}

/// Save a snapshot after every state change until the store is dropped
pub fn spawn_snapshot_persister(
    store: &SessionStore,
    storage: Arc<dyn SnapshotStorage>,
) -> JoinHandle<()> {
    let mut changes = store.subscribe();
    tokio::spawn(async move {
        while changes.changed().await.is_ok() {
            let snapshot = changes.borrow_and_update().clone();
            if let Err(e) = storage.save(&snapshot).await {
                warn!(error = %e, "Failed to persist session snapshot");
            }
        }
        debug!("Session store closed, snapshot persister exiting");
    })
}
