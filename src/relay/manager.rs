use crate::audio::AudioArtifact;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What a client connection is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionMode {
    /// Health-check echo, no upstream involved
    Echo,
    Transcribe,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub id: Uuid,
    pub client_id: String,
    pub mode: ConnectionMode,
    pub connected_at: DateTime<Utc>,
}

type ClaimCounts = Arc<Mutex<HashMap<PathBuf, usize>>>;

/// Registry of live client connections (connection id → info), plus the
/// uploads those connections are currently streaming.
#[derive(Debug, Clone, Default)]
pub struct ConnectionManager {
    connections: Arc<RwLock<HashMap<Uuid, ConnectionInfo>>>,
    uploads: ClaimCounts,
}

/// One connection's share of an uploaded file.
///
/// Connections naming the same upload share it; the file is deleted when the
/// last claim is released or dropped.
#[derive(Debug)]
pub struct UploadClaim {
    path: PathBuf,
    uploads: ClaimCounts,
    released: bool,
}

impl UploadClaim {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Give up this share, deleting the file if it was the last one.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.unclaim()
    }

    fn unclaim(&self) -> Result<()> {
        let mut uploads = match self.uploads.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let remaining = match uploads.get_mut(&self.path) {
            Some(count) => {
                *count = count.saturating_sub(1);
                *count
            }
            None => 0,
        };

        if remaining > 0 {
            debug!("Upload {} still used by {} connection(s)", self.path.display(), remaining);
            return Ok(());
        }
        uploads.remove(&self.path);

        // Deleted under the lock so a new claim cannot race the removal.
        AudioArtifact::owned(&self.path).release()
    }
}

impl Drop for UploadClaim {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = self.unclaim() {
                warn!("Failed to delete upload {}: {}", self.path.display(), e);
            }
        }
    }
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn connect(&self, client_id: &str, mode: ConnectionMode) -> ConnectionInfo {
        let info = ConnectionInfo {
            id: Uuid::new_v4(),
            client_id: client_id.to_string(),
            mode,
            connected_at: Utc::now(),
        };

        let mut connections = self.connections.write().await;
        connections.insert(info.id, info.clone());
        info!(
            "Connection {} registered for client {} ({} live)",
            info.id,
            client_id,
            connections.len()
        );

        info
    }

    pub async fn disconnect(&self, id: Uuid) -> Option<ConnectionInfo> {
        let mut connections = self.connections.write().await;
        let removed = connections.remove(&id);
        if removed.is_some() {
            info!("Connection {} removed ({} live)", id, connections.len());
        }
        removed
    }

    /// Live connections, oldest first
    pub async fn list(&self) -> Vec<ConnectionInfo> {
        let connections = self.connections.read().await;
        let mut list: Vec<ConnectionInfo> = connections.values().cloned().collect();
        list.sort_by_key(|info| info.connected_at);
        list
    }

    /// Claim a share of an upload; `path` should be canonical so aliases share one entry.
    pub fn claim_upload(&self, path: PathBuf) -> UploadClaim {
        let mut uploads = match self.uploads.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let count = uploads.entry(path.clone()).or_insert(0);
        *count += 1;
        debug!("Upload {} claimed ({} connection(s))", path.display(), count);
        drop(uploads);

        UploadClaim {
            path,
            uploads: Arc::clone(&self.uploads),
            released: false,
        }
    }

    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_and_disconnect_are_explicit() {
        let manager = ConnectionManager::new();
        let first = manager.connect("alice", ConnectionMode::Transcribe).await;
        let second = manager.connect("test", ConnectionMode::Echo).await;
        assert_eq!(manager.len().await, 2);
        assert_ne!(first.id, second.id);

        let removed = manager.disconnect(first.id).await.unwrap();
        assert_eq!(removed.client_id, "alice");
        assert!(manager.disconnect(first.id).await.is_none());

        let live = manager.list().await;
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].mode, ConnectionMode::Echo);

        manager.disconnect(second.id).await;
        assert!(manager.is_empty().await);
    }

    #[test]
    fn upload_is_deleted_by_last_claim() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("upload.wav");
        std::fs::write(&path, b"RIFF").unwrap();

        let manager = ConnectionManager::new();
        let first = manager.claim_upload(path.clone());
        let second = manager.claim_upload(path.clone());

        first.release().unwrap();
        assert!(path.exists());

        drop(second);
        assert!(!path.exists());

        // A later claim on a consumed upload is harmless.
        manager.claim_upload(path.clone()).release().unwrap();
    }
}
