use crate::state::SharedState;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;
use uuid::Uuid;

/// Working memory: latest snapshot per active session.
///
/// Best effort only. A poisoned lock or a miss just means the caller falls
/// back to the durable store.
#[derive(Default)]
pub struct SnapshotCache {
    latest: RwLock<HashMap<Uuid, Arc<SharedState>>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `snapshot` unless a later revision of the same session is cached
    pub fn put(&self, snapshot: &SharedState) {
        let Ok(mut latest) = self.latest.write() else {
            debug!("Snapshot cache unavailable, skipping put");
            return;
        };
        let newer_cached = latest
            .get(&snapshot.session_id)
            .map(|s| s.sequence > snapshot.sequence)
            .unwrap_or(false);
        if !newer_cached {
            latest.insert(snapshot.session_id, Arc::new(snapshot.clone()));
        }
    }

    pub fn get(&self, session_id: Uuid) -> Option<Arc<SharedState>> {
        self.latest.read().ok()?.get(&session_id).cloned()
    }

    pub fn evict(&self, session_id: Uuid) {
        if let Ok(mut latest) = self.latest.write() {
            latest.remove(&session_id);
        }
    }
}
