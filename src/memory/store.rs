use super::record::StoredRecord;
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Append-only record log, read back by session for replay and audit.
/// Records are never updated in place.
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn append(&self, session_id: Uuid, record: &StoredRecord) -> Result<(), StoreError>;

    /// Every record of a session in append order; empty if the session is unknown
    async fn read_session(&self, session_id: Uuid) -> Result<Vec<StoredRecord>, StoreError>;

    async fn sessions(&self) -> Result<Vec<Uuid>, StoreError>;
}

/// One JSON Lines file per session under a directory
pub struct JsonlStore {
    dir: PathBuf,
}

impl JsonlStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn session_path(&self, session_id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.jsonl", session_id))
    }
}

#[async_trait]
impl DurableStore for JsonlStore {
    async fn append(&self, session_id: Uuid, record: &StoredRecord) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        fs::create_dir_all(&self.dir).await?;
        let path = self.session_path(session_id);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        // One write per record keeps lines whole
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        debug!("Appended {} record to {}", record.kind(), path.display());
        Ok(())
    }

    async fn read_session(&self, session_id: Uuid) -> Result<Vec<StoredRecord>, StoreError> {
        let path = self.session_path(session_id);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&path).await?;
        let mut lines = BufReader::new(file).lines();
        let mut records = Vec::new();
        let mut line_no = 0;

        while let Some(line) = lines.next_line().await? {
            line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            let record = serde_json::from_str(&line).map_err(|e| StoreError::Corrupt {
                path: path.clone(),
                line: line_no,
                reason: e.to_string(),
            })?;
            records.push(record);
        }

        Ok(records)
    }

    async fn sessions(&self) -> Result<Vec<Uuid>, StoreError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = fs::read_dir(&self.dir).await?;
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| Uuid::parse_str(s).ok())
            {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// Process-local store used by tests and dry runs
#[derive(Default)]
pub struct InMemoryStore {
    sessions: RwLock<BTreeMap<Uuid, Vec<StoredRecord>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DurableStore for InMemoryStore {
    async fn append(&self, session_id: Uuid, record: &StoredRecord) -> Result<(), StoreError> {
        self.sessions
            .write()
            .await
            .entry(session_id)
            .or_default()
            .push(record.clone());
        Ok(())
    }

    async fn read_session(&self, session_id: Uuid) -> Result<Vec<StoredRecord>, StoreError> {
        Ok(self
            .sessions
            .read()
            .await
            .get(&session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn sessions(&self) -> Result<Vec<Uuid>, StoreError> {
        Ok(self.sessions.read().await.keys().copied().collect())
    }
}
