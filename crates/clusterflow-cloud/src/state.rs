//! Resource record persistence
//!
//! Records live under a `provider:type:name` key. [`StateManager`] keeps them
//! in `.clusterflow/state.json` next to the project, [`MemoryStateStore`]
//! keeps them in process for embedding and tests.

use crate::error::{CloudError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

const FORMAT_VERSION: u32 = 1;
const STATE_DIR: &str = ".clusterflow";
const STATE_FILE: &str = "state.json";
const STATE_BACKUP: &str = "state.json.backup";
const STATE_TMP: &str = "state.json.tmp";

/// Persistent store for resource records
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<ResourceState>>;

    /// Inserts or replaces the record; the first creation time is kept
    async fn put(&self, key: &str, state: ResourceState) -> Result<()>;

    /// Removes the record, returning it when it existed
    async fn remove(&self, key: &str) -> Result<Option<ResourceState>>;
}

/// Every record known to a store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    /// Format version of the document
    pub version: u32,

    pub updated_at: DateTime<Utc>,

    pub resources: HashMap<String, ResourceState>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            version: FORMAT_VERSION,
            updated_at: Utc::now(),
            resources: HashMap::new(),
        }
    }
}

impl StateFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, mut record: ResourceState) {
        if let Some(existing) = self.resources.get(key) {
            record.created_at = existing.created_at;
        }
        self.resources.insert(key.to_string(), record);
        self.updated_at = Utc::now();
    }

    pub fn remove(&mut self, key: &str) -> Option<ResourceState> {
        let removed = self.resources.remove(key)?;
        self.updated_at = Utc::now();
        Some(removed)
    }

    fn check_version(&self) -> Result<()> {
        if self.version > FORMAT_VERSION {
            return Err(CloudError::StateError(format!(
                "state format {} is newer than supported format {}",
                self.version, FORMAT_VERSION
            )));
        }
        Ok(())
    }
}

/// A persisted resource: its remote identifier, a coarse status and an
/// opaque attribute document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    pub id: String,

    pub resource_type: String,

    pub status: ResourceStatus,

    pub attributes: HashMap<String, serde_json::Value>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl ResourceState {
    pub fn new(id: impl Into<String>, resource_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            resource_type: resource_type.into(),
            status: ResourceStatus::Unknown,
            attributes: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_status(mut self, status: ResourceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Decodes an attribute; `None` when missing or of another shape
    pub fn get_attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.attributes.get(key)?;
        match T::deserialize(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                tracing::warn!("Ignoring undecodable attribute '{}' of {}: {}", key, self.id, e);
                None
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    Creating,
    Running,
    /// Hibernating or on its way in or out of hibernation
    Stopped,
    Deleting,
    Error,
    Unknown,
}

impl ResourceStatus {
    /// Maps a managed cluster lifecycle state onto a resource status
    pub fn from_cluster_state(state: &str) -> Self {
        match state {
            "installing" | "pending" | "validating" | "waiting" => Self::Creating,
            "ready" => Self::Running,
            "hibernating" | "powering_down" | "resuming" => Self::Stopped,
            "uninstalling" => Self::Deleting,
            "error" => Self::Error,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Creating => "creating",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Deleting => "deleting",
            Self::Error => "error",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File-backed state store
///
/// Each write copies the current file to `state.json.backup`, then replaces
/// `state.json` through a temporary file so a crash never leaves it
/// truncated.
pub struct StateManager {
    state_dir: PathBuf,
    /// Serializes read-modify-write cycles within this process
    guard: Mutex<()>,
}

impl StateManager {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            state_dir: project_root.as_ref().join(STATE_DIR),
            guard: Mutex::new(()),
        }
    }

    pub fn state_path(&self) -> PathBuf {
        self.state_dir.join(STATE_FILE)
    }

    pub fn backup_path(&self) -> PathBuf {
        self.state_dir.join(STATE_BACKUP)
    }

    /// Reads the state file; a missing file is an empty state
    pub async fn load(&self) -> Result<StateFile> {
        let path = self.state_path();
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("No state file at {}", path.display());
                return Ok(StateFile::new());
            }
            Err(e) => return Err(e.into()),
        };

        let state: StateFile = serde_json::from_slice(&bytes)?;
        state.check_version()?;
        tracing::debug!("Loaded {} resource records", state.resources.len());
        Ok(state)
    }

    pub async fn save(&self, state: &StateFile) -> Result<()> {
        fs::create_dir_all(&self.state_dir).await?;

        let path = self.state_path();
        match fs::copy(&path, self.backup_path()).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let tmp = self.state_dir.join(STATE_TMP);
        fs::write(&tmp, serde_json::to_vec_pretty(state)?).await?;
        fs::rename(&tmp, &path).await?;

        tracing::debug!("Saved {} resource records", state.resources.len());
        Ok(())
    }
}

#[async_trait]
impl StateStore for StateManager {
    async fn get(&self, key: &str) -> Result<Option<ResourceState>> {
        Ok(self.load().await?.resources.remove(key))
    }

    async fn put(&self, key: &str, record: ResourceState) -> Result<()> {
        let _guard = self.guard.lock().await;
        let mut state = self.load().await?;
        state.insert(key, record);
        self.save(&state).await
    }

    async fn remove(&self, key: &str) -> Result<Option<ResourceState>> {
        let _guard = self.guard.lock().await;
        let mut state = self.load().await?;
        let removed = state.remove(key);
        if removed.is_some() {
            self.save(&state).await?;
        }
        Ok(removed)
    }
}

/// In-memory state store
#[derive(Default)]
pub struct MemoryStateStore {
    state: Mutex<StateFile>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> StateFile {
        self.state.lock().await.clone()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<ResourceState>> {
        Ok(self.state.lock().await.resources.get(key).cloned())
    }

    async fn put(&self, key: &str, record: ResourceState) -> Result<()> {
        self.state.lock().await.insert(key, record);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<Option<ResourceState>> {
        Ok(self.state.lock().await.remove(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    const KEY: &str = "rosa-classic:cluster:dev";

    #[tokio::test]
    async fn test_save_and_load() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let mut state = StateFile::new();
        state.insert(
            KEY,
            ResourceState::new("1n2j3k4l", "cluster")
                .with_status(ResourceStatus::Running)
                .with_attribute("cluster", json!({"name": "dev"})),
        );
        state.insert("other:bucket:logs", ResourceState::new("logs", "bucket"));
        manager.save(&state).await.unwrap();

        let loaded = manager.load().await.unwrap();
        assert_eq!(loaded.resources.len(), 2);
        let record = &loaded.resources[KEY];
        assert_eq!(record.id, "1n2j3k4l");
        assert_eq!(record.status, ResourceStatus::Running);
        assert_eq!(record.attributes["cluster"], json!({"name": "dev"}));
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_state() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        assert!(manager.load().await.unwrap().resources.is_empty());
        assert!(manager.get(KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_newer_format_is_rejected() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let state = StateFile {
            version: FORMAT_VERSION + 1,
            ..StateFile::default()
        };
        manager.save(&state).await.unwrap();

        let err = manager.load().await.unwrap_err();
        assert!(matches!(err, CloudError::StateError(_)));
    }

    #[tokio::test]
    async fn test_put_keeps_a_backup() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        manager
            .put(KEY, ResourceState::new("abc", "cluster"))
            .await
            .unwrap();
        assert!(!manager.backup_path().exists());

        manager
            .put(KEY, ResourceState::new("abc", "cluster").with_status(ResourceStatus::Running))
            .await
            .unwrap();

        let backup: StateFile =
            serde_json::from_slice(&std::fs::read(manager.backup_path()).unwrap()).unwrap();
        assert_eq!(backup.resources[KEY].status, ResourceStatus::Unknown);
        assert_eq!(
            manager.get(KEY).await.unwrap().unwrap().status,
            ResourceStatus::Running
        );
    }

    #[tokio::test]
    async fn test_remove() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        manager
            .put(KEY, ResourceState::new("abc", "cluster"))
            .await
            .unwrap();
        assert_eq!(manager.remove(KEY).await.unwrap().unwrap().id, "abc");
        assert!(manager.get(KEY).await.unwrap().is_none());
        assert!(manager.remove(KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_keeps_created_at() {
        let store = MemoryStateStore::new();

        let first = ResourceState::new("abc", "cluster");
        let created = first.created_at;
        store.put(KEY, first).await.unwrap();
        store
            .put(KEY, ResourceState::new("abc", "cluster").with_status(ResourceStatus::Running))
            .await
            .unwrap();

        let stored = store.get(KEY).await.unwrap().unwrap();
        assert_eq!(stored.created_at, created);
        assert_eq!(stored.status, ResourceStatus::Running);
        assert_eq!(store.snapshot().await.resources.len(), 1);
    }

    #[test]
    fn test_get_attribute() {
        let record = ResourceState::new("abc", "cluster").with_attribute("replicas", json!(3));

        assert_eq!(record.get_attribute::<i64>("replicas"), Some(3));
        assert_eq!(record.get_attribute::<String>("replicas"), None);
        assert_eq!(record.get_attribute::<i64>("missing"), None);
    }

    #[test]
    fn test_status_from_cluster_state() {
        assert_eq!(
            ResourceStatus::from_cluster_state("installing"),
            ResourceStatus::Creating
        );
        assert_eq!(ResourceStatus::from_cluster_state("ready"), ResourceStatus::Running);
        assert_eq!(
            ResourceStatus::from_cluster_state("hibernating"),
            ResourceStatus::Stopped
        );
        assert_eq!(
            ResourceStatus::from_cluster_state("uninstalling"),
            ResourceStatus::Deleting
        );
        assert_eq!(ResourceStatus::from_cluster_state("bogus"), ResourceStatus::Unknown);
        assert_eq!(ResourceStatus::Deleting.to_string(), "deleting");
    }
}
