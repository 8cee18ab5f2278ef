//! Session and workflow-state persistence seams.
//!
//! The platform's real store is an external key-value collaborator; Herald
//! only needs get/set/delete keyed by session identity and by workflow
//! session id. Two implementations ship here: an in-memory store for tests
//! and a JSON-file store that survives daemon restarts (written atomically
//! via a temp-file rename).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{info, warn};

use herald_types::{ChatSession, HeraldError, SessionKey};
use herald_workflow::SavedWorkflow;

/// Persistence for chat sessions.
pub trait SessionStore: Send + Sync {
    fn load(&self, key: &SessionKey) -> Result<Option<ChatSession>, HeraldError>;
    fn save(&self, session: &ChatSession) -> Result<(), HeraldError>;
    fn delete(&self, key: &SessionKey) -> Result<(), HeraldError>;
    /// All stored sessions; used by maintenance sweeps.
    fn list(&self) -> Result<Vec<ChatSession>, HeraldError>;
}

/// Persistence for workflow snapshots produced by `WorkflowManager::save_all`.
pub trait WorkflowStateStore: Send + Sync {
    fn save_snapshot(&self, snapshot: &HashMap<String, SavedWorkflow>) -> Result<(), HeraldError>;
    fn load_snapshot(&self) -> Result<HashMap<String, SavedWorkflow>, HeraldError>;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// In-memory store for tests and ephemeral deployments.
#[derive(Default)]
pub struct MemoryStore {
    sessions: Mutex<HashMap<SessionKey, ChatSession>>,
    workflows: Mutex<HashMap<String, SavedWorkflow>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn load(&self, key: &SessionKey) -> Result<Option<ChatSession>, HeraldError> {
        Ok(self
            .sessions
            .lock()
            .expect("session store poisoned")
            .get(key)
            .cloned())
    }

    fn save(&self, session: &ChatSession) -> Result<(), HeraldError> {
        self.sessions
            .lock()
            .expect("session store poisoned")
            .insert(session.key.clone(), session.clone());
        Ok(())
    }

    fn delete(&self, key: &SessionKey) -> Result<(), HeraldError> {
        self.sessions
            .lock()
            .expect("session store poisoned")
            .remove(key);
        Ok(())
    }

    fn list(&self) -> Result<Vec<ChatSession>, HeraldError> {
        Ok(self
            .sessions
            .lock()
            .expect("session store poisoned")
            .values()
            .cloned()
            .collect())
    }
}

impl WorkflowStateStore for MemoryStore {
    fn save_snapshot(&self, snapshot: &HashMap<String, SavedWorkflow>) -> Result<(), HeraldError> {
        *self.workflows.lock().expect("workflow store poisoned") = snapshot.clone();
        Ok(())
    }

    fn load_snapshot(&self) -> Result<HashMap<String, SavedWorkflow>, HeraldError> {
        Ok(self
            .workflows
            .lock()
            .expect("workflow store poisoned")
            .clone())
    }
}

// ---------------------------------------------------------------------------
// JSON file store
// ---------------------------------------------------------------------------

/// JSON-file-backed store.
///
/// Sessions and workflow snapshots live in two files under one directory.
/// Writes go to a temp file first and rename into place, so a crash
/// mid-write never leaves a torn file behind.
pub struct JsonFileStore {
    sessions_path: PathBuf,
    workflows_path: PathBuf,
    /// Serializes file rewrites; readers go through the same lock.
    io: Mutex<()>,
}

impl JsonFileStore {
    /// Create a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, HeraldError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .map_err(|e| HeraldError::StoreError(format!("failed to create {dir:?}: {e}")))?;
        Ok(Self {
            sessions_path: dir.join("sessions.json"),
            workflows_path: dir.join("workflows.json"),
            io: Mutex::new(()),
        })
    }

    fn read_file<T: DeserializeOwned + Default>(&self, path: &Path) -> Result<T, HeraldError> {
        if !path.exists() {
            return Ok(T::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| HeraldError::StoreError(format!("failed to read {path:?}: {e}")))?;
        serde_json::from_str(&content).map_err(|e| {
            warn!(?path, error = %e, "store file is corrupt");
            HeraldError::StoreError(format!("corrupt store file {path:?}: {e}"))
        })
    }

    fn write_file<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), HeraldError> {
        let content = serde_json::to_string_pretty(value)
            .map_err(|e| HeraldError::StoreError(e.to_string()))?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, content)
            .map_err(|e| HeraldError::StoreError(format!("failed to write {tmp:?}: {e}")))?;
        std::fs::rename(&tmp, path)
            .map_err(|e| HeraldError::StoreError(format!("failed to replace {path:?}: {e}")))?;
        Ok(())
    }

    fn session_map_key(key: &SessionKey) -> String {
        key.to_string()
    }
}

impl SessionStore for JsonFileStore {
    fn load(&self, key: &SessionKey) -> Result<Option<ChatSession>, HeraldError> {
        let _guard = self.io.lock().expect("store io poisoned");
        let sessions: HashMap<String, ChatSession> = self.read_file(&self.sessions_path)?;
        Ok(sessions.get(&Self::session_map_key(key)).cloned())
    }

    fn save(&self, session: &ChatSession) -> Result<(), HeraldError> {
        let _guard = self.io.lock().expect("store io poisoned");
        let mut sessions: HashMap<String, ChatSession> = self.read_file(&self.sessions_path)?;
        sessions.insert(Self::session_map_key(&session.key), session.clone());
        self.write_file(&self.sessions_path, &sessions)
    }

    fn delete(&self, key: &SessionKey) -> Result<(), HeraldError> {
        let _guard = self.io.lock().expect("store io poisoned");
        let mut sessions: HashMap<String, ChatSession> = self.read_file(&self.sessions_path)?;
        if sessions.remove(&Self::session_map_key(key)).is_some() {
            self.write_file(&self.sessions_path, &sessions)?;
        }
        Ok(())
    }

    fn list(&self) -> Result<Vec<ChatSession>, HeraldError> {
        let _guard = self.io.lock().expect("store io poisoned");
        let sessions: HashMap<String, ChatSession> = self.read_file(&self.sessions_path)?;
        Ok(sessions.into_values().collect())
    }
}

impl WorkflowStateStore for JsonFileStore {
    fn save_snapshot(&self, snapshot: &HashMap<String, SavedWorkflow>) -> Result<(), HeraldError> {
        let _guard = self.io.lock().expect("store io poisoned");
        self.write_file(&self.workflows_path, snapshot)?;
        info!(count = snapshot.len(), "workflow snapshot persisted");
        Ok(())
    }

    fn load_snapshot(&self) -> Result<HashMap<String, SavedWorkflow>, HeraldError> {
        let _guard = self.io.lock().expect("store io poisoned");
        self.read_file(&self.workflows_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn session(user: &str) -> ChatSession {
        ChatSession::new(SessionKey::new("t1", user, "whatsapp"))
    }

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryStore::new();
        let s = session("u1");
        assert!(store.load(&s.key).unwrap().is_none());

        store.save(&s).unwrap();
        let loaded = store.load(&s.key).unwrap().unwrap();
        assert_eq!(loaded.key, s.key);

        store.delete(&s.key).unwrap();
        assert!(store.load(&s.key).unwrap().is_none());
    }

    #[test]
    fn json_store_roundtrip_across_instances() {
        let dir = TempDir::new().unwrap();
        let s = session("u1");

        {
            let store = JsonFileStore::open(dir.path()).unwrap();
            store.save(&s).unwrap();
            store.save(&session("u2")).unwrap();
        }

        // A fresh store over the same directory sees the data.
        let store = JsonFileStore::open(dir.path()).unwrap();
        assert!(store.load(&s.key).unwrap().is_some());
        assert_eq!(store.list().unwrap().len(), 2);

        store.delete(&s.key).unwrap();
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn json_store_workflow_snapshot_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();

        assert!(store.load_snapshot().unwrap().is_empty());

        let mut snapshot = HashMap::new();
        snapshot.insert(
            "assessment-u1-abc".to_string(),
            SavedWorkflow {
                type_name: "assessment".to_string(),
                owner: herald_types::UserId::new("u1"),
                started_at: chrono::Utc::now(),
                state: serde_json::json!({ "answers": ["Ana"] }),
            },
        );
        store.save_snapshot(&snapshot).unwrap();

        let loaded = store.load_snapshot().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded["assessment-u1-abc"].type_name, "assessment");
    }

    #[test]
    fn missing_files_read_as_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(dir.path().join("nested")).unwrap();
        assert!(store.list().unwrap().is_empty());
        assert!(store.load_snapshot().unwrap().is_empty());
    }
}
