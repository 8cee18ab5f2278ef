//! Workflow type registry and active-instance management.
//!
//! The [`WorkflowManager`] is an explicitly constructed, injected component
//! (no process-wide singleton): tests run as many independent managers as
//! they like. It registers workflow *types* at startup, tracks *active*
//! instances by session id, routes inbound turns, detects completion, and
//! persists/restores instance state.
//!
//! Locking: the active map sits behind one async mutex so insert/remove is
//! atomic with respect to `save_all` iteration; each instance sits behind
//! its own `Arc<Mutex>` so a turn in one session never blocks turns in
//! another. `handle_message` drops the map lock before locking the
//! instance.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use herald_types::UserId;

use crate::workflow::{
    Workflow, WorkflowContext, WorkflowDescriptor, WorkflowError, WorkflowReply,
};

/// User-safe text for a workflow that errored or timed out mid-turn.
pub const WORKFLOW_ERROR_REPLY: &str =
    "Lo sentimos, algo salió mal con este proceso. Escríbenos de nuevo para continuar.";

/// User-safe text for a turn addressed to a workflow that no longer exists.
pub const WORKFLOW_NOT_FOUND_REPLY: &str =
    "Parece que ese proceso ya no está activo. Empecemos de nuevo.";

/// Default bound on a single workflow turn.
const DEFAULT_TURN_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of routing one inbound message to a workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowTurn {
    /// The workflow produced a reply and remains active.
    InProgress(WorkflowReply),
    /// The workflow produced a final reply and was removed from the active
    /// map before this value was returned.
    Completed(WorkflowReply),
    /// No active instance for the session id; the session reference is
    /// stale. Handled gracefully, never an error.
    NotFound,
    /// The instance errored or timed out; it was removed (fail closed) and
    /// the carried text is safe to show the user.
    Failed(WorkflowReply),
}

/// A workflow's serialized form, as produced by [`WorkflowManager::save_all`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedWorkflow {
    pub type_name: String,
    pub owner: UserId,
    pub started_at: DateTime<Utc>,
    pub state: serde_json::Value,
}

/// Result of creating a workflow instance.
#[derive(Debug)]
pub struct CreatedWorkflow {
    /// Identifier for subsequent `handle_message`/`abort` calls; also what
    /// the chat session stores as its active workflow id.
    pub session_id: String,
    /// Opening reply produced by `initialize`.
    pub first_reply: WorkflowReply,
}

struct ActiveEntry {
    type_name: String,
    owner: UserId,
    started_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
    instance: Arc<Mutex<Box<dyn Workflow>>>,
}

/// Registry of workflow types plus the map of active instances.
pub struct WorkflowManager {
    registry: RwLock<HashMap<String, WorkflowDescriptor>>,
    active: Mutex<HashMap<String, ActiveEntry>>,
    turn_timeout: Duration,
}

impl WorkflowManager {
    /// Create an empty manager with the default turn timeout.
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(HashMap::new()),
            active: Mutex::new(HashMap::new()),
            turn_timeout: DEFAULT_TURN_TIMEOUT,
        }
    }

    /// Override the per-turn timeout.
    pub fn with_turn_timeout(mut self, timeout: Duration) -> Self {
        self.turn_timeout = timeout;
        self
    }

    /// Register a workflow type.
    ///
    /// Fails on duplicate names and on dependencies that are not already
    /// registered — the dependency graph must be registered leaves-first.
    /// Registration errors are programmer errors; callers should propagate
    /// them at process start rather than swallow them.
    pub fn register(&self, descriptor: WorkflowDescriptor) -> Result<(), WorkflowError> {
        let mut registry = self.registry.write().expect("workflow registry poisoned");
        if registry.contains_key(&descriptor.type_name) {
            return Err(WorkflowError::DuplicateWorkflowType(
                descriptor.type_name.clone(),
            ));
        }
        for dependency in &descriptor.dependencies {
            if !registry.contains_key(dependency) {
                return Err(WorkflowError::UnknownDependency {
                    type_name: descriptor.type_name.clone(),
                    dependency: dependency.clone(),
                });
            }
        }
        info!(
            type_name = %descriptor.type_name,
            dependencies = ?descriptor.dependencies,
            "workflow type registered"
        );
        registry.insert(descriptor.type_name.clone(), descriptor);
        Ok(())
    }

    /// Enable or disable a registered type. Disabled types block creation
    /// of every type that depends on them.
    pub fn set_enabled(&self, type_name: &str, enabled: bool) -> Result<(), WorkflowError> {
        let mut registry = self.registry.write().expect("workflow registry poisoned");
        let descriptor = registry
            .get_mut(type_name)
            .ok_or_else(|| WorkflowError::UnregisteredType(type_name.to_string()))?;
        descriptor.enabled = enabled;
        Ok(())
    }

    /// Registered type names, for diagnostics.
    pub fn registered_types(&self) -> Vec<String> {
        self.registry
            .read()
            .expect("workflow registry poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Create and initialize a new instance of a registered type.
    ///
    /// The instance enters the active map only after a successful
    /// `initialize`. Callers enforce the one-active-workflow-per-chat-
    /// session rule at the session boundary.
    pub async fn create(
        &self,
        type_name: &str,
        ctx: WorkflowContext,
    ) -> Result<CreatedWorkflow, WorkflowError> {
        let (factory, dependencies) = {
            let registry = self.registry.read().expect("workflow registry poisoned");
            let descriptor = registry
                .get(type_name)
                .ok_or_else(|| WorkflowError::UnregisteredType(type_name.to_string()))?;
            for dependency in &descriptor.dependencies {
                let satisfied = registry.get(dependency).is_some_and(|d| d.enabled);
                if !satisfied {
                    return Err(WorkflowError::DependencyNotSatisfied {
                        type_name: type_name.to_string(),
                        dependency: dependency.clone(),
                    });
                }
            }
            (Arc::clone(&descriptor.factory), descriptor.dependencies.len())
        };

        let mut instance = factory.create();
        let first_reply = instance.initialize(&ctx).await?;

        let now = Utc::now();
        let session_id = derive_session_id(type_name, &ctx.user_id, now);
        let entry = ActiveEntry {
            type_name: type_name.to_string(),
            owner: ctx.user_id.clone(),
            started_at: now,
            last_activity_at: now,
            instance: Arc::new(Mutex::new(instance)),
        };

        self.active.lock().await.insert(session_id.clone(), entry);
        info!(
            %session_id,
            type_name,
            owner = %ctx.user_id,
            dependencies,
            "workflow instance created"
        );

        Ok(CreatedWorkflow {
            session_id,
            first_reply,
        })
    }

    /// Route one inbound message to the active instance for `session_id`.
    ///
    /// A missing instance yields [`WorkflowTurn::NotFound`]. A turn that
    /// errors or exceeds the turn timeout removes the instance (fail
    /// closed — an erroring workflow must not keep the session stuck) and
    /// yields [`WorkflowTurn::Failed`] with user-safe text.
    pub async fn handle_message(&self, session_id: &str, text: &str) -> WorkflowTurn {
        let instance = {
            let mut active = self.active.lock().await;
            match active.get_mut(session_id) {
                Some(entry) => {
                    entry.last_activity_at = Utc::now();
                    Arc::clone(&entry.instance)
                }
                None => {
                    info!(%session_id, "message for inactive workflow session");
                    return WorkflowTurn::NotFound;
                }
            }
        };

        let mut workflow = instance.lock().await;
        let turn = tokio::time::timeout(self.turn_timeout, workflow.handle_message(text)).await;

        match turn {
            Ok(Ok(reply)) => {
                if workflow.is_completed() {
                    drop(workflow);
                    self.remove(session_id).await;
                    info!(%session_id, "workflow completed");
                    WorkflowTurn::Completed(reply)
                } else {
                    WorkflowTurn::InProgress(reply)
                }
            }
            Ok(Err(err)) => {
                drop(workflow);
                error!(%session_id, error = %err, "workflow turn failed; discarding instance");
                self.remove(session_id).await;
                WorkflowTurn::Failed(WorkflowReply::text(WORKFLOW_ERROR_REPLY))
            }
            Err(_) => {
                drop(workflow);
                error!(
                    %session_id,
                    timeout_secs = self.turn_timeout.as_secs(),
                    "workflow turn timed out; discarding instance"
                );
                self.remove(session_id).await;
                WorkflowTurn::Failed(WorkflowReply::text(WORKFLOW_ERROR_REPLY))
            }
        }
    }

    /// Abort an active instance. Idempotent: aborting an unknown id is a
    /// successful no-op.
    pub async fn abort(&self, session_id: &str) {
        let removed = self.active.lock().await.remove(session_id);
        if let Some(entry) = removed {
            entry.instance.lock().await.abort();
            info!(%session_id, type_name = %entry.type_name, "workflow aborted");
        }
    }

    /// Whether an instance is active under this session id.
    pub async fn is_active(&self, session_id: &str) -> bool {
        self.active.lock().await.contains_key(session_id)
    }

    /// Number of active instances.
    pub async fn active_count(&self) -> usize {
        self.active.lock().await.len()
    }

    /// Serialize every active instance for persistence.
    ///
    /// Instances whose `save_state` fails are skipped and logged — a
    /// corrupted instance must not block persisting the rest.
    pub async fn save_all(&self) -> HashMap<String, SavedWorkflow> {
        let active = self.active.lock().await;
        let mut saved = HashMap::with_capacity(active.len());

        for (session_id, entry) in active.iter() {
            let workflow = entry.instance.lock().await;
            match workflow.save_state() {
                Ok(state) => {
                    saved.insert(
                        session_id.clone(),
                        SavedWorkflow {
                            type_name: entry.type_name.clone(),
                            owner: entry.owner.clone(),
                            started_at: entry.started_at,
                            state,
                        },
                    );
                }
                Err(err) => {
                    warn!(%session_id, error = %err, "skipping unserializable workflow");
                }
            }
        }

        saved
    }

    /// Rehydrate instances from a `save_all` snapshot. Entries whose type
    /// is no longer registered are skipped and logged, not fatal. Returns
    /// the number restored.
    pub async fn restore(&self, saved: HashMap<String, SavedWorkflow>) -> usize {
        let mut restored = 0;

        for (session_id, snapshot) in saved {
            let factory = {
                let registry = self.registry.read().expect("workflow registry poisoned");
                registry
                    .get(&snapshot.type_name)
                    .map(|d| Arc::clone(&d.factory))
            };
            let Some(factory) = factory else {
                warn!(
                    %session_id,
                    type_name = %snapshot.type_name,
                    "skipping snapshot for unregistered workflow type"
                );
                continue;
            };

            match factory.load_from_state(&snapshot.state) {
                Ok(instance) => {
                    let entry = ActiveEntry {
                        type_name: snapshot.type_name,
                        owner: snapshot.owner,
                        started_at: snapshot.started_at,
                        last_activity_at: Utc::now(),
                        instance: Arc::new(Mutex::new(instance)),
                    };
                    self.active.lock().await.insert(session_id, entry);
                    restored += 1;
                }
                Err(err) => {
                    warn!(
                        %session_id,
                        error = %err,
                        "skipping snapshot that failed to rehydrate"
                    );
                }
            }
        }

        info!(restored, "workflow instances restored");
        restored
    }

    async fn remove(&self, session_id: &str) {
        self.active.lock().await.remove(session_id);
    }
}

impl Default for WorkflowManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Derive a workflow session id from the type name, owner, and creation
/// time. The digest suffix keeps ids unique when the same user restarts the
/// same workflow within a clock tick.
fn derive_session_id(type_name: &str, user_id: &UserId, created_at: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(type_name.as_bytes());
    hasher.update(user_id.as_str().as_bytes());
    hasher.update(
        created_at
            .timestamp_nanos_opt()
            .unwrap_or_default()
            .to_le_bytes(),
    );
    let digest = hasher.finalize();
    let suffix: String = digest[..6].iter().map(|b| format!("{b:02x}")).collect();
    format!("{type_name}-{user_id}-{suffix}")
}
