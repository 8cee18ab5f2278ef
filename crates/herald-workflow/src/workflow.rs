//! The workflow contract: trait, factory, and descriptor types.
//!
//! A workflow is a multi-turn, stateful conversational sub-process (an
//! assessment, a profile-creation funnel) distinct from single-turn
//! intent/response. The manager owns instance lifetime and sees workflow
//! internals only through this contract; workflow-specific state is opaque
//! JSON.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use herald_types::{ChannelId, MessageOption, TenantId, UserId};

/// Errors from workflow registration, creation, and execution.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// A type with this name is already registered. Registration errors are
    /// programmer errors and must surface loudly at process start.
    #[error("workflow type {0:?} already registered")]
    DuplicateWorkflowType(String),

    /// A declared dependency is not registered. The dependency graph must
    /// be registered leaves-first.
    #[error("workflow type {type_name:?} depends on unregistered type {dependency:?}")]
    UnknownDependency {
        type_name: String,
        dependency: String,
    },

    /// Creation was requested for a type that was never registered.
    #[error("workflow type {0:?} is not registered")]
    UnregisteredType(String),

    /// A dependency exists but is not presently enabled.
    #[error("workflow type {type_name:?} requires disabled dependency {dependency:?}")]
    DependencyNotSatisfied {
        type_name: String,
        dependency: String,
    },

    /// Persisted state could not be interpreted by the factory.
    #[error("invalid workflow state: {0}")]
    State(String),

    /// The instance failed while executing a turn.
    #[error("workflow execution failed: {0}")]
    Execution(String),
}

/// What a workflow wants said back to the user after a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowReply {
    pub text: String,
    pub options: Vec<MessageOption>,
}

impl WorkflowReply {
    /// Plain text reply.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            options: Vec::new(),
        }
    }

    /// Reply with selectable options.
    pub fn with_options(text: impl Into<String>, options: Vec<MessageOption>) -> Self {
        Self {
            text: text.into(),
            options,
        }
    }
}

/// Context handed to a workflow instance at creation time.
#[derive(Debug, Clone)]
pub struct WorkflowContext {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub channel: ChannelId,
    /// Free-form variables copied from the chat session.
    pub vars: HashMap<String, String>,
}

impl WorkflowContext {
    pub fn new(
        tenant_id: impl Into<TenantId>,
        user_id: impl Into<UserId>,
        channel: impl Into<ChannelId>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            user_id: user_id.into(),
            channel: channel.into(),
            vars: HashMap::new(),
        }
    }
}

/// A running workflow instance.
///
/// Implementations must be cheap to lock per turn; long work belongs in the
/// turn itself, which the manager bounds with a timeout.
#[async_trait]
pub trait Workflow: Send {
    /// The registered type name this instance belongs to.
    fn type_name(&self) -> &str;

    /// First contact: produce the opening reply for the user.
    async fn initialize(&mut self, ctx: &WorkflowContext) -> Result<WorkflowReply, WorkflowError>;

    /// Process one inbound user message and produce the next reply.
    async fn handle_message(&mut self, text: &str) -> Result<WorkflowReply, WorkflowError>;

    /// Whether the workflow has run to completion.
    fn is_completed(&self) -> bool;

    /// Serialize internal state for persistence.
    fn save_state(&self) -> Result<Value, WorkflowError>;

    /// Explicit cancellation hook. Default: nothing to clean up.
    fn abort(&mut self) {}
}

/// Constructor for a workflow type: fresh instances and rehydration from
/// persisted state.
pub trait WorkflowFactory: Send + Sync {
    /// Create a fresh, uninitialized instance.
    fn create(&self) -> Box<dyn Workflow>;

    /// Rebuild an instance from state produced by
    /// [`Workflow::save_state`].
    fn load_from_state(&self, state: &Value) -> Result<Box<dyn Workflow>, WorkflowError>;
}

/// A registered workflow type. Registered once at process start and
/// read-only afterward, except for the `enabled` toggle.
#[derive(Clone)]
pub struct WorkflowDescriptor {
    pub type_name: String,
    /// Type names that must be registered and enabled for this type to be
    /// instantiable.
    pub dependencies: Vec<String>,
    /// Permission tags the initiating caller must hold; enforcement lives
    /// with the platform's authorization layer.
    pub required_permissions: Vec<String>,
    pub enabled: bool,
    pub factory: Arc<dyn WorkflowFactory>,
}

impl WorkflowDescriptor {
    /// Descriptor with no dependencies or permission requirements, enabled.
    pub fn new(type_name: impl Into<String>, factory: Arc<dyn WorkflowFactory>) -> Self {
        Self {
            type_name: type_name.into(),
            dependencies: Vec::new(),
            required_permissions: Vec::new(),
            enabled: true,
            factory,
        }
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn with_permissions(mut self, permissions: Vec<String>) -> Self {
        self.required_permissions = permissions;
        self
    }
}

impl std::fmt::Debug for WorkflowDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowDescriptor")
            .field("type_name", &self.type_name)
            .field("dependencies", &self.dependencies)
            .field("required_permissions", &self.required_permissions)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}
