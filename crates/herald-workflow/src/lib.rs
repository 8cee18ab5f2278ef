//! Workflow orchestration for Herald conversations.
//!
//! A workflow is a multi-turn conversational sub-process bound to a chat
//! session. This crate defines the workflow contract, the type registry and
//! active-instance manager, and one built-in workflow (the scripted
//! assessment used by tenant funnels).
//!
//! # Architecture
//!
//! - [`workflow`]: the [`Workflow`] trait, factory, descriptor, and errors
//! - [`manager`]: the [`WorkflowManager`] — registration, creation, turn
//!   routing, abort, and save/restore
//! - [`assessment`]: built-in question/answer assessment workflow

pub mod assessment;
pub mod manager;
pub mod workflow;

pub use assessment::{AssessmentFactory, ScriptedAssessment};
pub use manager::{
    CreatedWorkflow, SavedWorkflow, WorkflowManager, WorkflowTurn, WORKFLOW_ERROR_REPLY,
    WORKFLOW_NOT_FOUND_REPLY,
};
pub use workflow::{
    Workflow, WorkflowContext, WorkflowDescriptor, WorkflowError, WorkflowFactory, WorkflowReply,
};
