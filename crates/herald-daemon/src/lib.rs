//! Message orchestration for the Herald platform.
//!
//! This crate composes the delivery pipeline, workflow manager, tenant
//! profiles, and session persistence into the [`MessageOrchestrator`]
//! facade the rest of the platform uses — background jobs push outbound
//! messages through it, and every channel's inbound webhook funnels into
//! [`MessageOrchestrator::route_inbound`].
//!
//! # Architecture
//!
//! - [`orchestrator`]: the facade and inbound turn state machine
//! - [`tenant`]: per-tenant conversational profiles, compiled at load
//! - [`responder`]: the external intent/response generator seam
//! - [`store`]: session and workflow-state persistence seams plus the
//!   in-memory and JSON-file implementations

pub mod orchestrator;
pub mod responder;
pub mod store;
pub mod tenant;

pub use orchestrator::{extract_inbound_text, InboundOutcome, MessageOrchestrator};
pub use responder::{GeneratedReply, PatternResponder, ResponseGenerator};
pub use store::{JsonFileStore, MemoryStore, SessionStore, WorkflowStateStore};
pub use tenant::{BusinessProfile, ProfileRegistry, TOS_ACCEPT_PAYLOAD, TOS_DECLINE_PAYLOAD};
