//! Core types shared across all Herald crates.
//!
//! Defines identifiers, the outbound message vocabulary, deployment
//! configuration, the chat-session state machine, and the shared error type
//! used by the delivery pipeline, the workflow manager, and the
//! orchestrator.

pub mod config;
pub mod error;
pub mod ids;
pub mod message;
pub mod session;

pub use config::{
    ChannelQuota, DeliveryConfig, HeraldConfig, IntentPatternConfig, MenuEntryConfig, TenantConfig,
};
pub use error::HeraldError;
pub use ids::{validate_channel_id, ChannelId, TenantId, UserId};
pub use message::{MediaRef, MessageOption, OutboundPayload, ProfileData};
pub use session::{
    ChatSession, SessionError, SessionKey, SessionState, ACTIVE_WORKFLOW_KEY,
};
