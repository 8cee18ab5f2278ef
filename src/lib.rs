//! Herald: conversational delivery and workflow orchestration core.
//!
//! Herald dispatches conversational messages to external messaging
//! channels under per-channel rate limits, retries and fails over delivery,
//! and tracks long-running multi-step conversational workflows bound to
//! per-user chat sessions.
//!
//! This facade re-exports the workspace crates:
//!
//! - [`types`]: identifiers, message vocabulary, configuration, sessions
//! - [`channel`]: channel adapters and the tenant-scoped registry
//! - [`delivery`]: rate limiting and retry/fallback/batching middleware
//! - [`workflow`]: workflow contract, manager, and built-in assessments
//! - [`daemon`]: the message orchestrator, tenant profiles, and stores

pub use herald_channel as channel;
pub use herald_daemon as daemon;
pub use herald_delivery as delivery;
pub use herald_types as types;
pub use herald_workflow as workflow;
