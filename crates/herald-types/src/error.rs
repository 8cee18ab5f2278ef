//! Error type shared across the Herald crates.

/// Errors that can occur across the Herald runtime.
///
/// Each variant corresponds to a different subsystem: configuration,
/// session/state storage, channel transport, or workflow execution.
/// Subsystem crates define richer local enums; this type is the common
/// denominator at crate seams and in collaborator traits.
#[derive(Debug, thiserror::Error)]
pub enum HeraldError {
    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("store error: {0}")]
    StoreError(String),

    #[error("channel error: {0}")]
    ChannelError(String),

    #[error("workflow error: {0}")]
    WorkflowError(String),

    #[error("response generation failed: {0}")]
    ResponderError(String),
}
