//! Core adapter trait and types for outbound messaging channels.
//!
//! A [`ChannelAdapter`] implementation handles one external messaging
//! provider (WhatsApp-like, Telegram-like, etc.). Adapters expose a uniform
//! capability set and never retry internally — all retry, fallback, and
//! pacing policy lives in the delivery middleware.

use async_trait::async_trait;
use thiserror::Error;

use herald_types::{MediaRef, MessageOption, ProfileData};

/// Errors from channel operations.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider API returned error: {0}")]
    Api(String),

    /// No adapter can be produced for a `(channel, tenant)` pair: missing
    /// credentials, unknown channel, or a factory failure. Recoverable by
    /// the fallback path or an operator fixing the configuration.
    #[error("adapter unavailable: {0}")]
    AdapterUnavailable(String),

    #[error("operation not supported: {0}")]
    NotSupported(String),

    #[error("{0}")]
    Other(String),
}

/// Static capability descriptor every adapter must report.
///
/// The middleware reads this to decide whether options need splitting and
/// whether a native paginated list send is available. There is no implicit
/// truncation anywhere: an adapter that can only render three inline
/// options says so here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterCapabilities {
    /// Maximum options renderable in a single message.
    pub max_inline_options: usize,
    /// Whether image/document sends are supported at all.
    pub supports_media: bool,
    /// Whether the adapter can render an arbitrarily long option list
    /// natively (e.g. an interactive list message).
    pub supports_paginated_lists: bool,
}

/// Provider acknowledgement for a successful send.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderReceipt {
    /// Message id assigned by the provider, when one is returned.
    pub provider_message_id: Option<String>,
}

impl ProviderReceipt {
    /// Receipt carrying a provider message id.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            provider_message_id: Some(id.into()),
        }
    }
}

/// Uniform contract over one external messaging provider.
///
/// All send methods are single attempts: they either reach the provider or
/// return an error for the middleware to act on. `send_paginated_options`
/// has a default `NotSupported` implementation so only adapters that
/// advertise [`AdapterCapabilities::supports_paginated_lists`] need to
/// override it.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Send a plain text message.
    async fn send_text(&self, recipient: &str, text: &str)
        -> Result<ProviderReceipt, ChannelError>;

    /// Send text with an ordered set of selectable options.
    ///
    /// Callers must not pass more options than
    /// [`AdapterCapabilities::max_inline_options`]; the middleware splits
    /// beforehand.
    async fn send_options(
        &self,
        recipient: &str,
        text: &str,
        options: &[MessageOption],
    ) -> Result<ProviderReceipt, ChannelError>;

    /// Send an arbitrarily long option list as a native paginated list.
    async fn send_paginated_options(
        &self,
        recipient: &str,
        text: &str,
        options: &[MessageOption],
    ) -> Result<ProviderReceipt, ChannelError> {
        let _ = (recipient, text, options);
        Err(ChannelError::NotSupported("send_paginated_options".into()))
    }

    /// Send an image with an optional caption.
    async fn send_image(
        &self,
        recipient: &str,
        image: &MediaRef,
        caption: Option<&str>,
    ) -> Result<ProviderReceipt, ChannelError>;

    /// Send a document with an optional caption.
    async fn send_document(
        &self,
        recipient: &str,
        document: &MediaRef,
        caption: Option<&str>,
    ) -> Result<ProviderReceipt, ChannelError>;

    /// Fetch profile data (name, locale, raw metadata) for a recipient.
    async fn fetch_profile(&self, recipient: &str) -> Result<ProfileData, ChannelError>;

    /// Human-readable name of this adapter's channel.
    fn name(&self) -> &str;

    /// Report this adapter's capability descriptor.
    fn capabilities(&self) -> AdapterCapabilities;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A minimal adapter with only required methods.
    struct MinimalAdapter;

    #[async_trait]
    impl ChannelAdapter for MinimalAdapter {
        async fn send_text(
            &self,
            _recipient: &str,
            _text: &str,
        ) -> Result<ProviderReceipt, ChannelError> {
            Ok(ProviderReceipt::with_id("m-1"))
        }

        async fn send_options(
            &self,
            _recipient: &str,
            _text: &str,
            _options: &[MessageOption],
        ) -> Result<ProviderReceipt, ChannelError> {
            Ok(ProviderReceipt::default())
        }

        async fn send_image(
            &self,
            _recipient: &str,
            _image: &MediaRef,
            _caption: Option<&str>,
        ) -> Result<ProviderReceipt, ChannelError> {
            Ok(ProviderReceipt::default())
        }

        async fn send_document(
            &self,
            _recipient: &str,
            _document: &MediaRef,
            _caption: Option<&str>,
        ) -> Result<ProviderReceipt, ChannelError> {
            Ok(ProviderReceipt::default())
        }

        async fn fetch_profile(&self, _recipient: &str) -> Result<ProfileData, ChannelError> {
            Ok(ProfileData::default())
        }

        fn name(&self) -> &str {
            "minimal"
        }

        fn capabilities(&self) -> AdapterCapabilities {
            AdapterCapabilities {
                max_inline_options: 3,
                supports_media: false,
                supports_paginated_lists: false,
            }
        }
    }

    #[tokio::test]
    async fn default_paginated_options_returns_not_supported() {
        let adapter = MinimalAdapter;
        let err = adapter
            .send_paginated_options("u1", "elige", &[])
            .await
            .unwrap_err();
        match err {
            ChannelError::NotSupported(op) => assert_eq!(op, "send_paginated_options"),
            other => panic!("expected NotSupported, got {other}"),
        }
    }

    #[test]
    fn receipt_with_id() {
        let receipt = ProviderReceipt::with_id("wamid.123");
        assert_eq!(receipt.provider_message_id.as_deref(), Some("wamid.123"));
        assert!(ProviderReceipt::default().provider_message_id.is_none());
    }

    #[test]
    fn not_supported_is_distinct_from_other() {
        let ns = ChannelError::NotSupported("x".into());
        let other = ChannelError::Other("x".into());
        assert_ne!(ns.to_string(), other.to_string());
    }
}
