//! Instagram-like channel adapter.
//!
//! The narrowest channel in the set: three inline options, images only.
//! Document sends return `NotSupported` so the middleware can reject media
//! payloads up front instead of burning retries.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use herald_types::{MediaRef, MessageOption, ProfileData};

use crate::channel::{AdapterCapabilities, ChannelAdapter, ChannelError, ProviderReceipt};
use crate::transport::{HttpTransport, TransportConfig};

/// Credentials and endpoints for the Instagram channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstagramConfig {
    /// Graph API base URL.
    pub api_url: String,
    /// Access token.
    pub access_token: String,
    /// Business account id messages are sent from.
    pub account_id: String,
}

/// Instagram channel adapter.
pub struct InstagramAdapter {
    transport: HttpTransport,
}

impl InstagramAdapter {
    /// Create a new adapter from configuration.
    pub fn new(config: InstagramConfig) -> Self {
        let base = config.api_url.trim_end_matches('/');
        let transport = HttpTransport::new(TransportConfig {
            name: "instagram".to_string(),
            outbound_url: format!("{base}/{}/messages", config.account_id),
            profile_url: Some(format!("{base}/{{recipient}}?fields=name")),
            auth_header: Some(format!("Bearer {}", config.access_token)),
        });
        Self { transport }
    }

    fn receipt(response: &Value) -> ProviderReceipt {
        ProviderReceipt {
            provider_message_id: response["message_id"].as_str().map(str::to_string),
        }
    }
}

#[async_trait]
impl ChannelAdapter for InstagramAdapter {
    async fn send_text(
        &self,
        recipient: &str,
        text: &str,
    ) -> Result<ProviderReceipt, ChannelError> {
        let body = json!({
            "recipient": { "id": recipient },
            "message": { "text": text }
        });
        let response = self.transport.post(&body).await?;
        Ok(Self::receipt(&response))
    }

    async fn send_options(
        &self,
        recipient: &str,
        text: &str,
        options: &[MessageOption],
    ) -> Result<ProviderReceipt, ChannelError> {
        let quick_replies: Vec<Value> = options
            .iter()
            .map(|opt| {
                json!({
                    "content_type": "text",
                    "title": opt.title,
                    "payload": opt.payload
                })
            })
            .collect();
        let body = json!({
            "recipient": { "id": recipient },
            "message": { "text": text, "quick_replies": quick_replies }
        });
        let response = self.transport.post(&body).await?;
        Ok(Self::receipt(&response))
    }

    async fn send_image(
        &self,
        recipient: &str,
        image: &MediaRef,
        _caption: Option<&str>,
    ) -> Result<ProviderReceipt, ChannelError> {
        let body = json!({
            "recipient": { "id": recipient },
            "message": {
                "attachment": {
                    "type": "image",
                    "payload": { "url": image.url }
                }
            }
        });
        let response = self.transport.post(&body).await?;
        Ok(Self::receipt(&response))
    }

    async fn send_document(
        &self,
        _recipient: &str,
        _document: &MediaRef,
        _caption: Option<&str>,
    ) -> Result<ProviderReceipt, ChannelError> {
        Err(ChannelError::NotSupported(
            "document messages on instagram".into(),
        ))
    }

    async fn fetch_profile(&self, recipient: &str) -> Result<ProfileData, ChannelError> {
        let raw = self.transport.get_profile(recipient).await?;
        Ok(ProfileData {
            name: raw["name"].as_str().map(str::to_string),
            locale: None,
            raw,
        })
    }

    fn name(&self) -> &str {
        self.transport.name()
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities {
            max_inline_options: 3,
            supports_media: true,
            supports_paginated_lists: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> InstagramAdapter {
        InstagramAdapter::new(InstagramConfig {
            api_url: "https://graph.example.com/v19.0".to_string(),
            access_token: "tok".to_string(),
            account_id: "178000".to_string(),
        })
    }

    #[test]
    fn adapter_name_and_capabilities() {
        let adapter = adapter();
        assert_eq!(adapter.name(), "instagram");
        assert_eq!(adapter.capabilities().max_inline_options, 3);
    }

    #[tokio::test]
    async fn document_send_is_not_supported() {
        let adapter = adapter();
        let err = adapter
            .send_document("u1", &MediaRef::new("https://cdn.example.com/cv.pdf"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::NotSupported(_)));
    }
}
