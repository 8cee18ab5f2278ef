//! Messenger-like channel adapter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use herald_types::{MediaRef, MessageOption, ProfileData};

use crate::channel::{AdapterCapabilities, ChannelAdapter, ChannelError, ProviderReceipt};
use crate::transport::{HttpTransport, TransportConfig};

/// Credentials and endpoints for the Messenger channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessengerConfig {
    /// Graph API base URL.
    pub api_url: String,
    /// Page access token.
    pub page_access_token: String,
}

/// Messenger channel adapter.
///
/// Options render as quick replies; link options fall back to a button
/// template since quick replies cannot carry URLs.
pub struct MessengerAdapter {
    transport: HttpTransport,
}

impl MessengerAdapter {
    /// Create a new adapter from configuration.
    pub fn new(config: MessengerConfig) -> Self {
        let base = config.api_url.trim_end_matches('/');
        let transport = HttpTransport::new(TransportConfig {
            name: "messenger".to_string(),
            outbound_url: format!("{base}/me/messages"),
            profile_url: Some(format!("{base}/{{recipient}}?fields=name,locale")),
            auth_header: Some(format!("Bearer {}", config.page_access_token)),
        });
        Self { transport }
    }

    fn receipt(response: &Value) -> ProviderReceipt {
        ProviderReceipt {
            provider_message_id: response["message_id"].as_str().map(str::to_string),
        }
    }
}

/// Build the message body for an options send.
fn options_body(recipient: &str, text: &str, options: &[MessageOption]) -> Value {
    if options.iter().any(|opt| opt.url.is_some()) {
        // Button template: supports URL buttons, capped at the same limit.
        let buttons: Vec<Value> = options
            .iter()
            .map(|opt| match opt.url {
                Some(ref url) => json!({
                    "type": "web_url",
                    "title": opt.title,
                    "url": url
                }),
                None => json!({
                    "type": "postback",
                    "title": opt.title,
                    "payload": opt.payload
                }),
            })
            .collect();
        json!({
            "recipient": { "id": recipient },
            "message": {
                "attachment": {
                    "type": "template",
                    "payload": {
                        "template_type": "button",
                        "text": text,
                        "buttons": buttons
                    }
                }
            }
        })
    } else {
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
        json!({
            "recipient": { "id": recipient },
            "message": { "text": text, "quick_replies": quick_replies }
        })
    }
}

#[async_trait]
impl ChannelAdapter for MessengerAdapter {
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
        let response = self
            .transport
            .post(&options_body(recipient, text, options))
            .await?;
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
                    "payload": { "url": image.url, "is_reusable": true }
                }
            }
        });
        let response = self.transport.post(&body).await?;
        Ok(Self::receipt(&response))
    }

    async fn send_document(
        &self,
        recipient: &str,
        document: &MediaRef,
        _caption: Option<&str>,
    ) -> Result<ProviderReceipt, ChannelError> {
        let body = json!({
            "recipient": { "id": recipient },
            "message": {
                "attachment": {
                    "type": "file",
                    "payload": { "url": document.url, "is_reusable": true }
                }
            }
        });
        let response = self.transport.post(&body).await?;
        Ok(Self::receipt(&response))
    }

    async fn fetch_profile(&self, recipient: &str) -> Result<ProfileData, ChannelError> {
        let raw = self.transport.get_profile(recipient).await?;
        Ok(ProfileData {
            name: raw["name"].as_str().map(str::to_string),
            locale: raw["locale"].as_str().map(str::to_string),
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
