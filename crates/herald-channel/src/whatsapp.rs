//! WhatsApp-like channel adapter.
//!
//! Inline button messages carry at most three options; longer option lists
//! are sent as native interactive lists, which this adapter advertises via
//! `supports_paginated_lists`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use herald_types::{MediaRef, MessageOption, ProfileData};

use crate::channel::{AdapterCapabilities, ChannelAdapter, ChannelError, ProviderReceipt};
use crate::transport::{HttpTransport, TransportConfig};

/// Rows per section in a native list message.
const LIST_SECTION_ROWS: usize = 10;

/// Credentials and endpoints for the WhatsApp channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WhatsappConfig {
    /// Provider API base URL.
    pub api_url: String,
    /// Access token for the business API.
    pub access_token: String,
    /// Phone number id messages are sent from.
    pub phone_number_id: String,
}

/// WhatsApp channel adapter.
pub struct WhatsappAdapter {
    transport: HttpTransport,
}

impl WhatsappAdapter {
    /// Create a new adapter from configuration.
    pub fn new(config: WhatsappConfig) -> Self {
        let base = config.api_url.trim_end_matches('/');
        let transport = HttpTransport::new(TransportConfig {
            name: "whatsapp".to_string(),
            outbound_url: format!("{base}/{}/messages", config.phone_number_id),
            profile_url: Some(format!("{base}/{{recipient}}?fields=name,locale")),
            auth_header: Some(format!("Bearer {}", config.access_token)),
        });
        Self { transport }
    }

    fn receipt(response: &Value) -> ProviderReceipt {
        ProviderReceipt {
            provider_message_id: response["messages"][0]["id"]
                .as_str()
                .map(str::to_string),
        }
    }
}

/// Build the interactive-buttons body for up to three options.
fn buttons_body(recipient: &str, text: &str, options: &[MessageOption]) -> Value {
    let buttons: Vec<Value> = options
        .iter()
        .map(|opt| {
            json!({
                "type": "reply",
                "reply": { "id": opt.payload, "title": opt.title }
            })
        })
        .collect();
    json!({
        "to": recipient,
        "type": "interactive",
        "interactive": {
            "type": "button",
            "body": { "text": text },
            "action": { "buttons": buttons }
        }
    })
}

/// Build the native list body: options chunked into sections of up to
/// [`LIST_SECTION_ROWS`] rows, order preserved.
fn list_body(recipient: &str, text: &str, options: &[MessageOption]) -> Value {
    let sections: Vec<Value> = options
        .chunks(LIST_SECTION_ROWS)
        .enumerate()
        .map(|(i, chunk)| {
            let rows: Vec<Value> = chunk
                .iter()
                .map(|opt| json!({ "id": opt.payload, "title": opt.title }))
                .collect();
            json!({ "title": format!("Opciones {}", i + 1), "rows": rows })
        })
        .collect();
    json!({
        "to": recipient,
        "type": "interactive",
        "interactive": {
            "type": "list",
            "body": { "text": text },
            "action": { "button": "Ver opciones", "sections": sections }
        }
    })
}

#[async_trait]
impl ChannelAdapter for WhatsappAdapter {
    async fn send_text(
        &self,
        recipient: &str,
        text: &str,
    ) -> Result<ProviderReceipt, ChannelError> {
        let body = json!({
            "to": recipient,
            "type": "text",
            "text": { "body": text }
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
            .post(&buttons_body(recipient, text, options))
            .await?;
        Ok(Self::receipt(&response))
    }

    async fn send_paginated_options(
        &self,
        recipient: &str,
        text: &str,
        options: &[MessageOption],
    ) -> Result<ProviderReceipt, ChannelError> {
        let response = self
            .transport
            .post(&list_body(recipient, text, options))
            .await?;
        Ok(Self::receipt(&response))
    }

    async fn send_image(
        &self,
        recipient: &str,
        image: &MediaRef,
        caption: Option<&str>,
    ) -> Result<ProviderReceipt, ChannelError> {
        let body = json!({
            "to": recipient,
            "type": "image",
            "image": { "link": image.url, "caption": caption }
        });
        let response = self.transport.post(&body).await?;
        Ok(Self::receipt(&response))
    }

    async fn send_document(
        &self,
        recipient: &str,
        document: &MediaRef,
        caption: Option<&str>,
    ) -> Result<ProviderReceipt, ChannelError> {
        let body = json!({
            "to": recipient,
            "type": "document",
            "document": {
                "link": document.url,
                "filename": document.filename,
                "caption": caption
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
            supports_paginated_lists: true,
        }
    }
}
