//! Telegram-like channel adapter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use herald_types::{MediaRef, MessageOption, ProfileData};

use crate::channel::{AdapterCapabilities, ChannelAdapter, ChannelError, ProviderReceipt};
use crate::transport::{HttpTransport, TransportConfig};

/// Credentials and endpoints for the Telegram channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TelegramConfig {
    /// Bot API base URL.
    pub api_url: String,
    /// Bot token.
    pub bot_token: String,
}

/// Telegram channel adapter.
///
/// Options render as an inline keyboard, one button per row. Link options
/// become URL buttons.
pub struct TelegramAdapter {
    transport: HttpTransport,
}

impl TelegramAdapter {
    /// Create a new adapter from configuration.
    pub fn new(config: TelegramConfig) -> Self {
        let transport = HttpTransport::new(TransportConfig {
            name: "telegram".to_string(),
            outbound_url: format!(
                "{}/bot{}/send",
                config.api_url.trim_end_matches('/'),
                config.bot_token
            ),
            profile_url: Some(format!(
                "{}/bot{}/getChat?chat_id={{recipient}}",
                config.api_url.trim_end_matches('/'),
                config.bot_token
            )),
            auth_header: None,
        });
        Self { transport }
    }

    fn receipt(response: &Value) -> ProviderReceipt {
        ProviderReceipt {
            provider_message_id: response["result"]["message_id"]
                .as_i64()
                .map(|id| id.to_string()),
        }
    }
}

/// Build the inline keyboard markup: one option per row, order preserved.
fn inline_keyboard(options: &[MessageOption]) -> Value {
    let rows: Vec<Value> = options
        .iter()
        .map(|opt| match opt.url {
            Some(ref url) => json!([{ "text": opt.title, "url": url }]),
            None => json!([{ "text": opt.title, "callback_data": opt.payload }]),
        })
        .collect();
    json!({ "inline_keyboard": rows })
}

#[async_trait]
impl ChannelAdapter for TelegramAdapter {
    async fn send_text(
        &self,
        recipient: &str,
        text: &str,
    ) -> Result<ProviderReceipt, ChannelError> {
        let body = json!({
            "method": "sendMessage",
            "chat_id": recipient,
            "text": text
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
        let body = json!({
            "method": "sendMessage",
            "chat_id": recipient,
            "text": text,
            "reply_markup": inline_keyboard(options)
        });
        let response = self.transport.post(&body).await?;
        Ok(Self::receipt(&response))
    }

    async fn send_image(
        &self,
        recipient: &str,
        image: &MediaRef,
        caption: Option<&str>,
    ) -> Result<ProviderReceipt, ChannelError> {
        let body = json!({
            "method": "sendPhoto",
            "chat_id": recipient,
            "photo": image.url,
            "caption": caption
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
            "method": "sendDocument",
            "chat_id": recipient,
            "document": document.url,
            "caption": caption
        });
        let response = self.transport.post(&body).await?;
        Ok(Self::receipt(&response))
    }

    async fn fetch_profile(&self, recipient: &str) -> Result<ProfileData, ChannelError> {
        let raw = self.transport.get_profile(recipient).await?;
        let result = &raw["result"];
        let name = match (result["first_name"].as_str(), result["last_name"].as_str()) {
            (Some(first), Some(last)) => Some(format!("{first} {last}")),
            (Some(first), None) => Some(first.to_string()),
            _ => result["username"].as_str().map(str::to_string),
        };
        Ok(ProfileData {
            name,
            locale: result["language_code"].as_str().map(str::to_string),
            raw,
        })
    }

    fn name(&self) -> &str {
        self.transport.name()
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities {
            max_inline_options: 8,
            supports_media: true,
            supports_paginated_lists: false,
        }
    }
}
