//! Slack-like channel adapter.
//!
//! The provider reports failures inside a 200 response (`"ok": false`), so
//! every call checks the envelope before extracting a receipt.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use herald_types::{MediaRef, MessageOption, ProfileData};

use crate::channel::{AdapterCapabilities, ChannelAdapter, ChannelError, ProviderReceipt};
use crate::transport::{HttpTransport, TransportConfig};

/// Credentials and endpoints for the Slack channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlackConfig {
    /// Web API base URL.
    pub api_url: String,
    /// Bot token.
    pub bot_token: String,
}

/// Slack channel adapter.
pub struct SlackAdapter {
    transport: HttpTransport,
}

impl SlackAdapter {
    /// Create a new adapter from configuration.
    pub fn new(config: SlackConfig) -> Self {
        let base = config.api_url.trim_end_matches('/');
        let transport = HttpTransport::new(TransportConfig {
            name: "slack".to_string(),
            outbound_url: format!("{base}/chat.postMessage"),
            profile_url: Some(format!("{base}/users.info?user={{recipient}}")),
            auth_header: Some(format!("Bearer {}", config.bot_token)),
        });
        Self { transport }
    }

    /// Reject `"ok": false` envelopes and extract the message timestamp id.
    fn receipt(response: &Value) -> Result<ProviderReceipt, ChannelError> {
        if response["ok"] == Value::Bool(false) {
            let reason = response["error"].as_str().unwrap_or("unknown_error");
            return Err(ChannelError::Api(format!("slack rejected send: {reason}")));
        }
        Ok(ProviderReceipt {
            provider_message_id: response["ts"].as_str().map(str::to_string),
        })
    }
}

/// Render options as an actions block of buttons, order preserved.
fn actions_block(options: &[MessageOption]) -> Value {
    let elements: Vec<Value> = options
        .iter()
        .map(|opt| {
            let mut button = json!({
                "type": "button",
                "text": { "type": "plain_text", "text": opt.title },
                "value": opt.payload
            });
            if let Some(ref url) = opt.url {
                button["url"] = json!(url);
            }
            button
        })
        .collect();
    json!({ "type": "actions", "elements": elements })
}

#[async_trait]
impl ChannelAdapter for SlackAdapter {
    async fn send_text(
        &self,
        recipient: &str,
        text: &str,
    ) -> Result<ProviderReceipt, ChannelError> {
        let body = json!({ "channel": recipient, "text": text });
        let response = self.transport.post(&body).await?;
        Self::receipt(&response)
    }

    async fn send_options(
        &self,
        recipient: &str,
        text: &str,
        options: &[MessageOption],
    ) -> Result<ProviderReceipt, ChannelError> {
        let body = json!({
            "channel": recipient,
            "text": text,
            "blocks": [
                { "type": "section", "text": { "type": "mrkdwn", "text": text } },
                actions_block(options)
            ]
        });
        let response = self.transport.post(&body).await?;
        Self::receipt(&response)
    }

    async fn send_image(
        &self,
        recipient: &str,
        image: &MediaRef,
        caption: Option<&str>,
    ) -> Result<ProviderReceipt, ChannelError> {
        let body = json!({
            "channel": recipient,
            "text": caption.unwrap_or_default(),
            "blocks": [{
                "type": "image",
                "image_url": image.url,
                "alt_text": caption.unwrap_or("image")
            }]
        });
        let response = self.transport.post(&body).await?;
        Self::receipt(&response)
    }

    async fn send_document(
        &self,
        recipient: &str,
        document: &MediaRef,
        caption: Option<&str>,
    ) -> Result<ProviderReceipt, ChannelError> {
        // Documents go out as a link share; the provider unfurls them.
        let title = document.filename.as_deref().unwrap_or("documento");
        let text = match caption {
            Some(caption) => format!("{caption}\n<{}|{title}>", document.url),
            None => format!("<{}|{title}>", document.url),
        };
        let body = json!({ "channel": recipient, "text": text });
        let response = self.transport.post(&body).await?;
        Self::receipt(&response)
    }

    async fn fetch_profile(&self, recipient: &str) -> Result<ProfileData, ChannelError> {
        let raw = self.transport.get_profile(recipient).await?;
        if raw["ok"] == Value::Bool(false) {
            let reason = raw["error"].as_str().unwrap_or("unknown_error");
            return Err(ChannelError::Api(format!("slack profile fetch: {reason}")));
        }
        let user = &raw["user"];
        Ok(ProfileData {
            name: user["real_name"]
                .as_str()
                .or(user["name"].as_str())
                .map(str::to_string),
            locale: user["locale"].as_str().map(str::to_string),
            raw,
        })
    }

    fn name(&self) -> &str {
        self.transport.name()
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities {
            max_inline_options: 5,
            supports_media: true,
            supports_paginated_lists: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_name_and_capabilities() {
        let adapter = SlackAdapter::new(SlackConfig {
            api_url: "https://slack.example.com/api".to_string(),
            bot_token: "xoxb-1".to_string(),
        });
        assert_eq!(adapter.name(), "slack");
        assert_eq!(adapter.capabilities().max_inline_options, 5);
    }

    #[test]
    fn ok_false_envelope_becomes_api_error() {
        let response = json!({ "ok": false, "error": "channel_not_found" });
        let err = SlackAdapter::receipt(&response).unwrap_err();
        assert!(err.to_string().contains("channel_not_found"));
    }

    #[test]
    fn ok_envelope_yields_ts_receipt() {
        let response = json!({ "ok": true, "ts": "1712345678.000200" });
        let receipt = SlackAdapter::receipt(&response).unwrap();
        assert_eq!(
            receipt.provider_message_id.as_deref(),
            Some("1712345678.000200")
        );
    }

    #[test]
    fn actions_block_preserves_order() {
        let options = vec![
            MessageOption::new("A", "a"),
            MessageOption::new("B", "b"),
            MessageOption::link("C", "c", "https://example.com"),
        ];
        let block = actions_block(&options);
        let elements = block["elements"].as_array().unwrap();
        assert_eq!(elements.len(), 3);
        assert_eq!(elements[0]["value"], "a");
        assert_eq!(elements[2]["url"], "https://example.com");
    }
}
