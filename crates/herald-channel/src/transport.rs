//! Shared HTTP transport for channel adapters.
//!
//! Every concrete adapter speaks JSON-over-HTTPS to its provider. This
//! transport owns the reqwest client, endpoint URLs, and auth header, so
//! adapters only build logical payload shapes. Provider wire formats stay
//! inside the adapter files; nothing outside this crate constructs a
//! provider request.

use reqwest::Client;
use serde_json::Value;

use crate::channel::ChannelError;

/// Configuration for an adapter's HTTP transport.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct TransportConfig {
    /// Channel name used in logs and errors.
    pub name: String,
    /// URL outbound messages are POSTed to.
    pub outbound_url: String,
    /// Optional URL template for profile fetches. `{recipient}` is replaced
    /// with the url-escaped recipient id.
    #[serde(default)]
    pub profile_url: Option<String>,
    /// Optional auth header value (e.g. `"Bearer TOKEN"`).
    #[serde(default)]
    pub auth_header: Option<String>,
}

/// JSON-over-HTTP transport shared by all adapters.
pub struct HttpTransport {
    config: TransportConfig,
    client: Client,
}

impl HttpTransport {
    /// Create a new transport with the given configuration.
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    /// The channel name this transport belongs to.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// POST a JSON body to the outbound URL and parse the response body.
    ///
    /// Non-2xx responses become [`ChannelError::Api`] with the status and
    /// the (truncated) body. An unparseable success body yields
    /// `Value::Null` rather than an error — some providers return empty
    /// bodies on success.
    pub async fn post(&self, body: &Value) -> Result<Value, ChannelError> {
        let mut request = self
            .client
            .post(&self.config.outbound_url)
            .header("Content-Type", "application/json")
            .json(body);

        if let Some(ref auth) = self.config.auth_header {
            request = request.header("Authorization", auth);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable>".to_string());
            return Err(ChannelError::Api(format!(
                "{} returned {status}: {}",
                self.config.name,
                truncate(&body, 512)
            )));
        }

        Ok(response.json().await.unwrap_or(Value::Null))
    }

    /// GET the profile endpoint for a recipient and parse the JSON body.
    pub async fn get_profile(&self, recipient: &str) -> Result<Value, ChannelError> {
        let Some(ref template) = self.config.profile_url else {
            return Err(ChannelError::NotSupported(format!(
                "profile fetch for {}",
                self.config.name
            )));
        };

        let url = template.replace("{recipient}", &urlencode(recipient));
        let mut request = self.client.get(&url);
        if let Some(ref auth) = self.config.auth_header {
            request = request.header("Authorization", auth);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ChannelError::Api(format!(
                "{} profile fetch returned {status}",
                self.config.name
            )));
        }

        Ok(response.json().await.unwrap_or(Value::Null))
    }
}

/// Truncate a string to at most `max` bytes on a char boundary.
fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Percent-encode a recipient id for URL interpolation.
fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_config_roundtrip() {
        let config = TransportConfig {
            name: "whatsapp".to_string(),
            outbound_url: "https://graph.example.com/v19.0/123/messages".to_string(),
            profile_url: Some("https://graph.example.com/{recipient}".to_string()),
            auth_header: Some("Bearer tok".to_string()),
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: TransportConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn urlencode_escapes_reserved_bytes() {
        assert_eq!(urlencode("user-1_a.b~"), "user-1_a.b~");
        assert_eq!(urlencode("+52 55"), "%2B52%2055");
        assert_eq!(urlencode("a/b"), "a%2Fb");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello", 3), "hel");
        // Multi-byte char straddling the cut point is dropped whole.
        let s = "ab\u{00e9}cd"; // é is 2 bytes starting at index 2
        assert_eq!(truncate(s, 3), "ab");
    }
}
