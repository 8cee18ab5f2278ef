//! Configuration types for a Herald deployment.
//!
//! [`HeraldConfig`] is the top-level configuration loaded from
//! `herald.toml`: per-channel delivery quotas, delivery-pipeline knobs, and
//! per-tenant conversational profiles. Validation runs at load time —
//! configuration errors are loud at process start, never masked.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::HeraldError;
use crate::ids::validate_channel_id;

/// Delivery quota and policy for one channel.
///
/// Immutable for the duration of a single delivery attempt; the middleware
/// re-resolves it between attempts, so edits hot-reload without restarting
/// in-flight sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelQuota {
    /// Maximum sends approved within one rate window.
    pub max_requests_per_window: u32,
    /// Rate window length in seconds.
    pub window_seconds: u64,
    /// Maximum send attempts on the primary channel before fallback.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Base delay between attempts in seconds (exponential backoff).
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_secs: u64,
    /// Alternate channel tried exactly once after the primary exhausts its
    /// retries. Must differ from the channel it is configured on.
    #[serde(default)]
    pub fallback_channel: Option<String>,
    /// Maximum outbound text length accepted for this channel.
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
    /// Whether media payloads (image/document) are deliverable.
    #[serde(default = "default_true")]
    pub supports_media: bool,
    /// Group size for bulk sends.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Messages per minute used to pace bulk sends between groups.
    #[serde(default = "default_rate_limit_per_minute")]
    pub rate_limit_per_minute: u32,
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_base_delay() -> u64 {
    5
}

fn default_max_message_length() -> usize {
    4096
}

fn default_batch_size() -> usize {
    50
}

fn default_rate_limit_per_minute() -> u32 {
    60
}

fn default_true() -> bool {
    true
}

impl Default for ChannelQuota {
    /// Conservative defaults used when a channel has no explicit
    /// configuration: 3 attempts, 5-second base delay, no fallback.
    fn default() -> Self {
        Self {
            max_requests_per_window: 60,
            window_seconds: 60,
            retry_attempts: default_retry_attempts(),
            retry_base_delay_secs: default_retry_base_delay(),
            fallback_channel: None,
            max_message_length: default_max_message_length(),
            supports_media: true,
            batch_size: default_batch_size(),
            rate_limit_per_minute: default_rate_limit_per_minute(),
        }
    }
}

impl ChannelQuota {
    /// Validate the quota invariants for the channel it is keyed under.
    pub fn validate(&self, channel_id: &str) -> Result<(), HeraldError> {
        validate_channel_id(channel_id)
            .map_err(|e| HeraldError::ConfigError(format!("channel {channel_id:?}: {e}")))?;
        if self.max_requests_per_window == 0 {
            return Err(HeraldError::ConfigError(format!(
                "channel {channel_id:?}: max_requests_per_window must be positive"
            )));
        }
        if self.window_seconds == 0 {
            return Err(HeraldError::ConfigError(format!(
                "channel {channel_id:?}: window_seconds must be positive"
            )));
        }
        if self.retry_attempts == 0 {
            return Err(HeraldError::ConfigError(format!(
                "channel {channel_id:?}: retry_attempts must be positive"
            )));
        }
        if self.batch_size == 0 {
            return Err(HeraldError::ConfigError(format!(
                "channel {channel_id:?}: batch_size must be positive"
            )));
        }
        if self.rate_limit_per_minute == 0 {
            return Err(HeraldError::ConfigError(format!(
                "channel {channel_id:?}: rate_limit_per_minute must be positive"
            )));
        }
        if let Some(ref fallback) = self.fallback_channel {
            if fallback == channel_id {
                return Err(HeraldError::ConfigError(format!(
                    "channel {channel_id:?}: fallback_channel must differ from the channel itself"
                )));
            }
            validate_channel_id(fallback).map_err(|e| {
                HeraldError::ConfigError(format!("channel {channel_id:?} fallback: {e}"))
            })?;
        }
        Ok(())
    }
}

/// Knobs for the delivery pipeline and session handling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Overall deadline for one `deliver` call (attempts + backoff + waits),
    /// in seconds. Exceeding it is a terminal failure, not a hang.
    #[serde(default = "default_overall_deadline")]
    pub overall_deadline_secs: u64,
    /// Polling interval for rate-limit waits, in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Pacing delay between option chunks when splitting, in milliseconds.
    #[serde(default = "default_chunk_pacing")]
    pub chunk_pacing_ms: u64,
    /// Timeout for a single workflow turn, in seconds. A turn exceeding it
    /// follows the same fail-closed path as a workflow error.
    #[serde(default = "default_workflow_turn_timeout")]
    pub workflow_turn_timeout_secs: u64,
    /// Options per page for tenant menus.
    #[serde(default = "default_menu_page_size")]
    pub menu_page_size: usize,
    /// Inactivity threshold before a conversing session is parked idle,
    /// in seconds.
    #[serde(default = "default_idle_threshold")]
    pub idle_threshold_secs: u64,
}

fn default_overall_deadline() -> u64 {
    120
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_chunk_pacing() -> u64 {
    400
}

fn default_workflow_turn_timeout() -> u64 {
    30
}

fn default_menu_page_size() -> usize {
    5
}

fn default_idle_threshold() -> u64 {
    1800
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            overall_deadline_secs: default_overall_deadline(),
            poll_interval_ms: default_poll_interval(),
            chunk_pacing_ms: default_chunk_pacing(),
            workflow_turn_timeout_secs: default_workflow_turn_timeout(),
            menu_page_size: default_menu_page_size(),
            idle_threshold_secs: default_idle_threshold(),
        }
    }
}

/// One entry of a tenant's configured menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuEntryConfig {
    pub title: String,
    pub payload: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// Conversational profile for one tenant (business unit), as configured.
///
/// Resolved into a runtime profile table once at load; string-matched
/// business-unit dispatch never appears in the hot path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantConfig {
    /// Human-readable tenant name.
    pub display_name: String,
    /// Messages sent right after TOS acceptance, in order.
    #[serde(default)]
    pub initial_messages: Vec<String>,
    /// Terms-of-service prompt text.
    #[serde(default = "default_tos_prompt")]
    pub tos_prompt: String,
    /// Title of the affirmative TOS option.
    #[serde(default = "default_tos_accept")]
    pub tos_accept_option: String,
    /// Title of the negative TOS option.
    #[serde(default = "default_tos_decline")]
    pub tos_decline_option: String,
    /// Inbound trigger text -> workflow type name.
    #[serde(default)]
    pub workflow_bindings: HashMap<String, String>,
    /// Regex pattern -> canned reply, evaluated in insertion order by the
    /// default responder.
    #[serde(default)]
    pub intent_patterns: Vec<IntentPatternConfig>,
    /// Tenant menu entries, paginated by `menu_page_size` on send.
    #[serde(default)]
    pub menu: Vec<MenuEntryConfig>,
}

fn default_tos_prompt() -> String {
    "Antes de continuar, ¿aceptas nuestros términos de servicio?".to_string()
}

fn default_tos_accept() -> String {
    "Sí, continuar".to_string()
}

fn default_tos_decline() -> String {
    "No".to_string()
}

/// A single intent pattern entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentPatternConfig {
    /// Regular expression matched against inbound text (case-insensitive).
    pub pattern: String,
    /// Reply sent when the pattern matches.
    pub reply: String,
}

/// Top-level configuration for a Herald deployment.
///
/// Loaded from `herald.toml`; `[channels.<id>]` tables hold delivery quotas,
/// `[delivery]` the pipeline knobs, `[tenants.<id>]` the conversational
/// profiles.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeraldConfig {
    #[serde(default)]
    pub channels: HashMap<String, ChannelQuota>,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub tenants: HashMap<String, TenantConfig>,
}

impl HeraldConfig {
    /// Parse a configuration from a TOML string and validate it.
    pub fn from_toml(content: &str) -> Result<Self, HeraldError> {
        let config: Self =
            toml::from_str(content).map_err(|e| HeraldError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String, HeraldError> {
        toml::to_string_pretty(self).map_err(|e| HeraldError::ConfigError(e.to_string()))
    }

    /// Validate every channel quota and tenant profile.
    pub fn validate(&self) -> Result<(), HeraldError> {
        for (channel_id, quota) in &self.channels {
            quota.validate(channel_id)?;
        }
        for (tenant_id, tenant) in &self.tenants {
            if tenant.display_name.is_empty() {
                return Err(HeraldError::ConfigError(format!(
                    "tenant {tenant_id:?}: display_name cannot be empty"
                )));
            }
            for binding in tenant.workflow_bindings.values() {
                if binding.is_empty() {
                    return Err(HeraldError::ConfigError(format!(
                        "tenant {tenant_id:?}: workflow binding target cannot be empty"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_defaults_are_conservative() {
        let quota = ChannelQuota::default();
        assert_eq!(quota.retry_attempts, 3);
        assert_eq!(quota.retry_base_delay_secs, 5);
        assert!(quota.fallback_channel.is_none());
        assert!(quota.validate("whatsapp").is_ok());
    }

    #[test]
    fn quota_rejects_zero_window() {
        let quota = ChannelQuota {
            window_seconds: 0,
            ..Default::default()
        };
        assert!(quota.validate("whatsapp").is_err());

        let quota = ChannelQuota {
            max_requests_per_window: 0,
            ..Default::default()
        };
        assert!(quota.validate("whatsapp").is_err());
    }

    #[test]
    fn quota_rejects_self_fallback() {
        let quota = ChannelQuota {
            fallback_channel: Some("whatsapp".to_string()),
            ..Default::default()
        };
        let err = quota.validate("whatsapp").unwrap_err();
        assert!(err.to_string().contains("fallback_channel"));
    }

    #[test]
    fn config_parses_from_toml() {
        let toml_str = r#"
            [channels.whatsapp]
            max_requests_per_window = 80
            window_seconds = 60
            retry_attempts = 4
            fallback_channel = "telegram"

            [channels.telegram]
            max_requests_per_window = 30
            window_seconds = 60

            [delivery]
            overall_deadline_secs = 90

            [tenants.t1]
            display_name = "HuntRED"
            initial_messages = ["¡Bienvenido!"]

            [tenants.t1.workflow_bindings]
            "evaluación" = "assessment"

            [[tenants.t1.intent_patterns]]
            pattern = "hola|buenos días"
            reply = "¡Hola! ¿En qué puedo ayudarte?"
        "#;

        let config = HeraldConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.channels["whatsapp"].retry_attempts, 4);
        assert_eq!(
            config.channels["whatsapp"].fallback_channel.as_deref(),
            Some("telegram")
        );
        assert_eq!(config.delivery.overall_deadline_secs, 90);
        assert_eq!(
            config.tenants["t1"].workflow_bindings["evaluación"],
            "assessment"
        );
    }

    #[test]
    fn config_roundtrips_through_toml() {
        let mut config = HeraldConfig::default();
        config
            .channels
            .insert("slack".to_string(), ChannelQuota::default());
        let toml_str = config.to_toml().unwrap();
        let back = HeraldConfig::from_toml(&toml_str).unwrap();
        assert_eq!(back.channels["slack"], config.channels["slack"]);
    }

    #[test]
    fn invalid_channel_key_is_rejected_at_load() {
        let toml_str = r#"
            [channels."bad channel"]
            max_requests_per_window = 10
            window_seconds = 60
        "#;
        assert!(HeraldConfig::from_toml(toml_str).is_err());
    }

    #[test]
    fn tos_defaults_have_two_options() {
        let tenant: TenantConfig = toml::from_str(r#"display_name = "X""#).unwrap();
        assert_eq!(tenant.tos_accept_option, "Sí, continuar");
        assert_eq!(tenant.tos_decline_option, "No");
        assert!(!tenant.tos_prompt.is_empty());
    }
}
