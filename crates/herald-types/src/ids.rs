//! Strongly-typed identifier wrappers to prevent accidental misuse of strings.
//!
//! A tenant, a user, and a channel are all identified by short strings on the
//! wire; mixing them up compiles fine and fails at runtime in the worst
//! possible places. Each wrapper uses `Arc<str>` internally so cloning is an
//! atomic increment instead of a heap allocation.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(Arc<str>);

        impl $name {
            /// Create a new identifier from any string-like value.
            pub fn new(value: impl Into<Arc<str>>) -> Self {
                Self(value.into())
            }

            /// Borrow as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::new(s)
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.as_str() == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.as_str() == *other
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Ok(Self::new(s))
            }
        }
    };
}

string_id! {
    /// An isolated customer / business unit. Credentials and conversational
    /// configuration are distinct per tenant.
    TenantId
}

string_id! {
    /// An end user as identified by the external messaging provider
    /// (phone number, platform user id, etc.).
    UserId
}

string_id! {
    /// A logical messaging channel (e.g. `"whatsapp"`, `"telegram"`).
    /// Channel ids key quota configuration, rate buckets, and adapter
    /// factories, so arbitrary deployment-specific ids are allowed.
    ChannelId
}

/// Maximum length for a channel identifier.
const MAX_CHANNEL_ID_LEN: usize = 32;

/// Validate a channel identifier: non-empty, bounded, alphanumeric plus
/// dash/underscore. Rejects control characters and path-like input.
pub fn validate_channel_id(id: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err("channel id cannot be empty".to_string());
    }
    if id.len() > MAX_CHANNEL_ID_LEN {
        return Err(format!(
            "channel id exceeds maximum length of {MAX_CHANNEL_ID_LEN}"
        ));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(
            "channel id may only contain ASCII letters, digits, hyphens, and underscores"
                .to_string(),
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_compare_against_str() {
        let tenant = TenantId::new("t1");
        assert_eq!(tenant, "t1");
        assert_eq!(tenant.as_str(), "t1");
        assert_eq!(tenant.to_string(), "t1");
    }

    #[test]
    fn ids_roundtrip_through_serde() {
        let channel = ChannelId::new("whatsapp");
        let json = serde_json::to_string(&channel).unwrap();
        assert_eq!(json, "\"whatsapp\"");
        let back: ChannelId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, channel);
    }

    #[test]
    fn channel_id_validation() {
        assert!(validate_channel_id("whatsapp").is_ok());
        assert!(validate_channel_id("whatsapp-mx").is_ok());
        assert!(validate_channel_id("chan_2").is_ok());

        assert!(validate_channel_id("").is_err());
        assert!(validate_channel_id("chan.type").is_err());
        assert!(validate_channel_id("chan/type").is_err());
        assert!(validate_channel_id(&"a".repeat(MAX_CHANNEL_ID_LEN + 1)).is_err());
    }
}
