//! Messaging channel adapters for the Herald delivery pipeline.
//!
//! One adapter per external provider, all behind the [`ChannelAdapter`]
//! trait, resolved per `(channel, tenant)` by the [`ChannelRegistry`].
//! Adapters are single-attempt senders: retry, fallback, rate limiting,
//! and option splitting belong to the delivery middleware.
//!
//! # Architecture
//!
//! - [`channel`]: the adapter trait, capability descriptor, and error type
//! - [`transport`]: shared JSON-over-HTTP transport the adapters wrap
//! - [`whatsapp`], [`telegram`], [`slack`], [`messenger`], [`instagram`]:
//!   the five provider adapters
//! - [`registry`]: tenant-scoped adapter resolution with a TTL cache

pub mod channel;
pub mod instagram;
pub mod messenger;
pub mod registry;
pub mod slack;
pub mod telegram;
pub mod transport;
pub mod whatsapp;

pub use channel::{AdapterCapabilities, ChannelAdapter, ChannelError, ProviderReceipt};
pub use registry::{AdapterFactory, ChannelRegistry, CredentialBundle, CredentialStore};
pub use transport::{HttpTransport, TransportConfig};
