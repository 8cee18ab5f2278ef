//! Tenant-scoped adapter resolution with a TTL cache.
//!
//! The [`ChannelRegistry`] resolves one [`ChannelAdapter`] per
//! `(channel, tenant)` pair: credentials come from the external
//! [`CredentialStore`] collaborator, construction goes through a per-channel
//! factory, and the result is cached for a time-to-live so credential
//! rotation picks up within bounded staleness (or immediately via
//! [`ChannelRegistry::invalidate`]).
//!
//! Adapters are held behind the [`ChannelAdapter`] trait, so no concrete
//! channel module is a compile-time dependency of any caller.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use herald_types::{ChannelId, TenantId};

use crate::channel::{ChannelAdapter, ChannelError};
use crate::instagram::{InstagramAdapter, InstagramConfig};
use crate::messenger::{MessengerAdapter, MessengerConfig};
use crate::slack::{SlackAdapter, SlackConfig};
use crate::telegram::{TelegramAdapter, TelegramConfig};
use crate::whatsapp::{WhatsappAdapter, WhatsappConfig};

/// Opaque credential bundle for one `(channel, tenant)` pair.
///
/// The registry never interprets it; each factory deserializes its own
/// config type out of it.
pub type CredentialBundle = Value;

/// External credential/configuration store.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Fetch the credential bundle for a channel/tenant pair.
    ///
    /// Returning [`ChannelError::AdapterUnavailable`] means the pair is not
    /// provisioned; callers recover via the fallback path.
    async fn get_channel_credentials(
        &self,
        channel: &ChannelId,
        tenant: &TenantId,
    ) -> Result<CredentialBundle, ChannelError>;
}

/// Factory producing an adapter from a credential bundle.
pub type AdapterFactory =
    Arc<dyn Fn(CredentialBundle) -> Result<Arc<dyn ChannelAdapter>, ChannelError> + Send + Sync>;

struct CacheEntry {
    adapter: Arc<dyn ChannelAdapter>,
    created_at: Instant,
}

/// Resolves and caches channel adapters per `(channel, tenant)` pair.
pub struct ChannelRegistry {
    factories: HashMap<ChannelId, AdapterFactory>,
    credentials: Arc<dyn CredentialStore>,
    cache: Mutex<HashMap<(ChannelId, TenantId), CacheEntry>>,
    ttl: Duration,
}

impl ChannelRegistry {
    /// Create an empty registry (no factories) with the given cache TTL.
    pub fn new(credentials: Arc<dyn CredentialStore>, ttl: Duration) -> Self {
        Self {
            factories: HashMap::new(),
            credentials,
            cache: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Create a registry with factories for the five built-in channels
    /// registered under their canonical ids.
    pub fn with_builtin_factories(credentials: Arc<dyn CredentialStore>, ttl: Duration) -> Self {
        let mut registry = Self::new(credentials, ttl);
        registry.register_factory("whatsapp", |bundle| {
            let config: WhatsappConfig = parse_bundle("whatsapp", bundle)?;
            Ok(Arc::new(WhatsappAdapter::new(config)) as Arc<dyn ChannelAdapter>)
        });
        registry.register_factory("telegram", |bundle| {
            let config: TelegramConfig = parse_bundle("telegram", bundle)?;
            Ok(Arc::new(TelegramAdapter::new(config)) as Arc<dyn ChannelAdapter>)
        });
        registry.register_factory("slack", |bundle| {
            let config: SlackConfig = parse_bundle("slack", bundle)?;
            Ok(Arc::new(SlackAdapter::new(config)) as Arc<dyn ChannelAdapter>)
        });
        registry.register_factory("messenger", |bundle| {
            let config: MessengerConfig = parse_bundle("messenger", bundle)?;
            Ok(Arc::new(MessengerAdapter::new(config)) as Arc<dyn ChannelAdapter>)
        });
        registry.register_factory("instagram", |bundle| {
            let config: InstagramConfig = parse_bundle("instagram", bundle)?;
            Ok(Arc::new(InstagramAdapter::new(config)) as Arc<dyn ChannelAdapter>)
        });
        registry
    }

    /// Register (or replace) the factory for a channel id.
    pub fn register_factory<F>(&mut self, channel: impl Into<ChannelId>, factory: F)
    where
        F: Fn(CredentialBundle) -> Result<Arc<dyn ChannelAdapter>, ChannelError>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(channel.into(), Arc::new(factory));
    }

    /// Resolve the adapter for a `(channel, tenant)` pair.
    ///
    /// Cache hit within TTL returns the cached instance. On miss, fetches
    /// credentials, constructs via the channel's factory, and caches the
    /// result. Missing factory or credentials yield
    /// [`ChannelError::AdapterUnavailable`] — callers must treat that as
    /// recoverable, not fatal to the pipeline.
    pub async fn get_adapter(
        &self,
        channel: &ChannelId,
        tenant: &TenantId,
    ) -> Result<Arc<dyn ChannelAdapter>, ChannelError> {
        let key = (channel.clone(), tenant.clone());

        {
            let cache = self.cache.lock().expect("adapter cache poisoned");
            if let Some(entry) = cache.get(&key) {
                if entry.created_at.elapsed() < self.ttl {
                    return Ok(Arc::clone(&entry.adapter));
                }
                debug!(%channel, %tenant, "adapter cache entry expired");
            }
        }

        let factory = self.factories.get(channel).cloned().ok_or_else(|| {
            ChannelError::AdapterUnavailable(format!("no factory registered for {channel:?}"))
        })?;

        let bundle = self
            .credentials
            .get_channel_credentials(channel, tenant)
            .await?;

        let adapter = factory(bundle).map_err(|e| {
            warn!(%channel, %tenant, error = %e, "adapter construction failed");
            ChannelError::AdapterUnavailable(format!(
                "factory for {channel:?} failed for tenant {tenant:?}: {e}"
            ))
        })?;

        let mut cache = self.cache.lock().expect("adapter cache poisoned");
        cache.insert(
            key,
            CacheEntry {
                adapter: Arc::clone(&adapter),
                created_at: Instant::now(),
            },
        );
        info!(%channel, %tenant, "adapter constructed and cached");
        Ok(adapter)
    }

    /// Evict the cache entry for a pair (after credential rotation).
    pub fn invalidate(&self, channel: &ChannelId, tenant: &TenantId) {
        let mut cache = self.cache.lock().expect("adapter cache poisoned");
        if cache.remove(&(channel.clone(), tenant.clone())).is_some() {
            info!(%channel, %tenant, "adapter cache entry invalidated");
        }
    }

    /// Channel ids with a registered factory.
    pub fn registered_channels(&self) -> Vec<ChannelId> {
        self.factories.keys().cloned().collect()
    }
}

fn parse_bundle<T: serde::de::DeserializeOwned>(
    channel: &str,
    bundle: CredentialBundle,
) -> Result<T, ChannelError> {
    serde_json::from_value(bundle).map_err(|e| {
        ChannelError::AdapterUnavailable(format!("malformed {channel} credentials: {e}"))
    })
}
