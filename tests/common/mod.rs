//! Shared helpers for integration tests.
//!
//! Each integration test file compiles common/ as its own module, so not
//! every helper is used in every file.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use herald_channel::{
    AdapterCapabilities, ChannelAdapter, ChannelError, ChannelRegistry, CredentialBundle,
    CredentialStore, ProviderReceipt,
};
use herald_daemon::{MemoryStore, MessageOrchestrator, PatternResponder, ProfileRegistry};
use herald_delivery::{DeliveryMiddleware, RateLimiter};
use herald_types::{
    ChannelId, ChannelQuota, ChatSession, HeraldConfig, MediaRef, MessageOption, ProfileData,
    SessionKey, TenantId,
};
use herald_workflow::{AssessmentFactory, WorkflowDescriptor, WorkflowManager};

/// What kind of send an adapter observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentKind {
    Text,
    Options,
    Paginated,
    Image,
    Document,
}

/// One message an adapter was asked to send.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub kind: SentKind,
    pub recipient: String,
    pub text: String,
    pub options: Vec<MessageOption>,
}

/// Test adapter that records every send and can fail the first N calls.
pub struct RecordingAdapter {
    name: String,
    caps: AdapterCapabilities,
    fail_remaining: AtomicU32,
    sent: Mutex<Vec<SentMessage>>,
}

impl RecordingAdapter {
    pub fn new(name: &str) -> Arc<Self> {
        Self::with_caps(
            name,
            AdapterCapabilities {
                max_inline_options: 3,
                supports_media: true,
                supports_paginated_lists: false,
            },
        )
    }

    pub fn with_caps(name: &str, caps: AdapterCapabilities) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            caps,
            fail_remaining: AtomicU32::new(0),
            sent: Mutex::new(Vec::new()),
        })
    }

    /// Make the next `n` sends fail with a provider error.
    pub fn fail_next(&self, n: u32) {
        self.fail_remaining.store(n, Ordering::SeqCst);
    }

    /// Everything sent so far, in order.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// The most recent send.
    pub fn last_sent(&self) -> Option<SentMessage> {
        self.sent.lock().unwrap().last().cloned()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    fn record(
        &self,
        kind: SentKind,
        recipient: &str,
        text: &str,
        options: &[MessageOption],
    ) -> Result<ProviderReceipt, ChannelError> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(SentMessage {
            kind,
            recipient: recipient.to_string(),
            text: text.to_string(),
            options: options.to_vec(),
        });
        let sequence = sent.len();
        drop(sent);

        let remaining = self.fail_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(ChannelError::Api("simulated provider failure".into()));
        }
        Ok(ProviderReceipt::with_id(format!("{}-{sequence}", self.name)))
    }
}

#[async_trait]
impl ChannelAdapter for RecordingAdapter {
    async fn send_text(
        &self,
        recipient: &str,
        text: &str,
    ) -> Result<ProviderReceipt, ChannelError> {
        self.record(SentKind::Text, recipient, text, &[])
    }

    async fn send_options(
        &self,
        recipient: &str,
        text: &str,
        options: &[MessageOption],
    ) -> Result<ProviderReceipt, ChannelError> {
        self.record(SentKind::Options, recipient, text, options)
    }

    async fn send_paginated_options(
        &self,
        recipient: &str,
        text: &str,
        options: &[MessageOption],
    ) -> Result<ProviderReceipt, ChannelError> {
        self.record(SentKind::Paginated, recipient, text, options)
    }

    async fn send_image(
        &self,
        recipient: &str,
        image: &MediaRef,
        caption: Option<&str>,
    ) -> Result<ProviderReceipt, ChannelError> {
        self.record(
            SentKind::Image,
            recipient,
            caption.unwrap_or(image.url.as_str()),
            &[],
        )
    }

    async fn send_document(
        &self,
        recipient: &str,
        document: &MediaRef,
        caption: Option<&str>,
    ) -> Result<ProviderReceipt, ChannelError> {
        self.record(
            SentKind::Document,
            recipient,
            caption.unwrap_or(document.url.as_str()),
            &[],
        )
    }

    async fn fetch_profile(&self, _recipient: &str) -> Result<ProfileData, ChannelError> {
        Ok(ProfileData::default())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> AdapterCapabilities {
        self.caps
    }
}

/// Credential store that provisions every pair with an empty bundle.
pub struct OpenCredentialStore;

#[async_trait]
impl CredentialStore for OpenCredentialStore {
    async fn get_channel_credentials(
        &self,
        _channel: &ChannelId,
        _tenant: &TenantId,
    ) -> Result<CredentialBundle, ChannelError> {
        Ok(json!({}))
    }
}

/// Registry whose factories hand out the given recording adapters.
pub fn recording_registry(adapters: Vec<Arc<RecordingAdapter>>) -> Arc<ChannelRegistry> {
    let mut registry =
        ChannelRegistry::new(Arc::new(OpenCredentialStore), Duration::from_secs(3600));
    for adapter in adapters {
        let name = adapter.name().to_string();
        registry.register_factory(name.as_str(), move |_bundle| {
            Ok(Arc::clone(&adapter) as Arc<dyn ChannelAdapter>)
        });
    }
    Arc::new(registry)
}

/// The standard test deployment configuration: one tenant (`t1`) on a
/// WhatsApp-like channel with a Telegram-like fallback, an assessment
/// binding, one intent pattern, and a six-entry menu.
pub fn test_config() -> HeraldConfig {
    HeraldConfig::from_toml(
        r#"
        [channels.whatsapp]
        max_requests_per_window = 100
        window_seconds = 60
        retry_attempts = 3
        retry_base_delay_secs = 1
        fallback_channel = "telegram"

        [channels.telegram]
        max_requests_per_window = 100
        window_seconds = 60
        retry_attempts = 2
        retry_base_delay_secs = 1

        [delivery]
        overall_deadline_secs = 600
        chunk_pacing_ms = 100

        [tenants.t1]
        display_name = "HuntRED"
        initial_messages = ["¡Bienvenido a HuntRED!"]
        tos_prompt = "Antes de continuar, ¿aceptas nuestros términos de servicio?"
        tos_accept_option = "Sí, continuar"
        tos_decline_option = "No"

        [tenants.t1.workflow_bindings]
        "evaluación" = "assessment"

        [[tenants.t1.intent_patterns]]
        pattern = "hola|buen(os|as)"
        reply = "¡Hola! ¿En qué puedo ayudarte?"

        [[tenants.t1.menu]]
        title = "Ver vacantes"
        payload = "vacancies"

        [[tenants.t1.menu]]
        title = "Mi perfil"
        payload = "profile"

        [[tenants.t1.menu]]
        title = "Hablar con un asesor"
        payload = "advisor"

        [[tenants.t1.menu]]
        title = "Estado de mi proceso"
        payload = "status"

        [[tenants.t1.menu]]
        title = "Subir mi CV"
        payload = "upload_cv"

        [[tenants.t1.menu]]
        title = "Ayuda"
        payload = "help"
        "#,
    )
    .expect("test config should parse")
}

/// Workflow manager with the standard two-question assessment registered.
pub fn manager_with_assessment() -> Arc<WorkflowManager> {
    let manager = WorkflowManager::new();
    manager
        .register(WorkflowDescriptor::new(
            "assessment",
            AssessmentFactory::new(
                "assessment",
                vec![
                    "¿Cuál es tu nombre completo?".to_string(),
                    "¿En qué ciudad vives?".to_string(),
                ],
            ),
        ))
        .expect("assessment registration should succeed");
    Arc::new(manager)
}

/// A fully wired test stack.
pub struct TestStack {
    pub orchestrator: MessageOrchestrator,
    pub sessions: Arc<MemoryStore>,
    pub workflows: Arc<WorkflowManager>,
    pub whatsapp: Arc<RecordingAdapter>,
    pub telegram: Arc<RecordingAdapter>,
}

impl TestStack {
    /// Load the persisted session for a key, panicking if absent.
    pub fn sessions_state(&self, key: &SessionKey) -> ChatSession {
        use herald_daemon::SessionStore;
        self.sessions
            .load(key)
            .expect("session store should not fail")
            .expect("session should exist")
    }
}

/// Build an orchestrator over recording adapters, the in-memory store, and
/// the standard test configuration.
pub fn build_stack() -> TestStack {
    let config = test_config();
    let whatsapp = RecordingAdapter::new("whatsapp");
    let telegram = RecordingAdapter::new("telegram");
    let registry = recording_registry(vec![Arc::clone(&whatsapp), Arc::clone(&telegram)]);

    let limiter = Arc::new(RateLimiter::from_config(config.channels.iter()));
    let quotas: HashMap<ChannelId, ChannelQuota> = config
        .channels
        .iter()
        .map(|(id, quota)| (ChannelId::new(id.as_str()), quota.clone()))
        .collect();
    let delivery = Arc::new(DeliveryMiddleware::new(
        limiter,
        registry,
        quotas,
        config.delivery.clone(),
    ));

    let profiles = Arc::new(ProfileRegistry::from_config(&config).expect("profiles compile"));
    let responder = Arc::new(PatternResponder::new(Arc::clone(&profiles)));
    let sessions = Arc::new(MemoryStore::new());
    let workflows = manager_with_assessment();

    let orchestrator = MessageOrchestrator::new(
        Arc::clone(&sessions) as Arc<dyn herald_daemon::SessionStore>,
        delivery,
        Arc::clone(&workflows),
        profiles,
        responder,
        config.delivery,
    );

    TestStack {
        orchestrator,
        sessions,
        workflows,
        whatsapp,
        telegram,
    }
}

/// Raw WhatsApp-like inbound payload carrying plain text.
pub fn whatsapp_text(text: &str) -> serde_json::Value {
    json!({ "text": { "body": text } })
}
