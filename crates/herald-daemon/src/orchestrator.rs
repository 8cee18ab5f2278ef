//! The message orchestration facade.
//!
//! [`MessageOrchestrator`] is the composition root the rest of the platform
//! talks to: outbound push sends (`send_text`, `send_options`, `send_image`,
//! `send_document`, `send_menu`) and the single inbound ingress
//! [`MessageOrchestrator::route_inbound`].
//!
//! Inbound turns for one session are serialized through a per-session async
//! lock — a conversation never processes two turns concurrently or out of
//! order, while unrelated sessions proceed in parallel.
//!
//! The only channel-specific branching outside the adapters lives in
//! [`extract_inbound_text`]: unpacking text or a selected option payload
//! from each provider's raw inbound shape.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use herald_delivery::{DeliveryContext, DeliveryMiddleware, DeliveryResult};
use herald_types::{
    ChannelId, ChatSession, DeliveryConfig, HeraldError, MediaRef, MessageOption, OutboundPayload,
    SessionKey, SessionState, TenantId, UserId,
};
use herald_workflow::{
    WorkflowContext, WorkflowManager, WorkflowReply, WorkflowTurn, WORKFLOW_NOT_FOUND_REPLY,
};

use crate::responder::ResponseGenerator;
use crate::store::{SessionStore, WorkflowStateStore};
use crate::tenant::ProfileRegistry;

/// Reply after TOS acceptance when the tenant configures no welcome copy.
const DEFAULT_WELCOME: &str = "¡Gracias! ¿En qué puedo ayudarte?";

/// Reply when a bound workflow cannot be started.
const WORKFLOW_UNAVAILABLE: &str =
    "Ese proceso no está disponible por el momento. Intenta más tarde.";

/// Text sent for an empty tenant menu.
const EMPTY_MENU: &str = "Por ahora no hay opciones en el menú.";

/// Outcome of routing one inbound message.
#[derive(Debug, Clone)]
pub struct InboundOutcome {
    /// Whether the response was delivered back to the user's channel.
    /// The response text is populated either way — the ingress layer can
    /// fall back to returning it in-band so the user never gets silence.
    pub success: bool,
    pub response: String,
}

/// The facade over sessions, workflows, tenant profiles, and delivery.
pub struct MessageOrchestrator {
    sessions: Arc<dyn SessionStore>,
    delivery: Arc<DeliveryMiddleware>,
    workflows: Arc<WorkflowManager>,
    profiles: Arc<ProfileRegistry>,
    responder: Arc<dyn ResponseGenerator>,
    config: DeliveryConfig,
    /// One lock per session identity; holds for the whole inbound turn.
    turn_locks: StdMutex<HashMap<SessionKey, Arc<Mutex<()>>>>,
}

impl MessageOrchestrator {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        delivery: Arc<DeliveryMiddleware>,
        workflows: Arc<WorkflowManager>,
        profiles: Arc<ProfileRegistry>,
        responder: Arc<dyn ResponseGenerator>,
        config: DeliveryConfig,
    ) -> Self {
        Self {
            sessions,
            delivery,
            workflows,
            profiles,
            responder,
            config,
            turn_locks: StdMutex::new(HashMap::new()),
        }
    }

    // -----------------------------------------------------------------
    // Outbound push API
    // -----------------------------------------------------------------

    /// Send a plain text message.
    pub async fn send_text(
        &self,
        channel: &ChannelId,
        tenant: &TenantId,
        recipient: &str,
        text: impl Into<String>,
    ) -> DeliveryResult {
        self.delivery
            .deliver(
                channel,
                tenant,
                recipient,
                &OutboundPayload::text(text),
                &DeliveryContext::interactive(),
            )
            .await
    }

    /// Send text with selectable options.
    pub async fn send_options(
        &self,
        channel: &ChannelId,
        tenant: &TenantId,
        recipient: &str,
        text: impl Into<String>,
        options: Vec<MessageOption>,
    ) -> DeliveryResult {
        self.delivery
            .deliver(
                channel,
                tenant,
                recipient,
                &OutboundPayload::options(text, options),
                &DeliveryContext::interactive(),
            )
            .await
    }

    /// Send an image with an optional caption.
    pub async fn send_image(
        &self,
        channel: &ChannelId,
        tenant: &TenantId,
        recipient: &str,
        image: MediaRef,
        caption: Option<String>,
    ) -> DeliveryResult {
        self.delivery
            .deliver(
                channel,
                tenant,
                recipient,
                &OutboundPayload::Image { image, caption },
                &DeliveryContext::interactive(),
            )
            .await
    }

    /// Send a document with an optional caption.
    pub async fn send_document(
        &self,
        channel: &ChannelId,
        tenant: &TenantId,
        recipient: &str,
        document: MediaRef,
        caption: Option<String>,
    ) -> DeliveryResult {
        self.delivery
            .deliver(
                channel,
                tenant,
                recipient,
                &OutboundPayload::Document { document, caption },
                &DeliveryContext::interactive(),
            )
            .await
    }

    /// Send one page of the tenant's configured menu.
    ///
    /// Pages are sliced by the configured page size; when more pages
    /// remain, a trailing option carries the `menu:<next>` payload so the
    /// user can page forward.
    pub async fn send_menu(
        &self,
        channel: &ChannelId,
        tenant: &TenantId,
        recipient: &str,
        page: usize,
    ) -> Result<DeliveryResult, HeraldError> {
        let profile = self.profiles.get(tenant).ok_or_else(|| {
            HeraldError::ConfigError(format!("no profile for tenant {tenant:?}"))
        })?;

        if profile.menu.is_empty() {
            return Ok(self.send_text(channel, tenant, recipient, EMPTY_MENU).await);
        }

        let page_size = self.config.menu_page_size.max(1);
        let pages = profile.menu.len().div_ceil(page_size);
        let page = page.min(pages - 1);
        let start = page * page_size;
        let end = (start + page_size).min(profile.menu.len());

        let mut options: Vec<MessageOption> = profile.menu[start..end].to_vec();
        if page + 1 < pages {
            options.push(MessageOption::new("Ver más", format!("menu:{}", page + 1)));
        }

        let text = format!(
            "Menú de {} ({}/{})",
            profile.display_name,
            page + 1,
            pages
        );
        Ok(self
            .send_options(channel, tenant, recipient, text, options)
            .await)
    }

    // -----------------------------------------------------------------
    // Inbound ingress
    // -----------------------------------------------------------------

    /// Route one inbound message: load or create the session, advance the
    /// conversational state machine, hand off to the active workflow or the
    /// response generator, deliver the reply, persist the session.
    pub async fn route_inbound(
        &self,
        tenant_id: impl Into<TenantId>,
        channel: impl Into<ChannelId>,
        user_id: impl Into<UserId>,
        raw_message: &Value,
    ) -> Result<InboundOutcome, HeraldError> {
        let key = SessionKey::new(tenant_id, user_id, channel);
        let profile = self.profiles.get(&key.tenant_id).ok_or_else(|| {
            HeraldError::ConfigError(format!("no profile for tenant {:?}", key.tenant_id))
        })?;

        let text = extract_inbound_text(&key.channel, raw_message).unwrap_or_default();

        // Serialize turns per session: no two turns for one conversation
        // run concurrently, arrival order is preserved.
        let turn_lock = self.turn_lock(&key);
        let _turn = turn_lock.lock().await;

        let mut session = match self.sessions.load(&key)? {
            Some(session) => session,
            None => {
                info!(session = %key, "creating chat session");
                ChatSession::new(key.clone())
            }
        };
        session.wake();

        let mut payloads: Vec<OutboundPayload> = Vec::new();
        let mut response = String::new();
        let mut success = true;

        match session.state {
            SessionState::Initial => {
                session.begin_tos();
                response = profile.tos_prompt.clone();
                payloads.push(OutboundPayload::options(
                    profile.tos_prompt.clone(),
                    profile.tos_options(),
                ));
            }
            SessionState::AwaitingTos => {
                if profile.is_tos_affirmative(&text) {
                    session.accept_tos();
                    if profile.initial_messages.is_empty() {
                        response = DEFAULT_WELCOME.to_string();
                        payloads.push(OutboundPayload::text(DEFAULT_WELCOME));
                    } else {
                        response = profile.initial_messages[0].clone();
                        for message in &profile.initial_messages {
                            payloads.push(OutboundPayload::text(message.clone()));
                        }
                    }
                } else {
                    // Anything but an affirmative re-prompts, state unchanged.
                    response = profile.tos_prompt.clone();
                    payloads.push(OutboundPayload::options(
                        profile.tos_prompt.clone(),
                        profile.tos_options(),
                    ));
                }
            }
            SessionState::InWorkflow => {
                let (reply, keep_workflow) = self.workflow_turn(&session, &text).await;
                response = reply.text.clone();
                payloads.push(reply_payload(reply));
                if !keep_workflow {
                    session.end_workflow();
                }
            }
            SessionState::Conversing | SessionState::Idle => {
                if let Some(workflow_type) = profile.workflow_for(&text) {
                    let ctx = WorkflowContext {
                        tenant_id: key.tenant_id.clone(),
                        user_id: key.user_id.clone(),
                        channel: key.channel.clone(),
                        vars: session.context.clone(),
                    };
                    match self.workflows.create(workflow_type, ctx).await {
                        Ok(created) => {
                            if let Err(err) = session.begin_workflow(&created.session_id) {
                                // Don't leak the freshly created instance.
                                self.workflows.abort(&created.session_id).await;
                                return Err(HeraldError::WorkflowError(err.to_string()));
                            }
                            response = created.first_reply.text.clone();
                            payloads.push(reply_payload(created.first_reply));
                        }
                        Err(err) => {
                            // Creation errors are never swallowed silently;
                            // the user still gets an answer.
                            error!(
                                session = %key,
                                workflow_type,
                                error = %err,
                                "failed to start bound workflow"
                            );
                            success = false;
                            response = WORKFLOW_UNAVAILABLE.to_string();
                            payloads.push(OutboundPayload::text(WORKFLOW_UNAVAILABLE));
                        }
                    }
                } else {
                    let generated = self.responder.generate(&session, &text).await?;
                    response = generated.text.clone();
                    payloads.push(if generated.options.is_empty() {
                        OutboundPayload::text(generated.text)
                    } else {
                        OutboundPayload::options(generated.text, generated.options)
                    });
                }
            }
        }

        session.touch();
        self.sessions.save(&session)?;

        let ctx = DeliveryContext::interactive();
        for payload in &payloads {
            let result = self
                .delivery
                .deliver(&key.channel, &key.tenant_id, key.user_id.as_str(), payload, &ctx)
                .await;
            if !result.success {
                // The response text still goes back to the ingress caller;
                // operational failures must never produce silence.
                warn!(
                    session = %key,
                    error = ?result.error,
                    "failed to deliver turn response"
                );
                success = false;
            }
        }

        Ok(InboundOutcome { success, response })
    }

    /// Run one workflow turn for the session's active instance. Returns the
    /// reply and whether the workflow is still active afterwards.
    async fn workflow_turn(&self, session: &ChatSession, text: &str) -> (WorkflowReply, bool) {
        let Some(workflow_id) = session.active_workflow().map(str::to_string) else {
            // State said InWorkflow but the context lost the id; recover by
            // falling back to conversing rather than wedging the session.
            warn!(session = %session.key, "in-workflow session missing workflow id");
            return (WorkflowReply::text(WORKFLOW_NOT_FOUND_REPLY), false);
        };

        match self.workflows.handle_message(&workflow_id, text).await {
            WorkflowTurn::InProgress(reply) => (reply, true),
            WorkflowTurn::Completed(reply) => (reply, false),
            WorkflowTurn::Failed(reply) => (reply, false),
            WorkflowTurn::NotFound => (WorkflowReply::text(WORKFLOW_NOT_FOUND_REPLY), false),
        }
    }

    // -----------------------------------------------------------------
    // Maintenance operations
    // -----------------------------------------------------------------

    /// Operator reset: state back to Initial, context cleared.
    pub async fn reset_session(&self, key: &SessionKey) -> Result<(), HeraldError> {
        if let Some(workflow_id) = self
            .sessions
            .load(key)?
            .and_then(|s| s.active_workflow().map(str::to_string))
        {
            self.workflows.abort(&workflow_id).await;
        }
        if let Some(mut session) = self.sessions.load(key)? {
            session.reset();
            self.sessions.save(&session)?;
            info!(session = %key, "session reset by operator");
        }
        Ok(())
    }

    /// Park conversing sessions idle after the configured inactivity
    /// threshold. Returns how many flipped.
    pub fn mark_idle_sessions(&self) -> Result<usize, HeraldError> {
        let threshold = chrono::Duration::seconds(self.config.idle_threshold_secs as i64);
        let mut flipped = 0;
        for mut session in self.sessions.list()? {
            if session.mark_idle(threshold) {
                self.sessions.save(&session)?;
                flipped += 1;
            }
        }
        if flipped > 0 {
            info!(flipped, "sessions parked idle");
        }
        Ok(flipped)
    }

    /// Persist every active workflow instance.
    pub async fn persist_workflows(
        &self,
        store: &dyn WorkflowStateStore,
    ) -> Result<usize, HeraldError> {
        let snapshot = self.workflows.save_all().await;
        let count = snapshot.len();
        store.save_snapshot(&snapshot)?;
        Ok(count)
    }

    /// Rehydrate workflow instances from a persisted snapshot.
    pub async fn restore_workflows(
        &self,
        store: &dyn WorkflowStateStore,
    ) -> Result<usize, HeraldError> {
        let snapshot = store.load_snapshot()?;
        Ok(self.workflows.restore(snapshot).await)
    }

    fn turn_lock(&self, key: &SessionKey) -> Arc<Mutex<()>> {
        let mut locks = self.turn_locks.lock().expect("turn locks poisoned");
        Arc::clone(locks.entry(key.clone()).or_default())
    }
}

fn reply_payload(reply: WorkflowReply) -> OutboundPayload {
    if reply.options.is_empty() {
        OutboundPayload::text(reply.text)
    } else {
        OutboundPayload::options(reply.text, reply.options)
    }
}

/// Unpack the user's text (or selected option payload) from a provider's
/// raw inbound shape. This is the only per-channel branching outside the
/// adapter crate.
pub fn extract_inbound_text(channel: &ChannelId, raw: &Value) -> Option<String> {
    let text = match channel.as_str() {
        "whatsapp" => raw["text"]["body"]
            .as_str()
            .or_else(|| raw["interactive"]["button_reply"]["id"].as_str())
            .or_else(|| raw["interactive"]["list_reply"]["id"].as_str()),
        "telegram" => raw["message"]["text"]
            .as_str()
            .or_else(|| raw["callback_query"]["data"].as_str()),
        "slack" => raw["event"]["text"].as_str(),
        "messenger" | "instagram" => raw["message"]["text"]
            .as_str()
            .or_else(|| raw["postback"]["payload"].as_str()),
        _ => raw["text"].as_str().or_else(|| raw.as_str()),
    };
    text.map(str::to_string)
}
