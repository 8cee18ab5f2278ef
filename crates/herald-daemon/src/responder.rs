//! Response-generation seam.
//!
//! The real intent/response pipeline (NLU, scoring, vacancy matching) is an
//! external collaborator; Herald only consumes its contract. The
//! [`PatternResponder`] shipped here answers from the tenant profile's
//! intent patterns and is the default for tests and simple deployments.

use std::sync::Arc;

use async_trait::async_trait;

use herald_types::{ChatSession, HeraldError, MessageOption};

use crate::tenant::ProfileRegistry;

/// Reply produced for one conversational turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedReply {
    pub text: String,
    pub options: Vec<MessageOption>,
}

impl GeneratedReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            options: Vec::new(),
        }
    }
}

/// External intent/response generator contract.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    /// Produce the reply for one inbound message given the session context.
    async fn generate(
        &self,
        session: &ChatSession,
        text: &str,
    ) -> Result<GeneratedReply, HeraldError>;
}

/// Default text when no intent pattern matches.
const FALLBACK_REPLY: &str =
    "No estoy seguro de haber entendido. ¿Puedes decirlo de otra forma?";

/// Responder backed by the tenant profile's compiled intent patterns.
pub struct PatternResponder {
    profiles: Arc<ProfileRegistry>,
}

impl PatternResponder {
    pub fn new(profiles: Arc<ProfileRegistry>) -> Self {
        Self { profiles }
    }
}

#[async_trait]
impl ResponseGenerator for PatternResponder {
    async fn generate(
        &self,
        session: &ChatSession,
        text: &str,
    ) -> Result<GeneratedReply, HeraldError> {
        let reply = self
            .profiles
            .get(&session.key.tenant_id)
            .and_then(|profile| profile.reply_for_intent(text).map(str::to_string))
            .unwrap_or_else(|| FALLBACK_REPLY.to_string());
        Ok(GeneratedReply::text(reply))
    }
}
