//! Per-user conversational session state.
//!
//! A [`ChatSession`] is identified by `(tenant, user, channel)` and carries
//! the conversational state machine plus a free-form context map. Sessions
//! are created on the first inbound message for an identity tuple and live
//! until an operator resets them; retention is an external concern.
//!
//! State machine:
//!
//! ```text
//! Initial -> AwaitingTos -> Conversing <-> InWorkflow
//!                               ^  \
//!                               |   v
//!                               +- Idle
//! ```
//!
//! Invariant: `context` contains [`ACTIVE_WORKFLOW_KEY`] if and only if the
//! state is [`SessionState::InWorkflow`]. All mutation goes through the
//! methods below, which uphold it.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ChannelId, TenantId, UserId};

/// Context key holding the active workflow's session id.
pub const ACTIVE_WORKFLOW_KEY: &str = "active_workflow_id";

/// Identity of a chat session: one conversation per user per channel per
/// tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    /// The channel the user converses on (their "platform").
    pub channel: ChannelId,
}

impl SessionKey {
    pub fn new(
        tenant_id: impl Into<TenantId>,
        user_id: impl Into<UserId>,
        channel: impl Into<ChannelId>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            user_id: user_id.into(),
            channel: channel.into(),
        }
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.tenant_id, self.channel, self.user_id)
    }
}

/// Conversational state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Brand-new session; no business content processed yet.
    Initial,
    /// Terms-of-service prompt sent; waiting for an affirmative reply.
    AwaitingTos,
    /// Normal single-turn conversation.
    Conversing,
    /// A workflow instance owns the conversation.
    InWorkflow,
    /// Inactive past the idle threshold; wakes on the next inbound message.
    Idle,
}

/// Error from an invalid session transition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// `begin_workflow` was called while another workflow is active.
    /// The caller must complete or abort the existing one first.
    #[error("session {session} already has active workflow {active}")]
    WorkflowAlreadyActive { session: String, active: String },
}

/// A per-user conversational session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub key: SessionKey,
    pub state: SessionState,
    /// String-keyed context map; carries [`ACTIVE_WORKFLOW_KEY`] while a
    /// workflow is running.
    #[serde(default)]
    pub context: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub last_interaction_at: DateTime<Utc>,
}

impl ChatSession {
    /// Create a fresh session in [`SessionState::Initial`].
    pub fn new(key: SessionKey) -> Self {
        let now = Utc::now();
        Self {
            key,
            state: SessionState::Initial,
            context: HashMap::new(),
            created_at: now,
            last_interaction_at: now,
        }
    }

    /// Record an interaction now.
    pub fn touch(&mut self) {
        self.last_interaction_at = Utc::now();
    }

    /// First inbound message of a new session: move to the TOS gate.
    /// No-op unless the session is [`SessionState::Initial`].
    pub fn begin_tos(&mut self) {
        if self.state == SessionState::Initial {
            self.state = SessionState::AwaitingTos;
        }
    }

    /// Affirmative TOS reply received: start conversing.
    /// No-op unless the session is [`SessionState::AwaitingTos`].
    pub fn accept_tos(&mut self) {
        if self.state == SessionState::AwaitingTos {
            self.state = SessionState::Conversing;
        }
    }

    /// Bind an active workflow to this session and enter
    /// [`SessionState::InWorkflow`].
    pub fn begin_workflow(&mut self, workflow_id: &str) -> Result<(), SessionError> {
        if let Some(active) = self.context.get(ACTIVE_WORKFLOW_KEY) {
            return Err(SessionError::WorkflowAlreadyActive {
                session: self.key.to_string(),
                active: active.clone(),
            });
        }
        self.context
            .insert(ACTIVE_WORKFLOW_KEY.to_string(), workflow_id.to_string());
        self.state = SessionState::InWorkflow;
        Ok(())
    }

    /// Clear the active workflow binding (completion or abort) and return to
    /// [`SessionState::Conversing`]. Returns the cleared workflow id, if any.
    pub fn end_workflow(&mut self) -> Option<String> {
        let cleared = self.context.remove(ACTIVE_WORKFLOW_KEY);
        if self.state == SessionState::InWorkflow {
            self.state = SessionState::Conversing;
        }
        cleared
    }

    /// The active workflow id, when the session is in a workflow.
    pub fn active_workflow(&self) -> Option<&str> {
        self.context.get(ACTIVE_WORKFLOW_KEY).map(String::as_str)
    }

    /// Flip a conversing session to [`SessionState::Idle`] if its last
    /// interaction is older than `threshold`. Returns whether it flipped.
    ///
    /// Only [`SessionState::Conversing`] is eligible: a workflow in flight
    /// must not be silently parked.
    pub fn mark_idle(&mut self, threshold: Duration) -> bool {
        if self.state == SessionState::Conversing
            && Utc::now() - self.last_interaction_at > threshold
        {
            self.state = SessionState::Idle;
            return true;
        }
        false
    }

    /// Wake an idle session on inbound traffic.
    pub fn wake(&mut self) {
        if self.state == SessionState::Idle {
            self.state = SessionState::Conversing;
        }
    }

    /// Operator reset: back to [`SessionState::Initial`] with cleared
    /// context.
    pub fn reset(&mut self) {
        self.state = SessionState::Initial;
        self.context.clear();
        self.touch();
    }
}
