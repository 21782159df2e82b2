//! Binds the controllers to the identity the client is showing.
//!
//! Neither controller knows which user its state belongs to. An
//! [`InsightsClient`](crate::InsightsClient) owns exactly one [`IdentityScope`]
//! that all of its views share: an observed identity change resets both
//! controllers at once, so one user's transcript or diagnosis is never shown
//! to another. A view holds a [`ChatScope`] or [`DiagnosisScope`], which
//! resets only the controller that view renders, on mount and when dropped.

use std::sync::{Arc, Mutex};

use shared::domain::UserId;
use tracing::{debug, info};

use crate::{
    chat::ChatSessionController,
    diagnosis::{DiagnosisController, DiagnosisPayload},
    error::{ChatError, DiagnosisError},
    lifecycle::lock,
};

pub struct IdentityScope {
    diagnosis: Arc<DiagnosisController>,
    chat: Arc<ChatSessionController>,
    current: Mutex<Option<UserId>>,
}

impl IdentityScope {
    pub fn new(
        diagnosis: Arc<DiagnosisController>,
        chat: Arc<ChatSessionController>,
    ) -> Arc<Self> {
        Arc::new(Self {
            diagnosis,
            chat,
            current: Mutex::new(None),
        })
    }

    pub fn current(&self) -> Option<UserId> {
        lock(&self.current).clone()
    }

    pub fn diagnosis(&self) -> &Arc<DiagnosisController> {
        &self.diagnosis
    }

    pub fn chat(&self) -> &Arc<ChatSessionController> {
        &self.chat
    }

    /// Records the identity the client now shows. Returns `true` when it
    /// differs from the previous one and both controllers were reset.
    ///
    /// Blank identities count as no identity.
    pub fn observe(&self, identity: Option<UserId>) -> bool {
        let identity = identity.filter(|id| !id.is_blank());
        let mut current = lock(&self.current);
        if *current == identity {
            return false;
        }
        info!(
            previous = ?current.as_ref().map(UserId::as_str),
            next = ?identity.as_ref().map(UserId::as_str),
            "active identity changed; resetting insights state"
        );
        *current = identity;
        // Still holding `current`: nobody reads the new identity before the
        // old state is gone.
        self.diagnosis.reset();
        self.chat.reset();
        true
    }
}

/// A chat view's hold on the chat controller.
pub struct ChatScope {
    identity: Arc<IdentityScope>,
}

impl ChatScope {
    pub fn mount(identity: Arc<IdentityScope>) -> Self {
        debug!("chat view mounted");
        identity.chat.reset();
        Self { identity }
    }

    pub fn current(&self) -> Option<UserId> {
        self.identity.current()
    }

    /// Shorthand for [`IdentityScope::observe`]; the change is seen by every
    /// view of the same client.
    pub fn observe(&self, identity: Option<UserId>) -> bool {
        self.identity.observe(identity)
    }

    pub fn chat(&self) -> &Arc<ChatSessionController> {
        &self.identity.chat
    }

    pub async fn send_message(&self, message: &str) -> Result<String, ChatError> {
        let user_id = self.current().ok_or(ChatError::Validation)?;
        self.identity.chat.send_message(&user_id, message).await
    }

    pub fn clear_history(&self) {
        self.identity.chat.clear_history();
    }
}

impl Drop for ChatScope {
    fn drop(&mut self) {
        self.identity.chat.reset();
    }
}

/// A summary view's hold on the diagnosis controller.
pub struct DiagnosisScope {
    identity: Arc<IdentityScope>,
}

impl DiagnosisScope {
    pub fn mount(identity: Arc<IdentityScope>) -> Self {
        debug!("diagnosis view mounted");
        identity.diagnosis.reset();
        Self { identity }
    }

    pub fn current(&self) -> Option<UserId> {
        self.identity.current()
    }

    pub fn observe(&self, identity: Option<UserId>) -> bool {
        self.identity.observe(identity)
    }

    pub fn diagnosis(&self) -> &Arc<DiagnosisController> {
        &self.identity.diagnosis
    }

    pub async fn ensure_diagnosis(&self) -> Result<DiagnosisPayload, DiagnosisError> {
        let user_id = self.current().ok_or(DiagnosisError::Validation)?;
        self.identity.diagnosis.ensure_diagnosis(&user_id).await
    }

    pub async fn refresh_diagnosis(&self) -> Result<DiagnosisPayload, DiagnosisError> {
        let user_id = self.current().ok_or(DiagnosisError::Validation)?;
        self.identity.diagnosis.fetch_diagnosis(&user_id).await
    }
}

impl Drop for DiagnosisScope {
    fn drop(&mut self) {
        self.identity.diagnosis.reset();
    }
}

#[cfg(test)]
#[path = "tests/identity_tests.rs"]
mod tests;
