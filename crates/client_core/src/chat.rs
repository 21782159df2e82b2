//! Chat transcript for the active user.

use std::sync::{Arc, Mutex};

use shared::{domain::UserId, protocol::ChatTurn};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    api::{InsightsApi, MissingInsightsApi},
    error::ChatError,
    lifecycle::{lock, Lifecycle, Ticket},
};

const SNAPSHOT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatSnapshot {
    pub history: Vec<ChatTurn>,
    pub chat_loading: bool,
    pub chat_error: Option<String>,
}

struct ChatState {
    history: Vec<ChatTurn>,
    chat_loading: bool,
    chat_error: Option<String>,
    lifecycle: Lifecycle,
}

impl ChatState {
    fn snapshot(&self) -> ChatSnapshot {
        ChatSnapshot {
            history: self.history.clone(),
            chat_loading: self.chat_loading,
            chat_error: self.chat_error.clone(),
        }
    }
}

/// Owns the ordered transcript of one chat session.
///
/// Sends are serialized: while a reply is pending, further sends fail with
/// [`ChatError::Busy`] and leave the transcript untouched, so turns always
/// appear in the order their sends were issued.
pub struct ChatSessionController {
    api: Arc<dyn InsightsApi>,
    state: Mutex<ChatState>,
    events: broadcast::Sender<ChatSnapshot>,
}

impl ChatSessionController {
    pub fn new(api: Arc<dyn InsightsApi>) -> Arc<Self> {
        let (events, _) = broadcast::channel(SNAPSHOT_CAPACITY);
        Arc::new(Self {
            api,
            state: Mutex::new(ChatState {
                history: Vec::new(),
                chat_loading: false,
                chat_error: None,
                lifecycle: Lifecycle::new(),
            }),
            events,
        })
    }

    pub fn detached() -> Arc<Self> {
        Self::new(Arc::new(MissingInsightsApi))
    }

    pub fn snapshot(&self) -> ChatSnapshot {
        lock(&self.state).snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatSnapshot> {
        self.events.subscribe()
    }

    /// Sends `message` and returns the assistant's reply.
    ///
    /// The user's turn is appended before the request goes out and stays in
    /// the transcript when the request fails; the failure is recorded in
    /// `chat_error` and returned.
    pub async fn send_message(&self, user_id: &UserId, message: &str) -> Result<String, ChatError> {
        if user_id.is_blank() {
            return Err(ChatError::Validation);
        }

        let pending = self.begin(message)?;
        let ticket = pending.ticket.clone();

        let outcome = tokio::select! {
            biased;
            _ = ticket.cancel.cancelled() => None,
            outcome = self.api.send_chat(user_id, message) => Some(outcome),
        };
        let Some(outcome) = outcome else {
            debug!(user_id = %user_id, "chat request cancelled by reset");
            return Err(ChatError::Cancelled);
        };

        match outcome {
            Ok(reply) => {
                let turn = ChatTurn::assistant(reply.clone());
                if !pending.finish(move |state| state.history.push(turn)) {
                    return Err(ChatError::Cancelled);
                }
                info!(user_id = %user_id, "assistant reply appended");
                Ok(reply)
            }
            Err(failure) => {
                warn!(user_id = %user_id, error = %failure, "chat request failed");
                let message = failure.message.clone();
                if !pending.finish(move |state| state.chat_error = Some(message)) {
                    return Err(ChatError::Cancelled);
                }
                Err(failure.into())
            }
        }
    }

    /// Replaces the transcript wholesale, e.g. when restoring a session.
    pub fn set_history(&self, turns: Vec<ChatTurn>) {
        let mut state = lock(&self.state);
        state.history = turns;
        self.publish(&state);
    }

    /// Empties the transcript and drops the last error. A pending send keeps
    /// running and its reply is still appended.
    pub fn clear_history(&self) {
        let mut state = lock(&self.state);
        state.history.clear();
        state.chat_error = None;
        self.publish(&state);
    }

    /// Clears the transcript and abandons any pending send. Used when the
    /// active identity changes or the consuming view goes away.
    pub fn reset(&self) {
        let mut state = lock(&self.state);
        state.lifecycle.invalidate();
        state.history.clear();
        state.chat_error = None;
        state.chat_loading = false;
        debug!(
            generation = state.lifecycle.generation(),
            "chat controller reset"
        );
        self.publish(&state);
    }

    fn begin(&self, message: &str) -> Result<PendingSend<'_>, ChatError> {
        let mut state = lock(&self.state);
        if state.chat_loading {
            warn!("chat send rejected: a reply is still pending");
            return Err(ChatError::Busy);
        }
        state.chat_loading = true;
        state.chat_error = None;
        state.history.push(ChatTurn::user(message));
        let ticket = state.lifecycle.ticket();
        self.publish(&state);
        Ok(PendingSend {
            controller: self,
            ticket,
            armed: true,
        })
    }

    fn publish(&self, state: &ChatState) {
        let _ = self.events.send(state.snapshot());
    }
}

/// Holds `chat_loading` for one send and releases it on every exit path.
struct PendingSend<'a> {
    controller: &'a ChatSessionController,
    ticket: Ticket,
    armed: bool,
}

impl PendingSend<'_> {
    fn finish(mut self, apply: impl FnOnce(&mut ChatState)) -> bool {
        self.armed = false;
        let mut state = lock(&self.controller.state);
        if !state.lifecycle.is_current(&self.ticket) {
            debug!("discarding stale chat completion");
            return false;
        }
        apply(&mut *state);
        state.chat_loading = false;
        self.controller.publish(&state);
        true
    }
}

impl Drop for PendingSend<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = lock(&self.controller.state);
        if state.lifecycle.is_current(&self.ticket) && state.chat_loading {
            state.chat_loading = false;
            self.controller.publish(&state);
        }
    }
}

#[cfg(test)]
#[path = "tests/chat_tests.rs"]
mod tests;
