//! Financial health diagnosis for the active user.
//!
//! The controller holds at most one diagnosis. [`DiagnosisController::fetch_diagnosis`]
//! always goes to the network; callers that want "fetch once until cleared"
//! use [`DiagnosisController::ensure_diagnosis`], which serves the cached
//! result when one is present. Only one fetch runs at a time: a second call
//! while one is pending fails with [`DiagnosisError::Busy`].

use std::sync::{Arc, Mutex};

use serde_json::Value;
use shared::{domain::UserId, protocol::FinancialDiagnosis};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::{
    api::{InsightsApi, MissingInsightsApi},
    error::DiagnosisError,
    lifecycle::{lock, Lifecycle, Ticket},
};

const SNAPSHOT_CAPACITY: usize = 64;

/// Diagnosis body exactly as the service returned it.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosisPayload(Value);

/// Read-only interpretation of a [`DiagnosisPayload`] for renderers.
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosisView {
    Structured(FinancialDiagnosis),
    /// The service could not parse the model output and passed it through.
    RawText(String),
    Opaque(Value),
}

impl DiagnosisPayload {
    pub fn new(body: Value) -> Self {
        Self(body)
    }

    pub fn as_json(&self) -> &Value {
        &self.0
    }

    pub fn into_json(self) -> Value {
        self.0
    }

    pub fn view(&self) -> DiagnosisView {
        let Some(object) = self.0.as_object() else {
            return DiagnosisView::Opaque(self.0.clone());
        };

        let structured = ["summary", "insights", "recommendations"]
            .iter()
            .any(|key| object.contains_key(*key));
        if structured {
            if let Ok(diagnosis) = serde_json::from_value::<FinancialDiagnosis>(self.0.clone()) {
                return DiagnosisView::Structured(diagnosis);
            }
        } else if let Some(raw) = object.get("raw_response").and_then(Value::as_str) {
            return DiagnosisView::RawText(raw.to_string());
        }

        DiagnosisView::Opaque(self.0.clone())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiagnosisSnapshot {
    pub result: Option<DiagnosisPayload>,
    pub loading: bool,
}

struct DiagnosisState {
    result: Option<DiagnosisPayload>,
    loading: bool,
    lifecycle: Lifecycle,
}

impl DiagnosisState {
    fn snapshot(&self) -> DiagnosisSnapshot {
        DiagnosisSnapshot {
            result: self.result.clone(),
            loading: self.loading,
        }
    }
}

pub struct DiagnosisController {
    api: Arc<dyn InsightsApi>,
    state: Mutex<DiagnosisState>,
    events: broadcast::Sender<DiagnosisSnapshot>,
}

impl DiagnosisController {
    pub fn new(api: Arc<dyn InsightsApi>) -> Arc<Self> {
        let (events, _) = broadcast::channel(SNAPSHOT_CAPACITY);
        Arc::new(Self {
            api,
            state: Mutex::new(DiagnosisState {
                result: None,
                loading: false,
                lifecycle: Lifecycle::new(),
            }),
            events,
        })
    }

    pub fn detached() -> Arc<Self> {
        Self::new(Arc::new(MissingInsightsApi))
    }

    pub fn snapshot(&self) -> DiagnosisSnapshot {
        lock(&self.state).snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DiagnosisSnapshot> {
        self.events.subscribe()
    }

    /// Fetches a fresh diagnosis for `user_id` and stores it verbatim.
    ///
    /// On failure the stored result is cleared, so a failed refresh never
    /// leaves an older diagnosis on display.
    pub async fn fetch_diagnosis(
        &self,
        user_id: &UserId,
    ) -> Result<DiagnosisPayload, DiagnosisError> {
        if user_id.is_blank() {
            return Err(DiagnosisError::Validation);
        }

        let pending = self.begin()?;
        let ticket = pending.ticket.clone();

        let outcome = tokio::select! {
            biased;
            _ = ticket.cancel.cancelled() => None,
            outcome = self.api.generate_diagnosis(user_id) => Some(outcome),
        };
        let Some(outcome) = outcome else {
            debug!(user_id = %user_id, "diagnosis request cancelled by reset");
            return Err(DiagnosisError::Cancelled);
        };

        match outcome {
            Ok(body) => {
                let payload = DiagnosisPayload::new(body);
                let stored = payload.clone();
                if !pending.finish(move |state| state.result = Some(stored)) {
                    return Err(DiagnosisError::Cancelled);
                }
                info!(user_id = %user_id, "financial diagnosis stored");
                Ok(payload)
            }
            Err(failure) => {
                error!(user_id = %user_id, error = %failure, "financial diagnosis request failed");
                if !pending.finish(|state| state.result = None) {
                    return Err(DiagnosisError::Cancelled);
                }
                Err(failure.into())
            }
        }
    }

    /// Returns the cached diagnosis, fetching it first when none is stored.
    pub async fn ensure_diagnosis(
        &self,
        user_id: &UserId,
    ) -> Result<DiagnosisPayload, DiagnosisError> {
        let cached = lock(&self.state).result.clone();
        if let Some(result) = cached {
            return Ok(result);
        }
        self.fetch_diagnosis(user_id).await
    }

    pub fn clear(&self) {
        let mut state = lock(&self.state);
        state.result = None;
        self.publish(&state);
    }

    /// Clears the result and abandons any pending fetch. Used when the
    /// active identity changes or the consuming view goes away.
    pub fn reset(&self) {
        let mut state = lock(&self.state);
        state.lifecycle.invalidate();
        state.result = None;
        state.loading = false;
        debug!(
            generation = state.lifecycle.generation(),
            "diagnosis controller reset"
        );
        self.publish(&state);
    }

    fn begin(&self) -> Result<PendingFetch<'_>, DiagnosisError> {
        let mut state = lock(&self.state);
        if state.loading {
            warn!("diagnosis fetch rejected: another fetch is in flight");
            return Err(DiagnosisError::Busy);
        }
        state.loading = true;
        let ticket = state.lifecycle.ticket();
        self.publish(&state);
        Ok(PendingFetch {
            controller: self,
            ticket,
            armed: true,
        })
    }

    fn publish(&self, state: &DiagnosisState) {
        let _ = self.events.send(state.snapshot());
    }
}

/// Holds the in-flight flag for one fetch and releases it on every exit path.
struct PendingFetch<'a> {
    controller: &'a DiagnosisController,
    ticket: Ticket,
    armed: bool,
}

impl PendingFetch<'_> {
    /// Applies the terminal state if the fetch is still current. Returns
    /// `false` when a reset made it stale.
    fn finish(mut self, apply: impl FnOnce(&mut DiagnosisState)) -> bool {
        self.armed = false;
        let mut state = lock(&self.controller.state);
        if !state.lifecycle.is_current(&self.ticket) {
            debug!("discarding stale diagnosis completion");
            return false;
        }
        apply(&mut *state);
        state.loading = false;
        self.controller.publish(&state);
        true
    }
}

impl Drop for PendingFetch<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = lock(&self.controller.state);
        if state.lifecycle.is_current(&self.ticket) && state.loading {
            state.loading = false;
            self.controller.publish(&state);
        }
    }
}

#[cfg(test)]
#[path = "tests/diagnosis_tests.rs"]
mod tests;
