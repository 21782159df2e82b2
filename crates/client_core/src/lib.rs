use std::{sync::Arc, time::Duration};

use shared::domain::UserId;

pub mod api;
pub mod chat;
pub mod diagnosis;
pub mod error;
pub mod identity;
mod lifecycle;
pub mod session;

pub use api::{HttpInsightsApi, InsightsApi, MissingInsightsApi};
pub use chat::{ChatSessionController, ChatSnapshot};
pub use diagnosis::{DiagnosisController, DiagnosisPayload, DiagnosisSnapshot, DiagnosisView};
pub use error::{ApiConfigError, ApiFailure, ChatError, DiagnosisError};
pub use identity::{ChatScope, DiagnosisScope, IdentityScope};
pub use session::SessionToken;

/// Where and how to reach the insights service.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub server_url: String,
    pub session: Option<SessionToken>,
    pub request_timeout: Option<Duration>,
}

/// The two controllers wired to one transport, plus the identity they are
/// bound to. Views mount their own [`ChatScope`] or [`DiagnosisScope`] rather
/// than reaching for a global.
#[derive(Clone)]
pub struct InsightsClient {
    identity: Arc<IdentityScope>,
}

impl InsightsClient {
    pub fn new(api: Arc<dyn InsightsApi>) -> Self {
        Self {
            identity: IdentityScope::new(
                DiagnosisController::new(Arc::clone(&api)),
                ChatSessionController::new(api),
            ),
        }
    }

    pub fn connect(options: ConnectOptions) -> Result<Self, ApiConfigError> {
        let api = HttpInsightsApi::new(&options.server_url)?;
        Ok(Self::with_http(api, options))
    }

    /// Like [`InsightsClient::connect`] but bypasses any system proxy.
    #[cfg(test)]
    pub(crate) fn connect_direct(options: ConnectOptions) -> Result<Self, ApiConfigError> {
        let api = HttpInsightsApi::direct(&options.server_url)?;
        Ok(Self::with_http(api, options))
    }

    fn with_http(api: HttpInsightsApi, options: ConnectOptions) -> Self {
        let api = api
            .with_session(options.session)
            .with_timeout(options.request_timeout);
        Self::new(Arc::new(api))
    }

    pub fn diagnosis(&self) -> &Arc<DiagnosisController> {
        self.identity.diagnosis()
    }

    pub fn chat(&self) -> &Arc<ChatSessionController> {
        self.identity.chat()
    }

    pub fn identity(&self) -> &Arc<IdentityScope> {
        &self.identity
    }

    /// See [`IdentityScope::observe`].
    pub fn observe(&self, identity: Option<UserId>) -> bool {
        self.identity.observe(identity)
    }

    pub fn current(&self) -> Option<UserId> {
        self.identity.current()
    }

    pub fn chat_scope(&self) -> ChatScope {
        ChatScope::mount(Arc::clone(&self.identity))
    }

    pub fn diagnosis_scope(&self) -> DiagnosisScope {
        DiagnosisScope::mount(Arc::clone(&self.identity))
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
