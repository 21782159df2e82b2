use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::COOKIE, Client, ClientBuilder, Response};
use serde::Serialize;
use serde_json::Value;
use shared::{
    domain::UserId,
    error::{ErrorBody, CHAT_FALLBACK_MESSAGE, DIAGNOSIS_FALLBACK_MESSAGE},
    protocol::{ChatRequest, ChatResponse, DiagnosisRequest, CHAT_PATH, DIAGNOSIS_PATH},
};
use tracing::{info, warn};
use url::Url;

use crate::{
    error::{ApiConfigError, ApiFailure},
    session::SessionToken,
};

/// Remote inference service as seen by the controllers.
#[async_trait]
pub trait InsightsApi: Send + Sync {
    /// Returns the diagnosis body untouched.
    async fn generate_diagnosis(&self, user_id: &UserId) -> Result<Value, ApiFailure>;
    /// Returns the assistant's reply text.
    async fn send_chat(&self, user_id: &UserId, message: &str) -> Result<String, ApiFailure>;
}

pub struct MissingInsightsApi;

#[async_trait]
impl InsightsApi for MissingInsightsApi {
    async fn generate_diagnosis(&self, user_id: &UserId) -> Result<Value, ApiFailure> {
        Err(ApiFailure::transport(format!(
            "insights service unavailable for user {user_id}"
        )))
    }

    async fn send_chat(&self, user_id: &UserId, _message: &str) -> Result<String, ApiFailure> {
        Err(ApiFailure::transport(format!(
            "insights service unavailable for user {user_id}"
        )))
    }
}

pub struct HttpInsightsApi {
    http: Client,
    base_url: String,
    session: Option<SessionToken>,
    timeout: Option<Duration>,
}

impl HttpInsightsApi {
    pub fn new(server_url: &str) -> Result<Self, ApiConfigError> {
        Self::build(server_url, Client::builder())
    }

    /// Ignores `HTTP_PROXY` and friends; for talking to loopback servers.
    #[cfg(test)]
    pub(crate) fn direct(server_url: &str) -> Result<Self, ApiConfigError> {
        Self::build(server_url, Client::builder().no_proxy())
    }

    fn build(server_url: &str, builder: ClientBuilder) -> Result<Self, ApiConfigError> {
        let trimmed = server_url.trim();
        let parsed = Url::parse(trimmed).map_err(|source| ApiConfigError::InvalidUrl {
            url: trimmed.to_string(),
            source,
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiConfigError::UnsupportedScheme(trimmed.to_string()));
        }

        Ok(Self {
            http: builder.build()?,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            session: None,
            timeout: None,
        })
    }

    pub fn with_session(mut self, session: Option<SessionToken>) -> Self {
        self.session = session;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        fallback: &str,
    ) -> Result<Response, ApiFailure> {
        let mut request = self.http.post(self.endpoint(path)).json(body);
        if let Some(session) = &self.session {
            request = request.header(COOKIE, session.cookie_header().as_str());
        }
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|err| {
            warn!(path, error = %err, "insights request failed before a response arrived");
            ApiFailure::transport(fallback)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.bytes().await.unwrap_or_default();
        let message = ErrorBody::message_or(&body, fallback);
        warn!(path, status = status.as_u16(), %message, "insights service rejected request");
        Err(ApiFailure::http(status.as_u16(), message))
    }
}

#[async_trait]
impl InsightsApi for HttpInsightsApi {
    async fn generate_diagnosis(&self, user_id: &UserId) -> Result<Value, ApiFailure> {
        info!(user_id = %user_id, "requesting financial diagnosis");
        let response = self
            .post_json(
                DIAGNOSIS_PATH,
                &DiagnosisRequest {
                    user_id: user_id.clone(),
                },
                DIAGNOSIS_FALLBACK_MESSAGE,
            )
            .await?;
        let status = response.status().as_u16();
        response.json::<Value>().await.map_err(|err| {
            warn!(error = %err, "diagnosis response body is not JSON");
            ApiFailure::http(status, DIAGNOSIS_FALLBACK_MESSAGE)
        })
    }

    async fn send_chat(&self, user_id: &UserId, message: &str) -> Result<String, ApiFailure> {
        info!(user_id = %user_id, chars = message.chars().count(), "sending chat message");
        let response = self
            .post_json(
                CHAT_PATH,
                &ChatRequest {
                    user_id: user_id.clone(),
                    message: message.to_string(),
                },
                CHAT_FALLBACK_MESSAGE,
            )
            .await?;
        let status = response.status().as_u16();
        let body: ChatResponse = response.json().await.map_err(|err| {
            warn!(error = %err, "chat response body is missing the response field");
            ApiFailure::http(status, CHAT_FALLBACK_MESSAGE)
        })?;
        Ok(body.response)
    }
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
