use thiserror::Error;

/// Failure reported by an [`crate::api::InsightsApi`] implementation. The
/// message is already fit for display.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ApiFailure {
    pub message: String,
    pub status: Option<u16>,
}

impl ApiFailure {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: Some(status),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiConfigError {
    #[error("invalid server url '{url}': {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("server url must start with http:// or https://, got '{0}'")]
    UnsupportedScheme(String),
    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiagnosisError {
    #[error("user id is required to fetch a diagnosis")]
    Validation,
    #[error("a diagnosis request is already in flight")]
    Busy,
    #[error("{message}")]
    Remote {
        message: String,
        status: Option<u16>,
    },
    #[error("diagnosis request was cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("user id is required to send a message")]
    Validation,
    #[error("please wait for the previous response")]
    Busy,
    #[error("{message}")]
    Remote {
        message: String,
        status: Option<u16>,
    },
    #[error("chat request was cancelled")]
    Cancelled,
}

impl From<ApiFailure> for DiagnosisError {
    fn from(value: ApiFailure) -> Self {
        Self::Remote {
            message: value.message,
            status: value.status,
        }
    }
}

impl From<ApiFailure> for ChatError {
    fn from(value: ApiFailure) -> Self {
        Self::Remote {
            message: value.message,
            status: value.status,
        }
    }
}
