use serde::{Deserialize, Serialize};

pub const DIAGNOSIS_FALLBACK_MESSAGE: &str = "Failed to fetch AI financial insights";
pub const CHAT_FALLBACK_MESSAGE: &str = "Failed to get a response from the finance assistant";

/// Body shape the insights service uses for every non-success response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
        }
    }

    /// Extracts the `error` field from a raw response body, ignoring blank
    /// messages and bodies that are not JSON.
    pub fn message_from_bytes(body: &[u8]) -> Option<String> {
        serde_json::from_slice::<ErrorBody>(body)
            .ok()
            .and_then(|body| body.error)
            .map(|message| message.trim().to_string())
            .filter(|message| !message.is_empty())
    }

    pub fn message_or(body: &[u8], fallback: &str) -> String {
        Self::message_from_bytes(body).unwrap_or_else(|| fallback.to_string())
    }
}
