use serde::{Deserialize, Serialize};

use crate::domain::{ChatRole, UserId};

pub const DIAGNOSIS_PATH: &str = "/generate_diagnosis";
pub const CHAT_PATH: &str = "/chat";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiagnosisRequest {
    pub user_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatRequest {
    pub user_id: UserId,
    pub message: String,
}

/// Only `response` is consumed; anything else the service adds is ignored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Structured shape of a diagnosis body.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FinancialDiagnosis {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub insights: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_request_uses_snake_case_fields() {
        let body = serde_json::to_value(ChatRequest {
            user_id: UserId::new("u1"),
            message: "Hi".into(),
        })
        .expect("serialize");
        assert_eq!(body, serde_json::json!({"user_id": "u1", "message": "Hi"}));
    }

    #[test]
    fn chat_response_ignores_extra_fields() {
        let parsed: ChatResponse =
            serde_json::from_str(r#"{"response":"Hello!","model":"x"}"#).expect("parse");
        assert_eq!(parsed.response, "Hello!");
    }

    #[test]
    fn chat_turn_round_trips_role_names() {
        let turn: ChatTurn =
            serde_json::from_str(r#"{"role":"assistant","content":"ok"}"#).expect("parse");
        assert_eq!(turn, ChatTurn::assistant("ok"));
    }
}
