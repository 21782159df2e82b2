use std::{collections::VecDeque, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde_json::Value;
use shared::domain::UserId;
use tokio::sync::{oneshot, Mutex};

use crate::{api::InsightsApi, error::ApiFailure};

enum Reply<T> {
    Ready(Result<T, ApiFailure>),
    Gated(oneshot::Receiver<Result<T, ApiFailure>>),
}

impl<T> Reply<T> {
    async fn resolve(self) -> Result<T, ApiFailure> {
        match self {
            Reply::Ready(result) => result,
            Reply::Gated(rx) => rx
                .await
                .unwrap_or_else(|_| Err(ApiFailure::transport("gate dropped"))),
        }
    }
}

/// `InsightsApi` that answers from queued replies. Gated replies stay pending
/// until the test releases them, which makes in-flight states observable.
#[derive(Default)]
pub(crate) struct ScriptedApi {
    diagnosis: Mutex<VecDeque<Reply<Value>>>,
    chat: Mutex<VecDeque<Reply<String>>>,
    pub diagnosis_calls: Mutex<Vec<UserId>>,
    pub chat_calls: Mutex<Vec<(UserId, String)>>,
}

impl ScriptedApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn push_diagnosis(&self, result: Result<Value, ApiFailure>) {
        self.diagnosis.lock().await.push_back(Reply::Ready(result));
    }

    pub async fn gate_diagnosis(&self) -> oneshot::Sender<Result<Value, ApiFailure>> {
        let (tx, rx) = oneshot::channel();
        self.diagnosis.lock().await.push_back(Reply::Gated(rx));
        tx
    }

    pub async fn push_chat(&self, result: Result<String, ApiFailure>) {
        self.chat.lock().await.push_back(Reply::Ready(result));
    }

    pub async fn gate_chat(&self) -> oneshot::Sender<Result<String, ApiFailure>> {
        let (tx, rx) = oneshot::channel();
        self.chat.lock().await.push_back(Reply::Gated(rx));
        tx
    }

    pub async fn diagnosis_call_count(&self) -> usize {
        self.diagnosis_calls.lock().await.len()
    }

    pub async fn chat_call_count(&self) -> usize {
        self.chat_calls.lock().await.len()
    }
}

#[async_trait]
impl InsightsApi for ScriptedApi {
    async fn generate_diagnosis(&self, user_id: &UserId) -> Result<Value, ApiFailure> {
        self.diagnosis_calls.lock().await.push(user_id.clone());
        let reply = self.diagnosis.lock().await.pop_front();
        match reply {
            Some(reply) => reply.resolve().await,
            None => Err(ApiFailure::transport("no scripted diagnosis reply")),
        }
    }

    async fn send_chat(&self, user_id: &UserId, message: &str) -> Result<String, ApiFailure> {
        self.chat_calls
            .lock()
            .await
            .push((user_id.clone(), message.to_string()));
        let reply = self.chat.lock().await.pop_front();
        match reply {
            Some(reply) => reply.resolve().await,
            None => Err(ApiFailure::transport("no scripted chat reply")),
        }
    }
}

/// Yields until `condition` holds, failing the test after two seconds.
pub(crate) async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached in time");
}

pub(crate) fn user(id: &str) -> UserId {
    UserId::new(id)
}
