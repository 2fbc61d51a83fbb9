//! Remote session service seam.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::RemoteError;
use crate::models::{StartPayload, StopPayload};

pub const START_PATH: &str = "/sessions/start";
pub const STOP_PATH: &str = "/sessions/stop";

/// The service that owns session durability. Responses are opaque
/// acknowledgments.
#[async_trait]
pub trait SessionRemote: Send + Sync {
    async fn start(&self, payload: &StartPayload) -> Result<Value, RemoteError>;
    async fn stop(&self, payload: &StopPayload) -> Result<Value, RemoteError>;
}

/// JSON-over-HTTP client for the session service.
pub struct HttpRemote {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpRemote {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<T: Serialize + Sync>(&self, path: &str, body: &T) -> Result<Value, RemoteError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%url, "posting to session service");

        // One deadline covers the headers and the body
        let exchange = async {
            let response = self.client.post(&url).json(body).send().await?;
            let status = response.status();
            let text = response.text().await?;
            Ok::<_, reqwest::Error>((status, text))
        };
        let (status, text) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| RemoteError::Timeout {
                path: path.to_string(),
            })?
            .map_err(|source| RemoteError::Transport {
                path: path.to_string(),
                source,
            })?;

        if !status.is_success() {
            return Err(RemoteError::Status {
                path: path.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }

        // Acknowledgment bodies are opaque; keep non-JSON text as a string
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}

#[async_trait]
impl SessionRemote for HttpRemote {
    async fn start(&self, payload: &StartPayload) -> Result<Value, RemoteError> {
        self.post(START_PATH, payload).await
    }

    async fn stop(&self, payload: &StopPayload) -> Result<Value, RemoteError> {
        self.post(STOP_PATH, payload).await
    }
}

/// Pull a session id out of a start acknowledgment, if it carries one.
pub fn session_id_from_ack(ack: &Value) -> Option<String> {
    ["session_id", "id"].iter().find_map(|key| match ack.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
pub(crate) mod scripted {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use tokio::sync::Notify;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        Start(StartPayload),
        Stop(StopPayload),
    }

    /// In-process remote with queued outcomes. Unscripted calls succeed.
    #[derive(Default)]
    pub struct ScriptedRemote {
        calls: Mutex<Vec<Call>>,
        start_outcomes: Mutex<VecDeque<Result<Value, RemoteError>>>,
        stop_outcomes: Mutex<VecDeque<Result<Value, RemoteError>>>,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedRemote {
        pub fn new() -> Self {
            Self::default()
        }

        /// Every call waits for one `notify_one` on the returned handle.
        pub fn gated() -> (Self, Arc<Notify>) {
            let gate = Arc::new(Notify::new());
            let remote = Self {
                gate: Some(Arc::clone(&gate)),
                ..Self::default()
            };
            (remote, gate)
        }

        pub fn push_start(&self, outcome: Result<Value, RemoteError>) {
            self.start_outcomes.lock().unwrap().push_back(outcome);
        }

        pub fn push_stop(&self, outcome: Result<Value, RemoteError>) {
            self.stop_outcomes.lock().unwrap().push_back(outcome);
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        pub fn rejection(path: &str) -> RemoteError {
            RemoteError::Status {
                path: path.to_string(),
                status: 500,
                body: "{\"error\":\"boom\"}".to_string(),
            }
        }

        async fn wait_gate(&self) {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
        }
    }

    #[async_trait]
    impl SessionRemote for ScriptedRemote {
        async fn start(&self, payload: &StartPayload) -> Result<Value, RemoteError> {
            self.calls.lock().unwrap().push(Call::Start(payload.clone()));
            self.wait_gate().await;
            let next = self.start_outcomes.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Ok(serde_json::json!({ "status": "started" })))
        }

        async fn stop(&self, payload: &StopPayload) -> Result<Value, RemoteError> {
            self.calls.lock().unwrap().push(Call::Stop(payload.clone()));
            self.wait_gate().await;
            let next = self.stop_outcomes.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Ok(serde_json::json!({ "status": "stopped" })))
        }
    }
}
