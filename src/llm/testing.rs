//! Scripted transport for pipeline and session tests.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use super::transport::{InferenceTransport, TransportError, TransportResponse};

#[derive(Debug, Clone)]
pub enum Scripted {
    Reply(u16, &'static str),
    Delayed(Duration, u16, &'static str),
    NetworkFailure,
    Hang,
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub url: String,
    pub credential: String,
    pub body: Value,
}

/// Replies are keyed by model (the URL suffix after `/models/`) and may be
/// overridden per prompt text.
#[derive(Default)]
pub struct FakeTransport {
    by_model: Mutex<HashMap<String, Scripted>>,
    by_prompt: Mutex<HashMap<String, Scripted>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_model(self, model: &str, reply: Scripted) -> Self {
        self.by_model.lock().insert(model.to_string(), reply);
        self
    }

    pub fn on_prompt(self, prompt: &str, reply: Scripted) -> Self {
        self.by_prompt.lock().insert(prompt.to_string(), reply);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn called_models(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| c.url.split("/models/").nth(1).map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl InferenceTransport for FakeTransport {
    async fn post_json(
        &self,
        url: &str,
        credential: &str,
        body: &Value,
    ) -> Result<TransportResponse, TransportError> {
        self.calls.lock().push(RecordedCall {
            url: url.to_string(),
            credential: credential.to_string(),
            body: body.clone(),
        });

        let model = url.split("/models/").nth(1).unwrap_or_default();
        let prompt = body["inputs"].as_str().unwrap_or_default();
        let script = self
            .by_prompt
            .lock()
            .get(prompt)
            .cloned()
            .or_else(|| self.by_model.lock().get(model).cloned())
            .unwrap_or(Scripted::Reply(404, "Not Found"));

        let reply = |status: u16, body: &str| TransportResponse {
            status,
            reason: String::new(),
            body: body.to_string(),
        };

        match script {
            Scripted::Reply(status, body) => Ok(reply(status, body)),
            Scripted::Delayed(delay, status, body) => {
                tokio::time::sleep(delay).await;
                Ok(reply(status, body))
            }
            Scripted::NetworkFailure => Err(TransportError::Network("connection refused".into())),
            Scripted::Hang => std::future::pending().await,
        }
    }
}
