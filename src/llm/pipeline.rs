use std::sync::Arc;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::{ConfigStore, InferenceConfig};
use super::decoder::{extract_text, ModelFamily};
use super::request::ChatRequest;
use super::task::{build_prompt, Task};
use super::transport::{InferenceTransport, TransportResponse};

pub const MAX_LENGTH: u32 = 500;
pub const TEMPERATURE: f64 = 0.7;
pub const TOP_P: f64 = 0.95;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("inference API key not configured")]
    Configuration,
    #[error("inference request to {model} failed: {reason}")]
    InferenceRequest {
        model: String,
        status: Option<u16>,
        reason: String,
    },
}

enum Attempt {
    Succeeded(TransportResponse),
    Failed { status: Option<u16>, reason: String },
    Cancelled,
}

/// Turns chat requests into calls against the hosted text-generation models.
#[derive(Clone)]
pub struct InferencePipeline {
    config: Arc<ConfigStore>,
    transport: Arc<dyn InferenceTransport>,
}

impl InferencePipeline {
    pub fn new(config: Arc<ConfigStore>, transport: Arc<dyn InferenceTransport>) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &Arc<ConfigStore> {
        &self.config
    }

    /// Runs one request. `Ok(None)` means the token fired before a reply was
    /// received; nothing should be shown for it.
    pub async fn process(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, PipelineError> {
        let config = self.config.snapshot();
        let credential = config.credential().ok_or(PipelineError::Configuration)?;

        if cancel.is_cancelled() {
            debug!("Request cancelled before dispatch");
            return Ok(None);
        }

        let model = select_model(&config, request.task);
        info!("Processing {} request with model: {}", request.task, model);
        if !request.files.is_empty() {
            // Attachments are never forwarded to the model.
            for file in &request.files {
                debug!("Attached file {} ({} bytes) not sent", file.name, file.size());
            }
        }

        let body = request_body(&build_prompt(request.task, &request.message));

        let (model, response) = match self.attempt(&config, credential, model, &body, cancel).await {
            Attempt::Succeeded(response) => (model, response),
            Attempt::Cancelled => return Ok(None),
            Attempt::Failed { status, reason } => {
                let backup = match config.models.backup() {
                    Some(backup) if backup != model => backup,
                    _ => {
                        return Err(PipelineError::InferenceRequest {
                            model: model.to_string(),
                            status,
                            reason: format!("API request failed: {}", reason),
                        })
                    }
                };

                warn!("Primary model {} failed ({}), trying backup model {}", model, reason, backup);
                match self.attempt(&config, credential, backup, &body, cancel).await {
                    Attempt::Succeeded(response) => (backup, response),
                    Attempt::Cancelled => return Ok(None),
                    Attempt::Failed { status, reason } => {
                        return Err(PipelineError::InferenceRequest {
                            model: backup.to_string(),
                            status,
                            reason: format!("Both primary and backup models failed: {}", reason),
                        })
                    }
                }
            }
        };

        let family = ModelFamily::of(model, config.models.summarization());
        Ok(Some(extract_text(&response.body, family)))
    }

    async fn attempt(
        &self,
        config: &InferenceConfig,
        credential: &str,
        model: &str,
        body: &Value,
        cancel: &CancellationToken,
    ) -> Attempt {
        let url = config.model_url(model);
        debug!("POST {}", url);

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Request to {} cancelled", model);
                return Attempt::Cancelled;
            }
            result = self.transport.post_json(&url, credential, body) => result,
        };

        match result {
            Ok(response) if response.is_success() => Attempt::Succeeded(response),
            Ok(response) => Attempt::Failed {
                status: Some(response.status),
                reason: if response.reason.is_empty() {
                    format!("status {}", response.status)
                } else {
                    format!("{} {}", response.status, response.reason)
                },
            },
            Err(e) => Attempt::Failed {
                status: None,
                reason: e.to_string(),
            },
        }
    }
}

pub fn select_model(config: &InferenceConfig, task: Task) -> &str {
    match (task, config.models.summarization()) {
        (Task::Summarize, Some(summarizer)) => summarizer,
        _ => config.models.main.as_str(),
    }
}

pub fn request_body(prompt: &str) -> Value {
    json!({
        "inputs": prompt,
        "parameters": {
            "max_length": MAX_LENGTH,
            "temperature": TEMPERATURE,
            "top_p": TOP_P,
        }
    })
}
