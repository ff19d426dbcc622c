use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::Serialize;
use tracing::{debug, info};

pub const DEFAULT_API_URL: &str = "https://api-inference.huggingface.co";
pub const DEFAULT_MAIN_MODEL: &str = "mistralai/Mixtral-8x7B-Instruct-v0.1";

/// Model identifiers addressed by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelMap {
    pub main: String,
    pub summarization: Option<String>,
    pub backup: Option<String>,
}

impl Default for ModelMap {
    fn default() -> Self {
        Self {
            main: DEFAULT_MAIN_MODEL.to_string(),
            summarization: None,
            backup: None,
        }
    }
}

impl ModelMap {
    pub fn new(main: impl Into<String>) -> Self {
        Self {
            main: main.into(),
            summarization: None,
            backup: None,
        }
    }

    pub fn with_summarization(mut self, model: impl Into<String>) -> Self {
        self.summarization = Some(model.into());
        self
    }

    pub fn with_backup(mut self, model: impl Into<String>) -> Self {
        self.backup = Some(model.into());
        self
    }

    /// Summarization model, ignoring blank entries.
    pub fn summarization(&self) -> Option<&str> {
        non_blank(self.summarization.as_deref())
    }

    /// Backup model, ignoring blank entries.
    pub fn backup(&self) -> Option<&str> {
        non_blank(self.backup.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Serialize)]
pub struct InferenceConfig {
    pub api_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub models: ModelMap,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            models: ModelMap::default(),
        }
    }
}

impl InferenceConfig {
    pub fn new(api_url: String, api_key: Option<String>, models: ModelMap) -> Self {
        Self {
            api_url,
            api_key,
            models,
        }
    }

    /// The bearer credential, if one is set and non-empty.
    pub fn credential(&self) -> Option<&str> {
        non_blank(self.api_key.as_deref())
    }

    pub fn model_url(&self, model: &str) -> String {
        format!("{}/models/{}", self.api_url.trim_end_matches('/'), model)
    }

    /// JSON rendering for logs. The credential is never included.
    pub fn redacted_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{{\"api_url\":\"{}\"}}", self.api_url))
    }
}

/// Process-wide configuration owned by the caller.
///
/// Updates replace the whole object; readers take a snapshot at the start of a
/// request, so a request in flight keeps the configuration it started with.
#[derive(Debug)]
pub struct ConfigStore {
    current: ArcSwap<InferenceConfig>,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(InferenceConfig::default())
    }
}

impl ConfigStore {
    pub fn new(config: InferenceConfig) -> Self {
        Self {
            current: ArcSwap::from_pointee(config),
        }
    }

    pub fn snapshot(&self) -> Arc<InferenceConfig> {
        self.current.load_full()
    }

    /// Sets the credential and model map, keeping the configured endpoint.
    pub fn configure(&self, credential: impl Into<String>, models: ModelMap) -> Arc<InferenceConfig> {
        let api_url = self.current.load().api_url.clone();
        let config = Arc::new(InferenceConfig::new(api_url, Some(credential.into()), models));
        info!("Inference configuration updated (main model: {})", config.models.main);
        debug!("Inference configuration: {}", config.redacted_json());
        self.current.store(Arc::clone(&config));
        config
    }
}
