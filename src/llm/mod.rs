pub mod config;
pub mod decoder;
pub mod pipeline;
pub mod request;
pub mod task;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ConfigStore, InferenceConfig, ModelMap};
pub use pipeline::{InferencePipeline, PipelineError};
pub use request::{Attachment, ChatRequest};
pub use task::{build_prompt, Task};
pub use transport::{HttpTransport, InferenceTransport};
