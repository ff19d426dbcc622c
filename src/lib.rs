pub mod chat;
pub mod llm;
pub mod utils;

pub use chat::{ChatSession, SessionError};
pub use llm::{Attachment, ChatRequest, ConfigStore, InferencePipeline, ModelMap, PipelineError, Task};
