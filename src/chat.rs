use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::llm::{Attachment, ChatRequest, InferencePipeline, PipelineError, Task};

pub const ERROR_PLACEHOLDER: &str = "I'm sorry, I wasn't able to process your request. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: u64,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Local>,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("nothing to send: message is empty and no files are attached")]
    EmptyRequest,
    #[error("a request is already in progress")]
    Busy,
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Caller side of the pipeline: keeps the transcript and allows one
/// outstanding request at a time.
pub struct ChatSession {
    pipeline: InferencePipeline,
    transcript: Mutex<Vec<ChatMessage>>,
    busy: AtomicBool,
    next_id: AtomicU64,
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ChatSession {
    pub fn new(pipeline: InferencePipeline) -> Self {
        Self {
            pipeline,
            transcript: Mutex::new(Vec::new()),
            busy: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn pipeline(&self) -> &InferencePipeline {
        &self.pipeline
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn transcript(&self) -> Vec<ChatMessage> {
        self.transcript.lock().clone()
    }

    pub fn clear(&self) {
        self.transcript.lock().clear();
    }

    /// Sends a message. Returns the reply, or `Ok(None)` when cancelled.
    pub async fn send(
        &self,
        message: &str,
        files: Vec<Attachment>,
        task: Task,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, SessionError> {
        let request = ChatRequest::new(message.trim())
            .with_files(files)
            .with_task(task);
        if !request.is_dispatchable() {
            return Err(SessionError::EmptyRequest);
        }

        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SessionError::Busy);
        }
        let _guard = BusyGuard(&self.busy);

        self.push(Role::User, user_entry(&request));

        match self.pipeline.process(&request, cancel).await {
            Ok(Some(reply)) => {
                self.push(Role::Assistant, reply.clone());
                Ok(Some(reply))
            }
            Ok(None) => {
                info!("Request cancelled; no reply recorded");
                Ok(None)
            }
            Err(e) => {
                error!("Error processing message: {}", e);
                self.push(Role::Assistant, ERROR_PLACEHOLDER.to_string());
                Err(e.into())
            }
        }
    }

    fn push(&self, role: Role, content: String) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.transcript.lock().push(ChatMessage {
            id,
            role,
            content,
            timestamp: Local::now(),
        });
    }
}

/// Transcript text for the user's side of a request.
pub fn user_entry(request: &ChatRequest) -> String {
    let mut content = request.message.clone();
    if !request.files.is_empty() {
        let names = request.file_names().join(", ");
        if content.is_empty() {
            content = format!("Files: {}", names);
        } else {
            content.push_str(&format!("\n\nFiles: {}", names));
        }
    }
    if request.task != Task::None {
        content = format!("[{}] {}", request.task.as_str().to_uppercase(), content);
    }
    content
}
