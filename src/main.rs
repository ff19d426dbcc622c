use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use docsense::chat::{ChatSession, SessionError, ERROR_PLACEHOLDER};
use docsense::llm::config::{DEFAULT_API_URL, DEFAULT_MAIN_MODEL};
use docsense::llm::{Attachment, ConfigStore, HttpTransport, InferenceConfig, InferencePipeline, ModelMap, Task};
use docsense::utils::documents::{collect_documents, load_attachment, load_attachments};

/// Sends business documents and questions to a hosted text-generation model
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Message to send. Without a message or files, starts an interactive chat
    #[arg(short, long)]
    message: Option<String>,

    /// Document to attach (repeatable)
    #[arg(short, long = "file")]
    files: Vec<PathBuf>,

    /// Attach every pdf/doc/docx/txt file under this directory
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Analysis task (review, summarize, insights, solutions, none)
    #[arg(short, long, default_value = "none")]
    task: Task,

    /// Inference API key
    #[arg(long, env = "HF_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Inference API base URL
    #[arg(long, env = "HF_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Main model
    #[arg(long, env = "HF_MODEL", default_value = DEFAULT_MAIN_MODEL)]
    model: String,

    /// Model used for summarize requests
    #[arg(long, env = "HF_SUMMARIZATION_MODEL")]
    summarization_model: Option<String>,

    /// Model retried once when the selected model fails
    #[arg(long, env = "HF_BACKUP_MODEL")]
    backup_model: Option<String>,

    /// HTTP timeout in seconds
    #[arg(long, default_value_t = 60)]
    timeout: u64,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(&args.log_level)?;

    let config = Arc::new(ConfigStore::new(setup_inference_config(&args)));
    let transport = HttpTransport::new(Some(Duration::from_secs(args.timeout)))
        .context("Failed to build HTTP client")?;
    let session = ChatSession::new(InferencePipeline::new(config, Arc::new(transport)));

    let mut files = load_attachments(&args.files)?;
    if let Some(dir) = &args.dir {
        files.extend(load_attachments(&collect_documents(dir))?);
    }

    if args.message.is_some() || !files.is_empty() {
        let message = args.message.clone().unwrap_or_default();
        return run_once(&session, &message, files, args.task).await;
    }

    run_interactive(&session, args.task).await
}

fn setup_logging(log_level: &str) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_thread_names(false)
        .with_ansi(true)
        .with_timer(tracing_subscriber::fmt::time::LocalTime::rfc_3339())
        .with_level(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("Failed to install log subscriber")?;
    Ok(())
}

fn setup_inference_config(args: &Args) -> InferenceConfig {
    let mut models = ModelMap::new(args.model.clone());
    models.summarization = args.summarization_model.clone();
    models.backup = args.backup_model.clone();

    let config = InferenceConfig::new(args.api_url.clone(), args.api_key.clone(), models);
    if config.credential().is_none() {
        warn!("No API key configured. Set HF_API_KEY or pass --api-key (or /key in chat).");
    }
    debug!("Inference configuration: {}", config.redacted_json());
    config
}

/// Routes Ctrl-C to the request in flight, or ends the chat when idle.
#[derive(Default)]
struct Interrupts {
    in_flight: Mutex<Option<CancellationToken>>,
    quit: Notify,
}

impl Interrupts {
    fn begin(&self) -> CancellationToken {
        let cancel = CancellationToken::new();
        *self.in_flight.lock() = Some(cancel.clone());
        cancel
    }

    fn finish(&self) {
        self.in_flight.lock().take();
    }

    /// Returns true when a request was cancelled, false when the chat should end.
    fn interrupt(&self) -> bool {
        match self.in_flight.lock().take() {
            Some(cancel) => {
                cancel.cancel();
                true
            }
            None => {
                self.quit.notify_one();
                false
            }
        }
    }
}

/// One-shot mode: a failed request is an error exit.
async fn run_once(session: &ChatSession, message: &str, files: Vec<Attachment>, task: Task) -> Result<()> {
    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let result = run_request(session, message, files, task, &cancel).await;
    watcher.abort();

    result.context("Failed to process message")?;
    Ok(())
}

/// Sends one message and prints the outcome.
async fn run_request(
    session: &ChatSession,
    message: &str,
    files: Vec<Attachment>,
    task: Task,
    cancel: &CancellationToken,
) -> Result<Option<String>, SessionError> {
    let message = match (message.trim().is_empty(), task.quick_prompt(files.len())) {
        (true, Some(prompt)) if !files.is_empty() => prompt,
        _ => message.to_string(),
    };

    let result = session.send(&message, files, task, cancel).await;

    match &result {
        Ok(Some(reply)) => println!("\n\x1b[1;36mAssistant:\x1b[0m\n{}\n", reply),
        Ok(None) => println!("\x1b[1;33m(cancelled)\x1b[0m"),
        Err(SessionError::EmptyRequest) => println!("Type a message or attach a file first."),
        Err(e) => {
            warn!("{}", e);
            println!("\n\x1b[1;31mAssistant:\x1b[0m\n{}\n", ERROR_PLACEHOLDER);
        }
    }
    result
}

async fn run_interactive(session: &ChatSession, mut task: Task) -> Result<()> {
    println!("Interactive chat. Commands: /task <name>, /file <path>, /dir <path>, /key <api key>, /clear, /quit");
    let mut pending_files: Vec<Attachment> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let interrupts = Arc::new(Interrupts::default());
    let listener = {
        let interrupts = interrupts.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if !interrupts.interrupt() {
                    break;
                }
            }
        })
    };

    loop {
        print_prompt(task, pending_files.len());
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read input")?,
            _ = interrupts.quit.notified() => {
                println!();
                break;
            }
        };
        let Some(line) = line else {
            break;
        };
        let line = line.trim();

        if let Some(command) = line.strip_prefix('/') {
            let (name, arg) = command.split_once(' ').unwrap_or((command, ""));
            let arg = arg.trim();
            match name {
                "quit" | "exit" => break,
                "task" => match arg.parse::<Task>() {
                    Ok(t) => {
                        task = t;
                        info!("Task set to {}", task);
                        if pending_files.is_empty() {
                            if let Some(hint) = task.quick_prompt(0) {
                                println!("{}", hint);
                            }
                        }
                    }
                    Err(e) => println!("{}", e),
                },
                "file" => match load_attachment(PathBuf::from(arg).as_path()) {
                    Ok(file) => pending_files.push(file),
                    Err(e) => println!("{:#}", e),
                },
                "dir" => match load_attachments(&collect_documents(PathBuf::from(arg).as_path())) {
                    Ok(files) => pending_files.extend(files),
                    Err(e) => println!("{:#}", e),
                },
                "key" => {
                    let models = session.pipeline().config().snapshot().models.clone();
                    session.pipeline().config().configure(arg, models);
                    println!("API settings saved.");
                }
                "clear" => {
                    session.clear();
                    pending_files.clear();
                }
                other => println!("Unknown command: /{}", other),
            }
            continue;
        }

        if line.is_empty() && pending_files.is_empty() {
            continue;
        }

        let cancel = interrupts.begin();
        let result = run_request(session, line, std::mem::take(&mut pending_files), task, &cancel).await;
        interrupts.finish();
        if let Err(e) = result {
            debug!("Request failed: {}", e);
        }
        task = Task::None;
    }

    listener.abort();
    Ok(())
}

fn print_prompt(task: Task, file_count: usize) {
    use std::io::Write;

    let mut tags = Vec::new();
    if task != Task::None {
        tags.push(task.as_str().to_uppercase());
    }
    if file_count > 0 {
        tags.push(format!("{} file(s)", file_count));
    }
    if tags.is_empty() {
        print!("> ");
    } else {
        print!("[{}] > ", tags.join(", "));
    }
    let _ = std::io::stdout().flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_without_key() -> ChatSession {
        let config = InferenceConfig::new("http://127.0.0.1:9".into(), None, ModelMap::new("org/main"));
        let transport = HttpTransport::new(Some(Duration::from_secs(1))).unwrap();
        ChatSession::new(InferencePipeline::new(
            Arc::new(ConfigStore::new(config)),
            Arc::new(transport),
        ))
    }

    #[tokio::test]
    async fn one_shot_failure_is_an_error() {
        let session = session_without_key();
        let err = run_once(&session, "hello", vec![], Task::None).await.unwrap_err();
        let rendered = format!("{:#}", err);
        assert!(rendered.contains("Failed to process message"), "{rendered}");
        assert!(rendered.contains("API key not configured"), "{rendered}");
    }

    #[tokio::test]
    async fn one_shot_empty_request_is_an_error() {
        let session = session_without_key();
        assert!(run_once(&session, "  ", vec![], Task::None).await.is_err());
    }

    #[tokio::test]
    async fn run_request_returns_pipeline_error() {
        let session = session_without_key();
        let result = run_request(&session, "hello", vec![], Task::Review, &CancellationToken::new()).await;
        assert!(matches!(
            result,
            Err(SessionError::Pipeline(docsense::PipelineError::Configuration))
        ));
    }

    #[tokio::test]
    async fn interrupt_cancels_request_in_flight() {
        let interrupts = Interrupts::default();
        let cancel = interrupts.begin();

        assert!(interrupts.interrupt());
        assert!(cancel.is_cancelled());

        // The chat keeps running: no quit signal is pending.
        let quit = tokio::time::timeout(Duration::from_millis(20), interrupts.quit.notified()).await;
        assert!(quit.is_err());
    }

    #[tokio::test]
    async fn interrupt_when_idle_ends_chat() {
        let interrupts = Interrupts::default();
        let cancel = interrupts.begin();
        interrupts.finish();

        assert!(!interrupts.interrupt());
        assert!(!cancel.is_cancelled());
        tokio::time::timeout(Duration::from_millis(100), interrupts.quit.notified())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn repeated_interrupts_keep_working() {
        let interrupts = Interrupts::default();
        for _ in 0..3 {
            let cancel = interrupts.begin();
            assert!(interrupts.interrupt());
            assert!(cancel.is_cancelled());
            interrupts.finish();
        }
        assert!(!interrupts.interrupt());
    }
}
