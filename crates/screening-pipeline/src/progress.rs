//! Ordered progress conduit between a pipeline run and the caller stream.
//!
//! The producer never blocks: when the buffer is full the message is
//! dropped, counted and logged at `warn`. Screenshots are the only large
//! payloads and the first to be lost under pressure.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

use crate::metrics;

pub const SCREENSHOT_MARKER: &str = "[SCREENSHOT]";
pub const FINAL_REPORT_MARKER: &str = "[FINAL_REPORT]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressMessage {
    Notice(String),
    /// Base64 encoded PNG.
    Screenshot(String),
    FinalReport(String),
    Error(String),
}

impl ProgressMessage {
    /// Caller-facing line, markers included.
    pub fn to_line(&self) -> String {
        match self {
            Self::Notice(text) => text.clone(),
            Self::Screenshot(data) => format!("{SCREENSHOT_MARKER}{data}"),
            Self::FinalReport(report) => format!("{FINAL_REPORT_MARKER}{report}"),
            Self::Error(text) => format!("❌ Error: {text}"),
        }
    }

    pub fn final_report(&self) -> Option<&str> {
        match self {
            Self::FinalReport(report) => Some(report),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProgressSender {
    tx: mpsc::Sender<ProgressMessage>,
    dropped: Arc<AtomicU64>,
}

/// Creates a bounded progress channel. Capacity is clamped to at least 1.
pub fn progress_channel(capacity: usize) -> (ProgressSender, mpsc::Receiver<ProgressMessage>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        ProgressSender {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        },
        rx,
    )
}

impl ProgressSender {
    /// Queues a message without waiting. Returns false if it was dropped.
    pub fn send(&self, message: ProgressMessage) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(message)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                metrics::record_progress_dropped();
                warn!(
                    target: "pipeline",
                    dropped_total = total,
                    kind = message_kind(&message),
                    "progress channel full, message dropped"
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(target: "pipeline", "progress receiver gone");
                false
            }
        }
    }

    pub fn notice(&self, text: impl Into<String>) {
        let text = text.into();
        info!(target: "pipeline", "{text}");
        self.send(ProgressMessage::Notice(text));
    }

    pub fn screenshot(&self, png: &[u8]) {
        self.send(ProgressMessage::Screenshot(BASE64.encode(png)));
    }

    pub fn final_report(&self, report: impl Into<String>) {
        self.send(ProgressMessage::FinalReport(report.into()));
    }

    pub fn error(&self, text: impl Into<String>) {
        let text = text.into();
        warn!(target: "pipeline", "{text}");
        self.send(ProgressMessage::Error(text));
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

fn message_kind(message: &ProgressMessage) -> &'static str {
    match message {
        ProgressMessage::Notice(_) => "notice",
        ProgressMessage::Screenshot(_) => "screenshot",
        ProgressMessage::FinalReport(_) => "final_report",
        ProgressMessage::Error(_) => "error",
    }
}

enum TaskState<T> {
    Running(JoinHandle<T>),
    Done(Result<T, JoinError>),
}

enum Step<T> {
    Message(Option<ProgressMessage>),
    Finished(Result<T, JoinError>),
}

/// Drains a progress receiver while the producing task runs.
///
/// Queued messages always win over task completion, so messages come out
/// in production order and none queued before completion are lost.
pub struct ProgressDrain<T> {
    rx: mpsc::Receiver<ProgressMessage>,
    state: TaskState<T>,
    final_report: Option<String>,
}

impl<T> ProgressDrain<T> {
    pub fn new(rx: mpsc::Receiver<ProgressMessage>, task: JoinHandle<T>) -> Self {
        Self {
            rx,
            state: TaskState::Running(task),
            final_report: None,
        }
    }

    /// Next message, or `None` once the task finished and the queue is empty.
    pub async fn next_message(&mut self) -> Option<ProgressMessage> {
        loop {
            let message = match &mut self.state {
                TaskState::Running(task) => {
                    let step = tokio::select! {
                        biased;
                        message = self.rx.recv() => Step::Message(message),
                        outcome = &mut *task => Step::Finished(outcome),
                    };
                    match step {
                        Step::Message(Some(message)) => message,
                        Step::Message(None) => {
                            let outcome = task.await;
                            self.state = TaskState::Done(outcome);
                            return None;
                        }
                        Step::Finished(outcome) => {
                            self.state = TaskState::Done(outcome);
                            continue;
                        }
                    }
                }
                TaskState::Done(_) => self.rx.try_recv().ok()?,
            };
            if let Some(report) = message.final_report() {
                self.final_report = Some(report.to_string());
            }
            return Some(message);
        }
    }

    /// Last final report seen on the channel.
    pub fn final_report(&self) -> Option<&str> {
        self.final_report.as_deref()
    }

    /// Task outcome. Awaits the task if draining stopped early.
    pub async fn finish(self) -> Result<T, JoinError> {
        match self.state {
            TaskState::Running(task) => task.await,
            TaskState::Done(outcome) => outcome,
        }
    }
}
