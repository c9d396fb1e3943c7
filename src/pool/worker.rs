use crate::classifier::{Classification, Classifier};
use crate::error::ScanError;
use crate::tokenizer::Tokenizer;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Tokenize,
    Classify,
}

impl TaskKind {
    pub const ALL: [TaskKind; 2] = [TaskKind::Tokenize, TaskKind::Classify];
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Tokenize => write!(f, "tokenize"),
            TaskKind::Classify => write!(f, "classify"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskPayload {
    Tokenize {
        text: String,
        locale: Option<String>,
        is_markup: bool,
    },
    Classify {
        tokens: Vec<String>,
        return_probabilities: bool,
    },
}

impl TaskPayload {
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskPayload::Tokenize { .. } => TaskKind::Tokenize,
            TaskPayload::Classify { .. } => TaskKind::Classify,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutput {
    Tokens(Vec<String>),
    Classification(Classification),
}

/// Work done inside a single worker thread. Each worker owns its handler.
pub trait TaskHandler: Send {
    fn handle(&mut self, payload: TaskPayload) -> Result<TaskOutput, ScanError>;
}

impl TaskHandler for Tokenizer {
    fn handle(&mut self, payload: TaskPayload) -> Result<TaskOutput, ScanError> {
        match payload {
            TaskPayload::Tokenize {
                text,
                locale,
                is_markup,
            } => Ok(TaskOutput::Tokens(self.tokenize(
                &text,
                locale.as_deref(),
                is_markup,
            ))),
            other => Err(ScanError::Worker(format!(
                "tokenize worker cannot run a {} task",
                other.kind()
            ))),
        }
    }
}

impl TaskHandler for Classifier {
    fn handle(&mut self, payload: TaskPayload) -> Result<TaskOutput, ScanError> {
        match payload {
            TaskPayload::Classify {
                tokens,
                return_probabilities,
            } => self
                .categorize(&tokens, return_probabilities)
                .map(TaskOutput::Classification),
            other => Err(ScanError::Worker(format!(
                "classify worker cannot run a {} task",
                other.kind()
            ))),
        }
    }
}

pub(crate) struct Job {
    pub task_id: u64,
    pub payload: TaskPayload,
}

pub(crate) enum WorkerEvent {
    Finished {
        worker_id: u64,
        task_id: u64,
        result: Result<TaskOutput, ScanError>,
    },
    Crashed {
        worker_id: u64,
        task_id: u64,
        reason: String,
    },
}

/// Supervisor-side end of a worker thread. Dropping it stops the thread once
/// its current job is done.
pub(crate) struct WorkerHandle {
    pub id: u64,
    pub kind: TaskKind,
    jobs: mpsc::Sender<Job>,
}

impl WorkerHandle {
    /// Hands the job to the worker, giving it back if the thread is gone.
    pub fn dispatch(&self, job: Job) -> Result<(), Job> {
        self.jobs.send(job).map_err(|e| e.0)
    }
}

pub(crate) fn spawn_worker(
    id: u64,
    kind: TaskKind,
    mut handler: Box<dyn TaskHandler>,
    events: UnboundedSender<WorkerEvent>,
) -> std::io::Result<WorkerHandle> {
    let (jobs_tx, jobs_rx) = mpsc::channel::<Job>();

    thread::Builder::new()
        .name(format!("{kind}-worker-{id}"))
        .spawn(move || {
            while let Ok(job) = jobs_rx.recv() {
                let task_id = job.task_id;
                let payload = job.payload;
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler.handle(payload)));

                let (event, crashed) = match outcome {
                    Ok(result) => (
                        WorkerEvent::Finished {
                            worker_id: id,
                            task_id,
                            result,
                        },
                        false,
                    ),
                    Err(panic) => (
                        WorkerEvent::Crashed {
                            worker_id: id,
                            task_id,
                            reason: panic_message(panic.as_ref()),
                        },
                        true,
                    ),
                };

                if events.send(event).is_err() || crashed {
                    break;
                }
            }
            log::debug!("{kind} worker {id} exiting");
        })?;

    Ok(WorkerHandle {
        id,
        kind,
        jobs: jobs_tx,
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}
