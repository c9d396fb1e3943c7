mod worker;

pub use worker::{TaskHandler, TaskKind, TaskOutput, TaskPayload};

use crate::classifier::{Classification, Classifier};
use crate::config::Config;
use crate::error::ScanError;
use crate::tokenizer::Tokenizer;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use worker::{spawn_worker, Job, WorkerEvent, WorkerHandle};

/// Builds the handler a new worker of the given kind will own.
pub type HandlerFactory = Arc<dyn Fn(TaskKind) -> Box<dyn TaskHandler> + Send + Sync>;

type Reply = oneshot::Sender<Result<TaskOutput, ScanError>>;

enum Command {
    Submit {
        kind: TaskKind,
        payload: TaskPayload,
        reply: Reply,
    },
    Size {
        reply: oneshot::Sender<usize>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

struct QueuedTask {
    task_id: u64,
    kind: TaskKind,
    payload: TaskPayload,
    reply: Reply,
}

/// Fixed-size pool of tokenize and classify worker threads.
///
/// Every worker owns its own tokenizer or classifier; payloads and results
/// are moved over channels. A supervisor task owns the queue and all worker
/// bookkeeping, so the handle is cheap to clone.
#[derive(Clone)]
pub struct WorkerPool {
    commands: mpsc::UnboundedSender<Command>,
    num_threads: usize,
}

impl WorkerPool {
    /// Pool whose workers run copies of the given tokenizer and classifier.
    /// Must be called from within a tokio runtime.
    pub fn new(
        config: &Config,
        tokenizer: Tokenizer,
        classifier: Classifier,
    ) -> Result<Self, ScanError> {
        let factory: HandlerFactory = Arc::new(move |kind| -> Box<dyn TaskHandler> {
            match kind {
                TaskKind::Tokenize => Box::new(tokenizer.clone()),
                TaskKind::Classify => Box::new(classifier.clone()),
            }
        });
        Self::with_handlers(config.num_threads, factory)
    }

    pub fn with_handlers(num_threads: usize, factory: HandlerFactory) -> Result<Self, ScanError> {
        if num_threads == 0 {
            return Err(ScanError::Configuration(
                "num_threads must be a positive integer".to_string(),
            ));
        }

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let mut supervisor = Supervisor {
            num_threads,
            factory,
            events: events_tx,
            idle: HashMap::new(),
            busy: HashMap::new(),
            pending: HashMap::new(),
            queue: VecDeque::new(),
            next_worker_id: 0,
            next_task_id: 0,
        };
        for kind in TaskKind::ALL {
            for _ in 0..num_threads {
                let handle = supervisor.spawn(kind)?;
                supervisor.idle.entry(kind).or_default().push(handle);
            }
        }

        log::info!(
            "Worker pool started with {num_threads} tokenize and {num_threads} classify workers"
        );
        tokio::spawn(supervisor.run(commands_rx, events_rx));

        Ok(Self {
            commands: commands_tx,
            num_threads,
        })
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Run a task on a worker of the given kind, waiting in the queue while
    /// the pool is saturated.
    pub async fn submit(&self, kind: TaskKind, payload: TaskPayload) -> Result<TaskOutput, ScanError> {
        if payload.kind() != kind {
            return Err(ScanError::Worker(format!(
                "{} payload submitted as a {kind} task",
                payload.kind()
            )));
        }

        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Submit {
                kind,
                payload,
                reply,
            })
            .map_err(|_| ScanError::PoolClosed)?;
        response.await.map_err(|_| ScanError::PoolClosed)?
    }

    pub async fn tokenize(
        &self,
        text: String,
        locale: Option<String>,
        is_markup: bool,
    ) -> Result<Vec<String>, ScanError> {
        let payload = TaskPayload::Tokenize {
            text,
            locale,
            is_markup,
        };
        match self.submit(TaskKind::Tokenize, payload).await? {
            TaskOutput::Tokens(tokens) => Ok(tokens),
            other => Err(unexpected_output(TaskKind::Tokenize, &other)),
        }
    }

    pub async fn categorize(
        &self,
        tokens: Vec<String>,
        return_probabilities: bool,
    ) -> Result<Classification, ScanError> {
        let payload = TaskPayload::Classify {
            tokens,
            return_probabilities,
        };
        match self.submit(TaskKind::Classify, payload).await? {
            TaskOutput::Classification(classification) => Ok(classification),
            other => Err(unexpected_output(TaskKind::Classify, &other)),
        }
    }

    /// Number of live workers across both kinds.
    pub async fn size(&self) -> Result<usize, ScanError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Size { reply })
            .map_err(|_| ScanError::PoolClosed)?;
        response.await.map_err(|_| ScanError::PoolClosed)
    }

    /// Reject everything queued or running and stop the workers. Safe to call
    /// more than once.
    pub async fn close(&self) {
        let (reply, response) = oneshot::channel();
        if self.commands.send(Command::Close { reply }).is_ok() {
            let _ = response.await;
        }
    }
}

fn unexpected_output(kind: TaskKind, output: &TaskOutput) -> ScanError {
    ScanError::Worker(format!("{kind} task returned {output:?}"))
}

struct Supervisor {
    num_threads: usize,
    factory: HandlerFactory,
    events: mpsc::UnboundedSender<WorkerEvent>,
    idle: HashMap<TaskKind, Vec<WorkerHandle>>,
    busy: HashMap<u64, WorkerHandle>,
    pending: HashMap<u64, Reply>,
    queue: VecDeque<QueuedTask>,
    next_worker_id: u64,
    next_task_id: u64,
}

impl Supervisor {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<WorkerEvent>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Submit { kind, payload, reply }) => {
                        let task_id = self.next_task_id;
                        self.next_task_id += 1;
                        self.queue.push_back(QueuedTask {
                            task_id,
                            kind,
                            payload,
                            reply,
                        });
                        self.drain();
                    }
                    Some(Command::Size { reply }) => {
                        let _ = reply.send(self.size());
                    }
                    Some(Command::Close { reply }) => {
                        self.shutdown();
                        let _ = reply.send(());
                        break;
                    }
                    None => {
                        self.shutdown();
                        break;
                    }
                },
                Some(event) = events.recv() => {
                    self.handle_event(event);
                    self.drain();
                }
            }
        }
        log::debug!("Worker pool supervisor stopped");
    }

    fn size(&self) -> usize {
        self.idle.values().map(Vec::len).sum::<usize>() + self.busy.len()
    }

    fn spawn(&mut self, kind: TaskKind) -> Result<WorkerHandle, ScanError> {
        let id = self.next_worker_id;
        self.next_worker_id += 1;
        let handler = (self.factory)(kind);
        Ok(spawn_worker(id, kind, handler, self.events.clone())?)
    }

    /// Dispatch queued tasks in FIFO order while the in-flight cap allows.
    fn drain(&mut self) {
        while self.busy.len() < self.num_threads {
            let Some(task) = self.queue.pop_front() else {
                break;
            };
            self.dispatch(task);
        }
    }

    fn dispatch(&mut self, task: QueuedTask) {
        let worker = match self.idle.get_mut(&task.kind).and_then(Vec::pop) {
            Some(worker) => worker,
            None => match self.spawn(task.kind) {
                Ok(worker) => worker,
                Err(e) => {
                    log::error!("No {} worker available: {e}", task.kind);
                    let _ = task.reply.send(Err(ScanError::Worker(e.to_string())));
                    return;
                }
            },
        };

        let job = Job {
            task_id: task.task_id,
            payload: task.payload,
        };
        match worker.dispatch(job) {
            Ok(()) => {
                self.pending.insert(task.task_id, task.reply);
                self.busy.insert(worker.id, worker);
            }
            Err(_) => {
                log::error!("{} worker {} is gone", worker.kind, worker.id);
                let _ = task
                    .reply
                    .send(Err(ScanError::Worker(format!("{} worker exited", worker.kind))));
                self.replace(worker.kind);
            }
        }
    }

    fn handle_event(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Finished {
                worker_id,
                task_id,
                result,
            } => {
                if let Some(worker) = self.busy.remove(&worker_id) {
                    self.idle.entry(worker.kind).or_default().push(worker);
                }
                if let Some(reply) = self.pending.remove(&task_id) {
                    let _ = reply.send(result);
                }
            }
            WorkerEvent::Crashed {
                worker_id,
                task_id,
                reason,
            } => {
                log::error!("Worker {worker_id} crashed running task {task_id}: {reason}");
                if let Some(reply) = self.pending.remove(&task_id) {
                    let _ = reply.send(Err(ScanError::Worker(reason)));
                }
                if let Some(worker) = self.busy.remove(&worker_id) {
                    self.replace(worker.kind);
                }
            }
        }
    }

    fn replace(&mut self, kind: TaskKind) {
        match self.spawn(kind) {
            Ok(worker) => {
                log::warn!("Spawned replacement {kind} worker {}", worker.id);
                self.idle.entry(kind).or_default().push(worker);
            }
            Err(e) => log::error!("Could not replace {kind} worker: {e}"),
        }
    }

    fn shutdown(&mut self) {
        for task in self.queue.drain(..) {
            let _ = task.reply.send(Err(ScanError::PoolClosed));
        }
        for (_, reply) in self.pending.drain() {
            let _ = reply.send(Err(ScanError::PoolClosed));
        }
        self.idle.clear();
        self.busy.clear();
        log::info!("Worker pool closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Echoes tokenize input back as a single token; panics on "boom".
    struct EchoHandler {
        active: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
        delay: Duration,
    }

    impl TaskHandler for EchoHandler {
        fn handle(&mut self, payload: TaskPayload) -> Result<TaskOutput, ScanError> {
            let running = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(running, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.active.fetch_sub(1, Ordering::SeqCst);

            match payload {
                TaskPayload::Tokenize { text, .. } => {
                    if text == "boom" {
                        panic!("handler exploded");
                    }
                    Ok(TaskOutput::Tokens(vec![text]))
                }
                TaskPayload::Classify { tokens, .. } => {
                    Ok(TaskOutput::Classification(Classification {
                        category: tokens.join(" "),
                        probabilities: None,
                    }))
                }
            }
        }
    }

    fn echo_pool(num_threads: usize, delay: Duration) -> (WorkerPool, Arc<AtomicUsize>) {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let factory_peak = peak.clone();
        let factory: HandlerFactory = Arc::new(move |_| -> Box<dyn TaskHandler> {
            Box::new(EchoHandler {
                active: active.clone(),
                peak: factory_peak.clone(),
                delay,
            })
        });
        (WorkerPool::with_handlers(num_threads, factory).unwrap(), peak)
    }

    #[tokio::test]
    async fn test_zero_threads_rejected() {
        let factory: HandlerFactory = Arc::new(|_| -> Box<dyn TaskHandler> {
            Box::new(Classifier::new(10, "ham"))
        });
        assert!(matches!(
            WorkerPool::with_handlers(0, factory),
            Err(ScanError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_excess_tasks_queue_and_resolve_once() {
        let (pool, peak) = echo_pool(2, Duration::from_millis(20));
        assert_eq!(pool.size().await.unwrap(), 4);

        let mut handles = Vec::new();
        for i in 0..8 {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    pool.tokenize(format!("task{i}"), None, false)
                        .await
                        .map(|tokens| tokens.join(" "))
                } else {
                    pool.categorize(vec![format!("task{i}")], false)
                        .await
                        .map(|c| c.category)
                }
            }));
        }

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap().unwrap());
        }
        let expected: Vec<String> = (0..8).map(|i| format!("task{i}")).collect();
        assert_eq!(results, expected);
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(pool.size().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_crash_rejects_only_that_task() {
        let (pool, _) = echo_pool(1, Duration::from_millis(0));

        let crashed = pool.tokenize("boom".to_string(), None, false).await;
        match crashed {
            Err(ScanError::Worker(reason)) => assert_eq!(reason, "handler exploded"),
            other => panic!("expected worker error, got {other:?}"),
        }

        assert_eq!(pool.size().await.unwrap(), 2);
        let tokens = pool.tokenize("fine".to_string(), None, false).await.unwrap();
        assert_eq!(tokens, vec!["fine"]);
    }

    #[tokio::test]
    async fn test_concurrent_crashes_reject_only_crashing_tasks() {
        let (pool, peak) = echo_pool(2, Duration::from_millis(10));
        let inputs = ["a", "boom", "b", "c", "boom", "d"];

        let handles: Vec<_> = inputs
            .iter()
            .map(|input| {
                let pool = pool.clone();
                let input = input.to_string();
                tokio::spawn(async move { pool.tokenize(input, None, false).await })
            })
            .collect();

        let mut outcomes = Vec::new();
        for handle in handles {
            outcomes.push(match handle.await.unwrap() {
                Ok(tokens) => tokens.join(" "),
                Err(ScanError::Worker(reason)) => format!("Err({reason})"),
                Err(other) => panic!("unexpected error {other:?}"),
            });
        }

        assert_eq!(
            outcomes,
            vec![
                "a",
                "Err(handler exploded)",
                "b",
                "c",
                "Err(handler exploded)",
                "d"
            ]
        );
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(pool.size().await.unwrap(), 4);

        let tokens = pool.tokenize("after".to_string(), None, false).await.unwrap();
        assert_eq!(tokens, vec!["after"]);
    }

    #[tokio::test]
    async fn test_mismatched_payload() {
        let (pool, _) = echo_pool(1, Duration::from_millis(0));
        let result = pool
            .submit(
                TaskKind::Classify,
                TaskPayload::Tokenize {
                    text: "x".to_string(),
                    locale: None,
                    is_markup: false,
                },
            )
            .await;
        assert!(matches!(result, Err(ScanError::Worker(_))));
    }

    #[tokio::test]
    async fn test_close_rejects_pending_and_later_tasks() {
        let (pool, _) = echo_pool(1, Duration::from_millis(200));

        let running = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.tokenize("slow".to_string(), None, false).await })
        };
        let queued = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.tokenize("queued".to_string(), None, false).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        pool.close().await;
        assert!(matches!(running.await.unwrap(), Err(ScanError::PoolClosed)));
        assert!(matches!(queued.await.unwrap(), Err(ScanError::PoolClosed)));
        assert!(matches!(
            pool.tokenize("late".to_string(), None, false).await,
            Err(ScanError::PoolClosed)
        ));
        assert!(matches!(pool.size().await, Err(ScanError::PoolClosed)));
        pool.close().await;
    }

    #[tokio::test]
    async fn test_pool_with_real_handlers() {
        let mut config = Config::default();
        config.num_threads = 2;
        let tokenizer = Tokenizer::new(&config).unwrap();
        let mut classifier = Classifier::new(config.vocabulary_limit, "ham");
        classifier.learn(&tokenizer.tokenize("hello world", None, false), "ham");
        classifier.learn(&tokenizer.tokenize("buy cheap pills now", None, false), "spam");

        let pool = WorkerPool::new(&config, tokenizer, classifier).unwrap();
        let tokens = pool
            .tokenize("Hello world".to_string(), None, false)
            .await
            .unwrap();
        assert_eq!(tokens, vec!["hello", "world"]);

        let classification = pool.categorize(tokens, true).await.unwrap();
        assert_eq!(classification.category, "ham");
        assert!(classification.probability_of("ham").unwrap() > 0.5);
        pool.close().await;
    }
}
