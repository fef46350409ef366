//! Background work scheduling.
//!
//! Catalog fetches run one at a time on a dedicated worker so a slow login can
//! never overwrite a newer one. EPG, image and detail fetches go to a small
//! auxiliary pool. Every task is stamped with the session generation current at
//! submit time; `poll` drops events from older generations.

use log::{debug, error, warn};
use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;

pub const MAX_AUX_WORKERS: usize = 10;

pub type Generation = u64;
pub type TaskId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Catalog,
    Epg,
    SeriesInfo,
    VodInfo,
    Image,
}

impl TaskKind {
    /// Catalog work is strictly serial; the rest may overlap
    fn is_serial(&self) -> bool {
        matches!(self, TaskKind::Catalog)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskPayload<T> {
    Progress { percent: u8, label: String },
    Completed(T),
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskEvent<T> {
    pub generation: Generation,
    pub task_id: TaskId,
    pub kind: TaskKind,
    pub payload: TaskPayload<T>,
}

impl<T> TaskEvent<T> {
    /// Completed or Error
    pub fn is_final(&self) -> bool {
        !matches!(self.payload, TaskPayload::Progress { .. })
    }
}

/// Handed to a running job for progress reports. Percent never goes backwards.
pub struct ProgressReporter<T> {
    sender: Sender<TaskEvent<T>>,
    generation: Generation,
    task_id: TaskId,
    kind: TaskKind,
    last_percent: u8,
}

impl<T> ProgressReporter<T> {
    pub fn report(&mut self, percent: u8, label: &str) {
        let percent = percent.min(100).max(self.last_percent);
        self.last_percent = percent;
        self.send(TaskPayload::Progress { percent, label: label.to_string() });
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    fn send(&self, payload: TaskPayload<T>) {
        // The coordinator may already be gone during shutdown
        let _ = self.sender.send(TaskEvent {
            generation: self.generation,
            task_id: self.task_id,
            kind: self.kind,
            payload,
        });
    }
}

type Job<T> = Box<dyn FnOnce(&mut ProgressReporter<T>) -> Result<T, String> + Send>;

struct QueuedTask<T> {
    generation: Generation,
    task_id: TaskId,
    kind: TaskKind,
    job: Job<T>,
}

/// Runs queued tasks until the queue is closed
fn worker_loop<T: Send + 'static>(
    name: String,
    queue: Arc<Mutex<Receiver<QueuedTask<T>>>>,
    events: Sender<TaskEvent<T>>,
    current: Arc<AtomicU64>,
) {
    loop {
        let next = match queue.lock() {
            Ok(receiver) => receiver.recv(),
            Err(_) => break,
        };
        let Ok(task) = next else { break };

        if task.generation < current.load(Ordering::SeqCst) {
            debug!("{}: skipping {:?} task {} from an old session", name, task.kind, task.task_id);
            continue;
        }

        let mut reporter = ProgressReporter {
            sender: events.clone(),
            generation: task.generation,
            task_id: task.task_id,
            kind: task.kind,
            last_percent: 0,
        };
        let job = task.job;
        let payload = match catch_unwind(AssertUnwindSafe(|| job(&mut reporter))) {
            Ok(Ok(value)) => TaskPayload::Completed(value),
            Ok(Err(message)) => TaskPayload::Error(message),
            Err(_) => {
                error!("{}: {:?} task {} panicked", name, task.kind, task.task_id);
                TaskPayload::Error(format!("{:?} task failed unexpectedly", task.kind))
            }
        };
        reporter.send(payload);
    }
    debug!("{} stopped", name);
}

fn spawn_worker<T: Send + 'static>(
    name: String,
    queue: Arc<Mutex<Receiver<QueuedTask<T>>>>,
    events: Sender<TaskEvent<T>>,
    current: Arc<AtomicU64>,
) {
    let builder = thread::Builder::new().name(name.clone());
    if let Err(e) = builder.spawn(move || worker_loop(name, queue, events, current)) {
        error!("Failed to spawn worker thread: {}", e);
    }
}

pub struct TaskCoordinator<T> {
    generation: Arc<AtomicU64>,
    next_task_id: TaskId,
    catalog_queue: Sender<QueuedTask<T>>,
    aux_queue: Sender<QueuedTask<T>>,
    event_sender: Sender<TaskEvent<T>>,
    events: Receiver<TaskEvent<T>>,
    outstanding: HashSet<TaskId>,
}

impl<T: Send + 'static> TaskCoordinator<T> {
    /// One catalog worker plus `aux_workers` (1..=10) helpers
    pub fn new(aux_workers: usize) -> Self {
        let generation = Arc::new(AtomicU64::new(0));
        let (event_sender, events) = channel();

        let (catalog_queue, catalog_rx) = channel();
        spawn_worker(
            "catalog-worker".to_string(),
            Arc::new(Mutex::new(catalog_rx)),
            event_sender.clone(),
            Arc::clone(&generation),
        );

        let (aux_queue, aux_rx) = channel();
        let aux_rx = Arc::new(Mutex::new(aux_rx));
        for i in 0..aux_workers.clamp(1, MAX_AUX_WORKERS) {
            spawn_worker(
                format!("aux-worker-{}", i),
                Arc::clone(&aux_rx),
                event_sender.clone(),
                Arc::clone(&generation),
            );
        }

        Self {
            generation,
            next_task_id: 1,
            catalog_queue,
            aux_queue,
            event_sender,
            events,
            outstanding: HashSet::new(),
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation.load(Ordering::SeqCst)
    }

    /// Start a new session. Everything submitted before is superseded:
    /// queued tasks are skipped and late results are dropped by `poll`.
    pub fn begin_session(&mut self) -> Generation {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.outstanding.clear();
        debug!("Session generation is now {}", generation);
        generation
    }

    pub fn submit<F>(&mut self, kind: TaskKind, job: F) -> TaskId
    where
        F: FnOnce(&mut ProgressReporter<T>) -> Result<T, String> + Send + 'static,
    {
        let task_id = self.next_task_id;
        self.next_task_id += 1;

        let task = QueuedTask {
            generation: self.generation(),
            task_id,
            kind,
            job: Box::new(job),
        };
        let queue = if kind.is_serial() { &self.catalog_queue } else { &self.aux_queue };
        if queue.send(task).is_err() {
            warn!("No worker available for {:?} task {}", kind, task_id);
            let _ = self.event_sender.send(TaskEvent {
                generation: self.generation(),
                task_id,
                kind,
                payload: TaskPayload::Error("Background worker unavailable".to_string()),
            });
        }
        self.outstanding.insert(task_id);
        task_id
    }

    /// Drain pending events without blocking. Events from older sessions are dropped.
    pub fn poll(&mut self) -> Vec<TaskEvent<T>> {
        let current = self.generation();
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            if event.generation < current {
                if event.is_final() {
                    debug!("Discarding stale {:?} result (generation {} < {})", event.kind, event.generation, current);
                }
                continue;
            }
            if event.is_final() {
                self.outstanding.remove(&event.task_id);
            }
            out.push(event);
        }
        out
    }

    /// True while a task of the current session has not reported its result
    pub fn is_busy(&self) -> bool {
        !self.outstanding.is_empty()
    }
}
