//! Bounded queue manager for in-flight LLM calls.
//!
//! All LLM work is routed through a queue that caps concurrent
//! in-flight futures at a configurable limit, with fifo/priority
//! scheduling, per-task lifecycle tracking, and aggregate statistics.
//! Tasks follow `pending -> running -> {completed | failed}`; a task
//! never moves from pending to failed without running, and one task's
//! failure never cancels or blocks another.
//!
//! The manager never retries: retry policy belongs to the transport
//! layer underneath the provider.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, Notify};

use crate::errors::LlmError;

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// Boxed future produced by a queue task.
pub type TaskFuture<T> = Pin<Box<dyn Future<Output = Result<T, LlmError>> + Send>>;

type TaskFactory<T> = Box<dyn FnOnce() -> TaskFuture<T> + Send>;

/// A unit of LLM work: an id, an optional priority, and the future to
/// run. The future is not constructed until the task is dispatched.
pub struct QueueTask<T> {
    id: String,
    priority: Option<i32>,
    factory: TaskFactory<T>,
}

impl<T> QueueTask<T> {
    pub fn new<F, Fut>(id: impl Into<String>, f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, LlmError>> + Send + 'static,
    {
        Self {
            id: id.into(),
            priority: None,
            factory: Box::new(move || Box::pin(f())),
        }
    }

    /// Numeric priority; higher dispatches first under the `priority`
    /// strategy.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }
}

/// Dispatch order for pending tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulingStrategy {
    /// Submission order.
    Fifo,
    /// Highest numeric priority first; stable among equals.
    Priority,
    /// Reserved for heterogeneous-task balancing; dispatches fifo.
    Balanced,
}

impl Default for SchedulingStrategy {
    fn default() -> Self {
        Self::Fifo
    }
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Point-in-time queue statistics; computable at any time without
/// blocking. Completed/failed counts are cumulative and monotonic.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub max_concurrency: usize,
    /// `running / max_concurrency`, 0 when the queue is paused.
    pub utilization: f64,
    pub elapsed_ms: u64,
}

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

struct PendingTask<T> {
    id: String,
    priority: i32,
    seq: u64,
    factory: TaskFactory<T>,
    tx: oneshot::Sender<Result<T, LlmError>>,
}

struct QueueState<T> {
    pending: Vec<PendingTask<T>>,
    running: HashSet<String>,
    completed: HashSet<String>,
    failed: HashMap<String, String>,
    max_concurrency: usize,
    strategy: SchedulingStrategy,
    next_seq: u64,
    total_enqueued: u64,
}

impl<T> QueueState<T> {
    /// Index of the next task to dispatch, per strategy. Stable among
    /// equal priorities: the earliest submission wins because only a
    /// strictly higher priority displaces the current pick.
    fn next_index(&self) -> Option<usize> {
        if self.pending.is_empty() {
            return None;
        }
        match self.strategy {
            SchedulingStrategy::Fifo | SchedulingStrategy::Balanced => Some(0),
            SchedulingStrategy::Priority => {
                let mut best = 0;
                for (i, task) in self.pending.iter().enumerate().skip(1) {
                    if task.priority > self.pending[best].priority {
                        best = i;
                    }
                }
                Some(best)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Queue manager
// ---------------------------------------------------------------------------

/// Bounded scheduler for LLM task futures.
///
/// Cloning is cheap and shares the underlying queue.
pub struct LlmQueueManager<T> {
    state: Arc<Mutex<QueueState<T>>>,
    notify: Arc<Notify>,
    started_at: Instant,
}

impl<T> Clone for LlmQueueManager<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            notify: Arc::clone(&self.notify),
            started_at: self.started_at,
        }
    }
}

impl<T> std::fmt::Debug for LlmQueueManager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("LlmQueueManager")
            .field("pending", &state.pending.len())
            .field("running", &state.running.len())
            .field("completed", &state.completed.len())
            .field("failed", &state.failed.len())
            .field("max_concurrency", &state.max_concurrency)
            .finish()
    }
}

impl<T: Send + 'static> LlmQueueManager<T> {
    /// Create a manager. `max_concurrency` of 0 pauses dispatch until
    /// raised with [`set_concurrency`](Self::set_concurrency).
    pub fn new(max_concurrency: usize, strategy: SchedulingStrategy) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState {
                pending: Vec::new(),
                running: HashSet::new(),
                completed: HashSet::new(),
                failed: HashMap::new(),
                max_concurrency,
                strategy,
                next_seq: 0,
                total_enqueued: 0,
            })),
            notify: Arc::new(Notify::new()),
            started_at: Instant::now(),
        }
    }

    /// Append a task and immediately attempt to drain the queue.
    /// The returned handle resolves when the task eventually runs.
    pub fn enqueue(&self, task: QueueTask<T>) -> QueueHandle<T> {
        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.state.lock();
            let seq = state.next_seq;
            state.next_seq += 1;
            state.total_enqueued += 1;
            state.pending.push(PendingTask {
                id: task.id,
                priority: task.priority.unwrap_or(0),
                seq,
                factory: task.factory,
                tx,
            });
        }
        self.dispatch();
        QueueHandle { rx }
    }

    /// Start pending tasks while capacity allows. The lock is held only
    /// while picking a task; the spawned future runs outside it.
    fn dispatch(&self) {
        loop {
            let task = {
                let mut state = self.state.lock();
                if state.running.len() >= state.max_concurrency {
                    break;
                }
                match state.next_index() {
                    Some(index) => {
                        let task = state.pending.remove(index);
                        state.running.insert(task.id.clone());
                        task
                    }
                    None => break,
                }
            };

            let manager = self.clone();
            let PendingTask {
                id, factory, tx, seq, ..
            } = task;
            log::debug!("dispatching LLM task '{}' (seq {})", id, seq);

            tokio::spawn(async move {
                let future = factory();
                let result = future.await;
                {
                    let mut state = manager.state.lock();
                    state.running.remove(&id);
                    match &result {
                        Ok(_) => {
                            state.completed.insert(id.clone());
                        }
                        Err(e) => {
                            log::warn!("LLM task '{}' failed: {}", id, e);
                            state.failed.insert(id.clone(), e.to_string());
                        }
                    }
                }
                // Receiver may have been dropped; the bookkeeping above
                // already recorded the outcome.
                let _ = tx.send(result);
                manager.notify.notify_waiters();
                manager.dispatch();
            });
        }
    }

    /// Change the concurrency cap at runtime. A reduction never cancels
    /// in-flight tasks; an increase triggers an immediate drain pass.
    pub fn set_concurrency(&self, max_concurrency: usize) {
        {
            let mut state = self.state.lock();
            state.max_concurrency = max_concurrency;
        }
        self.dispatch();
    }

    /// Wait until both the pending list and the running set are empty.
    pub async fn drain(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let state = self.state.lock();
                if state.pending.is_empty() && state.running.is_empty() {
                    return;
                }
            }
            notified.await;
        }
    }

    /// Current statistics; non-blocking.
    pub fn stats(&self) -> QueueStats {
        let state = self.state.lock();
        let utilization = if state.max_concurrency == 0 {
            0.0
        } else {
            state.running.len() as f64 / state.max_concurrency as f64
        };
        QueueStats {
            pending: state.pending.len(),
            running: state.running.len(),
            completed: state.completed.len(),
            failed: state.failed.len(),
            max_concurrency: state.max_concurrency,
            utilization,
            elapsed_ms: self.started_at.elapsed().as_millis() as u64,
        }
    }

    /// Whether the task ran to successful completion.
    pub fn is_completed(&self, id: &str) -> bool {
        self.state.lock().completed.contains(id)
    }

    /// The recorded error for a task that ran and failed. `None` means
    /// the task either never ran or succeeded.
    pub fn failure(&self, id: &str) -> Option<String> {
        self.state.lock().failed.get(id).cloned()
    }

    /// Total tasks ever enqueued.
    pub fn total_enqueued(&self) -> u64 {
        self.state.lock().total_enqueued
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Awaitable result of an enqueued task.
pub struct QueueHandle<T> {
    rx: oneshot::Receiver<Result<T, LlmError>>,
}

impl<T> Future for QueueHandle<T> {
    type Output = Result<T, LlmError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.get_mut().rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(LlmError::Dropped)),
            Poll::Pending => Poll::Pending,
        }
    }
}
