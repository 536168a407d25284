use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::AbortHandle;
use tracing::{debug, warn};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Task status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

// ---------------------------------------------------------------------------
// BackgroundTask
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundTask {
    pub id: String,
    pub name: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl BackgroundTask {
    /// Creates a new task in the `Pending` state.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    /// Transition the task to `Running`.
    pub fn start(&mut self) {
        self.status = TaskStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Transition the task to `Completed`.
    pub fn complete(&mut self) {
        self.status = TaskStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Transition the task to `Failed` with an error message.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = TaskStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error = Some(error.into());
    }

    /// Transition the task to `Cancelled`.
    pub fn cancel(&mut self) {
        self.status = TaskStatus::Cancelled;
        self.completed_at = Some(Utc::now());
    }

    /// Returns `true` if the task has reached a terminal state.
    pub fn is_finished(&self) -> bool {
        matches!(
            self.status,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

// ---------------------------------------------------------------------------
// Outcomes and handles
// ---------------------------------------------------------------------------

/// Result of one background operation, delivered on the outcome channel.
#[derive(Debug)]
pub struct TaskOutcome<T, E> {
    pub task_id: String,
    pub name: String,
    pub result: Result<T, E>,
}

pub type OutcomeReceiver<T, E> = mpsc::UnboundedReceiver<TaskOutcome<T, E>>;

#[derive(Default)]
struct Registry {
    tasks: Vec<BackgroundTask>,
    handles: HashMap<String, AbortHandle>,
}

impl Registry {
    fn task_mut(&mut self, task_id: &str) -> Option<&mut BackgroundTask> {
        self.tasks.iter_mut().find(|t| t.id == task_id)
    }

    fn cancel(&mut self, task_id: &str) -> anyhow::Result<()> {
        let task = self
            .task_mut(task_id)
            .ok_or_else(|| anyhow::anyhow!("Task not found: {}", task_id))?;

        if task.is_finished() {
            anyhow::bail!("Task {} is already finished", task_id);
        }
        task.cancel();
        if let Some(handle) = self.handles.remove(task_id) {
            handle.abort();
        }
        Ok(())
    }
}

/// Handle to a submitted task.
#[derive(Clone)]
pub struct TaskHandle {
    id: String,
    registry: Arc<Mutex<Registry>>,
}

impl TaskHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Abort the task. A cancelled task never delivers an outcome.
    pub fn cancel(&self) -> anyhow::Result<()> {
        self.registry.lock().cancel(&self.id)
    }

    pub fn status(&self) -> Option<TaskStatus> {
        self.registry
            .lock()
            .tasks
            .iter()
            .find(|t| t.id == self.id)
            .map(|t| t.status)
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle").field("id", &self.id).finish()
    }
}

// ---------------------------------------------------------------------------
// BackgroundService
// ---------------------------------------------------------------------------

/// Runs operations off the caller's task and hands results back over a
/// channel.
///
/// Every submitted future becomes a tokio task tracked as a
/// [`BackgroundTask`]. At most `max_concurrent` run at once; the rest wait in
/// `Pending`. Results arrive on the [`OutcomeReceiver`] returned by
/// [`BackgroundService::new`]. After [`shutdown`](Self::shutdown) (or drop)
/// outstanding work is aborted and late results are discarded.
///
/// Must be used from within a tokio runtime.
pub struct BackgroundService<T, E> {
    registry: Arc<Mutex<Registry>>,
    permits: Arc<Semaphore>,
    outcomes: mpsc::UnboundedSender<TaskOutcome<T, E>>,
    closed: Arc<AtomicBool>,
    max_concurrent: usize,
}

impl<T, E> BackgroundService<T, E>
where
    T: Send + 'static,
    E: Display + Send + 'static,
{
    pub fn new(max_concurrent: usize) -> (Self, OutcomeReceiver<T, E>) {
        let max_concurrent = max_concurrent.max(1);
        let (tx, rx) = mpsc::unbounded_channel();
        let service = Self {
            registry: Arc::new(Mutex::new(Registry::default())),
            permits: Arc::new(Semaphore::new(max_concurrent)),
            outcomes: tx,
            closed: Arc::new(AtomicBool::new(false)),
            max_concurrent,
        };
        (service, rx)
    }

    /// Submit a new task. Returns a handle for cancellation and status.
    ///
    /// After shutdown the task is recorded as `Cancelled` and never runs.
    pub fn submit<F>(&self, name: impl Into<String>, work: F) -> TaskHandle
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        let mut task = BackgroundTask::new(name);
        let id = task.id.clone();
        let handle = TaskHandle {
            id: id.clone(),
            registry: Arc::clone(&self.registry),
        };

        if self.closed.load(Ordering::SeqCst) {
            task.cancel();
            self.registry.lock().tasks.push(task);
            return handle;
        }

        let name = task.name.clone();
        self.registry.lock().tasks.push(task);

        let registry = Arc::clone(&self.registry);
        let permits = Arc::clone(&self.permits);
        let outcomes = self.outcomes.clone();
        let closed = Arc::clone(&self.closed);
        let task_id = id.clone();

        let join = tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            {
                let mut reg = registry.lock();
                match reg.task_mut(&task_id) {
                    Some(t) if t.status == TaskStatus::Pending => t.start(),
                    _ => return,
                }
            }
            debug!(task_id = %task_id, name = %name, "background task started");

            let result = work.await;

            {
                let mut reg = registry.lock();
                reg.handles.remove(&task_id);
                let Some(t) = reg.task_mut(&task_id) else {
                    return;
                };
                if t.status != TaskStatus::Running {
                    return;
                }
                match &result {
                    Ok(_) => t.complete(),
                    Err(e) => t.fail(e.to_string()),
                }
            }

            if closed.load(Ordering::SeqCst) {
                debug!(task_id = %task_id, "dropping outcome after shutdown");
                return;
            }
            let outcome = TaskOutcome {
                task_id,
                name,
                result,
            };
            if outcomes.send(outcome).is_err() {
                debug!("outcome receiver gone; result dropped");
            }
        });

        let mut reg = self.registry.lock();
        let finished = reg
            .tasks
            .iter()
            .find(|t| t.id == id)
            .is_none_or(|t| t.is_finished());
        if !finished {
            reg.handles.insert(id, join.abort_handle());
        }
        handle
    }
}

impl<T, E> BackgroundService<T, E> {
    /// Cancel a task by ID. Errors if the task is unknown or already finished.
    pub fn cancel(&self, task_id: &str) -> anyhow::Result<()> {
        self.registry.lock().cancel(task_id)
    }

    /// Abort every outstanding task without waiting for it. Idempotent.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.permits.close();
        let mut reg = self.registry.lock();
        let mut aborted = 0usize;
        for (_, handle) in reg.handles.drain() {
            handle.abort();
            aborted += 1;
        }
        for task in reg.tasks.iter_mut().filter(|t| !t.is_finished()) {
            task.cancel();
        }
        if aborted > 0 {
            warn!(aborted, "background service shut down with work in flight");
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Look up a task by ID.
    pub fn status(&self, task_id: &str) -> Option<BackgroundTask> {
        self.registry
            .lock()
            .tasks
            .iter()
            .find(|t| t.id == task_id)
            .cloned()
    }

    /// Snapshot of all tracked tasks.
    pub fn list_tasks(&self) -> Vec<BackgroundTask> {
        self.registry.lock().tasks.clone()
    }

    /// Remove all tasks that have reached a terminal state.
    pub fn cleanup_completed(&self) {
        let mut reg = self.registry.lock();
        reg.tasks.retain(|t| !t.is_finished());
        let live: Vec<String> = reg.tasks.iter().map(|t| t.id.clone()).collect();
        reg.handles.retain(|id, _| live.contains(id));
    }

    /// Number of tasks currently in the `Running` state.
    pub fn running_count(&self) -> usize {
        self.count(TaskStatus::Running)
    }

    /// Number of tasks currently in the `Pending` state.
    pub fn pending_count(&self) -> usize {
        self.count(TaskStatus::Pending)
    }

    /// The configured concurrency limit.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    fn count(&self, status: TaskStatus) -> usize {
        self.registry
            .lock()
            .tasks
            .iter()
            .filter(|t| t.status == status)
            .count()
    }
}

impl<T, E> Drop for BackgroundService<T, E> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ===========================================================================
// Tests
// ===========================================================================
