//! Idle-eviction scheduler.
//!
//! A single ticker thread wakes every tick interval, pops every task whose
//! deadline has passed and hands its action to an executor thread, so a slow
//! action (flushing a large collection) never delays the next tick.
//!
//! Tasks are one-shot: once an action has been dispatched the task is gone
//! and [`TimeoutHandle::reset`] becomes a no-op.

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Identifier of a scheduled task.
pub type TaskId = u64;

type Action = Box<dyn FnOnce() + Send>;

struct TaskEntry {
    deadline: Instant,
    window: Duration,
    action: Action,
}

#[derive(Default)]
struct Scheduler {
    tasks: HashMap<TaskId, TaskEntry>,
    deadlines: BTreeSet<(Instant, TaskId)>,
}

impl Scheduler {
    fn insert(&mut self, id: TaskId, entry: TaskEntry) {
        self.deadlines.insert((entry.deadline, id));
        self.tasks.insert(id, entry);
    }

    fn reset(&mut self, id: TaskId, now: Instant) -> bool {
        let Some(entry) = self.tasks.get_mut(&id) else {
            return false;
        };
        self.deadlines.remove(&(entry.deadline, id));
        entry.deadline = now + entry.window;
        self.deadlines.insert((entry.deadline, id));
        true
    }

    fn cancel(&mut self, id: TaskId) -> bool {
        match self.tasks.remove(&id) {
            Some(entry) => {
                self.deadlines.remove(&(entry.deadline, id));
                true
            }
            None => false,
        }
    }

    fn pop_expired(&mut self, now: Instant) -> Vec<(TaskId, Action)> {
        let mut expired = Vec::new();
        while let Some(&(deadline, id)) = self.deadlines.first() {
            if deadline > now {
                break;
            }
            self.deadlines.pop_first();
            if let Some(entry) = self.tasks.remove(&id) {
                expired.push((id, entry.action));
            }
        }
        expired
    }
}

struct ManagerInner {
    state: Mutex<Scheduler>,
    next_id: AtomicU64,
}

/// Handle to a scheduled task.
///
/// Dropping the handle does not cancel the task.
#[derive(Clone)]
pub struct TimeoutHandle {
    id: TaskId,
    manager: Weak<ManagerInner>,
}

impl TimeoutHandle {
    /// Returns the task id.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Pushes the deadline to now plus the task's window.
    ///
    /// Returns false if the task already fired or was cancelled.
    pub fn reset(&self) -> bool {
        match self.manager.upgrade() {
            Some(inner) => inner.state.lock().reset(self.id, Instant::now()),
            None => false,
        }
    }

    /// Removes the task permanently.
    ///
    /// Returns false if the task already fired or was cancelled.
    pub fn cancel(&self) -> bool {
        match self.manager.upgrade() {
            Some(inner) => inner.state.lock().cancel(self.id),
            None => false,
        }
    }

    /// Returns true if the task has neither fired nor been cancelled.
    pub fn is_scheduled(&self) -> bool {
        self.manager
            .upgrade()
            .is_some_and(|inner| inner.state.lock().tasks.contains_key(&self.id))
    }
}

impl std::fmt::Debug for TimeoutHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeoutHandle").field("id", &self.id).finish()
    }
}

/// Scheduler for idle-eviction tasks.
pub struct TimeoutManager {
    inner: Arc<ManagerInner>,
    shutdown_tx: Mutex<Option<Sender<()>>>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl TimeoutManager {
    /// Creates a manager and starts its ticker and executor threads.
    ///
    /// # Errors
    ///
    /// Returns an error if a thread cannot be spawned.
    pub fn start(tick_interval: Duration) -> std::io::Result<Self> {
        let manager = Self::manual();
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);
        let (jobs_tx, jobs_rx) = crossbeam_channel::unbounded::<(TaskId, Action)>();

        let executor = {
            let shutdown_rx = shutdown_rx.clone();
            thread::Builder::new()
                .name("rozsdb-timeout-exec".into())
                .spawn(move || run_executor(&jobs_rx, &shutdown_rx))?
        };

        let inner = Arc::clone(&manager.inner);
        let ticker = thread::Builder::new()
            .name("rozsdb-timeout-tick".into())
            .spawn(move || loop {
                crossbeam_channel::select! {
                    recv(shutdown_rx) -> _ => break,
                    default(tick_interval) => {
                        let expired = inner.state.lock().pop_expired(Instant::now());
                        for job in expired {
                            if jobs_tx.send(job).is_err() {
                                return;
                            }
                        }
                    }
                }
            })?;

        *manager.shutdown_tx.lock() = Some(shutdown_tx);
        manager.threads.lock().extend([ticker, executor]);
        Ok(manager)
    }

    /// Creates a manager without background threads.
    ///
    /// Expired tasks only run when [`run_expired`](Self::run_expired) is
    /// called.
    pub fn manual() -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                state: Mutex::new(Scheduler::default()),
                next_id: AtomicU64::new(1),
            }),
            shutdown_tx: Mutex::new(None),
            threads: Mutex::new(Vec::new()),
        }
    }

    /// Schedules `action` to run once `window` elapses without a reset.
    pub fn schedule<F>(&self, window: Duration, action: F) -> TimeoutHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = TaskEntry {
            deadline: Instant::now() + window,
            window,
            action: Box::new(action),
        };
        self.inner.state.lock().insert(id, entry);
        TimeoutHandle {
            id,
            manager: Arc::downgrade(&self.inner),
        }
    }

    /// Runs every task whose deadline is at or before `now` on the calling
    /// thread. Returns the number of actions run.
    pub fn run_expired(&self, now: Instant) -> usize {
        let expired = self.inner.state.lock().pop_expired(now);
        let count = expired.len();
        for (id, action) in expired {
            tracing::trace!(task = id, "running expired task");
            action();
        }
        count
    }

    /// Number of scheduled tasks.
    pub fn pending(&self) -> usize {
        self.inner.state.lock().tasks.len()
    }

    /// Stops the background threads and drops every scheduled task.
    ///
    /// Safe to call more than once.
    pub fn shutdown(&self) {
        drop(self.shutdown_tx.lock().take());
        let threads: Vec<JoinHandle<()>> = self.threads.lock().drain(..).collect();
        for handle in threads {
            if handle.join().is_err() {
                tracing::error!("timeout thread panicked");
            }
        }
        let mut state = self.inner.state.lock();
        state.tasks.clear();
        state.deadlines.clear();
    }
}

fn run_executor(jobs: &Receiver<(TaskId, Action)>, shutdown: &Receiver<()>) {
    loop {
        crossbeam_channel::select! {
            recv(jobs) -> job => match job {
                Ok((id, action)) => {
                    tracing::trace!(task = id, "running expired task");
                    action();
                }
                Err(_) => break,
            },
            recv(shutdown) -> _ => break,
        }
    }
}

impl std::fmt::Debug for TimeoutManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeoutManager")
            .field("pending", &self.pending())
            .finish()
    }
}

impl Drop for TimeoutManager {
    fn drop(&mut self) {
        drop(self.shutdown_tx.lock().take());
        for handle in self.threads.lock().drain(..) {
            let _ = handle.join();
        }
    }
}
