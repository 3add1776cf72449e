//! Cancelable timers
//!
//! The debounce window and periodic maintenance are expressed as one-shot
//! tasks handed to a [`Scheduler`]. Every task comes back as a
//! [`CancelToken`]; a cancelled task never runs.

use shiftstore_core::Result;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// A task run once by a scheduler
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Handle used to cancel a scheduled task
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a live token
    pub fn new() -> Self {
        Self::default()
    }

    /// Prevents the task from running if it has not started yet
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once [`CancelToken::cancel`] was called
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Runs tasks after a delay
pub trait Scheduler: Send + Sync {
    /// Schedules `task` to run once after `delay`
    fn after(&self, delay: Duration, task: Task) -> CancelToken;
}

/// [`Scheduler`] backed by a single worker thread.
///
/// The worker sleeps until the earliest deadline, so cancelled tasks cost
/// a map entry rather than a thread. Dropping the scheduler stops the
/// worker; tasks still pending then never run.
pub struct ThreadScheduler {
    shared: Arc<TimerShared>,
}

struct TimerShared {
    state: Mutex<TimerState>,
    wakeup: Condvar,
}

#[derive(Default)]
struct TimerState {
    tasks: BTreeMap<(Instant, u64), (CancelToken, Task)>,
    next_seq: u64,
    stopped: bool,
}

impl ThreadScheduler {
    /// Starts the worker thread
    pub fn new() -> Result<Self> {
        let shared = Arc::new(TimerShared {
            state: Mutex::new(TimerState::default()),
            wakeup: Condvar::new(),
        });
        let worker_shared = Arc::clone(&shared);
        thread::Builder::new()
            .name("shiftstore-timer".to_string())
            .spawn(move || run_timer_worker(&worker_shared))?;
        Ok(Self { shared })
    }

    /// Number of scheduled tasks that are neither run nor cancelled
    pub fn pending(&self) -> usize {
        let state = self.shared.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .tasks
            .values()
            .filter(|(token, _)| !token.is_cancelled())
            .count()
    }
}

impl Scheduler for ThreadScheduler {
    fn after(&self, delay: Duration, task: Task) -> CancelToken {
        let token = CancelToken::new();
        let cancelled = {
            let mut state = self.shared.state.lock().unwrap_or_else(|e| e.into_inner());
            let cancelled = take_cancelled(&mut state);
            let seq = state.next_seq;
            state.next_seq += 1;
            state
                .tasks
                .insert((Instant::now() + delay, seq), (token.clone(), task));
            cancelled
        };
        drop(cancelled);
        self.shared.wakeup.notify_one();
        token
    }
}

impl Drop for ThreadScheduler {
    fn drop(&mut self) {
        // Not joined: the last handle may be dropped by a task on the worker.
        let abandoned = {
            let mut state = self.shared.state.lock().unwrap_or_else(|e| e.into_inner());
            state.stopped = true;
            std::mem::take(&mut state.tasks)
        };
        drop(abandoned);
        self.shared.wakeup.notify_one();
    }
}

/// Removes cancelled tasks so they can be dropped outside the lock
fn take_cancelled(state: &mut TimerState) -> Vec<Task> {
    let keys: Vec<(Instant, u64)> = state
        .tasks
        .iter()
        .filter(|(_, (token, _))| token.is_cancelled())
        .map(|(key, _)| *key)
        .collect();
    keys.into_iter()
        .filter_map(|key| state.tasks.remove(&key))
        .map(|(_, task)| task)
        .collect()
}

fn run_timer_worker(shared: &TimerShared) {
    let mut state = shared.state.lock().unwrap_or_else(|e| e.into_inner());
    loop {
        if state.stopped {
            return;
        }
        let cancelled = take_cancelled(&mut state);
        if !cancelled.is_empty() {
            drop(state);
            drop(cancelled);
            state = shared.state.lock().unwrap_or_else(|e| e.into_inner());
            continue;
        }

        let now = Instant::now();
        match state.tasks.keys().next().copied() {
            None => {
                state = shared.wakeup.wait(state).unwrap_or_else(|e| e.into_inner());
            }
            Some((due, _)) if due > now => {
                state = match shared.wakeup.wait_timeout(state, due - now) {
                    Ok((guard, _)) => guard,
                    Err(e) => e.into_inner().0,
                };
            }
            Some(first) => {
                if let Some((token, task)) = state.tasks.remove(&first) {
                    drop(state);
                    if !token.is_cancelled() {
                        task();
                    }
                    state = shared.state.lock().unwrap_or_else(|e| e.into_inner());
                }
            }
        }
    }
}

struct PendingTask {
    due: Duration,
    token: CancelToken,
    task: Task,
}

/// A [`Scheduler`] driven by explicit calls to [`ManualScheduler::advance`].
///
/// Suits hosts with their own event loop, and makes debounce behaviour
/// deterministic in tests. Clones share the same timeline.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    state: Arc<Mutex<ManualState>>,
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    pending: Vec<PendingTask>,
}

impl ManualScheduler {
    /// Creates a scheduler at time zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves time forward by `by` and runs every task that became due,
    /// in due order. Returns the number of tasks run.
    ///
    /// Tasks run without the scheduler lock held, so they may schedule
    /// further tasks; those run in the same call if they fall due.
    pub fn advance(&self, by: Duration) -> usize {
        let target = {
            let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.now + by
        };

        let mut ran = 0;
        loop {
            let next = {
                let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
                state.pending.retain(|p| !p.token.is_cancelled());
                let due = state
                    .pending
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| p.due <= target)
                    .min_by_key(|(_, p)| p.due)
                    .map(|(i, _)| i);
                match due {
                    Some(i) => {
                        let task = state.pending.remove(i);
                        state.now = state.now.max(task.due);
                        Some(task)
                    }
                    None => {
                        state.now = target;
                        None
                    }
                }
            };

            match next {
                Some(pending) => {
                    if !pending.token.is_cancelled() {
                        (pending.task)();
                        ran += 1;
                    }
                }
                None => return ran,
            }
        }
    }

    /// Number of scheduled tasks that are neither run nor cancelled
    pub fn pending(&self) -> usize {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .pending
            .iter()
            .filter(|p| !p.token.is_cancelled())
            .count()
    }
}

impl Scheduler for ManualScheduler {
    fn after(&self, delay: Duration, task: Task) -> CancelToken {
        let token = CancelToken::new();
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let due = state.now + delay;
        state.pending.push(PendingTask {
            due,
            token: token.clone(),
            task,
        });
        token
    }
}
