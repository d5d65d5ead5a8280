//! Registry of activity runs in flight

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use theater_shared::ActivityId;
use tokio_util::sync::CancellationToken;

/// A run that is currently executing
#[derive(Debug, Clone)]
pub struct ActiveRun {
    pub run_id: u64,
    pub activity_id: ActivityId,
    pub started_at: DateTime<Utc>,
    cancel: CancellationToken,
}

impl ActiveRun {
    /// Token the run checks between steps and during delays
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Keeps a run registered until dropped
///
/// Dropping the guard removes the run, so a run whose future is abandoned
/// mid-flight does not stay registered.
#[derive(Debug)]
pub struct RunGuard<'a> {
    registry: &'a RunRegistry,
    run: ActiveRun,
}

impl RunGuard<'_> {
    pub fn run(&self) -> &ActiveRun {
        &self.run
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.registry.remove(self.run.run_id);
    }
}

/// Tracks running activities so they can be stopped by activity id
///
/// Locked only in short synchronous sections; `RunGuard` unregisters from `Drop`.
#[derive(Debug, Default)]
pub struct RunRegistry {
    run_id: AtomicU64,
    runs: Mutex<Vec<ActiveRun>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ActiveRun>> {
        self.runs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record a new run of `activity_id` controlled by `cancel`
    pub fn register(&self, activity_id: ActivityId, cancel: CancellationToken) -> RunGuard<'_> {
        let run = ActiveRun {
            run_id: self.run_id.fetch_add(1, Ordering::SeqCst) + 1,
            activity_id,
            started_at: Utc::now(),
            cancel,
        };
        self.lock().push(run.clone());
        RunGuard {
            registry: self,
            run,
        }
    }

    fn remove(&self, run_id: u64) {
        self.lock().retain(|r| r.run_id != run_id);
    }

    /// Cancel every run of `activity_id`, returning how many were signalled
    pub fn cancel_activity(&self, activity_id: ActivityId) -> usize {
        let runs = self.lock();
        let mut cancelled = 0;
        for run in runs.iter().filter(|r| r.activity_id == activity_id) {
            run.cancel.cancel();
            cancelled += 1;
        }
        cancelled
    }

    /// Whether any run of `activity_id` is registered
    pub fn is_running(&self, activity_id: ActivityId) -> bool {
        self.lock().iter().any(|r| r.activity_id == activity_id)
    }

    /// Snapshot of all runs in flight, oldest first
    pub fn active(&self) -> Vec<ActiveRun> {
        self.lock().clone()
    }
}
