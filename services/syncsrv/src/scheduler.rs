//! Fixed-delay task scheduler
//!
//! Each registered task runs its work to completion, then sleeps for the
//! configured interval, then runs again. The delay is measured from the
//! end of one run to the start of the next, so a slow run stretches the
//! cadence instead of stacking overlapping invocations.
//!
//! A failed run is logged and counted; the loop keeps going. [`stop`]
//! interrupts only the sleep, never the work: an in-flight run finishes,
//! and once `stop` returns no further invocation will start.
//!
//! [`stop`]: PollScheduler::stop

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type WorkFn = dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync;

/// Point-in-time view of one task, served by the stats API.
#[derive(Debug, Clone, Serialize)]
pub struct TaskStats {
    pub name: String,
    pub interval_ms: u64,
    pub runs: u64,
    pub failures: u64,
    pub consecutive_failures: u32,
    pub in_flight: bool,
    pub running: bool,
    pub last_run: Option<DateTime<Utc>>,
}

struct TaskShared {
    name: String,
    interval_ms: AtomicU64,
    runs: AtomicU64,
    failures: AtomicU64,
    consecutive_failures: AtomicU32,
    in_flight: AtomicBool,
    last_run: RwLock<Option<DateTime<Utc>>>,
    stop_tx: watch::Sender<bool>,
}

/// Handle to a registered task. Obtained from [`PollScheduler::register`],
/// also resolvable by name.
pub struct ScheduledTask {
    shared: Arc<TaskShared>,
    work: Arc<WorkFn>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl ScheduledTask {
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.shared.interval_ms.load(Ordering::Relaxed))
    }

    pub fn set_interval(&self, interval: Duration) {
        let millis = interval.as_millis() as u64;
        self.shared.interval_ms.store(millis, Ordering::Relaxed);
        debug!("task '{}' interval set to {}ms", self.shared.name, millis);
    }

    pub fn is_running(&self) -> bool {
        self.join.lock().is_some()
    }

    pub fn stats(&self) -> TaskStats {
        TaskStats {
            name: self.shared.name.clone(),
            interval_ms: self.shared.interval_ms.load(Ordering::Relaxed),
            runs: self.shared.runs.load(Ordering::Relaxed),
            failures: self.shared.failures.load(Ordering::Relaxed),
            consecutive_failures: self.shared.consecutive_failures.load(Ordering::Relaxed),
            in_flight: self.shared.in_flight.load(Ordering::SeqCst),
            running: self.is_running(),
            last_run: *self.shared.last_run.read(),
        }
    }
}

/// Clears the in-flight marker on every exit path, including cancellation.
struct InFlightGuard(Arc<TaskShared>);

impl InFlightGuard {
    fn arm(shared: &Arc<TaskShared>) -> Self {
        shared.in_flight.store(true, Ordering::SeqCst);
        Self(shared.clone())
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.in_flight.store(false, Ordering::SeqCst);
    }
}

/// Owns the named polling tasks. Registration and start are separate so
/// callers can wire everything up before any work runs.
pub struct PollScheduler {
    tasks: DashMap<String, Arc<ScheduledTask>>,
}

impl PollScheduler {
    pub fn new() -> Self {
        Self {
            tasks: DashMap::new(),
        }
    }

    /// Registers a task under a unique name. Replaces (and stops nothing of)
    /// a previous registration with the same name, so register once.
    pub fn register<F>(&self, name: &str, interval: Duration, work: F) -> Arc<ScheduledTask>
    where
        F: Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync + 'static,
    {
        let (stop_tx, _) = watch::channel(false);
        let task = Arc::new(ScheduledTask {
            shared: Arc::new(TaskShared {
                name: name.to_string(),
                interval_ms: AtomicU64::new(interval.as_millis() as u64),
                runs: AtomicU64::new(0),
                failures: AtomicU64::new(0),
                consecutive_failures: AtomicU32::new(0),
                in_flight: AtomicBool::new(false),
                last_run: RwLock::new(None),
                stop_tx,
            }),
            work: Arc::new(work),
            join: Mutex::new(None),
        });
        if self.tasks.insert(name.to_string(), task.clone()).is_some() {
            warn!("task '{name}' re-registered, previous handle orphaned");
        }
        task
    }

    pub fn get(&self, name: &str) -> Option<Arc<ScheduledTask>> {
        self.tasks.get(name).map(|entry| entry.clone())
    }

    /// Starts the task loop. The first run happens immediately.
    pub fn start(&self, task: &Arc<ScheduledTask>) {
        let mut join = task.join.lock();
        if join.is_some() {
            warn!("task '{}' already running", task.name());
            return;
        }
        // reset a stop flag left over from a previous run
        let _ = task.shared.stop_tx.send(false);
        let shared = task.shared.clone();
        let work = task.work.clone();
        let stop_rx = task.shared.stop_tx.subscribe();
        *join = Some(tokio::spawn(run_loop(shared, work, stop_rx)));
        info!(
            "task '{}' started, interval {}ms",
            task.name(),
            task.shared.interval_ms.load(Ordering::Relaxed)
        );
    }

    /// Signals the task to stop and waits for its loop to exit. The run in
    /// flight (if any) completes first; after this returns no new run starts.
    pub async fn stop(&self, task: &Arc<ScheduledTask>) {
        let _ = task.shared.stop_tx.send(true);
        let join = task.join.lock().take();
        if let Some(handle) = join {
            if handle.await.is_err() {
                warn!("task '{}' loop panicked", task.name());
            }
            info!("task '{}' stopped", task.name());
        }
    }

    pub async fn stop_all(&self) {
        let tasks: Vec<Arc<ScheduledTask>> =
            self.tasks.iter().map(|entry| entry.clone()).collect();
        for task in tasks {
            self.stop(&task).await;
        }
    }

    pub fn set_interval(&self, name: &str, interval: Duration) -> bool {
        match self.get(name) {
            Some(task) => {
                task.set_interval(interval);
                true
            }
            None => false,
        }
    }

    pub fn stats(&self) -> Vec<TaskStats> {
        let mut stats: Vec<TaskStats> = self.tasks.iter().map(|entry| entry.stats()).collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }
}

impl Default for PollScheduler {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_loop(
    shared: Arc<TaskShared>,
    work: Arc<WorkFn>,
    mut stop_rx: watch::Receiver<bool>,
) {
    debug!("task '{}' loop entered", shared.name);
    loop {
        if *stop_rx.borrow() {
            break;
        }

        {
            let _guard = InFlightGuard::arm(&shared);
            *shared.last_run.write() = Some(Utc::now());
            let result = (work)().await;
            shared.runs.fetch_add(1, Ordering::Relaxed);
            match result {
                Ok(()) => {
                    shared.consecutive_failures.store(0, Ordering::Relaxed);
                }
                Err(e) => {
                    shared.failures.fetch_add(1, Ordering::Relaxed);
                    let streak = shared.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
                    warn!(
                        "task '{}' run failed ({streak} consecutive): {e:#}",
                        shared.name
                    );
                }
            }
        }

        // fixed delay from end of run; only the sleep is interruptible
        let delay = Duration::from_millis(shared.interval_ms.load(Ordering::Relaxed));
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
            }
        }
    }
    debug!("task '{}' loop exited", shared.name);
}
