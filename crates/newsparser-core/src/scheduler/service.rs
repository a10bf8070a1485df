use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex, Notify};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::tasks::{TaskRunner, MANUAL_TASK_PREFIX};
use crate::{Error, Result};

type JobFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Body of a recurring job. Called once per fire; the returned future runs on
/// its own worker.
pub type JobAction = Arc<dyn Fn() -> JobFuture + Send + Sync>;

/// Wrap an async closure as a [`JobAction`]
pub fn job_action<F, Fut>(f: F) -> JobAction
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move || -> JobFuture { Box::pin(f()) })
}

/// Wait used when no jobs are scheduled; the loop is woken early on changes
const IDLE_WAIT: Duration = Duration::from_secs(3600);

/// Job metadata exposed for status reporting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobInfo {
    pub id: String,
    pub name: String,
    pub next_run: Option<DateTime<Utc>>,
    pub trigger: String,
}

/// Human-readable trigger description, e.g. `interval[1:00:00]`
pub fn format_trigger(interval: Duration) -> String {
    let secs = interval.as_secs();
    format!("interval[{}:{:02}:{:02}]", secs / 3600, (secs % 3600) / 60, secs % 60)
}

struct Job {
    id: String,
    name: String,
    interval: Duration,
    next_fire: Instant,
    action: JobAction,
    /// Set while a fire of this job is executing
    firing: Arc<AtomicBool>,
}

/// Clears a job's in-flight flag when its worker ends, including on panic
struct FiringGuard(Arc<AtomicBool>);

impl Drop for FiringGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

enum State {
    Idle,
    Running(JoinHandle<()>),
    Stopped,
}

struct Inner {
    jobs: Mutex<Vec<Job>>,
    state: Mutex<State>,
    workers: Mutex<JoinSet<()>>,
    wake: Notify,
    shutdown_tx: watch::Sender<bool>,
}

/// In-process scheduler for recurring jobs and one-off manual runs.
///
/// A single loop sleeps until the earliest due job and hands each fire to a
/// separate worker, so a slow job never blocks the loop or other jobs. Each
/// recurring job is non-overlapping: a fire that arrives while the previous
/// one is still executing is dropped and logged. Ticks missed while the loop
/// was busy are coalesced into one.
#[derive(Clone)]
pub struct SchedulerService {
    inner: Arc<Inner>,
}

impl Default for SchedulerService {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerService {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                jobs: Mutex::new(Vec::new()),
                state: Mutex::new(State::Idle),
                workers: Mutex::new(JoinSet::new()),
                wake: Notify::new(),
                shutdown_tx,
            }),
        }
    }

    /// Add a recurring job, replacing any job with the same id.
    ///
    /// A replaced job keeps its in-flight flag, so an execution already
    /// underway still blocks the next fire of the replacement.
    pub async fn schedule_recurring(
        &self,
        id: &str,
        name: &str,
        interval: Duration,
        action: JobAction,
    ) -> Result<()> {
        if interval.is_zero() {
            return Err(Error::Scheduler(format!("Job {} has a zero interval", id)));
        }

        let mut jobs = self.inner.jobs.lock().await;
        let firing = match jobs.iter().position(|job| job.id == id) {
            Some(index) => {
                debug!(job = id, "Replacing existing job");
                jobs.remove(index).firing
            }
            None => Arc::new(AtomicBool::new(false)),
        };

        jobs.push(Job {
            id: id.to_string(),
            name: name.to_string(),
            interval,
            next_fire: Instant::now() + interval,
            action,
            firing,
        });
        drop(jobs);

        self.inner.wake.notify_one();
        info!(job = id, "Scheduled '{}' every {}", name, format_trigger(interval));
        Ok(())
    }

    /// Start the trigger loop. Fails if the scheduler was already started or stopped.
    pub async fn start(&self) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        match *state {
            State::Idle => {}
            State::Running(_) => {
                return Err(Error::Scheduler("Scheduler is already running".to_string()))
            }
            State::Stopped => {
                return Err(Error::Scheduler("Scheduler has been stopped".to_string()))
            }
        }

        let now = Instant::now();
        for job in self.inner.jobs.lock().await.iter_mut() {
            job.next_fire = now + job.interval;
        }

        let inner = Arc::clone(&self.inner);
        let shutdown = self.inner.shutdown_tx.subscribe();
        *state = State::Running(tokio::spawn(run_loop(inner, shutdown)));
        Ok(())
    }

    /// Create a manual ingestion task and run it on its own worker.
    ///
    /// Returns the task id immediately. Manual runs share nothing with the
    /// recurring job: no id, no lock and no overlap check.
    pub async fn trigger_once(&self, runner: &TaskRunner) -> Result<String> {
        if matches!(*self.inner.state.lock().await, State::Stopped) {
            return Err(Error::Scheduler("Scheduler has been stopped".to_string()));
        }

        let task_id = runner.create_task(MANUAL_TASK_PREFIX).await?;

        let runner = runner.clone();
        let worker_task_id = task_id.clone();
        self.inner.workers.lock().await.spawn(async move {
            runner.run(&worker_task_id).await;
        });

        info!(task_id = %task_id, "Manual feed fetch triggered");
        Ok(task_id)
    }

    /// Metadata for every recurring job, in scheduling order
    pub async fn list_jobs(&self) -> Vec<JobInfo> {
        let running = self.is_running().await;
        let now = Instant::now();
        let wall_now = Utc::now();

        let jobs = self.inner.jobs.lock().await;
        jobs.iter()
            .map(|job| {
                let until = job.next_fire.saturating_duration_since(now);
                let next_run = running
                    .then(|| chrono::Duration::from_std(until).ok())
                    .flatten()
                    .map(|until| wall_now + until);
                JobInfo {
                    id: job.id.clone(),
                    name: job.name.clone(),
                    next_run,
                    trigger: format_trigger(job.interval),
                }
            })
            .collect()
    }

    pub async fn is_running(&self) -> bool {
        matches!(*self.inner.state.lock().await, State::Running(_))
    }

    /// Receiver that turns true once `stop` is called
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.inner.shutdown_tx.subscribe()
    }

    /// Signal shutdown, join the trigger loop and wait for in-flight workers
    pub async fn stop(&self) {
        let previous = std::mem::replace(&mut *self.inner.state.lock().await, State::Stopped);
        self.inner.shutdown_tx.send_replace(true);

        if let State::Running(handle) = previous {
            if let Err(e) = handle.await {
                error!("Scheduler loop ended abnormally: {}", e);
            }
        }

        let mut workers = std::mem::take(&mut *self.inner.workers.lock().await);
        while let Some(result) = workers.join_next().await {
            if let Err(e) = result {
                error!("Scheduled worker failed: {}", e);
            }
        }

        info!("Scheduler stopped");
    }
}

async fn run_loop(inner: Arc<Inner>, mut shutdown: watch::Receiver<bool>) {
    info!("Scheduler started");

    loop {
        let deadline = inner
            .jobs
            .lock()
            .await
            .iter()
            .map(|job| job.next_fire)
            .min()
            .unwrap_or_else(|| Instant::now() + IDLE_WAIT);

        tokio::select! {
            result = shutdown.changed() => {
                if result.is_err() || *shutdown.borrow() {
                    debug!("Scheduler loop received shutdown signal");
                    break;
                }
            }
            _ = inner.wake.notified() => {}
            _ = tokio::time::sleep_until(deadline) => {
                inner.fire_due(Instant::now()).await;
            }
        }

        inner.reap_workers().await;
    }
}

impl Inner {
    async fn fire_due(&self, now: Instant) {
        let mut due = Vec::new();
        for job in self.jobs.lock().await.iter_mut() {
            if job.next_fire > now {
                continue;
            }
            while job.next_fire <= now {
                job.next_fire += job.interval;
            }
            due.push((job.id.clone(), Arc::clone(&job.action), Arc::clone(&job.firing)));
        }

        let mut workers = self.workers.lock().await;
        for (id, action, firing) in due {
            if firing.swap(true, Ordering::AcqRel) {
                warn!(job = %id, "Skipping run: previous execution still in progress");
                continue;
            }

            let guard = FiringGuard(firing);
            workers.spawn(async move {
                let _guard = guard;
                debug!(job = %id, "Running scheduled job");
                action().await;
            });
        }
    }

    async fn reap_workers(&self) {
        let mut workers = self.workers.lock().await;
        while let Some(result) = workers.try_join_next() {
            if let Err(e) = result {
                error!("Scheduled worker failed: {}", e);
            }
        }
    }
}
