use chrono::Utc;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::dedup::{ingest_candidate, DedupOutcome};
use super::model::{RunStats, Tally, Task};
use super::registry::{new_task_id, TaskRegistry};
use crate::config::FeedSource;
use crate::feed::{Candidate, CandidateSource};
use crate::storage::ArticleStore;
use crate::{Error, Result};

/// Task id prefix for runs requested through the API or CLI
pub const MANUAL_TASK_PREFIX: &str = "feed_fetch";
/// Task id prefix for runs fired by the recurring job
pub const SCHEDULED_TASK_PREFIX: &str = "scheduled_fetch";

/// Progress after the feed at `index` has been fetched: the first 10% is
/// split evenly across feeds.
pub fn feed_progress(index: usize, total_feeds: usize) -> u8 {
    if total_feeds == 0 {
        return 0;
    }
    (10 * (index + 1) / total_feeds) as u8
}

/// Progress after `processed` of `total` candidates, capped at 99
pub fn candidate_progress(processed: usize, total: usize) -> u8 {
    if total == 0 {
        return 10;
    }
    (10 + 90 * processed / total).min(99) as u8
}

/// Executes ingestion runs, reporting each one through the task registry
#[derive(Clone)]
pub struct TaskRunner {
    source: Arc<dyn CandidateSource>,
    store: Arc<dyn ArticleStore>,
    registry: TaskRegistry,
    feeds: Arc<Vec<FeedSource>>,
    cancel: watch::Receiver<bool>,
}

impl TaskRunner {
    pub fn new(
        source: Arc<dyn CandidateSource>,
        store: Arc<dyn ArticleStore>,
        registry: TaskRegistry,
        feeds: Vec<FeedSource>,
    ) -> Self {
        let (_never_cancelled, cancel) = watch::channel(false);
        Self {
            source,
            store,
            registry,
            feeds: Arc::new(feeds),
            cancel,
        }
    }

    /// Abort runs between items once `cancel` turns true
    pub fn with_cancel_signal(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn feeds(&self) -> &[FeedSource] {
        &self.feeds
    }

    /// Register a fresh `Starting` task and return its id
    pub async fn create_task(&self, prefix: &str) -> Result<String> {
        let task_id = new_task_id(prefix);
        self.registry.create(&task_id).await?;
        Ok(task_id)
    }

    /// Create a task and run it to completion
    pub async fn run_new(&self, prefix: &str) -> Result<Option<Task>> {
        let task_id = self.create_task(prefix).await?;
        Ok(self.run(&task_id).await)
    }

    /// Drive one ingestion run under `task_id` and finalize it.
    ///
    /// Only the call that moves the task out of `Starting` drives it, and that
    /// call always leaves it terminal. Any other call returns the current
    /// snapshot untouched. Returns `None` for unknown or evicted tasks.
    pub async fn run(&self, task_id: &str) -> Option<Task> {
        match self.registry.update(task_id, |task| task.start()).await {
            Some(true) => {}
            Some(false) => {
                warn!(task_id, "Task was already started, not running it again");
                return self.registry.get(task_id).await;
            }
            None => {
                warn!(task_id, "Task is not registered");
                return None;
            }
        }

        info!(task_id, feeds = self.feeds.len(), "Starting feed fetch task");

        match self.execute(task_id).await {
            Ok(stats) => {
                self.registry
                    .update(task_id, |task| task.complete(stats, Utc::now()))
                    .await;
                if let Some(task) = self.registry.get(task_id).await {
                    let result = task.result();
                    info!(
                        task_id,
                        new = result.new,
                        duplicates = result.duplicates,
                        errors = result.errors,
                        "Feed fetch task completed"
                    );
                }
            }
            Err(e) => {
                error!(task_id, error = %e, "Feed fetch task failed");
                let message = e.to_string();
                self.registry
                    .update(task_id, |task| task.fail(message, Utc::now()))
                    .await;
            }
        }

        self.registry.get(task_id).await
    }

    async fn execute(&self, task_id: &str) -> Result<RunStats> {
        let candidates = self.collect_candidates(task_id).await?;
        let total = candidates.len();
        info!(task_id, total, "Processing candidates");
        let mut saved = 0u32;

        for (index, candidate) in candidates.iter().enumerate() {
            self.check_cancelled()?;

            let tally = match ingest_candidate(&*self.store, &*self.source, candidate).await {
                Ok(DedupOutcome::New) => {
                    saved += 1;
                    Tally::New
                }
                Ok(DedupOutcome::Duplicate(key)) => {
                    debug!(task_id, link = %candidate.link, ?key, "Skipping duplicate");
                    Tally::Duplicate
                }
                Err(e) if e.is_systemic() => return Err(e),
                Err(e) => {
                    error!(task_id, title = %candidate.title, error = %e, "Error saving article");
                    Tally::Error
                }
            };

            let processed = index + 1;
            self.registry
                .update(task_id, |task| {
                    task.record(tally);
                    task.set_phase(format!("Processed {}/{} articles", processed, total));
                    task.advance_progress(candidate_progress(processed, total));
                })
                .await;
        }

        Ok(RunStats {
            processed_feeds: self.feeds.len() as u32,
            processed_articles: saved,
            total_found: total as u32,
        })
    }

    /// Fetch every feed in order, counting per-feed failures as errors
    async fn collect_candidates(&self, task_id: &str) -> Result<Vec<Candidate>> {
        let total_feeds = self.feeds.len();
        let mut candidates = Vec::new();

        for (index, feed) in self.feeds.iter().enumerate() {
            self.check_cancelled()?;

            self.registry
                .update(task_id, |task| {
                    task.set_phase(format!(
                        "Fetching {} ({}/{})",
                        feed.name,
                        index + 1,
                        total_feeds
                    ))
                })
                .await;

            let failed = match self.source.fetch(feed).await {
                Ok(found) => {
                    debug!(task_id, feed = %feed.name, count = found.len(), "Fetched feed");
                    candidates.extend(found);
                    false
                }
                Err(e) if e.is_systemic() => return Err(e),
                Err(e) => {
                    error!(task_id, feed = %feed.name, error = %e, "Error processing feed");
                    true
                }
            };

            self.registry
                .update(task_id, |task| {
                    if failed {
                        task.record(Tally::Error);
                    }
                    task.advance_progress(feed_progress(index, total_feeds));
                })
                .await;
        }

        Ok(candidates)
    }

    fn check_cancelled(&self) -> Result<()> {
        if *self.cancel.borrow() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}
