use std::sync::Arc;
use tracing::{error, info};

use crate::config::AppConfig;
use crate::feed::{CandidateSource, FeedFetcher};
use crate::scheduler::{job_action, SchedulerService};
use crate::storage::{ArticleStore, Database};
use crate::tasks::{cleanup_old_tasks, Task, TaskRegistry, TaskRunner, SCHEDULED_TASK_PREFIX};
use crate::Result;

pub const FETCH_JOB_ID: &str = "fetch_rss_feeds";
pub const CLEANUP_JOB_ID: &str = "cleanup_old_tasks";

/// Everything a running service needs, built once at startup and shared
/// by the scheduler, the HTTP handlers and the CLI.
pub struct AppContext {
    config: Arc<AppConfig>,
    registry: TaskRegistry,
    runner: TaskRunner,
    scheduler: SchedulerService,
}

impl AppContext {
    pub fn new(
        config: AppConfig,
        source: Arc<dyn CandidateSource>,
        store: Arc<dyn ArticleStore>,
    ) -> Self {
        let scheduler = SchedulerService::new();
        let registry = TaskRegistry::new();
        let runner = TaskRunner::new(source, store, registry.clone(), config.feeds.clone())
            .with_cancel_signal(scheduler.shutdown_signal());

        Self {
            config: Arc::new(config),
            registry,
            runner,
            scheduler,
        }
    }

    /// Wire the SQLite store and HTTP fetcher described by `config`
    pub async fn from_config(config: AppConfig) -> Result<Self> {
        let db = Database::new(&config).await?;
        let fetcher = FeedFetcher::new(&config)?;
        Ok(Self::new(config, Arc::new(fetcher), Arc::new(db)))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn runner(&self) -> &TaskRunner {
        &self.runner
    }

    pub fn scheduler(&self) -> &SchedulerService {
        &self.scheduler
    }

    /// Register the recurring fetch and cleanup jobs and start the scheduler
    pub async fn start(&self) -> Result<()> {
        let runner = self.runner.clone();
        self.scheduler
            .schedule_recurring(
                FETCH_JOB_ID,
                "Fetch RSS feeds hourly",
                self.config.sync.refresh_interval(),
                job_action(move || {
                    let runner = runner.clone();
                    async move {
                        if let Err(e) = runner.run_new(SCHEDULED_TASK_PREFIX).await {
                            error!("Scheduled feed fetch could not start: {}", e);
                        }
                    }
                }),
            )
            .await?;

        let registry = self.registry.clone();
        let retention = self.config.sync.task_retention();
        self.scheduler
            .schedule_recurring(
                CLEANUP_JOB_ID,
                "Clean up old tasks every 10 minutes",
                self.config.sync.cleanup_interval(),
                job_action(move || {
                    let registry = registry.clone();
                    async move {
                        cleanup_old_tasks(&registry, retention).await;
                    }
                }),
            )
            .await?;

        self.scheduler.start().await?;
        info!(
            "Background scheduler started: fetch every {}s, cleanup every {}s",
            self.config.sync.refresh_interval_secs, self.config.sync.cleanup_interval_secs
        );
        Ok(())
    }

    /// Start a manual ingestion run in the background and return its task id
    pub async fn trigger_manual_fetch(&self) -> Result<String> {
        self.scheduler.trigger_once(&self.runner).await
    }

    pub async fn task(&self, task_id: &str) -> Task {
        self.registry.lookup(task_id).await
    }

    pub async fn shutdown(&self) {
        info!("Shutting down background scheduler");
        self.scheduler.stop().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeedSource;
    use crate::feed::{Article, Candidate, NewArticle};
    use crate::storage::InsertOutcome;
    use crate::tasks::{RunStats, TaskStatus};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;

    struct OneStorySource;

    #[async_trait]
    impl CandidateSource for OneStorySource {
        async fn fetch(&self, feed: &FeedSource) -> Result<Vec<Candidate>> {
            Ok(vec![story(feed)])
        }

        async fn extract_body(&self, _link: &str) -> Option<String> {
            None
        }
    }

    fn story(feed: &FeedSource) -> Candidate {
        Candidate {
            title: format!("Top story from {}", feed.name),
            link: format!("https://news.example.com/{}", feed.name),
            description: None,
            topic: "world".to_string(),
            published_at: Utc::now(),
            image_url: None,
        }
    }

    /// Each fetch waits for one permit on `gate`
    #[derive(Default)]
    struct GatedSource {
        gate: Notify,
    }

    #[async_trait]
    impl CandidateSource for GatedSource {
        async fn fetch(&self, feed: &FeedSource) -> Result<Vec<Candidate>> {
            self.gate.notified().await;
            Ok(vec![story(feed)])
        }

        async fn extract_body(&self, _link: &str) -> Option<String> {
            None
        }
    }

    /// Keeps only links, enough for insert-if-absent
    #[derive(Default)]
    struct LinkStore {
        links: Mutex<HashSet<String>>,
    }

    #[async_trait]
    impl ArticleStore for LinkStore {
        async fn find_by_url(&self, _url: &str) -> Result<Option<Article>> {
            Ok(None)
        }

        async fn find_by_title(&self, _title: &str) -> Result<Option<Article>> {
            Ok(None)
        }

        async fn insert(&self, article: &NewArticle) -> Result<InsertOutcome> {
            if self.links.lock().unwrap().insert(article.url.clone()) {
                Ok(InsertOutcome::Inserted)
            } else {
                Ok(InsertOutcome::AlreadyExists)
            }
        }
    }

    async fn scheduled_tasks(ctx: &AppContext) -> Vec<Task> {
        ctx.registry()
            .list_all()
            .await
            .into_iter()
            .filter(|task| task.id().starts_with(SCHEDULED_TASK_PREFIX))
            .collect()
    }

    async fn test_context() -> AppContext {
        let db = Database::new_in_memory().await.unwrap();
        AppContext::new(AppConfig::default(), Arc::new(OneStorySource), Arc::new(db))
    }

    #[tokio::test]
    async fn test_start_registers_jobs() {
        let ctx = test_context().await;
        ctx.start().await.unwrap();

        let jobs = ctx.scheduler().list_jobs().await;
        let ids: Vec<&str> = jobs.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec![FETCH_JOB_ID, CLEANUP_JOB_ID]);
        assert_eq!(jobs[0].trigger, "interval[1:00:00]");
        assert_eq!(jobs[1].trigger, "interval[0:10:00]");
        assert!(jobs.iter().all(|j| j.next_run.is_some()));

        assert!(ctx.start().await.is_err(), "second start is rejected");
        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn test_manual_fetch_completes() {
        let ctx = test_context().await;
        let task_id = ctx.trigger_manual_fetch().await.unwrap();
        assert!(task_id.starts_with("feed_fetch_"));

        let task = tokio::time::timeout(std::time::Duration::from_secs(5), async {
            loop {
                let task = ctx.task(&task_id).await;
                if task.is_terminal() {
                    break task;
                }
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        // nine default feeds, one story each
        assert_eq!(task.status(), TaskStatus::Completed);
        assert_eq!(task.result().new, 9);
        assert_eq!(ctx.task("nope").await.status(), TaskStatus::NotFound);
        ctx.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_cancels_pending_runs() {
        let ctx = test_context().await;
        ctx.scheduler().stop().await;

        let task = ctx.runner().run_new("feed_fetch").await.unwrap().unwrap();
        assert_eq!(task.status(), TaskStatus::Failed);
        assert_eq!(task.error(), Some("Run cancelled"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_jobs_drive_the_registry() {
        let mut config = AppConfig::default();
        config.feeds.truncate(1);
        let source = Arc::new(GatedSource::default());
        let ctx = AppContext::new(config, source.clone(), Arc::new(LinkStore::default()));

        // a run that finished two hours ago
        ctx.registry().create("feed_fetch_stale").await.unwrap();
        ctx.registry()
            .update("feed_fetch_stale", |task| {
                task.start();
                task.complete(RunStats::default(), Utc::now() - chrono::Duration::hours(2));
            })
            .await;

        ctx.start().await.unwrap();

        // first cleanup fire at 10 minutes
        tokio::time::sleep(Duration::from_secs(601)).await;
        assert!(ctx.registry().get("feed_fetch_stale").await.is_none());
        assert!(scheduled_tasks(&ctx).await.is_empty());

        // the fetch fired at 1h is still blocked, so the 2h fire is skipped
        tokio::time::sleep(Duration::from_secs(6600)).await;
        let running = scheduled_tasks(&ctx).await;
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].status(), TaskStatus::Running);

        source.gate.notify_one();
        let task_id = running[0].id().to_string();
        let finished = loop {
            let task = ctx.task(&task_id).await;
            if task.is_terminal() {
                break task;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        };
        assert_eq!(finished.status(), TaskStatus::Completed);
        assert_eq!(finished.result().new, 1);
        assert_eq!(scheduled_tasks(&ctx).await.len(), 1);

        ctx.shutdown().await;
    }
}
