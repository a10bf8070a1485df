use chrono::Utc;
use std::time::Duration;
use tracing::{debug, info};

use super::registry::TaskRegistry;

/// Evict finished tasks older than `retention`. Returns how many were removed.
pub async fn cleanup_old_tasks(registry: &TaskRegistry, retention: Duration) -> usize {
    let retention = chrono::Duration::from_std(retention).unwrap_or(chrono::Duration::MAX);
    let evicted = registry.evict_expired(retention, Utc::now()).await;

    if evicted.is_empty() {
        debug!("No old tasks to clean up");
    } else {
        info!("Cleaned up {} old tasks", evicted.len());
    }

    evicted.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::model::RunStats;

    async fn finished_task(registry: &TaskRegistry, id: &str, age_secs: i64) {
        registry.create(id).await.unwrap();
        registry
            .update(id, |t| {
                t.start();
                t.complete(RunStats::default(), Utc::now() - chrono::Duration::seconds(age_secs))
            })
            .await;
    }

    #[tokio::test]
    async fn test_retention_threshold() {
        let registry = TaskRegistry::new();
        finished_task(&registry, "expired", 3601).await;
        finished_task(&registry, "fresh", 3599).await;

        let removed = cleanup_old_tasks(&registry, Duration::from_secs(3600)).await;

        assert_eq!(removed, 1);
        assert!(registry.get("expired").await.is_none());
        assert!(registry.get("fresh").await.is_some());
    }

    #[tokio::test]
    async fn test_failed_tasks_expire_too() {
        let registry = TaskRegistry::new();
        registry.create("failed").await.unwrap();
        registry
            .update("failed", |t| t.fail("boom", Utc::now() - chrono::Duration::hours(2)))
            .await;

        assert_eq!(cleanup_old_tasks(&registry, Duration::from_secs(3600)).await, 1);
    }

    #[tokio::test]
    async fn test_running_tasks_are_never_evicted() {
        let registry = TaskRegistry::new();
        registry.create("running").await.unwrap();
        registry.update("running", |t| t.start()).await;
        registry.create("starting").await.unwrap();

        assert_eq!(cleanup_old_tasks(&registry, Duration::ZERO).await, 0);
        assert_eq!(registry.len().await, 2);
    }
}
