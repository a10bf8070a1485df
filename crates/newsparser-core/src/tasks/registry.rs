use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::model::Task;
use crate::{Error, Result};

/// Generate a process-unique task id: `{prefix}_{unix_secs}_{random}`
pub fn new_task_id(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}_{}", prefix, Utc::now().timestamp(), &suffix[..8])
}

/// Shared, lock-protected map of task id to task.
///
/// Every read returns a clone taken under the lock and every update runs to
/// completion under the write lock, so pollers never see a half-applied change.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: Arc<RwLock<HashMap<String, Task>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new task in `Starting` state
    pub async fn create(&self, task_id: &str) -> Result<Task> {
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(task_id) {
            return Err(Error::DuplicateTask(task_id.to_string()));
        }
        let task = Task::new(task_id);
        tasks.insert(task_id.to_string(), task.clone());
        Ok(task)
    }

    pub async fn get(&self, task_id: &str) -> Option<Task> {
        self.tasks.read().await.get(task_id).cloned()
    }

    /// Like `get`, but unknown ids yield a `NotFound` sentinel
    pub async fn lookup(&self, task_id: &str) -> Task {
        self.get(task_id)
            .await
            .unwrap_or_else(|| Task::not_found(task_id))
    }

    /// Apply `mutation` atomically. Returns `None` if the task is unknown.
    pub async fn update<R>(
        &self,
        task_id: &str,
        mutation: impl FnOnce(&mut Task) -> R,
    ) -> Option<R> {
        let mut tasks = self.tasks.write().await;
        tasks.get_mut(task_id).map(mutation)
    }

    /// Snapshot of every task, oldest first
    pub async fn list_all(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self.tasks.read().await.values().cloned().collect();
        tasks.sort_by_key(|t| t.started_at());
        tasks
    }

    pub async fn evict(&self, task_id: &str) -> Option<Task> {
        self.tasks.write().await.remove(task_id)
    }

    /// Remove terminal tasks that finished more than `retention` before `now`
    pub async fn evict_expired(&self, retention: Duration, now: DateTime<Utc>) -> Vec<String> {
        let mut tasks = self.tasks.write().await;
        let expired: Vec<String> = tasks
            .values()
            .filter(|task| task.is_expired(retention, now))
            .map(|task| task.id().to_string())
            .collect();

        for id in &expired {
            tasks.remove(id);
        }
        expired
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::model::{RunStats, Tally, TaskStatus};

    #[tokio::test]
    async fn test_create_get_and_duplicate() {
        let registry = TaskRegistry::new();
        let task = registry.create("t1").await.unwrap();
        assert_eq!(task.status(), TaskStatus::Starting);

        assert!(matches!(registry.create("t1").await, Err(Error::DuplicateTask(_))));
        assert_eq!(registry.get("t1").await.unwrap().id(), "t1");
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let registry = TaskRegistry::new();
        assert!(registry.get("missing").await.is_none());

        let task = registry.lookup("missing").await;
        assert_eq!(task.status(), TaskStatus::NotFound);
        assert_eq!(task.id(), "missing");
        assert!(registry.is_empty().await, "lookup never stores the sentinel");
        assert!(registry.update("missing", |t| t.start()).await.is_none());
    }

    #[tokio::test]
    async fn test_update_and_evict() {
        let registry = TaskRegistry::new();
        registry.create("t1").await.unwrap();

        let started = registry.update("t1", |t| t.start()).await;
        assert_eq!(started, Some(true));
        assert_eq!(registry.get("t1").await.unwrap().status(), TaskStatus::Running);

        assert!(registry.evict("t1").await.is_some());
        assert!(registry.get("t1").await.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_writers_do_not_lose_updates() {
        let registry = TaskRegistry::new();
        registry.create("t1").await.unwrap();
        registry.update("t1", |t| t.start()).await;

        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..50 {
                    registry.update("t1", |t| t.record(Tally::New)).await;
                    let snapshot = registry.get("t1").await.unwrap();
                    assert_eq!(snapshot.status(), TaskStatus::Running);
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(registry.get("t1").await.unwrap().result().new, 800);
    }

    #[tokio::test]
    async fn test_evict_expired_only_touches_finished_tasks() {
        let registry = TaskRegistry::new();
        let now = Utc::now();

        registry.create("done").await.unwrap();
        registry
            .update("done", |t| {
                t.start();
                t.complete(RunStats::default(), now - Duration::seconds(7200))
            })
            .await;
        registry.create("running").await.unwrap();
        registry.update("running", |t| t.start()).await;

        let evicted = registry.evict_expired(Duration::seconds(3600), now).await;
        assert_eq!(evicted, vec!["done".to_string()]);
        assert!(registry.get("running").await.is_some());
    }

    #[test]
    fn test_task_ids_are_unique() {
        let a = new_task_id("feed_fetch");
        let b = new_task_id("feed_fetch");
        assert!(a.starts_with("feed_fetch_"));
        assert_ne!(a, b);
    }
}
