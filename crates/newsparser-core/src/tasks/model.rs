use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of an ingestion task.
///
/// Stored tasks only move forward: `Starting -> Running -> Completed | Failed`.
/// `NotFound` is returned for unknown ids and is never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Starting,
    Running,
    Completed,
    Failed,
    NotFound,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Starting => "starting",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::NotFound => "not_found",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-candidate accounting for a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    pub new: u32,
    pub duplicates: u32,
    pub errors: u32,
}

impl TaskResult {
    pub fn total(&self) -> u32 {
        self.new + self.duplicates + self.errors
    }
}

/// Which counter an item lands in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tally {
    New,
    Duplicate,
    Error,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub processed_feeds: u32,
    pub processed_articles: u32,
    pub total_found: u32,
}

/// One ingestion attempt as seen by pollers.
///
/// Mutation goes through the methods below, which enforce the status order,
/// keep `progress` non-decreasing and below 100 until completion, and freeze
/// the record once it is terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    id: String,
    status: TaskStatus,
    status_message: String,
    progress: u8,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    result: TaskResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    stats: Option<RunStats>,
    error: Option<String>,
}

impl Task {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: TaskStatus::Starting,
            status_message: "Starting feed fetch".to_string(),
            progress: 0,
            started_at: Utc::now(),
            completed_at: None,
            result: TaskResult::default(),
            stats: None,
            error: None,
        }
    }

    /// Sentinel returned for ids the registry does not know
    pub fn not_found(id: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::NotFound,
            status_message: "Task not found".to_string(),
            ..Self::new(id)
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn result(&self) -> TaskResult {
        self.result
    }

    pub fn stats(&self) -> Option<RunStats> {
        self.stats
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Wall-clock run time in seconds, rounded to one decimal, once finished
    pub fn duration_seconds(&self) -> Option<f64> {
        self.completed_at.map(|completed| {
            let millis = (completed - self.started_at).num_milliseconds() as f64;
            (millis / 100.0).round() / 10.0
        })
    }

    /// Whether the sweep may evict this task at `now`
    pub fn is_expired(&self, retention: Duration, now: DateTime<Utc>) -> bool {
        match self.completed_at {
            Some(completed) if self.is_terminal() => now - completed > retention,
            _ => false,
        }
    }

    /// `Starting -> Running`. Returns false if the task was already past `Starting`.
    pub fn start(&mut self) -> bool {
        if self.status != TaskStatus::Starting {
            return false;
        }
        self.status = TaskStatus::Running;
        self.progress = 0;
        self.result = TaskResult::default();
        true
    }

    pub fn set_phase(&mut self, message: impl Into<String>) {
        if !self.is_terminal() {
            self.status_message = message.into();
        }
    }

    /// Raise progress, never lowering it and never reaching 100 before completion
    pub fn advance_progress(&mut self, progress: u8) {
        if self.status == TaskStatus::Running {
            self.progress = self.progress.max(progress.min(99));
        }
    }

    pub fn record(&mut self, tally: Tally) {
        if self.is_terminal() {
            return;
        }
        match tally {
            Tally::New => self.result.new += 1,
            Tally::Duplicate => self.result.duplicates += 1,
            Tally::Error => self.result.errors += 1,
        }
    }

    /// `Running -> Completed`
    pub fn complete(&mut self, stats: RunStats, now: DateTime<Utc>) -> bool {
        if self.status != TaskStatus::Running {
            return false;
        }
        self.status = TaskStatus::Completed;
        self.progress = 100;
        self.status_message = "Feed fetch completed".to_string();
        self.completed_at = Some(now);
        self.stats = Some(stats);
        true
    }

    /// Any non-terminal state `-> Failed`, keeping the counts gathered so far
    pub fn fail(&mut self, error: impl Into<String>, now: DateTime<Utc>) -> bool {
        if self.is_terminal() || self.status == TaskStatus::NotFound {
            return false;
        }
        self.status = TaskStatus::Failed;
        self.status_message = "Feed fetch failed".to_string();
        self.error = Some(error.into());
        self.completed_at = Some(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_only_transitions() {
        let mut task = Task::new("t1");
        assert_eq!(task.status(), TaskStatus::Starting);
        assert!(!task.complete(RunStats::default(), Utc::now()));

        assert!(task.start());
        assert!(!task.start());

        assert!(task.complete(RunStats::default(), Utc::now()));
        assert_eq!(task.status(), TaskStatus::Completed);
        assert_eq!(task.progress(), 100);

        assert!(!task.fail("late", Utc::now()));
        assert!(!task.start());
        assert_eq!(task.status(), TaskStatus::Completed);
        assert!(task.error().is_none());
    }

    #[test]
    fn test_progress_is_monotonic_and_capped() {
        let mut task = Task::new("t1");
        task.advance_progress(50);
        assert_eq!(task.progress(), 0, "no progress before running");

        task.start();
        task.advance_progress(40);
        task.advance_progress(20);
        assert_eq!(task.progress(), 40);

        task.advance_progress(100);
        assert_eq!(task.progress(), 99);
    }

    #[test]
    fn test_fail_preserves_counts() {
        let mut task = Task::new("t1");
        task.start();
        task.record(Tally::New);
        task.record(Tally::Duplicate);
        task.record(Tally::Duplicate);

        assert!(task.fail("store unreachable", Utc::now()));
        assert_eq!(task.status(), TaskStatus::Failed);
        assert_eq!(task.error(), Some("store unreachable"));
        assert_eq!(task.result(), TaskResult { new: 1, duplicates: 2, errors: 0 });
        assert!(task.completed_at().is_some());

        task.record(Tally::Error);
        assert_eq!(task.result().errors, 0);
    }

    #[test]
    fn test_duration_rounding() {
        let mut task = Task::new("t1");
        task.start();
        let finished = task.started_at() + Duration::milliseconds(12_345);
        task.complete(RunStats::default(), finished);
        assert_eq!(task.duration_seconds(), Some(12.3));
    }

    #[test]
    fn test_serialized_shape() {
        let task = Task::new("feed_fetch_1");
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["id"], "feed_fetch_1");
        assert_eq!(json["status"], "starting");
        assert_eq!(json["progress"], 0);
        assert_eq!(json["result"]["new"], 0);
        assert!(json["completed_at"].is_null());
        assert!(json.get("stats").is_none());
    }
}
