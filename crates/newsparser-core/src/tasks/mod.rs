mod cleanup;
mod dedup;
mod model;
mod registry;
mod runner;

pub use cleanup::cleanup_old_tasks;
pub use dedup::{ingest_candidate, DedupOutcome, DuplicateKey};
pub use model::{RunStats, Tally, Task, TaskResult, TaskStatus};
pub use registry::{new_task_id, TaskRegistry};
pub use runner::{
    candidate_progress, feed_progress, TaskRunner, MANUAL_TASK_PREFIX, SCHEDULED_TASK_PREFIX,
};
