use anyhow::{bail, Result};

use newsparser_core::tasks::{TaskStatus, MANUAL_TASK_PREFIX};
use newsparser_core::{AppConfig, AppContext};

pub async fn run(config: AppConfig) -> Result<()> {
    let feed_count = config.feeds.len();
    let ctx = AppContext::from_config(config).await?;

    println!("Fetching {} feeds...\n", feed_count);

    let Some(task) = ctx.runner().run_new(MANUAL_TASK_PREFIX).await? else {
        bail!("Task record disappeared before the run finished");
    };

    let result = task.result();
    match task.status() {
        TaskStatus::Completed => {
            println!(
                "Fetch complete: {} new, {} duplicates, {} errors.",
                result.new, result.duplicates, result.errors
            );
            if let Some(stats) = task.stats() {
                println!(
                    "  {} feeds processed, {} articles found",
                    stats.processed_feeds, stats.total_found
                );
            }
            if let Some(secs) = task.duration_seconds() {
                println!("  Took {:.1}s", secs);
            }
            Ok(())
        }
        _ => bail!(
            "Fetch failed: {} ({} new, {} duplicates, {} errors before failure)",
            task.error().unwrap_or("unknown error"),
            result.new,
            result.duplicates,
            result.errors
        ),
    }
}
