use async_trait::async_trait;

use super::models::Candidate;
use crate::config::FeedSource;
use crate::Result;

/// Where ingestion runs get their candidates from.
///
/// `fetch` may fail for a single feed without affecting the others; the
/// pipeline counts that failure and moves on. `extract_body` is best-effort
/// and reports every failure as `None`.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    async fn fetch(&self, feed: &FeedSource) -> Result<Vec<Candidate>>;

    async fn extract_body(&self, link: &str) -> Option<String>;
}
