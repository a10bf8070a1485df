use crate::feed::{Candidate, CandidateSource, NewArticle};
use crate::storage::{ArticleStore, InsertOutcome};
use crate::Result;

/// Why a candidate was not stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateKey {
    Link,
    Title,
    /// Another run inserted the same article between our lookups and our insert
    ConcurrentInsert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupOutcome {
    New,
    Duplicate(DuplicateKey),
}

/// Check a candidate against the store and insert it if neither its link nor
/// its title is known yet.
///
/// The body is only fetched for candidates that survive both lookups, and a
/// failed fetch stores the article without a body.
pub async fn ingest_candidate(
    store: &dyn ArticleStore,
    source: &dyn CandidateSource,
    candidate: &Candidate,
) -> Result<DedupOutcome> {
    if store.find_by_url(&candidate.link).await?.is_some() {
        return Ok(DedupOutcome::Duplicate(DuplicateKey::Link));
    }

    if store.find_by_title(&candidate.title).await?.is_some() {
        return Ok(DedupOutcome::Duplicate(DuplicateKey::Title));
    }

    let content = source.extract_body(&candidate.link).await;
    let article = NewArticle::from_candidate(candidate, content);

    match store.insert(&article).await? {
        InsertOutcome::Inserted => Ok(DedupOutcome::New),
        InsertOutcome::AlreadyExists => Ok(DedupOutcome::Duplicate(DuplicateKey::ConcurrentInsert)),
    }
}
