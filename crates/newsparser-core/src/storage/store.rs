use async_trait::async_trait;

use super::article_repo::{ArticleRepository, InsertOutcome};
use super::Database;
use crate::feed::{Article, NewArticle};
use crate::Result;

/// Persisted set of ingested articles, as seen by the ingestion pipeline.
///
/// The pipeline only ever looks up and inserts. `insert` must be an atomic
/// insert-if-absent over both dedup keys (url and title) and must not affect
/// any other row when it fails.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    async fn find_by_url(&self, url: &str) -> Result<Option<Article>>;

    async fn find_by_title(&self, title: &str) -> Result<Option<Article>>;

    async fn insert(&self, article: &NewArticle) -> Result<InsertOutcome>;
}

#[async_trait]
impl ArticleStore for Database {
    async fn find_by_url(&self, url: &str) -> Result<Option<Article>> {
        ArticleRepository::new(self).find_by_url(url).await
    }

    async fn find_by_title(&self, title: &str) -> Result<Option<Article>> {
        ArticleRepository::new(self).find_by_title(title).await
    }

    async fn insert(&self, article: &NewArticle) -> Result<InsertOutcome> {
        ArticleRepository::new(self).insert_if_absent(article).await
    }
}
