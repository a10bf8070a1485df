use chrono::{DateTime, Utc};
use sqlx::FromRow;

use super::retry::with_retry;
use super::Database;
use crate::feed::{Article, NewArticle};
use crate::Result;

/// Result of an insert-if-absent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// An article with the same url or title was already present
    AlreadyExists,
}

/// Repository for article persistence and queries
pub struct ArticleRepository<'a> {
    db: &'a Database,
}

#[derive(FromRow)]
struct ArticleRow {
    id: i64,
    title: String,
    url: String,
    summary: Option<String>,
    content: Option<String>,
    topic: Option<String>,
    image_url: Option<String>,
    published_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<ArticleRow> for Article {
    fn from(row: ArticleRow) -> Self {
        Article {
            id: row.id,
            title: row.title,
            url: row.url,
            summary: row.summary,
            content: row.content,
            topic: row.topic,
            image_url: row.image_url,
            published_at: row.published_at,
            created_at: row.created_at,
        }
    }
}

const SELECT_COLUMNS: &str =
    "SELECT id, title, url, summary, content, topic, image_url, published_at, created_at FROM articles";

impl<'a> ArticleRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Insert an article unless one with the same url or title already exists.
    ///
    /// The existence check and the insert are a single statement, so two
    /// concurrent runs racing on the same article cannot both insert it.
    pub async fn insert_if_absent(&self, article: &NewArticle) -> Result<InsertOutcome> {
        let now = Utc::now();

        let result = with_retry(|| {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO articles
                (title, url, summary, content, topic, image_url, published_at, created_at)
                SELECT ?, ?, ?, ?, ?, ?, ?, ?
                WHERE NOT EXISTS (SELECT 1 FROM articles WHERE url = ? OR title = ?)
                "#,
            )
            .bind(&article.title)
            .bind(&article.url)
            .bind(&article.summary)
            .bind(&article.content)
            .bind(&article.topic)
            .bind(&article.image_url)
            .bind(article.published_at)
            .bind(now)
            .bind(&article.url)
            .bind(&article.title)
            .execute(self.db.pool())
        })
        .await?;

        if result.rows_affected() > 0 {
            Ok(InsertOutcome::Inserted)
        } else {
            Ok(InsertOutcome::AlreadyExists)
        }
    }

    /// Find an article by its canonical URL
    pub async fn find_by_url(&self, url: &str) -> Result<Option<Article>> {
        let query = format!("{} WHERE url = ?", SELECT_COLUMNS);
        let row: Option<ArticleRow> = with_retry(|| {
            sqlx::query_as(&query)
                .bind(url)
                .fetch_optional(self.db.pool())
        })
        .await?;

        Ok(row.map(Article::from))
    }

    /// Find an article by exact title
    pub async fn find_by_title(&self, title: &str) -> Result<Option<Article>> {
        let query = format!("{} WHERE title = ? LIMIT 1", SELECT_COLUMNS);
        let row: Option<ArticleRow> = with_retry(|| {
            sqlx::query_as(&query)
                .bind(title)
                .fetch_optional(self.db.pool())
        })
        .await?;

        Ok(row.map(Article::from))
    }

    /// Most recently published articles
    pub async fn list_recent(&self, limit: u32) -> Result<Vec<Article>> {
        let query = format!("{} ORDER BY published_at DESC LIMIT ?", SELECT_COLUMNS);
        let rows: Vec<ArticleRow> = sqlx::query_as(&query)
            .bind(limit)
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows.into_iter().map(Article::from).collect())
    }

    /// Articles whose topic contains the given text (case-insensitive)
    pub async fn list_by_topic(&self, topic: &str, limit: u32) -> Result<Vec<Article>> {
        let query = format!(
            "{} WHERE topic LIKE ? ORDER BY published_at DESC LIMIT ?",
            SELECT_COLUMNS
        );
        let rows: Vec<ArticleRow> = sqlx::query_as(&query)
            .bind(format!("%{}%", topic))
            .bind(limit)
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows.into_iter().map(Article::from).collect())
    }

    /// Articles matching every whitespace-separated keyword in title, summary or content
    pub async fn search(&self, keywords: &str, limit: u32) -> Result<Vec<Article>> {
        let terms: Vec<String> = keywords
            .split_whitespace()
            .map(|term| format!("%{}%", term))
            .collect();

        let mut query = SELECT_COLUMNS.to_string();
        for (i, _) in terms.iter().enumerate() {
            query.push_str(if i == 0 { " WHERE " } else { " AND " });
            query.push_str("(title LIKE ? OR summary LIKE ? OR content LIKE ?)");
        }
        query.push_str(" ORDER BY published_at DESC LIMIT ?");

        let mut query_builder = sqlx::query_as::<_, ArticleRow>(&query);
        for term in &terms {
            query_builder = query_builder.bind(term).bind(term).bind(term);
        }

        let rows = query_builder
            .bind(limit)
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows.into_iter().map(Article::from).collect())
    }

    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM articles")
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn new_article(title: &str, url: &str) -> NewArticle {
        NewArticle {
            title: title.to_string(),
            url: url.to_string(),
            summary: Some(format!("{} summary", title)),
            content: None,
            topic: Some("politics".to_string()),
            image_url: None,
            published_at: Utc.with_ymd_and_hms(2025, 1, 6, 10, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = ArticleRepository::new(&db);

        let outcome = repo
            .insert_if_absent(&new_article("Budget vote", "https://example.com/a"))
            .await
            .unwrap();
        assert_eq!(outcome, InsertOutcome::Inserted);

        let by_url = repo.find_by_url("https://example.com/a").await.unwrap().unwrap();
        assert_eq!(by_url.title, "Budget vote");
        assert_eq!(by_url.topic.as_deref(), Some("politics"));

        let by_title = repo.find_by_title("Budget vote").await.unwrap().unwrap();
        assert_eq!(by_title.id, by_url.id);

        assert!(repo.find_by_url("https://example.com/missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_if_absent_rejects_same_url_or_title() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = ArticleRepository::new(&db);

        repo.insert_if_absent(&new_article("First", "https://example.com/a"))
            .await
            .unwrap();

        let same_url = repo
            .insert_if_absent(&new_article("Renamed", "https://example.com/a"))
            .await
            .unwrap();
        let same_title = repo
            .insert_if_absent(&new_article("First", "https://example.com/b"))
            .await
            .unwrap();

        assert_eq!(same_url, InsertOutcome::AlreadyExists);
        assert_eq!(same_title, InsertOutcome::AlreadyExists);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_search_and_topic_queries() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = ArticleRepository::new(&db);

        repo.insert_if_absent(&new_article("Budget vote passes", "https://example.com/a"))
            .await
            .unwrap();
        let mut sport = new_article("Cup final result", "https://example.com/b");
        sport.topic = Some("sports".to_string());
        repo.insert_if_absent(&sport).await.unwrap();

        let found = repo.search("budget passes", 10).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].url, "https://example.com/a");

        let sports = repo.list_by_topic("sport", 10).await.unwrap();
        assert_eq!(sports.len(), 1);
        assert_eq!(sports[0].title, "Cup final result");

        assert_eq!(repo.list_recent(10).await.unwrap().len(), 2);
    }
}
