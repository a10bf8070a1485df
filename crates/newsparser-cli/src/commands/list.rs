use anyhow::Result;

use newsparser_core::storage::{ArticleRepository, Database};
use newsparser_core::AppConfig;

pub async fn run(
    config: &AppConfig,
    limit: u32,
    topic: Option<&str>,
    search: Option<&str>,
) -> Result<()> {
    let db = Database::new(config).await?;
    let repo = ArticleRepository::new(&db);

    let articles = match (search, topic) {
        (Some(keywords), _) => repo.search(keywords, limit).await?,
        (None, Some(topic)) => repo.list_by_topic(topic, limit).await?,
        (None, None) => repo.list_recent(limit).await?,
    };

    if articles.is_empty() {
        println!("No articles stored yet.");
        println!("\nTo fetch articles now, run:");
        println!("  newsparser fetch");
        return Ok(());
    }

    println!("Articles ({} of {}):\n", articles.len(), repo.count().await?);

    for article in &articles {
        let topic = article.topic.as_deref().unwrap_or("general");
        println!("  [{}] {}", topic, article.title);
        println!("    URL: {}", article.url);
        println!("    Published: {}", article.published_at.format("%Y-%m-%d %H:%M"));

        let preview = article.content_preview(120);
        if !preview.is_empty() {
            println!("    {}", preview);
        }
        println!();
    }

    db.close().await;
    Ok(())
}
