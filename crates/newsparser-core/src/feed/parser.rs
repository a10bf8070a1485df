use chrono::Utc;
use feed_rs::parser;

use super::models::Candidate;
use super::topic::determine_topic;
use crate::{Error, Result};

/// Remove stray CDATA markers some feeds leave in text fields
fn clean_text(raw: &str) -> String {
    raw.replace("]]>", "").replace("<![CDATA[", "").trim().to_string()
}

/// Parse RSS/Atom feed content into candidate records
pub fn parse_feed(content: &[u8], feed_url: &str) -> Result<Vec<Candidate>> {
    let feed = parser::parse(content).map_err(|e| Error::FeedParse(e.to_string()))?;

    let candidates = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let link = entry.links.first().map(|l| l.href.clone())?;

            let title = entry
                .title
                .map(|t| clean_text(&t.content))
                .unwrap_or_default();

            let description = entry
                .summary
                .map(|s| clean_text(&s.content))
                .map(|d| if d.contains('<') { html_to_text(&d) } else { d })
                .filter(|d| !d.is_empty());

            let topic = determine_topic(&title, description.as_deref().unwrap_or(""), feed_url);

            let published_at = entry
                .published
                .or(entry.updated)
                .unwrap_or_else(Utc::now);

            let image_url = entry
                .media
                .first()
                .and_then(|m| m.thumbnails.first())
                .map(|t| t.image.uri.clone());

            Some(Candidate {
                title,
                link,
                description,
                topic,
                published_at,
                image_url,
            })
        })
        .collect();

    Ok(candidates)
}

/// Convert HTML content to plain text
fn html_to_text(html: &str) -> String {
    html2text::from_read(html.as_bytes(), 80)
        .map(|text| text.trim().to_string())
        .unwrap_or_else(|_| html.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>BBC News</title>
    <link>https://www.bbc.co.uk/news</link>
    <description>BBC News - Politics</description>
    <item>
      <title><![CDATA[Budget vote passes]]></title>
      <description><![CDATA[MPs approved the plan.]]></description>
      <link>https://www.bbc.co.uk/news/articles/one</link>
      <pubDate>Mon, 06 Jan 2025 10:00:00 GMT</pubDate>
      <media:thumbnail width="240" height="135" url="https://ichef.bbci.co.uk/one.jpg"/>
    </item>
    <item>
      <title>Second story</title>
      <link>https://www.bbc.co.uk/news/articles/two</link>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_candidates_in_feed_order() {
        let candidates = parse_feed(
            SAMPLE_RSS.as_bytes(),
            "https://feeds.bbci.co.uk/news/politics/rss.xml",
        )
        .unwrap();

        assert_eq!(candidates.len(), 2);

        let first = &candidates[0];
        assert_eq!(first.title, "Budget vote passes");
        assert_eq!(first.link, "https://www.bbc.co.uk/news/articles/one");
        assert_eq!(first.description.as_deref(), Some("MPs approved the plan."));
        assert_eq!(first.topic, "politics");
        assert_eq!(first.published_at.to_rfc3339(), "2025-01-06T10:00:00+00:00");

        let second = &candidates[1];
        assert_eq!(second.title, "Second story");
        assert!(second.description.is_none());
    }

    #[test]
    fn test_clean_text_strips_cdata_markers() {
        assert_eq!(clean_text("  <![CDATA[Hello]]>  "), "Hello");
    }

    #[test]
    fn test_invalid_feed_is_an_error() {
        let result = parse_feed(b"not a feed", "https://example.com/rss.xml");
        assert!(matches!(result, Err(Error::FeedParse(_))));
    }
}
