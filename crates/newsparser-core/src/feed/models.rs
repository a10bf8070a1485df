use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An item read from a feed that has not yet been checked against the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub title: String,
    /// Canonical link, the primary dedup key
    pub link: String,
    pub description: Option<String>,
    pub topic: String,
    pub published_at: DateTime<Utc>,
    pub image_url: Option<String>,
}

/// Represents a stored article
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub topic: Option<String>,
    pub image_url: Option<String>,
    pub published_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Data required to create a new article
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub title: String,
    pub url: String,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub topic: Option<String>,
    pub image_url: Option<String>,
    pub published_at: DateTime<Utc>,
}

impl NewArticle {
    /// Build the row to persist for a candidate that passed dedup
    pub fn from_candidate(candidate: &Candidate, content: Option<String>) -> Self {
        Self {
            title: candidate.title.clone(),
            url: candidate.link.clone(),
            summary: candidate.description.clone(),
            content,
            topic: Some(candidate.topic.clone()),
            image_url: candidate.image_url.clone(),
            published_at: candidate.published_at,
        }
    }
}

impl Article {
    /// Get a preview of the summary or body (first N characters)
    pub fn content_preview(&self, max_len: usize) -> String {
        let text = self
            .summary
            .as_deref()
            .or(self.content.as_deref())
            .unwrap_or("");

        if max_len == 0 {
            return String::new();
        }

        if text.len() <= max_len {
            text.to_string()
        } else {
            let mut end = 0;
            for (idx, ch) in text.char_indices() {
                let next = idx + ch.len_utf8();
                if next > max_len {
                    break;
                }
                end = next;
            }
            format!("{}...", &text[..end])
        }
    }
}
