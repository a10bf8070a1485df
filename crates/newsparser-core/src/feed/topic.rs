pub const DEFAULT_TOPIC: &str = "general";

// Checked in order; the first topic with a matching keyword wins.
const TOPIC_KEYWORDS: &[(&str, &[&str])] = &[
    ("technology", &["tech", "digital", "software", "hardware", "ai", "cyber"]),
    ("politics", &["politics", "government", "election", "parliament", "congress", "policy"]),
    ("business", &["business", "economy", "finance", "market", "stock", "trade"]),
    ("health", &["health", "medical", "medicine", "disease", "covid", "pandemic"]),
    ("sports", &["sport", "football", "soccer", "basketball", "tennis", "olympic"]),
    ("science", &["science", "research", "discovery", "space", "climate", "environment"]),
    ("entertainment", &["entertainment", "movie", "film", "music", "celebrity", "tv"]),
    ("world", &["world", "global", "international", "foreign"]),
    ("uk", &["uk", "britain", "london", "scotland", "wales", "england"]),
];

fn match_topic(text: &str) -> Option<&'static str> {
    TOPIC_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| text.contains(kw)))
        .map(|(topic, _)| *topic)
}

/// Classify an item by its feed URL first, then by its own title and description
pub fn determine_topic(title: &str, description: &str, feed_url: &str) -> String {
    if let Some(topic) = match_topic(&feed_url.to_lowercase()) {
        return topic.to_string();
    }

    let text = format!("{} {}", title, description).to_lowercase();
    match_topic(&text).unwrap_or(DEFAULT_TOPIC).to_string()
}
