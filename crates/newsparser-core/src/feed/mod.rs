mod extractor;
mod fetcher;
mod models;
mod parser;
mod source;
mod topic;

pub use extractor::extract_article_body;
pub use fetcher::FeedFetcher;
pub use models::{Article, Candidate, NewArticle};
pub use parser::parse_feed;
pub use source::CandidateSource;
pub use topic::{determine_topic, DEFAULT_TOPIC};
