mod article_repo;
mod database;
pub mod retry;
mod store;

pub use article_repo::{ArticleRepository, InsertOutcome};
pub use database::Database;
pub use store::ArticleStore;
