pub mod api;
pub mod config;
pub mod context;
pub mod error;
pub mod feed;
pub mod scheduler;
pub mod storage;
pub mod tasks;

pub use config::{AppConfig, FeedSource};
pub use context::AppContext;
pub use error::{Error, Result};
