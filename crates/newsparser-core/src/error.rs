use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed parsing error: {0}")]
    FeedParse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Task already exists: {0}")]
    DuplicateTask(String),

    #[error("Article store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error should abort a whole ingestion run rather than
    /// being counted against the single feed or article that produced it.
    pub fn is_systemic(&self) -> bool {
        match self {
            Error::Database(err) => matches!(
                err,
                sqlx::Error::PoolClosed
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::WorkerCrashed
                    | sqlx::Error::Io(_)
            ),
            Error::StoreUnavailable(_) | Error::Cancelled => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_systemic_classification() {
        assert!(Error::StoreUnavailable("down".into()).is_systemic());
        assert!(Error::Database(sqlx::Error::PoolClosed).is_systemic());
        assert!(Error::Cancelled.is_systemic());

        assert!(!Error::Database(sqlx::Error::RowNotFound).is_systemic());
        assert!(!Error::FeedParse("bad xml".into()).is_systemic());
        assert!(!Error::Other("constraint".into()).is_systemic());
    }
}
