use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    /// Feeds ingested on every run, in processing order
    #[serde(default = "default_feeds")]
    pub feeds: Vec<FeedSource>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            sync: SyncConfig::default(),
            feeds: default_feeds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Data directory path
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Explicit database URL (e.g. "sqlite:/var/lib/newsparser/db.sqlite"), overrides data_dir
    #[serde(default)]
    pub database_url: Option<String>,
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database_url: None,
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Interval between scheduled ingestion runs
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    /// Interval between task registry sweeps
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,
    /// How long a finished task stays queryable
    #[serde(default = "default_task_retention")]
    pub task_retention_secs: u64,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    /// HTTP proxy URL for feed fetching (e.g., "http://127.0.0.1:7890" or "socks5://127.0.0.1:1080")
    #[serde(default)]
    pub proxy_url: Option<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval(),
            cleanup_interval_secs: default_cleanup_interval(),
            task_retention_secs: default_task_retention(),
            request_timeout_secs: default_timeout(),
            proxy_url: None,
        }
    }
}

impl SyncConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn task_retention(&self) -> Duration {
        Duration::from_secs(self.task_retention_secs)
    }
}

/// A feed the ingestion pipeline pulls candidates from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
}

impl FeedSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

fn default_feeds() -> Vec<FeedSource> {
    [
        ("politics", "https://feeds.bbci.co.uk/news/politics/rss.xml"),
        ("world", "https://feeds.bbci.co.uk/news/world/rss.xml"),
        ("uk", "https://feeds.bbci.co.uk/news/uk/rss.xml"),
        ("business", "https://feeds.bbci.co.uk/news/business/rss.xml"),
        ("technology", "https://feeds.bbci.co.uk/news/technology/rss.xml"),
        ("science", "https://feeds.bbci.co.uk/news/science_and_environment/rss.xml"),
        ("entertainment", "https://feeds.bbci.co.uk/news/entertainment_and_arts/rss.xml"),
        ("health", "https://feeds.bbci.co.uk/news/health/rss.xml"),
        ("sport", "https://feeds.bbci.co.uk/sport/rss.xml"),
    ]
    .into_iter()
    .map(|(name, url)| FeedSource::new(name, url))
    .collect()
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("newsparser")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_refresh_interval() -> u64 {
    3600 // 1 hour
}

fn default_cleanup_interval() -> u64 {
    600 // 10 minutes
}

fn default_task_retention() -> u64 {
    3600 // 1 hour
}

fn default_timeout() -> u64 {
    10
}

/// Expand tilde (~) in path to user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(path_str) = path.to_str() {
        if let Some(stripped) = path_str.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        } else if path_str == "~" {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
    }
    path.to_path_buf()
}

impl AppConfig {
    /// Load configuration from the default location or return defaults
    pub fn load() -> crate::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from an explicit file, falling back to defaults when it is absent
    pub fn load_from(path: &Path) -> crate::Result<Self> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml(&content)?
        } else {
            Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> crate::Result<Self> {
        toml::from_str(content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Reject settings the scheduler cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.sync.refresh_interval_secs == 0 {
            return Err(crate::Error::Config(
                "sync.refresh_interval_secs must be greater than zero".into(),
            ));
        }
        if self.sync.cleanup_interval_secs == 0 {
            return Err(crate::Error::Config(
                "sync.cleanup_interval_secs must be greater than zero".into(),
            ));
        }
        for feed in &self.feeds {
            url::Url::parse(&feed.url).map_err(|e| {
                crate::Error::Config(format!("Invalid URL for feed '{}': {}", feed.name, e))
            })?;
        }
        Ok(())
    }

    /// Get the configuration file path
    /// Always uses ~/.config/newsparser/config.toml on all platforms
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("newsparser")
            .join("config.toml")
    }

    /// Get the database file path
    pub fn database_path(&self) -> PathBuf {
        self.data_dir().join("newsparser.db")
    }

    /// Get the data directory (with tilde expansion)
    pub fn data_dir(&self) -> PathBuf {
        expand_tilde(&self.general.data_dir)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
