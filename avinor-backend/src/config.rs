use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::module::detail::DEFAULT_DETAIL_BASE_URL;
use crate::module::feed::DEFAULT_BASE_URL;
use crate::module::flights::PollConfiguration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_feed_base_url")]
    pub feed_base_url: String,

    #[serde(default = "default_detail_base_url")]
    pub detail_base_url: String,

    /// Credential for flight detail lookups; callers may also pass their own
    #[serde(default, skip_serializing)]
    pub detail_api_key: Option<String>,

    #[serde(default = "default_update_interval_seconds")]
    pub update_interval_seconds: u64,

    #[serde(default = "default_airport_cache_hours")]
    pub airport_cache_hours: i64,

    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
}

/// One polled airport/direction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Registry key, defaults to e.g. "OSL_D"
    #[serde(default)]
    pub id: Option<String>,

    #[serde(flatten)]
    pub poll: PollConfiguration,
}

impl FeedConfig {
    pub fn id(&self) -> String {
        self.id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.poll.default_id())
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_feed_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_detail_base_url() -> String {
    DEFAULT_DETAIL_BASE_URL.to_string()
}

fn default_update_interval_seconds() -> u64 {
    180
}

fn default_airport_cache_hours() -> i64 {
    24
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            log_dir: default_log_dir(),
            feed_base_url: default_feed_base_url(),
            detail_base_url: default_detail_base_url(),
            detail_api_key: None,
            update_interval_seconds: default_update_interval_seconds(),
            airport_cache_hours: default_airport_cache_hours(),
            feeds: Vec::new(),
        }
    }
}

impl BackendConfig {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Invalid config file '{}'", path.display()))
    }

    /// Like [`from_file`](Self::from_file), but a missing file yields defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::from_file(path)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: BackendConfig = toml::from_str(content).context("Failed to parse TOML")?;
        config.validate()
    }

    /// Validate every feed and reject duplicate ids.
    pub fn validate(mut self) -> anyhow::Result<Self> {
        if self.update_interval_seconds == 0 {
            anyhow::bail!("update_interval_seconds must be greater than 0");
        }
        if self.airport_cache_hours <= 0 {
            anyhow::bail!("airport_cache_hours must be greater than 0");
        }

        let mut feeds = Vec::with_capacity(self.feeds.len());
        for feed in self.feeds {
            let poll = feed
                .poll
                .validate()
                .with_context(|| format!("Invalid feed '{}'", feed.id.as_deref().unwrap_or("?")))?;
            let feed = FeedConfig { id: feed.id, poll };
            let id = feed.id();
            if feeds.iter().any(|existing: &FeedConfig| existing.id() == id) {
                anyhow::bail!("Duplicate feed id '{}'", id);
            }
            feeds.push(feed);
        }
        self.feeds = feeds;
        Ok(self)
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn detail_api_key(&self) -> Option<&str> {
        self.detail_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}
