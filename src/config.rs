//! Configuration for the chart feed importer

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Default chart feed locator; `{limit}` is replaced by the result-size limit
const DEFAULT_URL_TEMPLATE: &str =
    "http://ax.phobos.apple.com.edgesuite.net/WebObjects/MZStore.woa/wpa/MRSS/newreleases/limit={limit}/rss.xml";

fn default_url_template() -> String {
    DEFAULT_URL_TEMPLATE.to_string()
}

/// Default number of chart entries requested from the feed
fn default_limit() -> usize {
    300
}

/// Default completed records per intermediate commit
fn default_batch_size() -> usize {
    20
}

fn default_cache_capacity() -> usize {
    15
}

fn default_true() -> bool {
    true
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub import: ImportConfig,
}

/// Where the feed comes from and how much of it to ask for
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Feed URL with a `{limit}` placeholder for the result-size limit
    #[serde(default = "default_url_template")]
    pub url_template: String,
    /// Number of chart entries to request
    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url_template: default_url_template(),
            limit: default_limit(),
        }
    }
}

impl FeedConfig {
    /// Build the ready-to-use feed locator from the template and limit
    pub fn url(&self) -> Result<Url> {
        let rendered = self.url_template.replace("{limit}", &self.limit.to_string());
        Url::parse(&rendered)
            .map_err(|e| anyhow::anyhow!("invalid feed url '{}': {}", rendered, e))
    }
}

/// Pipeline tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Completed records per intermediate commit
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Category cache capacity
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Category caching on/off, kept switchable for A/B comparison
    #[serde(default = "default_true")]
    pub cache_enabled: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            cache_capacity: default_cache_capacity(),
            cache_enabled: default_true(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file and validate it
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file '{}': {}", path.display(), e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("failed to parse config file '{}': {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all fields, reporting every problem at once
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if self.feed.limit == 0 {
            errors.push("feed limit must be positive".to_string());
        }
        if !self.feed.url_template.contains("{limit}") {
            errors.push("feed url template must contain a {limit} placeholder".to_string());
        }
        if self.import.batch_size == 0 {
            errors.push("import batch size must be positive".to_string());
        }
        if self.import.cache_capacity == 0 {
            errors.push("cache capacity must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("invalid configuration:\n  - {}", errors.join("\n  - "))
        }
    }
}
