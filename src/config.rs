use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Directory the per-source feed files are written to
    #[serde(default = "default_feeds_dir")]
    pub feeds_dir: PathBuf,
    /// Maximum items retained per feed (sources may override)
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    /// Per-source fetch timeout in seconds
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// How many sources are fetched at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    pub sources: Vec<SourceConfig>,
}

fn default_feeds_dir() -> PathBuf {
    PathBuf::from("feeds")
}

fn default_max_items() -> usize {
    50
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_concurrency() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    /// Key identifying this source; also names the feed file on disk.
    pub id: String,
    /// Channel title for the generated feed.
    pub title: String,
    /// Channel link (the site the articles come from).
    pub link: String,
    #[serde(default)]
    pub description: String,
    /// Fetch parameter handed to the adapter (typically an upstream URL).
    pub url: String,
    #[serde(default = "default_adapter")]
    pub adapter: String,
    /// Per-source override of the global item cap.
    pub max_items: Option<usize>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_adapter() -> String {
    "remote_feed".to_string()
}

fn default_enabled() -> bool {
    true
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Source ids name feed files, so they must be present and unique;
    /// two sources sharing an id would race on the same file.
    fn validate(&self) -> anyhow::Result<()> {
        let mut seen = std::collections::HashSet::new();
        for source in &self.sources {
            if source.id.trim().is_empty() {
                anyhow::bail!("source with url '{}' has an empty id", source.url);
            }
            if !seen.insert(source.id.as_str()) {
                anyhow::bail!("duplicate source id '{}'", source.id);
            }
        }
        Ok(())
    }
}
