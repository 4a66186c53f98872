use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::config::SourceConfig;
use crate::model::{FailureKind, RawItem};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),
    #[error("parse error: {0}")]
    Parse(String),
}

impl FetchError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            FetchError::Network(_) => FailureKind::Network,
            FetchError::Timeout(_) => FailureKind::Timeout,
            FetchError::Parse(_) => FailureKind::Parse,
        }
    }
}

/// Shared per-run resources handed to every adapter invocation.
///
/// The HTTP client is built once when the orchestrator is constructed and
/// passed in explicitly, so tests can point adapters at a local mock server.
#[derive(Clone)]
pub struct FetchContext {
    pub client: reqwest::Client,
}

/// One source's fetch capability: produce raw items from a live endpoint.
///
/// New sources register an adapter under a name and reference it from
/// their config; the core never needs to change.
#[async_trait]
pub trait FetchAdapter: Send + Sync {
    /// Name sources use to select this adapter in config.
    fn name(&self) -> &str;

    async fn fetch(
        &self,
        ctx: &FetchContext,
        source: &SourceConfig,
    ) -> Result<Vec<RawItem>, FetchError>;
}

/// Registry of fetch adapters keyed by name.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn FetchAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in adapters registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(RemoteFeedAdapter));
        registry
    }

    pub fn register(&mut self, adapter: Arc<dyn FetchAdapter>) {
        self.adapters.insert(adapter.name().to_string(), adapter);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn FetchAdapter>> {
        self.adapters.get(name).cloned()
    }
}

/// Built-in adapter that fetches an upstream RSS/Atom document and maps its
/// entries to raw items.
pub struct RemoteFeedAdapter;

pub const REMOTE_FEED_ADAPTER: &str = "remote_feed";

#[async_trait]
impl FetchAdapter for RemoteFeedAdapter {
    fn name(&self) -> &str {
        REMOTE_FEED_ADAPTER
    }

    async fn fetch(
        &self,
        ctx: &FetchContext,
        source: &SourceConfig,
    ) -> Result<Vec<RawItem>, FetchError> {
        let response = ctx
            .client
            .get(&source.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| FetchError::Network(e.to_string()))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let parsed =
            feed_rs::parser::parse(&bytes[..]).map_err(|e| FetchError::Parse(e.to_string()))?;

        let mut raws = Vec::with_capacity(parsed.entries.len());
        for entry in parsed.entries {
            let link = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .unwrap_or_default();

            let title = entry
                .title
                .as_ref()
                .map(|t| t.content.clone())
                .unwrap_or_else(|| "Untitled".to_string());

            if link.is_empty() {
                warn!(source = %source.id, "skipping entry with no link: {}", title);
                continue;
            }

            let guid = if entry.id.is_empty() {
                None
            } else {
                Some(entry.id.clone())
            };

            raws.push(RawItem {
                guid,
                title,
                link,
                published_at: entry.published.or(entry.updated),
                summary: entry.summary.map(|t| t.content),
            });
        }

        Ok(raws)
    }
}
