use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::builder;
use crate::config::{Config, SourceConfig};
use crate::fetch::{AdapterRegistry, FetchContext};
use crate::model::{FailureKind, Feed, Item, RunReport, SourceOutcome};
use crate::store::{FeedStore, StoreError};

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub fetch_timeout: Duration,
    pub max_items: usize,
    pub concurrency: usize,
}

impl RunOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            fetch_timeout: Duration::from_secs(config.fetch_timeout_secs),
            max_items: config.max_items,
            concurrency: config.concurrency,
        }
    }
}

/// Runs every configured source through fetch, merge, and save, isolating
/// failures so one broken source never affects the others.
pub struct Orchestrator {
    registry: Arc<AdapterRegistry>,
    store: Arc<FeedStore>,
    ctx: Arc<FetchContext>,
    options: RunOptions,
}

impl Orchestrator {
    pub fn new(registry: AdapterRegistry, store: FeedStore, options: RunOptions) -> Self {
        let client = Client::builder()
            .timeout(options.fetch_timeout)
            .user_agent(concat!("feedsmith/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to create HTTP client");

        Self::with_context(registry, store, options, FetchContext { client })
    }

    /// Construct with an explicit fetch context, letting tests inject a
    /// client of their own.
    pub fn with_context(
        registry: AdapterRegistry,
        store: FeedStore,
        options: RunOptions,
        ctx: FetchContext,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            store: Arc::new(store),
            ctx: Arc::new(ctx),
            options,
        }
    }

    /// Run all sources and return one outcome per source, in input order.
    ///
    /// Sources run on a bounded pool of `options.concurrency` workers.
    /// Completion order does not matter; outcomes are joined back by
    /// position. Nothing a single source does, including panicking inside
    /// a custom adapter, aborts the rest of the run.
    pub async fn run(&self, sources: &[SourceConfig]) -> RunReport {
        info!("Running {} sources", sources.len());

        let semaphore = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
        let mut handles = Vec::with_capacity(sources.len());

        for source in sources {
            let source = source.clone();
            let registry = self.registry.clone();
            let store = self.store.clone();
            let ctx = self.ctx.clone();
            let options = self.options.clone();
            let semaphore = semaphore.clone();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore never closed");
                process_source(&registry, &store, &ctx, &options, &source).await
            }));
        }

        let mut report = RunReport::default();
        for (source, handle) in sources.iter().zip(handles) {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Source '{}' task panicked: {}", source.id, e);
                    SourceOutcome::Failed {
                        kind: FailureKind::Internal,
                        message: format!("source task panicked: {}", e),
                    }
                }
            };
            report.push(source.id.clone(), outcome);
        }

        info!(
            "Run complete: {} succeeded, {} skipped, {} failed",
            report.succeeded(),
            report.skipped(),
            report.failed()
        );
        report
    }
}

/// One source's full pipeline: fetch, normalize, load previous state,
/// merge, save. Every error is turned into an outcome; the feed file is
/// only touched on the success path.
async fn process_source(
    registry: &AdapterRegistry,
    store: &FeedStore,
    ctx: &FetchContext,
    options: &RunOptions,
    source: &SourceConfig,
) -> SourceOutcome {
    if !source.enabled {
        info!("Skipping disabled source '{}'", source.id);
        return SourceOutcome::Skipped {
            reason: "disabled in configuration".to_string(),
        };
    }

    let Some(adapter) = registry.get(&source.adapter) else {
        error!(
            "Source '{}' names unknown adapter '{}'",
            source.id, source.adapter
        );
        return SourceOutcome::Failed {
            kind: FailureKind::Internal,
            message: format!("no adapter registered under '{}'", source.adapter),
        };
    };

    info!("Fetching source '{}' ({})", source.id, source.url);
    let fetched_at = Utc::now();

    let raws = match timeout(options.fetch_timeout, adapter.fetch(ctx, source)).await {
        Err(_) => {
            error!("Source '{}' timed out", source.id);
            return SourceOutcome::Failed {
                kind: FailureKind::Timeout,
                message: format!("fetch exceeded {:?}", options.fetch_timeout),
            };
        }
        Ok(Err(e)) => {
            error!("Source '{}' fetch failed: {}", source.id, e);
            return SourceOutcome::Failed {
                kind: e.failure_kind(),
                message: e.to_string(),
            };
        }
        Ok(Ok(raws)) => raws,
    };

    let items: Vec<Item> = raws
        .into_iter()
        .filter_map(|raw| Item::from_raw(raw, fetched_at))
        .collect();

    let existing = match store.load(&source.id) {
        Ok(feed) => Some(feed),
        Err(StoreError::NotFound) => None,
        Err(StoreError::Corrupt { reason }) => {
            warn!(
                "Existing feed for '{}' is unreadable ({}), rebuilding from scratch",
                source.id, reason
            );
            None
        }
        Err(e) => {
            error!("Could not read existing feed for '{}': {}", source.id, e);
            return SourceOutcome::Failed {
                kind: FailureKind::Store,
                message: e.to_string(),
            };
        }
    };

    if items.is_empty() && existing.is_none() {
        warn!("Source '{}' produced no items and has no feed yet", source.id);
        return SourceOutcome::Skipped {
            reason: "no items fetched and no existing feed".to_string(),
        };
    }

    let existing = existing.unwrap_or_else(|| Feed::empty(source, fetched_at));
    let max_items = source.max_items.unwrap_or(options.max_items);
    let merged = builder::merge(&existing, items, max_items, Utc::now());

    match store.save(&merged) {
        Ok(()) => {
            info!(
                "Wrote {} items for source '{}'",
                merged.items.len(),
                source.id
            );
            SourceOutcome::Success {
                items: merged.items.len(),
            }
        }
        Err(e) => {
            error!("Could not save feed for '{}': {}", source.id, e);
            SourceOutcome::Failed {
                kind: FailureKind::Store,
                message: e.to_string(),
            }
        }
    }
}
