mod builder;
mod config;
mod fetch;
mod model;
mod orchestrator;
mod store;

use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::fetch::AdapterRegistry;
use crate::model::SourceOutcome;
use crate::orchestrator::{Orchestrator, RunOptions};
use crate::store::FeedStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "feedsmith=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "feeds.toml".to_string());
    let config = Config::load(&config_path)?;
    info!(
        "Loaded {} sources from {}",
        config.sources.len(),
        config_path
    );

    // Wire up the run
    let registry = AdapterRegistry::with_defaults();
    let store = FeedStore::new(&config.feeds_dir);
    let orchestrator = Orchestrator::new(registry, store, RunOptions::from_config(&config));

    let report = orchestrator.run(&config.sources).await;

    for (source_id, outcome) in report.outcomes() {
        match outcome {
            SourceOutcome::Success { items } => {
                info!("{}: wrote {} items", source_id, items);
            }
            SourceOutcome::Skipped { reason } => {
                warn!("{}: skipped ({})", source_id, reason);
            }
            SourceOutcome::Failed { kind, message } => {
                error!("{}: failed ({}): {}", source_id, kind, message);
            }
        }
    }

    // Signal schedulers when a run produced nothing at all
    if report.failed() > 0 && report.succeeded() == 0 {
        anyhow::bail!("no feeds were generated");
    }

    Ok(())
}
