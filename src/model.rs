use chrono::{DateTime, SubsecRound, Utc};
use tracing::warn;

use crate::config::SourceConfig;

/// One normalized article record.
///
/// Identity for deduplication is the `guid` alone; structural equality is
/// what tests and the serialization round-trip rely on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Stable unique identifier, unique within a feed's item set.
    pub guid: String,
    pub title: String,
    /// Absolute URL to the article.
    pub link: String,
    pub published_at: DateTime<Utc>,
    /// May be empty.
    pub summary: String,
}

/// What a fetch adapter hands back before normalization.
#[derive(Debug, Clone, Default)]
pub struct RawItem {
    pub guid: Option<String>,
    pub title: String,
    pub link: String,
    pub published_at: Option<DateTime<Utc>>,
    pub summary: Option<String>,
}

impl Item {
    /// Normalize a raw record into an [`Item`].
    ///
    /// The guid falls back to the link, and the published time falls back to
    /// `fetched_at`. Timestamps are truncated to whole seconds because the
    /// persisted RSS pubDate carries no sub-second field. Records with no
    /// title or no link are dropped with a warning rather than failing the
    /// source.
    pub fn from_raw(raw: RawItem, fetched_at: DateTime<Utc>) -> Option<Item> {
        if raw.title.trim().is_empty() {
            warn!(link = %raw.link, "dropping item with empty title");
            return None;
        }
        if raw.link.trim().is_empty() {
            warn!(title = %raw.title, "dropping item with no link");
            return None;
        }

        let guid = match raw.guid {
            Some(id) if !id.trim().is_empty() => id,
            _ => raw.link.clone(),
        };

        Some(Item {
            guid,
            title: raw.title,
            link: raw.link,
            published_at: raw.published_at.unwrap_or(fetched_at).trunc_subsecs(0),
            summary: raw.summary.unwrap_or_default(),
        })
    }
}

/// The persisted ordered collection of items for one source.
///
/// Invariants maintained by [`crate::builder::merge`]: no two items share a
/// `guid`, items are sorted by `published_at` descending (ties broken by
/// `guid` ascending), and `items.len()` never exceeds the configured cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feed {
    pub source_id: String,
    pub title: String,
    pub link: String,
    pub description: String,
    pub items: Vec<Item>,
    pub generated_at: DateTime<Utc>,
}

impl Feed {
    /// A first-run feed with channel metadata taken from the source config.
    pub fn empty(source: &SourceConfig, generated_at: DateTime<Utc>) -> Feed {
        Feed {
            source_id: source.id.clone(),
            title: source.title.clone(),
            link: source.link.clone(),
            description: source.description.clone(),
            items: Vec::new(),
            generated_at: generated_at.trunc_subsecs(0),
        }
    }
}

/// Broad classification of a per-source failure, for the run report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Network,
    Timeout,
    Parse,
    Store,
    /// Misconfigured adapter name or a panicked adapter task.
    Internal,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::Network => "network",
            FailureKind::Timeout => "timeout",
            FailureKind::Parse => "parse",
            FailureKind::Store => "store",
            FailureKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Outcome of one source within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    Success { items: usize },
    Skipped { reason: String },
    Failed { kind: FailureKind, message: String },
}

/// Per-source outcomes for one orchestrator invocation, in the order the
/// sources were supplied.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    outcomes: Vec<(String, SourceOutcome)>,
}

impl RunReport {
    pub fn push(&mut self, source_id: String, outcome: SourceOutcome) {
        self.outcomes.push((source_id, outcome));
    }

    pub fn outcomes(&self) -> &[(String, SourceOutcome)] {
        &self.outcomes
    }

    pub fn get(&self, source_id: &str) -> Option<&SourceOutcome> {
        self.outcomes
            .iter()
            .find(|(id, _)| id == source_id)
            .map(|(_, outcome)| outcome)
    }

    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, SourceOutcome::Success { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, SourceOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, SourceOutcome::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&SourceOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }
}
