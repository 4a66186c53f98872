//! Pure feed construction: merging new items into an existing feed and
//! encoding/decoding the on-disk RSS 2.0 document. No I/O happens here;
//! the [`crate::store`] module owns the files.

use std::collections::HashMap;

use chrono::{DateTime, SubsecRound, Utc};
use rss::{Category, Channel, Guid};

use crate::model::{Feed, Item};
use crate::store::StoreError;

const GENERATOR: &str = concat!("feedsmith/", env!("CARGO_PKG_VERSION"));

/// Merge `new_items` into `existing`, keyed by guid.
///
/// New data wins on a guid collision, so a re-fetch that updates a title or
/// summary replaces the stored entry instead of duplicating it. The result
/// is sorted newest-first (ties broken by guid ascending so output is
/// reproducible), capped at `max_items`, and stamped with `now`.
///
/// Merging the same `new_items` twice yields the same feed as merging once.
pub fn merge(existing: &Feed, new_items: Vec<Item>, max_items: usize, now: DateTime<Utc>) -> Feed {
    let mut by_guid: HashMap<String, Item> = existing
        .items
        .iter()
        .map(|item| (item.guid.clone(), item.clone()))
        .collect();

    for item in new_items {
        by_guid.insert(item.guid.clone(), item);
    }

    let mut items: Vec<Item> = by_guid.into_values().collect();
    items.sort_by(|a, b| {
        b.published_at
            .cmp(&a.published_at)
            .then_with(|| a.guid.cmp(&b.guid))
    });
    items.truncate(max_items);

    Feed {
        source_id: existing.source_id.clone(),
        title: existing.title.clone(),
        link: existing.link.clone(),
        description: existing.description.clone(),
        items,
        generated_at: now.trunc_subsecs(0),
    }
}

/// Encode a feed as RSS 2.0 bytes.
///
/// The encoding is deterministic: identical `Feed` values produce identical
/// bytes. The source id rides in the channel `<category>` so the document
/// round-trips without relying on its filename, and `lastBuildDate` carries
/// `generated_at`.
pub fn serialize(feed: &Feed) -> Vec<u8> {
    let items = feed
        .items
        .iter()
        .map(|item| rss::Item {
            title: Some(item.title.clone()),
            link: Some(item.link.clone()),
            guid: Some(Guid {
                value: item.guid.clone(),
                permalink: false,
            }),
            pub_date: Some(item.published_at.to_rfc2822()),
            description: Some(item.summary.clone()),
            ..Default::default()
        })
        .collect();

    let channel = Channel {
        title: feed.title.clone(),
        link: feed.link.clone(),
        description: feed.description.clone(),
        generator: Some(GENERATOR.to_string()),
        last_build_date: Some(feed.generated_at.to_rfc2822()),
        categories: vec![Category {
            name: feed.source_id.clone(),
            domain: None,
        }],
        items,
        ..Default::default()
    };

    channel.to_string().into_bytes()
}

/// Decode bytes produced by [`serialize`] back into a [`Feed`].
///
/// Anything else fails with [`StoreError::Corrupt`]: malformed XML, a
/// missing source id category, items lacking guid/title/link/pubDate, or
/// two items sharing a guid (which [`merge`] can never emit).
pub fn deserialize(bytes: &[u8]) -> Result<Feed, StoreError> {
    let channel = Channel::read_from(bytes).map_err(|e| StoreError::Corrupt {
        reason: e.to_string(),
    })?;

    let source_id = channel
        .categories
        .first()
        .map(|c| c.name.clone())
        .ok_or_else(|| corrupt("channel has no source id category"))?;

    let generated_at = channel
        .last_build_date
        .as_deref()
        .ok_or_else(|| corrupt("channel has no lastBuildDate"))
        .and_then(parse_rfc2822)?;

    let mut items = Vec::with_capacity(channel.items.len());
    let mut seen_guids = std::collections::HashSet::new();
    for item in &channel.items {
        let guid = item
            .guid
            .as_ref()
            .map(|g| g.value.clone())
            .ok_or_else(|| corrupt("item has no guid"))?;
        if !seen_guids.insert(guid.clone()) {
            return Err(StoreError::Corrupt {
                reason: format!("duplicate item guid '{}'", guid),
            });
        }
        let title = item
            .title
            .clone()
            .ok_or_else(|| corrupt("item has no title"))?;
        let link = item
            .link
            .clone()
            .ok_or_else(|| corrupt("item has no link"))?;
        let published_at = item
            .pub_date
            .as_deref()
            .ok_or_else(|| corrupt("item has no pubDate"))
            .and_then(parse_rfc2822)?;

        items.push(Item {
            guid,
            title,
            link,
            published_at,
            summary: item.description.clone().unwrap_or_default(),
        });
    }

    Ok(Feed {
        source_id,
        title: channel.title,
        link: channel.link,
        description: channel.description,
        items,
        generated_at,
    })
}

fn corrupt(reason: &str) -> StoreError {
    StoreError::Corrupt {
        reason: reason.to_string(),
    }
}

fn parse_rfc2822(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc2822(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            reason: format!("bad date '{}': {}", s, e),
        })
}
