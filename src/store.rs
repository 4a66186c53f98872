use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

use crate::builder;
use crate::model::Feed;

#[derive(Debug, Error)]
pub enum StoreError {
    /// No feed file exists yet for this source; callers treat this as an
    /// empty feed on first run.
    #[error("feed file not found")]
    NotFound,
    /// The persisted feed could not be parsed back. Callers log this and
    /// rebuild the feed from scratch rather than crashing the run.
    #[error("persisted feed is corrupt: {reason}")]
    Corrupt { reason: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Reads and writes one RSS file per source under a feeds directory.
pub struct FeedStore {
    dir: PathBuf,
}

impl FeedStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn feed_path(&self, source_id: &str) -> PathBuf {
        self.dir.join(format!("{}.xml", source_id))
    }

    pub fn load(&self, source_id: &str) -> Result<Feed, StoreError> {
        let path = self.feed_path(source_id);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound)
            }
            Err(e) => return Err(StoreError::Io(e)),
        };
        let feed = builder::deserialize(&bytes)?;
        // save() derives its target path from the feed's source id, so a
        // document claiming a different id would redirect the next save
        // onto another source's file. Treat it as corrupt.
        if feed.source_id != source_id {
            return Err(StoreError::Corrupt {
                reason: format!(
                    "file claims source id '{}', expected '{}'",
                    feed.source_id, source_id
                ),
            });
        }
        Ok(feed)
    }

    /// Persist a feed, replacing any previous file atomically.
    ///
    /// The serialized document is written to a temporary file in the same
    /// directory and renamed over the destination, so a crash mid-write
    /// leaves the previous file intact. The temporary file is removed on
    /// every failure path (it is deleted when dropped).
    pub fn save(&self, feed: &Feed) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir)?;

        let bytes = builder::serialize(feed);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.feed_path(&feed.source_id))
            .map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
