//! Reconciliation between the index and the note storage.
//!
//! There is no change journal and no file watcher: a sync pass walks both
//! the index and storage, compares modification timestamps, and rewrites
//! whatever disagrees. A note whose content changes without its timestamp
//! changing is not picked up.

use std::collections::HashSet;
use std::thread;

use rayon::prelude::*;

use crate::config::RetryPolicy;
use crate::error::{Error, Result};
use crate::search::{IndexedNote, SearchIndex, WriteBatch};
use crate::storage::{title_from_key, NoteStorage};
use crate::tags;

/// Mutations issued by one sync pass. A pass over unchanged storage
/// reports zeros across the board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        *self == SyncReport::default()
    }
}

/// Outcome of a retried sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Synced(SyncReport),
    /// Retries were exhausted on lock contention; searches keep serving the
    /// previously committed index state.
    Degraded,
}

/// Reconciles the index against current storage state.
///
/// Holds borrowed handles only; the index and storage are owned and
/// injected by the caller.
pub struct Synchronizer<'a> {
    index: &'a SearchIndex,
    storage: &'a dyn NoteStorage,
    retry: RetryPolicy,
}

impl<'a> Synchronizer<'a> {
    pub fn new(index: &'a SearchIndex, storage: &'a dyn NoteStorage, retry: RetryPolicy) -> Self {
        Self {
            index,
            storage,
            retry,
        }
    }

    /// Runs one full reconciliation pass and commits it.
    ///
    /// With `clean` set the index is cleared first and rebuilt from storage
    /// wholesale; the stale enumeration is not consulted, otherwise notes
    /// with unchanged timestamps would be missing from the rebuilt index.
    ///
    /// Fails fast with [`Error::IndexLocked`] when another writer holds the
    /// index; use [`Self::sync_with_retry`] on paths that should tolerate
    /// contention.
    pub fn sync(&self, clean: bool, optimize: bool) -> Result<SyncReport> {
        let mut batch = self.index.begin_write()?;
        let mut report = SyncReport::default();
        let mut current: HashSet<String> = HashSet::new();

        if clean {
            batch.clear()?;
        } else {
            for (key, indexed_at) in self.index.stored_entries()? {
                match self.storage.modified_time(&key) {
                    // Delete missing
                    Err(Error::NotFound(_)) => {
                        batch.delete(&key);
                        report.removed += 1;
                        log::info!("'{}' removed from index", key);
                    }
                    // Update modified
                    Ok(modified)
                        if modified.timestamp_micros() != indexed_at.timestamp_micros() =>
                    {
                        match self.load(&key) {
                            Ok(note) => {
                                batch.upsert(&note)?;
                                current.insert(key.clone());
                                report.updated += 1;
                                log::info!("'{}' updated", key);
                            }
                            Err(Error::NotFound(_)) => {
                                batch.delete(&key);
                                report.removed += 1;
                                log::info!("'{}' removed from index", key);
                            }
                            Err(other) => return Err(other),
                        }
                    }
                    // Ignore already indexed
                    Ok(_) => {
                        current.insert(key);
                    }
                    Err(other) => return Err(other),
                }
            }
        }

        report.added += self.add_missing(&mut batch, &current)?;

        self.index.commit(batch, optimize)?;
        log::info!(
            "index synchronized ({} added, {} updated, {} removed)",
            report.added,
            report.updated,
            report.removed
        );
        Ok(report)
    }

    /// Indexes every note in storage that is not already current. Reading
    /// and tag extraction run in parallel, writes go through the single
    /// batch sequentially.
    fn add_missing(&self, batch: &mut WriteBatch<'_>, current: &HashSet<String>) -> Result<usize> {
        let missing: Vec<String> = self
            .storage
            .list_keys()?
            .into_iter()
            .filter(|key| !current.contains(key))
            .collect();

        let loaded: Vec<Result<IndexedNote>> =
            missing.par_iter().map(|key| self.load(key)).collect();

        let mut added = 0;
        for result in loaded {
            match result {
                Ok(note) => {
                    log::info!("'{}' added to index", note.key);
                    batch.upsert(&note)?;
                    added += 1;
                }
                // Deleted between the listing and the read; the next pass
                // settles it.
                Err(Error::NotFound(title)) => {
                    log::warn!("'{}' vanished during sync", title);
                }
                Err(other) => return Err(other),
            }
        }
        Ok(added)
    }

    fn load(&self, key: &str) -> Result<IndexedNote> {
        let raw = self.storage.read(key)?;
        let last_modified = self.storage.modified_time(key)?;
        let (content, tag_set) = tags::extract(&raw);
        Ok(IndexedNote {
            key: key.to_string(),
            title: title_from_key(key).to_string(),
            last_modified,
            content,
            tags: tag_set,
        })
    }

    /// Runs [`Self::sync`], retrying lock contention with a fixed delay.
    ///
    /// Exhausting the retries is not an error to the caller: the failure is
    /// logged and the index stays at its last committed state.
    pub fn sync_with_retry(&self, clean: bool, optimize: bool) -> Result<SyncStatus> {
        for _ in 0..self.retry.max_attempts {
            match self.sync(clean, optimize) {
                Ok(report) => return Ok(SyncStatus::Synced(report)),
                Err(err) if err.is_lock_contention() => {
                    log::warn!("index locked, retrying in {:?}", self.retry.delay);
                    thread::sleep(self.retry.delay);
                }
                Err(other) => return Err(other),
            }
        }
        log::error!(
            "failed to sync index after {} retries",
            self.retry.max_attempts
        );
        Ok(SyncStatus::Degraded)
    }
}
