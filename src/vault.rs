//! The vault facade tying storage, index and synchronization together.

use std::path::Path;

use crate::config::{RetryPolicy, VaultConfig, DEFAULT_INDEX_DIR};
use crate::error::{Error, Result};
use crate::models::{Note, SearchResult, SortBy, SortOrder};
use crate::search::sync::{SyncStatus, Synchronizer};
use crate::search::SearchIndex;
use crate::storage::{key_from_title, FileSystemStorage, NoteStorage};

const FORBIDDEN_TITLE_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// A directory of notes with a synchronized full-text index.
///
/// Every read of the index (search, tag listing) is preceded by a
/// reconciliation pass, so callers never observe an index that is stale
/// relative to storage for longer than the pass itself. The pass is
/// retried on writer-lock contention and degrades to the last committed
/// state when the retries run out.
pub struct Vault {
    storage: Box<dyn NoteStorage>,
    index: SearchIndex,
    retry: RetryPolicy,
}

impl Vault {
    /// Opens a vault on the local filesystem and runs the startup sync
    /// (with index optimization).
    pub fn open(config: VaultConfig) -> Result<Self> {
        let storage = FileSystemStorage::new(&config.storage_dir)?;
        let index_dir = config
            .index_dir
            .clone()
            .unwrap_or_else(|| config.storage_dir.join(DEFAULT_INDEX_DIR));
        Self::with_storage(Box::new(storage), &index_dir, config.retry)
    }

    /// Opens a vault over any storage backend.
    pub fn with_storage(
        storage: Box<dyn NoteStorage>,
        index_dir: &Path,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let index = SearchIndex::open(index_dir)?;
        let vault = Self {
            storage,
            index,
            retry,
        };
        vault.synchronizer().sync_with_retry(false, true)?;
        Ok(vault)
    }

    fn synchronizer(&self) -> Synchronizer<'_> {
        Synchronizer::new(&self.index, self.storage.as_ref(), self.retry)
    }

    /// Creates a new note.
    pub fn create(&self, title: &str, content: &str) -> Result<Note> {
        let title = validate_title(title)?;
        let key = key_from_title(&title);
        self.storage.write(&key, content, true)?;
        Ok(Note {
            last_modified: self.storage.modified_time(&key)?,
            title,
            content: content.to_string(),
        })
    }

    /// Gets a specific note.
    pub fn get(&self, title: &str) -> Result<Note> {
        let title = validate_title(title)?;
        let key = key_from_title(&title);
        let content = self.storage.read(&key)?;
        Ok(Note {
            last_modified: self.storage.modified_time(&key)?,
            title,
            content,
        })
    }

    /// Updates a note's title and/or content.
    pub fn update(
        &self,
        title: &str,
        new_title: Option<&str>,
        new_content: Option<&str>,
    ) -> Result<Note> {
        let mut title = validate_title(title)?;
        let mut key = key_from_title(&title);

        if let Some(new_title) = new_title {
            let new_title = validate_title(new_title)?;
            let new_key = key_from_title(&new_title);
            if new_key != key {
                if self.storage.modified_time(&new_key).is_ok() {
                    return Err(Error::AlreadyExists(new_title));
                }
                self.storage.rename(&key, &new_key)?;
            }
            title = new_title;
            key = new_key;
        }

        let content = match new_content {
            Some(content) => {
                self.storage.write(&key, content, false)?;
                content.to_string()
            }
            None => self.storage.read(&key)?,
        };

        Ok(Note {
            last_modified: self.storage.modified_time(&key)?,
            title,
            content,
        })
    }

    /// Deletes a note.
    pub fn delete(&self, title: &str) -> Result<()> {
        let title = validate_title(title)?;
        self.storage.remove(&key_from_title(&title))
    }

    /// Searches the vault, returning ordered, highlighted results.
    ///
    /// The term supports quoted phrases, `#tag` shorthand, `field:` scoped
    /// terms, date expressions on `last_modified`, and `*` for "every
    /// note".
    pub fn search(
        &self,
        term: &str,
        sort: SortBy,
        order: SortOrder,
        limit: Option<usize>,
    ) -> Result<Vec<SearchResult>> {
        self.sync_before_read()?;
        let plan = self.index.build_query(term)?;
        self.index
            .search(&plan, sort, order, limit, self.storage.as_ref())
    }

    /// Lists all indexed tags.
    ///
    /// Tags of notes deleted or edited since the last optimizing commit may
    /// still show up until the index is next optimized.
    pub fn list_tags(&self) -> Result<Vec<String>> {
        self.sync_before_read()?;
        self.index.tag_terms()
    }

    /// Runs an explicit sync pass with retry; exposed for embedders that
    /// want to optimize on their own schedule.
    pub fn sync(&self, optimize: bool) -> Result<SyncStatus> {
        self.synchronizer().sync_with_retry(false, optimize)
    }

    fn sync_before_read(&self) -> Result<()> {
        // Degraded is fine here: a search against a stale-but-committed
        // index beats blocking on the lock.
        self.synchronizer().sync_with_retry(false, false)?;
        Ok(())
    }
}

fn validate_title(title: &str) -> Result<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() || trimmed.contains(FORBIDDEN_TITLE_CHARS) {
        return Err(Error::InvalidTitle(title.to_string()));
    }
    Ok(trimmed.to_string())
}
