//! Note storage capability.
//!
//! The indexing core only needs a handful of keyed operations on note
//! files, expressed as the [`NoteStorage`] trait so alternate backends can
//! be dropped in without touching the index or sync logic.

pub mod file_system;

pub use file_system::FileSystemStorage;

use chrono::{DateTime, Utc};

use crate::error::Result;

/// File extension appended to a title to form its storage key.
pub const MARKDOWN_EXT: &str = ".md";

/// Keyed access to note files.
///
/// Keys are opaque to the index (`title + ".md"` for the filesystem
/// backend). Implementations report a missing key as
/// [`crate::Error::NotFound`] and an exclusive-write collision as
/// [`crate::Error::AlreadyExists`]; other I/O failures propagate untouched.
pub trait NoteStorage: Send + Sync {
    /// Reads the full content of a note.
    fn read(&self, key: &str) -> Result<String>;

    /// Writes `content` under `key`. With `exclusive` set the write fails
    /// if the key is already occupied; otherwise it overwrites an existing
    /// note and fails if there is none.
    fn write(&self, key: &str, content: &str, exclusive: bool) -> Result<()>;

    /// Moves a note to a new key.
    fn rename(&self, key: &str, new_key: &str) -> Result<()>;

    /// Deletes a note.
    fn remove(&self, key: &str) -> Result<()>;

    /// Last modification time of a note.
    fn modified_time(&self, key: &str) -> Result<DateTime<Utc>>;

    /// Every note key currently present in storage.
    fn list_keys(&self) -> Result<Vec<String>>;
}

/// Strips the markdown extension off a storage key, yielding the title.
pub fn title_from_key(key: &str) -> &str {
    key.strip_suffix(MARKDOWN_EXT).unwrap_or(key)
}

/// Builds the storage key for a title.
pub fn key_from_title(title: &str) -> String {
    format!("{}{}", title, MARKDOWN_EXT)
}
