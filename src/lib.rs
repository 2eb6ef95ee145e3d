//! Flat-directory Markdown note vault with a persistent full-text index.
//!
//! Notes are plain UTF-8 `.md` files keyed by their title. A tantivy index
//! shadows the vault and is reconciled against it on startup and before
//! every search, so edits made outside the library show up without any
//! watcher machinery. Inline `#tags` are extracted from note bodies and
//! searchable both through the `#tag` shorthand and as a ranked field.

pub mod config;
pub mod error;
pub mod models;
pub mod search;
pub mod storage;
pub mod tags;
pub mod vault;

pub use config::{RetryPolicy, VaultConfig};
pub use error::{Error, Result};
pub use models::{Note, SearchResult, SortBy, SortOrder};
pub use vault::Vault;
