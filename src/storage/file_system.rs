//! Filesystem-backed note storage: one UTF-8 `.md` file per note in a flat
//! directory.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::storage::{title_from_key, NoteStorage, MARKDOWN_EXT};

pub struct FileSystemStorage {
    root: PathBuf,
}

impl FileSystemStorage {
    /// Opens the storage rooted at an existing directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::Config(format!(
                "'{}' is not a valid directory",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn map_io(key: &str, err: io::Error) -> Error {
        match err.kind() {
            io::ErrorKind::NotFound => Error::NotFound(title_from_key(key).to_string()),
            io::ErrorKind::AlreadyExists => Error::AlreadyExists(title_from_key(key).to_string()),
            _ => Error::Io(err),
        }
    }
}

impl NoteStorage for FileSystemStorage {
    fn read(&self, key: &str) -> Result<String> {
        log::debug!("reading from '{}'", key);
        fs::read_to_string(self.path_for(key)).map_err(|e| Self::map_io(key, e))
    }

    fn write(&self, key: &str, content: &str, exclusive: bool) -> Result<()> {
        log::debug!("writing to '{}'", key);
        let path = self.path_for(key);
        let mut file = if exclusive {
            OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .map_err(|e| Self::map_io(key, e))?
        } else {
            // Overwrite must not create: updating a deleted note is an error.
            OpenOptions::new()
                .write(true)
                .truncate(true)
                .open(&path)
                .map_err(|e| Self::map_io(key, e))?
        };
        file.write_all(content.as_bytes())
            .map_err(|e| Self::map_io(key, e))?;
        Ok(())
    }

    fn rename(&self, key: &str, new_key: &str) -> Result<()> {
        fs::rename(self.path_for(key), self.path_for(new_key))
            .map_err(|e| Self::map_io(key, e))
    }

    fn remove(&self, key: &str) -> Result<()> {
        fs::remove_file(self.path_for(key)).map_err(|e| Self::map_io(key, e))
    }

    fn modified_time(&self, key: &str) -> Result<DateTime<Utc>> {
        let metadata = fs::metadata(self.path_for(key)).map_err(|e| Self::map_io(key, e))?;
        let modified = metadata.modified().map_err(|e| Self::map_io(key, e))?;
        Ok(DateTime::<Utc>::from(modified))
    }

    fn list_keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.ends_with(MARKDOWN_EXT) {
                keys.push(name.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn exclusive_write_rejects_existing_key() {
        let dir = TempDir::new().unwrap();
        let storage = FileSystemStorage::new(dir.path()).unwrap();

        storage.write("A.md", "first", true).unwrap();
        let err = storage.write("A.md", "second", true).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(title) if title == "A"));
    }

    #[test]
    fn overwrite_requires_existing_key() {
        let dir = TempDir::new().unwrap();
        let storage = FileSystemStorage::new(dir.path()).unwrap();

        let err = storage.write("Missing.md", "text", false).unwrap_err();
        assert!(matches!(err, Error::NotFound(title) if title == "Missing"));
    }

    #[test]
    fn list_keys_only_returns_markdown_files() {
        let dir = TempDir::new().unwrap();
        let storage = FileSystemStorage::new(dir.path()).unwrap();

        storage.write("B.md", "", true).unwrap();
        storage.write("A.md", "", true).unwrap();
        std::fs::write(dir.path().join("ignore.txt"), "x").unwrap();
        std::fs::create_dir(dir.path().join("subdir")).unwrap();

        assert_eq!(storage.list_keys().unwrap(), vec!["A.md", "B.md"]);
    }

    #[test]
    fn missing_root_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let result = FileSystemStorage::new(dir.path().join("nope"));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
