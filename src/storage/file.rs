// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! File-backed storage.
//!
//! Each key is one `<key>.json` file inside the store directory. Writers take
//! an exclusive lock on a sibling `.lock` file, write a temp file and rename it
//! into place, so a crash never leaves a half-written value and two
//! `mindguard` processes never interleave writes. Readers take a shared lock.
//!
//! On Unix the store directory is owner-only (0700) and every file in it is
//! created 0600, since the session store holds raw key material.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;

use super::Storage;
use crate::error::StorageError;

/// Default timeout for acquiring file locks (5 seconds)
const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Retry interval when waiting for lock acquisition
const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(50);

const LOCK_FILE: &str = ".storage.lock";

#[cfg(unix)]
const DIR_MODE: u32 = 0o700;

#[cfg(unix)]
const FILE_MODE: u32 = 0o600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockMode {
    Shared,
    Exclusive,
}

/// A directory of JSON values.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
    lock_timeout: Duration,
}

impl FileStorage {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        create_private_dir(&dir).map_err(|source| StorageError::Io {
            key: dir.display().to_string(),
            source,
        })?;

        tracing::debug!("STORAGE_OPENED | dir={}", dir.display());

        Ok(Self {
            dir,
            lock_timeout: LOCK_TIMEOUT,
        })
    }

    /// Override the lock acquisition timeout.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Directory holding the values.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn value_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }

    /// Acquire the store lock, retrying until the timeout expires.
    ///
    /// The lock is released when the returned handle is dropped.
    fn acquire_lock(&self, key: &str, mode: LockMode) -> Result<File, StorageError> {
        let path = self.dir.join(LOCK_FILE);
        let io_err = |source| StorageError::Io {
            key: key.to_string(),
            source,
        };

        let mut options = OpenOptions::new();
        options.read(true).write(true).create(true).truncate(false);
        let lock_file = open_private(&mut options, &path).map_err(io_err)?;

        let start = Instant::now();

        loop {
            // Fully qualified so newer std inherent lock methods don't shadow fs2.
            let attempt = match mode {
                LockMode::Shared => FileExt::try_lock_shared(&lock_file),
                LockMode::Exclusive => FileExt::try_lock_exclusive(&lock_file),
            };

            match attempt {
                Ok(()) => return Ok(lock_file),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if start.elapsed() >= self.lock_timeout {
                        return Err(StorageError::LockTimeout(format!(
                            "{} after {:?}; another mindguard process may be writing",
                            path.display(),
                            self.lock_timeout
                        )));
                    }
                    thread::sleep(LOCK_RETRY_INTERVAL);
                }
                Err(e) => return Err(io_err(e)),
            }
        }
    }
}

/// Create `dir` (and parents) and restrict the leaf to its owner.
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::{DirBuilderExt, PermissionsExt};

        fs::DirBuilder::new().recursive(true).mode(DIR_MODE).create(dir)?;
        // An existing directory keeps its old mode otherwise.
        fs::set_permissions(dir, fs::Permissions::from_mode(DIR_MODE))
    }

    #[cfg(not(unix))]
    {
        fs::create_dir_all(dir)
    }
}

/// Open a file that only its owner can read.
fn open_private(options: &mut OpenOptions, path: &Path) -> std::io::Result<File> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

        let file = options.mode(FILE_MODE).open(path)?;
        // A file left over from an older run keeps its old mode otherwise.
        file.set_permissions(fs::Permissions::from_mode(FILE_MODE))?;
        Ok(file)
    }

    #[cfg(not(unix))]
    {
        options.open(path)
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.value_path(key)?;
        if !path.exists() {
            return Ok(None);
        }

        let _lock = self.acquire_lock(key, LockMode::Shared)?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            // Removed between the existence check and the lock
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.value_path(key)?;
        let io_err = |source| StorageError::Io {
            key: key.to_string(),
            source,
        };

        let _lock = self.acquire_lock(key, LockMode::Exclusive)?;

        let temp_path = path.with_extension("json.tmp");
        {
            let mut options = OpenOptions::new();
            options.write(true).create(true).truncate(true);
            let mut temp = open_private(&mut options, &temp_path).map_err(io_err)?;
            temp.write_all(value.as_bytes()).map_err(io_err)?;
            temp.sync_all().map_err(io_err)?;
        }
        fs::rename(&temp_path, &path).map_err(io_err)?;

        tracing::debug!("STORAGE_WRITE | key={} bytes={}", key, value.len());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let path = self.value_path(key)?;
        let _lock = self.acquire_lock(key, LockMode::Exclusive)?;

        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!("STORAGE_REMOVE | key={}", key);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempdir().unwrap();
        let store = FileStorage::open(dir.path()).unwrap();
        store.set_item("mindguard_session", r#"{"anon":true}"#).unwrap();

        let reopened = FileStorage::open(dir.path()).unwrap();
        assert_eq!(
            reopened.get_item("mindguard_session").unwrap().as_deref(),
            Some(r#"{"anon":true}"#)
        );
        assert!(dir.path().join("mindguard_session.json").exists());
        assert!(!dir.path().join("mindguard_session.json.tmp").exists());
    }

    #[test]
    fn test_remove_missing_key_is_ok() {
        let dir = tempdir().unwrap();
        let store = FileStorage::open(dir.path()).unwrap();
        store.remove_item("never_written").unwrap();
        assert!(store.get_item("never_written").unwrap().is_none());
    }

    #[test]
    fn test_rejects_path_like_keys() {
        let dir = tempdir().unwrap();
        let store = FileStorage::open(dir.path()).unwrap();
        assert!(matches!(
            store.set_item("../escape", "x"),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(store.get_item(""), Err(StorageError::InvalidKey(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let root = dir.path().join("session");
        fs::create_dir(&root).unwrap();
        fs::set_permissions(&root, fs::Permissions::from_mode(0o755)).unwrap();

        let store = FileStorage::open(&root).unwrap();
        store.set_item("mindguard_key_temp", r#"{"k":"00"}"#).unwrap();

        let mode = |p: &Path| fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&root), 0o700);
        assert_eq!(mode(&root.join("mindguard_key_temp.json")), 0o600);
        assert_eq!(mode(&root.join(LOCK_FILE)), 0o600);
    }

    #[test]
    fn test_creates_nested_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let store = FileStorage::open(&nested).unwrap();
        store.set_item("k", "v").unwrap();
        assert_eq!(store.dir(), nested.as_path());
    }
}
