//! Persistent key/value areas backing the local store.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::error::{StoreError, StoreResult};

/// Same-device string storage, one value per key.
pub trait KeyValueArea: Send + Sync {
    /// Value under `key`, `None` when absent.
    fn get_item(&self, key: &str) -> StoreResult<Option<String>>;

    /// Overwrite the value under `key`.
    fn set_item(&self, key: &str, value: &str) -> StoreResult<()>;

    fn remove_item(&self, key: &str) -> StoreResult<()>;
}

/// Directory-backed area: one `<key>.json` file per key.
#[derive(Debug, Clone)]
pub struct FileArea {
    dir: PathBuf,
}

impl FileArea {
    /// Open an area rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> StoreResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StoreError::StorageUnavailable(format!(
                "invalid storage key: {key:?}"
            )));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KeyValueArea for FileArea {
    fn get_item(&self, key: &str) -> StoreResult<Option<String>> {
        match std::fs::read_to_string(self.path_for(key)?) {
            Ok(raw) => Ok(Some(raw)),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> StoreResult<()> {
        let path = self.path_for(key)?;
        let temp_path = self.dir.join(format!(".{key}.json.tmp"));
        std::fs::write(&temp_path, value)?;
        std::fs::rename(&temp_path, &path)?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> StoreResult<()> {
        match std::fs::remove_file(self.path_for(key)?) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }
}

/// In-process area, used by tests and ephemeral sessions.
///
/// [`MemoryArea::deny_writes`] makes every write fail the way a full or
/// disabled browser storage does.
#[derive(Debug, Default)]
pub struct MemoryArea {
    items: Mutex<HashMap<String, String>>,
    writes_denied: AtomicBool,
}

impl MemoryArea {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deny_writes(&self, denied: bool) {
        self.writes_denied.store(denied, Ordering::SeqCst);
    }

    fn check_writable(&self) -> StoreResult<()> {
        if self.writes_denied.load(Ordering::SeqCst) {
            Err(StoreError::StorageUnavailable(
                "storage quota exceeded".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    fn items(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueArea for MemoryArea {
    fn get_item(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.items().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> StoreResult<()> {
        self.check_writable()?;
        self.items().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> StoreResult<()> {
        self.check_writable()?;
        self.items().remove(key);
        Ok(())
    }
}
