//! Persistent key-value storage behind the tracker.
//!
//! The tracker never owns durability: it is handed a `UsageStore` by the
//! host. Two implementations ship with the crate:
//! - `MemoryStore` - shared in-memory map, the test fake and the fallback
//!   for hosts without durable storage
//! - `FileStore` - single JSON file under the user's home directory, the
//!   desktop-host equivalent of the browser's origin-scoped storage

use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

const STORE_DIR: &str = ".trimtools";
const STORE_FILENAME: &str = "usage_store.json";

/// Synchronous string key-value store.
///
/// Matches the durability profile of browser local storage: persistent
/// across restarts within one profile, not shared across machines, and
/// capacity-bounded, so every operation can fail.
pub trait UsageStore {
    /// Returns the stored value for `key`, or `None` if absent.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removes `key` if present.
    fn remove(&self, key: &str) -> Result<()>;
}

struct MemoryStoreInner {
    entries: Mutex<HashMap<String, String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

/// In-memory store. Clones share the same underlying map, so a test can
/// keep a handle to inspect or corrupt state after handing the store to a
/// tracker.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryStoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryStoreInner {
                entries: Mutex::new(HashMap::new()),
                fail_reads: AtomicBool::new(false),
                fail_writes: AtomicBool::new(false),
            }),
        }
    }

    /// Makes every subsequent `get` fail, simulating an unavailable store.
    pub fn set_fail_reads(&self, fail: bool) {
        self.inner.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent `set`/`remove` fail, simulating a full store.
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.inner
            .entries
            .lock()
            .map(|entries| entries.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl UsageStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        if self.inner.fail_reads.load(Ordering::SeqCst) {
            return Err(anyhow!("store unavailable (simulated read failure)"));
        }
        let entries = self
            .inner
            .entries
            .lock()
            .map_err(|_| anyhow!("store mutex poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(anyhow!("store quota exceeded (simulated write failure)"));
        }
        let mut entries = self
            .inner
            .entries
            .lock()
            .map_err(|_| anyhow!("store mutex poisoned"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(anyhow!("store quota exceeded (simulated write failure)"));
        }
        let mut entries = self
            .inner
            .entries
            .lock()
            .map_err(|_| anyhow!("store mutex poisoned"))?;
        entries.remove(key);
        Ok(())
    }
}

/// Durable store persisting the whole key-value map to one JSON file,
/// write-through on every mutation.
///
/// A missing file starts the store empty. A corrupt file is discarded with
/// a warning and replaced on the next write, matching the tracker's
/// treatment of malformed individual records.
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Opens (or starts) a store at the given path.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read usage store at {}", path.display()))?;
            match serde_json::from_str(&content) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(
                        "Discarding corrupt usage store at {}: {}",
                        path.display(),
                        e
                    );
                    HashMap::new()
                }
            }
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Opens the store at its default location, `~/.trimtools/usage_store.json`,
    /// creating the directory if needed.
    pub fn open_default() -> Result<Self> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        let dir = home.join(STORE_DIR);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        Self::open(dir.join(STORE_FILENAME))
    }

    /// Path backing this store.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self, entries: &HashMap<String, String>) -> Result<()> {
        let content =
            serde_json::to_string_pretty(entries).context("Failed to serialize usage store")?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write usage store at {}", self.path.display()))
    }
}

impl UsageStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("store mutex poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("store mutex poisoned"))?;
        entries.insert(key.to_string(), value.to_string());
        self.save(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("store mutex poisoned"))?;
        entries.remove(key);
        self.save(&entries)
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
