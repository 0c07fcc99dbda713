use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Default lifetime of a cached response.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Storage for successful response bodies.
pub trait ResponseCache: Send + Sync {
    /// Returns the cached body for `key` if it has not expired.
    fn get(&self, key: &str) -> Option<String>;
    fn put(&self, key: &str, body: &str);
    /// Persists pending entries. Called after each paged fetch.
    fn flush(&self) {}
}

impl<T: ResponseCache + ?Sized> ResponseCache for Arc<T> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn put(&self, key: &str, body: &str) {
        (**self).put(key, body)
    }

    fn flush(&self) {
        (**self).flush()
    }
}

impl<T: ResponseCache + ?Sized> ResponseCache for Box<T> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn put(&self, key: &str, body: &str) {
        (**self).put(key, body)
    }

    fn flush(&self) {
        (**self).flush()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    body: String,
    stored_at_ms: u64,
}

impl CacheEntry {
    fn is_fresh(&self, ttl: Duration, now_ms: u64) -> bool {
        u128::from(now_ms.saturating_sub(self.stored_at_ms)) < ttl.as_millis()
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Disables caching.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

impl ResponseCache for NoCache {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }

    fn put(&self, _key: &str, _body: &str) {}
}

/// In-process cache; contents are lost when the client is dropped.
#[derive(Debug)]
pub struct MemoryCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl MemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResponseCache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().ok()?;
        let now = now_ms();
        match entries.get(key) {
            Some(entry) if entry.is_fresh(self.ttl, now) => Some(entry.body.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn put(&self, key: &str, body: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                key.to_string(),
                CacheEntry {
                    body: body.to_string(),
                    stored_at_ms: now_ms(),
                },
            );
        }
    }
}

/// JSON file cache that survives process restarts.
///
/// Inserts are held in memory until [`ResponseCache::flush`] or drop, which
/// replace the file through a rename so a reader never sees a partial write.
/// Expired entries are dropped when the file is loaded and when they are
/// looked up.
#[derive(Debug)]
pub struct DiskCache {
    path: PathBuf,
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
    dirty: AtomicBool,
}

impl DiskCache {
    /// `<user cache dir>/rentman/api_cache.json`
    pub fn default_location() -> Option<PathBuf> {
        dirs::cache_dir().map(|d| d.join("rentman").join("api_cache.json"))
    }

    /// Opens the cache at the default location.
    pub fn open_default() -> Result<Self> {
        let path = Self::default_location()
            .context("could not determine a cache directory for this platform")?;
        Self::open(path, DEFAULT_TTL)
    }

    pub fn open(path: impl Into<PathBuf>, ttl: Duration) -> Result<Self> {
        let path = path.into();
        let mut entries: HashMap<String, CacheEntry> = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read cache file {}", path.display()))?;
            match serde_json::from_str(&text) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!("discarding corrupt cache file {}: {}", path.display(), e);
                    HashMap::new()
                }
            }
        } else {
            HashMap::new()
        };

        let now = now_ms();
        entries.retain(|_, entry| entry.is_fresh(ttl, now));

        Ok(Self {
            path,
            ttl,
            entries: Mutex::new(entries),
            dirty: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self, entries: &HashMap<String, CacheEntry>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create directory {}", parent.display()))?;
            }
        }
        let text = serde_json::to_string(entries).context("failed to encode cache")?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, text)
            .with_context(|| format!("failed to write cache file {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to replace cache file {}", self.path.display()))
    }
}

impl ResponseCache for DiskCache {
    fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().ok()?;
        let now = now_ms();
        match entries.get(key) {
            Some(entry) if entry.is_fresh(self.ttl, now) => Some(entry.body.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn put(&self, key: &str, body: &str) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        entries.insert(
            key.to_string(),
            CacheEntry {
                body: body.to_string(),
                stored_at_ms: now_ms(),
            },
        );
        self.dirty.store(true, Ordering::Release);
    }

    fn flush(&self) {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return;
        }
        let Ok(entries) = self.entries.lock() else {
            return;
        };
        if let Err(e) = self.save(&entries) {
            self.dirty.store(true, Ordering::Release);
            tracing::warn!("{:#}", e);
        }
    }
}

impl Drop for DiskCache {
    fn drop(&mut self) {
        self.flush();
    }
}
