//! Recency-bounded cache of file tails for descending reads that start at EOF.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lru::LruCache;

use crate::reader::{KeywordFilter, ScannedLine};

pub const DEFAULT_CACHE_CAPACITY: usize = 20;

/// The most recently fetched contiguous tail of one file, newest line first.
/// `cursor` is where a descending read continues past the cached lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    lines: Vec<ScannedLine>,
    cursor: u64,
}

impl CacheEntry {
    pub fn new(lines: Vec<ScannedLine>, cursor: u64) -> Self {
        Self { lines, cursor }
    }

    pub fn lines(&self) -> &[ScannedLine] {
        &self.lines
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// What a tail read took from the front of a cached entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CachedTail {
    /// Matching lines, newest first.
    pub lines: Vec<ScannedLine>,
    /// Cached lines the filter rejected on the way.
    pub filtered: usize,
    /// Cursor past the whole entry, or `None` when nothing was cached.
    pub resume: Option<u64>,
}

/// Shared tail cache. All access goes through [`TailCache::with_file`], which
/// serializes read-splice-update sequences per file while leaving other
/// files free to proceed.
pub struct TailCache {
    entries: Mutex<LruCache<PathBuf, CacheEntry>>,
    file_locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl Default for TailCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl TailCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            file_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries().cap().get()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Inspects an entry without touching its recency.
    pub fn peek(&self, path: &Path) -> Option<CacheEntry> {
        self.entries().peek(path).cloned()
    }

    /// Runs `f` inside the critical section for `path`.
    pub fn with_file<T>(&self, path: &Path, f: impl FnOnce(&mut FileSlot<'_>) -> T) -> T {
        let lock = self.file_lock(path);
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            let mut slot = FileSlot { cache: self, path };
            f(&mut slot)
        };
        self.release_file_lock(path, &lock);
        result
    }

    fn entries(&self) -> MutexGuard<'_, LruCache<PathBuf, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn file_lock(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.file_locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(path.to_path_buf()).or_default().clone()
    }

    fn release_file_lock(&self, path: &Path, lock: &Arc<Mutex<()>>) {
        let mut locks = self.file_locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Only the map and this caller hold it: nobody is waiting.
        if Arc::strong_count(lock) == 2 {
            locks.remove(path);
        }
    }
}

/// Access to one file's entry while its critical section is held.
pub struct FileSlot<'a> {
    cache: &'a TailCache,
    path: &'a Path,
}

impl FileSlot<'_> {
    /// Walks the entry newest first and copies out matching lines until
    /// `max_lines` are collected. Only the lines taken are cloned. The entry
    /// is promoted to most recently used.
    pub fn take_front(&mut self, max_lines: Option<usize>, filter: &KeywordFilter) -> CachedTail {
        let mut entries = self.cache.entries();
        let Some(entry) = entries.get(self.path) else {
            return CachedTail::default();
        };

        let mut tail = CachedTail {
            resume: Some(entry.cursor),
            ..CachedTail::default()
        };
        for line in &entry.lines {
            if max_lines.is_some_and(|max| tail.lines.len() >= max) {
                break;
            }
            if filter.matches(&line.text) {
                tail.lines.push(line.clone());
            } else {
                tail.filtered += 1;
            }
        }
        tail
    }

    /// Appends older lines to the entry (creating it when absent) and moves
    /// its cursor. Inserting into a full cache evicts the least recently used
    /// entry.
    pub fn extend(&mut self, lines: Vec<ScannedLine>, cursor: u64) {
        let mut entries = self.cache.entries();
        if let Some(entry) = entries.get_mut(self.path) {
            entry.lines.extend(lines);
            entry.cursor = cursor;
            return;
        }
        let entry = CacheEntry::new(lines, cursor);
        if let Some((evicted, _)) = entries.push(self.path.to_path_buf(), entry) {
            tracing::debug!(path = %evicted.display(), "tail cache evicted entry");
        }
    }
}
