// src/cache/live.rs

//! In-process cache of recently pushed or loaded values

use lru::LruCache;
use std::any::Any;
use std::num::NonZeroUsize;
use std::sync::Arc;

struct LiveEntry {
    written_at: i64,
    value: Arc<dyn Any + Send + Sync>,
}

/// Bounded LRU of owned values, keyed like the disk cache
///
/// A capacity of zero disables it.
pub(crate) struct LiveCache {
    entries: Option<LruCache<String, LiveEntry>>,
}

impl LiveCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(LruCache::new),
        }
    }

    /// Clone out a value of type `T`; a value of another type is a miss
    pub fn get<T: Clone + 'static>(&mut self, key: &str) -> Option<(i64, T)> {
        let entry = self.entries.as_mut()?.get(key)?;
        let value = entry.value.downcast_ref::<T>()?;
        Some((entry.written_at, value.clone()))
    }

    pub fn put(&mut self, key: &str, written_at: i64, value: Arc<dyn Any + Send + Sync>) {
        if let Some(entries) = self.entries.as_mut() {
            entries.put(key.to_string(), LiveEntry { written_at, value });
        }
    }

    pub fn remove(&mut self, key: &str) {
        if let Some(entries) = self.entries.as_mut() {
            entries.pop(key);
        }
    }

    /// Drop every key under `namespace/`
    pub fn remove_namespace(&mut self, namespace: &str) {
        let Some(entries) = self.entries.as_mut() else {
            return;
        };
        let prefix = format!("{}/", namespace);
        let doomed: Vec<String> = entries
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .map(|(key, _)| key.clone())
            .collect();
        for key in doomed {
            entries.pop(&key);
        }
    }

    pub fn clear(&mut self) {
        if let Some(entries) = self.entries.as_mut() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, LruCache::len)
    }
}
