// src/cache/mod.rs

//! On-disk object cache
//!
//! Values are serialized to JSON, one file per key, under
//! `<cache_dir>/<namespace>/<sha256(key)>.cache`. Each file carries the full
//! key and its write time, so a hash collision or a truncated write reads back
//! as a miss.
//!
//! Asynchronous pushes go onto an in-memory LIFO stack drained by a single
//! writer thread. `sync` inserts a barrier at the bottom of the stack and
//! waits for the writer to reach it.

mod fingerprint;
mod live;

pub use fingerprint::Fingerprint;

use crate::error::{Error, Result};
use chrono::Utc;
use crossbeam_channel::{RecvTimeoutError, Sender};
use live::LiveCache;
use parking_lot::{Condvar, Mutex};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// File suffix of cache entries
pub const CACHE_SUFFIX: &str = ".cache";

/// Namespace for keys that do not name one
pub const DEFAULT_NAMESPACE: &str = "misc";

/// How long `sync(false)` waits for the writer
const SYNC_TIMEOUT: Duration = Duration::from_secs(10);

/// A value the writer thread can serialize
trait Encode: Send {
    fn encode(&self, key: &str, written_at: i64) -> serde_json::Result<Vec<u8>>;
}

impl<T: Serialize + Send> Encode for T {
    fn encode(&self, key: &str, written_at: i64) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&EnvelopeRef {
            key,
            written_at,
            value: self,
        })
    }
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    key: &'a str,
    written_at: i64,
    value: &'a T,
}

#[derive(Deserialize)]
struct Envelope<T> {
    key: String,
    written_at: i64,
    value: T,
}

enum Job {
    Write {
        key: String,
        written_at: i64,
        value: Box<dyn Encode>,
    },
    Barrier(Sender<()>),
}

struct Shared {
    dir: PathBuf,
    stack: Mutex<Vec<Job>>,
    ready: Condvar,
    alive: AtomicBool,
}

/// Fingerprint-keyed, write-behind object cache
pub struct ObjectCache {
    shared: Arc<Shared>,
    live: Mutex<LiveCache>,
    buffer_capacity: usize,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl ObjectCache {
    /// Create a cache rooted at `dir` and start its writer thread
    ///
    /// `live_capacity` bounds the in-process cache (zero disables it);
    /// `buffer_capacity` bounds the asynchronous write stack.
    pub fn new(dir: impl Into<PathBuf>, live_capacity: usize, buffer_capacity: usize) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let shared = Arc::new(Shared {
            dir,
            stack: Mutex::new(Vec::new()),
            ready: Condvar::new(),
            alive: AtomicBool::new(true),
        });

        let for_thread = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name("entropy-cache-writer".to_string())
            .spawn(move || writer_loop(for_thread))?;

        debug!("Object cache started at {}", shared.dir.display());

        Ok(Self {
            shared,
            live: Mutex::new(LiveCache::new(live_capacity)),
            buffer_capacity: buffer_capacity.max(1),
            writer: Mutex::new(Some(handle)),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.shared.dir
    }

    /// Store `value` under `key`
    ///
    /// The cache takes ownership, so later changes made by the caller to its
    /// own copies are never observed. With `asynchronous` set the write is
    /// queued for the writer thread; it falls back to a synchronous write when
    /// the queue is full or the writer has stopped.
    pub fn push<T>(&self, key: &str, value: T, asynchronous: bool) -> Result<()>
    where
        T: Serialize + Clone + Send + Sync + 'static,
    {
        let written_at = Utc::now().timestamp();
        self.live.lock().put(key, written_at, Arc::new(value.clone()));

        if asynchronous && self.shared.alive.load(Ordering::Acquire) {
            let mut stack = self.shared.stack.lock();
            if stack.len() < self.buffer_capacity {
                stack.push(Job::Write {
                    key: key.to_string(),
                    written_at,
                    value: Box::new(value),
                });
                self.shared.ready.notify_one();
                return Ok(());
            }
            debug!("Cache write buffer full, writing {} synchronously", key);
        }

        write_entry(&self.shared.dir, key, written_at, &value)
    }

    /// Load the value stored under `key`
    ///
    /// Missing, unreadable or corrupt entries are all misses.
    pub fn pop<T>(&self, key: &str) -> Option<T>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        self.load(key).map(|(_, value)| value)
    }

    /// Like [`pop`](Self::pop), but entries older than `max_age` are misses
    pub fn pop_aged<T>(&self, key: &str, max_age: Duration) -> Option<T>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        let (written_at, value) = self.load(key)?;
        let age = Utc::now().timestamp().saturating_sub(written_at);
        if age < 0 || age as u64 > max_age.as_secs() {
            debug!("Cache entry {} is {}s old, ignoring", key, age);
            return None;
        }
        Some(value)
    }

    fn load<T>(&self, key: &str) -> Option<(i64, T)>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        if let Some(hit) = self.live.lock().get::<T>(key) {
            return Some(hit);
        }

        let path = entry_path(&self.shared.dir, key);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    debug!("Cannot read cache entry {}: {}", path.display(), e);
                }
                return None;
            }
        };

        let envelope: Envelope<T> = match serde_json::from_slice(&bytes) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!("Corrupt cache entry {}: {}", path.display(), e);
                return None;
            }
        };
        if envelope.key != key {
            return None;
        }

        self.live
            .lock()
            .put(key, envelope.written_at, Arc::new(envelope.value.clone()));
        Some((envelope.written_at, envelope.value))
    }

    /// Wait for queued writes to reach the disk
    ///
    /// With `wait` unset the wait is bounded. Returns whether the queue was
    /// drained.
    pub fn sync(&self, wait: bool) -> bool {
        if !self.shared.alive.load(Ordering::Acquire) {
            return self.shared.stack.lock().is_empty();
        }

        let (tx, rx) = crossbeam_channel::bounded(1);
        {
            let mut stack = self.shared.stack.lock();
            stack.insert(0, Job::Barrier(tx));
            self.shared.ready.notify_one();
        }

        if wait {
            rx.recv().is_ok()
        } else {
            match rx.recv_timeout(SYNC_TIMEOUT) {
                Ok(()) => true,
                Err(RecvTimeoutError::Timeout) => {
                    warn!("Cache writer did not drain within {:?}", SYNC_TIMEOUT);
                    false
                }
                Err(RecvTimeoutError::Disconnected) => false,
            }
        }
    }

    /// Drop queued writes that have not reached the disk
    pub fn discard(&self) {
        let mut stack = self.shared.stack.lock();
        let before = stack.len();
        stack.retain(|job| matches!(job, Job::Barrier(_)));
        debug!("Discarded {} queued cache write(s)", before - stack.len());
    }

    /// Remove every entry in every namespace
    pub fn clear_all(&self) -> Result<()> {
        self.discard();
        self.live.lock().clear();

        let mut removed = 0;
        for entry in walkdir::WalkDir::new(&self.shared.dir).follow_links(false) {
            let entry = entry.map_err(|e| Error::Io(e.into()))?;
            if entry.file_type().is_file()
                && entry.file_name().to_string_lossy().ends_with(CACHE_SUFFIX)
            {
                std::fs::remove_file(entry.path())?;
                removed += 1;
            }
        }

        info!("Removed {} cache entries from {}", removed, self.shared.dir.display());
        Ok(())
    }

    /// Remove every entry under `namespace`
    pub fn clear_namespace(&self, namespace: &str) -> Result<()> {
        {
            let prefix = format!("{}/", namespace);
            let mut stack = self.shared.stack.lock();
            stack.retain(|job| match job {
                Job::Write { key, .. } => !key.starts_with(&prefix),
                Job::Barrier(_) => true,
            });
        }
        self.live.lock().remove_namespace(namespace);

        let dir = self.shared.dir.join(namespace);
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => {
                debug!("Cleared cache namespace {}", namespace);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a single entry
    pub fn remove(&self, key: &str) -> Result<()> {
        self.live.lock().remove(key);
        match std::fs::remove_file(entry_path(&self.shared.dir, key)) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    /// Drain the write queue and join the writer thread
    ///
    /// Later pushes are written synchronously.
    pub fn stop(&self) {
        let Some(handle) = self.writer.lock().take() else {
            return;
        };

        {
            let _stack = self.shared.stack.lock();
            self.shared.alive.store(false, Ordering::Release);
            self.shared.ready.notify_all();
        }

        if handle.join().is_err() {
            warn!("Cache writer thread panicked");
        }
        debug!(
            "Object cache stopped ({} live entries)",
            self.live.lock().len()
        );
    }
}

impl Drop for ObjectCache {
    fn drop(&mut self) {
        self.stop();
    }
}

fn writer_loop(shared: Arc<Shared>) {
    loop {
        let job = {
            let mut stack = shared.stack.lock();
            loop {
                if let Some(job) = stack.pop() {
                    break Some(job);
                }
                if !shared.alive.load(Ordering::Acquire) {
                    break None;
                }
                shared.ready.wait(&mut stack);
            }
        };

        match job {
            Some(Job::Write {
                key,
                written_at,
                value,
            }) => {
                if let Err(e) = write_entry(&shared.dir, &key, written_at, value.as_ref()) {
                    warn!("Failed to write cache entry {}: {}", key, e);
                }
            }
            Some(Job::Barrier(done)) => {
                let _ = done.send(());
            }
            None => break,
        }
    }
    debug!("Cache writer thread exiting");
}

/// `<dir>/<namespace>/<sha256(key)>.cache`
fn entry_path(dir: &Path, key: &str) -> PathBuf {
    let namespace = match key.split_once('/') {
        Some((namespace, _)) if is_safe_component(namespace) => namespace,
        _ => DEFAULT_NAMESPACE,
    };
    dir.join(namespace)
        .join(format!("{}{}", Fingerprint::of(key), CACHE_SUFFIX))
}

fn is_safe_component(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

fn write_entry(dir: &Path, key: &str, written_at: i64, value: &dyn Encode) -> Result<()> {
    let path = entry_path(dir, key);
    let bytes = value.encode(key, written_at)?;

    let parent = path.parent().unwrap_or(dir);
    std::fs::create_dir_all(parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(&bytes)?;
    tmp.persist(&path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}
