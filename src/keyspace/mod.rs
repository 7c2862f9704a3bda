//! The keyspace: a single mutex-guarded map from key to value, plus the
//! TTL secondary index and the version tags WATCH relies on. All command
//! execution serializes through one lock (see the design notes on the
//! concurrency model) — there is no per-key locking to reason about.

mod hash_ops;
mod json_ops;
mod list_ops;
mod set_ops;
mod stream_ops;
mod string_ops;
mod vector_ops;
mod zset_ops;

pub use stream_ops::TrimSpec;
pub use zset_ops::{format_score_bytes, parse_score_bound};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;

use crate::clock::Clock;
use crate::error::{KvError, Result};
use crate::expiry::ExpiryIndex;
use crate::types::{KeyType, StreamId};
use crate::value::ValueObject;

#[derive(Debug, Clone)]
pub struct KeyEntry {
    pub value: ValueObject,
}

#[derive(Default)]
pub struct Inner {
    pub entries: HashMap<Vec<u8>, KeyEntry>,
    pub expiry: ExpiryIndex,
    /// Version counters, kept even after a key is deleted so a WATCH taken
    /// before a DEL still observes a change at EXEC time.
    pub versions: HashMap<Vec<u8>, u64>,
    /// Last-generated stream ID for a key whose stream was evicted while
    /// logically empty (see `keyspace::stream_ops::with_stream_mut`), so a
    /// later XADD on the same key keeps generating strictly increasing IDs
    /// even though the key itself was gone from `entries` in between.
    pub stream_tombstones: HashMap<Vec<u8>, StreamId>,
}

impl Inner {
    fn bump_version(&mut self, key: &[u8]) -> u64 {
        let v = self.versions.entry(key.to_vec()).or_insert(0);
        *v += 1;
        *v
    }

    pub fn version_of(&self, key: &[u8]) -> u64 {
        self.versions.get(key).copied().unwrap_or(0)
    }
}

pub struct Keyspace {
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
    /// Per-key condition variables for blocking reads (BLPOP/BRPOP/XREAD
    /// BLOCK). Looked up and cloned out from under `inner`'s lock before
    /// an `.await`, since `Notify` handles are cheap and `Send`.
    waiters: Mutex<HashMap<Vec<u8>, Arc<Notify>>>,
}

impl Keyspace {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            inner: Mutex::new(Inner::default()),
            waiters: Mutex::new(HashMap::new()),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("keyspace mutex poisoned")
    }

    pub fn version_of(&self, key: &[u8]) -> u64 {
        self.lock().version_of(key)
    }

    pub fn waiter_for(&self, key: &[u8]) -> Arc<Notify> {
        self.waiters
            .lock()
            .expect("waiters mutex poisoned")
            .entry(key.to_vec())
            .or_insert_with(|| Arc::new(Notify::new()))
            .clone()
    }

    fn notify_waiters(&self, key: &[u8]) {
        if let Some(n) = self.waiters.lock().expect("waiters mutex poisoned").get(key) {
            n.notify_waiters();
        }
    }

    /// Drop an expired key if its TTL has passed, recording the removal in
    /// the caller-visible sense (lazy expiration happens on every lookup).
    fn expire_if_due(inner: &mut Inner, key: &[u8], now_ms: i64) {
        if inner.expiry.is_expired(key, now_ms) {
            inner.entries.remove(key);
            inner.expiry.clear(key);
            inner.stream_tombstones.remove(key);
            inner.bump_version(key);
        }
    }

    fn get_entry<'a>(inner: &'a mut Inner, key: &[u8], now_ms: i64) -> Option<&'a KeyEntry> {
        Self::expire_if_due(inner, key, now_ms);
        inner.entries.get(key)
    }

    pub fn exists(&self, key: &[u8]) -> bool {
        let now = self.now_ms();
        let mut inner = self.lock();
        Self::get_entry(&mut inner, key, now).is_some()
    }

    pub fn key_type(&self, key: &[u8]) -> Option<KeyType> {
        let now = self.now_ms();
        let mut inner = self.lock();
        Self::get_entry(&mut inner, key, now).map(|e| e.value.kind())
    }

    /// Read-and-clone a value of the expected kind, or `WRONGTYPE` /
    /// `None` (missing).
    pub fn get_kind(&self, key: &[u8], kind: KeyType) -> Result<Option<ValueObject>> {
        let now = self.now_ms();
        let mut inner = self.lock();
        match Self::get_entry(&mut inner, key, now) {
            None => Ok(None),
            Some(e) if e.value.kind() == kind => Ok(Some(e.value.clone())),
            Some(_) => Err(KvError::WrongType),
        }
    }

    /// Remove `key` if it exists and is logically empty (per
    /// `ValueObject::is_logically_empty`). Called after mutating container
    /// kinds so empty collections don't linger as phantom keys.
    fn remove_if_empty(inner: &mut Inner, key: &[u8]) {
        let is_empty = inner
            .entries
            .get(key)
            .map(|e| e.value.is_logically_empty())
            .unwrap_or(false);
        if is_empty {
            inner.entries.remove(key);
            inner.expiry.clear(key);
        }
    }

    pub fn del(&self, keys: &[Vec<u8>]) -> i64 {
        let now = self.now_ms();
        let mut inner = self.lock();
        let mut removed = 0;
        for key in keys {
            Self::expire_if_due(&mut inner, key, now);
            if inner.entries.remove(key).is_some() {
                inner.expiry.clear(key);
                inner.stream_tombstones.remove(key);
                inner.bump_version(key);
                removed += 1;
            }
        }
        drop(inner);
        for key in keys {
            self.notify_waiters(key);
        }
        removed
    }

    pub fn unlink(&self, keys: &[Vec<u8>]) -> i64 {
        self.del(keys)
    }

    pub fn expire_at_ms(&self, key: &[u8], at_ms: i64) -> bool {
        let now = self.now_ms();
        let mut inner = self.lock();
        Self::expire_if_due(&mut inner, key, now);
        if !inner.entries.contains_key(key) {
            return false;
        }
        if at_ms <= now {
            inner.entries.remove(key);
            inner.expiry.clear(key);
            inner.stream_tombstones.remove(key);
            inner.bump_version(key);
            drop(inner);
            self.notify_waiters(key);
        } else {
            inner.expiry.set(key, at_ms);
            inner.bump_version(key);
        }
        true
    }

    pub fn persist(&self, key: &[u8]) -> bool {
        let now = self.now_ms();
        let mut inner = self.lock();
        if Self::get_entry(&mut inner, key, now).is_none() {
            return false;
        }
        if inner.expiry.get(key).is_some() {
            inner.expiry.clear(key);
            inner.bump_version(key);
            true
        } else {
            false
        }
    }

    /// Remaining TTL in ms, `None` if the key has no TTL, `Some(-2)`-style
    /// "missing" is signalled by the caller checking `exists` separately.
    pub fn ttl_ms(&self, key: &[u8]) -> Option<i64> {
        let now = self.now_ms();
        let mut inner = self.lock();
        Self::get_entry(&mut inner, key, now)?;
        inner.expiry.get(key).map(|at| (at - now).max(0))
    }

    pub fn keys_matching(&self, pattern: &str) -> Vec<Vec<u8>> {
        let now = self.now_ms();
        let mut inner = self.lock();
        let expired: Vec<Vec<u8>> = inner
            .entries
            .keys()
            .filter(|k| inner.expiry.is_expired(k, now))
            .cloned()
            .collect();
        for k in &expired {
            inner.entries.remove(k);
            inner.expiry.clear(k);
        }
        inner
            .entries
            .keys()
            .filter(|k| crate::pubsub::glob_match(pattern.as_bytes(), k))
            .cloned()
            .collect()
    }

    pub fn dbsize(&self) -> i64 {
        let now = self.now_ms();
        let mut inner = self.lock();
        let expired: Vec<Vec<u8>> = inner
            .entries
            .keys()
            .filter(|k| inner.expiry.is_expired(k, now))
            .cloned()
            .collect();
        for k in &expired {
            inner.entries.remove(k);
            inner.expiry.clear(k);
        }
        inner.entries.len() as i64
    }

    pub fn flush_all(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.expiry = ExpiryIndex::new();
        inner.stream_tombstones.clear();
    }

    pub fn rename(&self, src: &[u8], dst: &[u8]) -> Result<()> {
        let now = self.now_ms();
        let mut inner = self.lock();
        Self::expire_if_due(&mut inner, src, now);
        let Some(entry) = inner.entries.remove(src) else {
            return Err(KvError::NoSuchKey);
        };
        let ttl = inner.expiry.get(src);
        inner.expiry.clear(src);
        inner.expiry.clear(dst);
        if let Some(at) = ttl {
            inner.expiry.set(dst, at);
        }
        inner.entries.insert(dst.to_vec(), entry);
        inner.bump_version(src);
        inner.bump_version(dst);
        drop(inner);
        self.notify_waiters(dst);
        Ok(())
    }

    pub fn renamenx(&self, src: &[u8], dst: &[u8]) -> Result<bool> {
        let now = self.now_ms();
        {
            let mut inner = self.lock();
            Self::expire_if_due(&mut inner, dst, now);
            if inner.entries.contains_key(dst) {
                return Ok(false);
            }
        }
        self.rename(src, dst)?;
        Ok(true)
    }

    pub fn copy(&self, src: &[u8], dst: &[u8], replace: bool) -> Result<bool> {
        let now = self.now_ms();
        let mut inner = self.lock();
        Self::expire_if_due(&mut inner, src, now);
        Self::expire_if_due(&mut inner, dst, now);
        let Some(entry) = inner.entries.get(src).cloned() else {
            return Ok(false);
        };
        if !replace && inner.entries.contains_key(dst) {
            return Ok(false);
        }
        let ttl = inner.expiry.get(src);
        inner.entries.insert(dst.to_vec(), entry);
        inner.expiry.clear(dst);
        if let Some(at) = ttl {
            inner.expiry.set(dst, at);
        }
        inner.bump_version(dst);
        Ok(true)
    }

    pub fn random_key(&self) -> Option<Vec<u8>> {
        let now = self.now_ms();
        let mut inner = self.lock();
        let expired: Vec<Vec<u8>> = inner
            .entries
            .keys()
            .filter(|k| inner.expiry.is_expired(k, now))
            .cloned()
            .collect();
        for k in &expired {
            inner.entries.remove(k);
            inner.expiry.clear(k);
        }
        inner.entries.keys().next().cloned()
    }

    /// Bounded sweep tick: evict up to `limit` keys whose TTL has passed.
    /// Returns the number evicted.
    pub fn sweep_expired(&self, limit: usize) -> usize {
        let now = self.now_ms();
        let mut inner = self.lock();
        let due = inner.expiry.sample_expired(now, limit);
        for key in &due {
            inner.entries.remove(key);
            inner.expiry.clear(key);
            inner.stream_tombstones.remove(key);
            inner.bump_version(key);
        }
        drop(inner);
        for key in &due {
            self.notify_waiters(key);
        }
        due.len()
    }
}
