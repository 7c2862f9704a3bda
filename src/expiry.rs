//! Secondary index from key to absolute expiry timestamp. All reads against
//! the keyspace consult this before serving a value (lazy expiration); a
//! periodic sweep also evicts in small bounded batches.

use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Default)]
pub struct ExpiryIndex {
    expires_at: HashMap<Vec<u8>, i64>,
    by_time: BTreeMap<i64, HashSet<Vec<u8>>>,
}

impl ExpiryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm or re-arm a key's expiry. Replaces any previous entry.
    pub fn set(&mut self, key: &[u8], expires_at_ms: i64) {
        self.clear(key);
        self.expires_at.insert(key.to_vec(), expires_at_ms);
        self.by_time.entry(expires_at_ms).or_default().insert(key.to_vec());
    }

    /// Remove any expiry entry for `key`. A no-op if none exists.
    pub fn clear(&mut self, key: &[u8]) {
        if let Some(old) = self.expires_at.remove(key) {
            if let Some(set) = self.by_time.get_mut(&old) {
                set.remove(key);
                if set.is_empty() {
                    self.by_time.remove(&old);
                }
            }
        }
    }

    pub fn get(&self, key: &[u8]) -> Option<i64> {
        self.expires_at.get(key).copied()
    }

    pub fn is_expired(&self, key: &[u8], now_ms: i64) -> bool {
        matches!(self.get(key), Some(at) if at <= now_ms)
    }

    pub fn len(&self) -> usize {
        self.expires_at.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expires_at.is_empty()
    }

    /// Return up to `limit` keys whose expiry is at or before `now_ms`,
    /// earliest first. Bounds a sweep tick's work regardless of how many
    /// keys carry a TTL.
    pub fn sample_expired(&self, now_ms: i64, limit: usize) -> Vec<Vec<u8>> {
        let mut out = Vec::with_capacity(limit);
        for (_, keys) in self.by_time.range(..=now_ms) {
            for k in keys {
                out.push(k.clone());
                if out.len() >= limit {
                    return out;
                }
            }
        }
        out
    }
}
