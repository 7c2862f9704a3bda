use crate::error::{KvError, Result};
use crate::types::{KeyType, SetOptions};
use crate::value::ValueObject;

use super::{KeyEntry, Keyspace};

fn parse_i64(bytes: &[u8]) -> Result<i64> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(KvError::NotInteger)
}

fn parse_f64(bytes: &[u8]) -> Result<f64> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|f| f.is_finite())
        .ok_or(KvError::NotFloat)
}

fn format_f64(f: f64) -> String {
    if f == f.trunc() && f.is_finite() {
        format!("{}", f as i64)
    } else {
        let mut s = format!("{:.17}", f);
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
        s
    }
}

impl Keyspace {
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.get_kind(key, KeyType::String)? {
            Some(ValueObject::String(v)) => Ok(Some(v)),
            Some(_) => unreachable!("get_kind already enforces kind"),
            None => Ok(None),
        }
    }

    /// `SET key value [options]`. Returns `true` if the write happened
    /// (always true unless an NX/XX precondition failed).
    pub fn set(&self, key: &[u8], value: Vec<u8>, opts: &SetOptions) -> bool {
        let now = self.now_ms();
        let mut inner = self.lock();
        Self::expire_if_due(&mut inner, key, now);
        let exists = inner.entries.contains_key(key);
        if opts.nx && exists {
            return false;
        }
        if opts.xx && !exists {
            return false;
        }
        inner.bump_version(key);
        inner.entries.insert(
            key.to_vec(),
            KeyEntry {
                value: ValueObject::String(value),
            },
        );
        inner.expiry.clear(key);
        if let Some(ttl) = opts.ttl {
            inner.expiry.set(key, now + ttl.as_millis() as i64);
        }
        drop(inner);
        self.notify_waiters(key);
        true
    }

    fn with_counter(&self, key: &[u8], f: impl FnOnce(i64) -> Result<i64>) -> Result<i64> {
        let now = self.now_ms();
        let mut inner = self.lock();
        Self::expire_if_due(&mut inner, key, now);
        let current = match inner.entries.get(key) {
            Some(e) => match &e.value {
                ValueObject::String(s) => parse_i64(s)?,
                _ => return Err(KvError::WrongType),
            },
            None => 0,
        };
        let updated = f(current)?;
        inner.bump_version(key);
        let ttl = inner.expiry.get(key);
        inner.entries.insert(
            key.to_vec(),
            KeyEntry {
                value: ValueObject::String(updated.to_string().into_bytes()),
            },
        );
        if ttl.is_none() {
            inner.expiry.clear(key);
        }
        Ok(updated)
    }

    pub fn incrby(&self, key: &[u8], delta: i64) -> Result<i64> {
        self.with_counter(key, |cur| cur.checked_add(delta).ok_or(KvError::NotInteger))
    }

    pub fn decrby(&self, key: &[u8], delta: i64) -> Result<i64> {
        self.with_counter(key, |cur| cur.checked_sub(delta).ok_or(KvError::NotInteger))
    }

    pub fn incrbyfloat(&self, key: &[u8], delta: f64) -> Result<f64> {
        let now = self.now_ms();
        let mut inner = self.lock();
        Self::expire_if_due(&mut inner, key, now);
        let current = match inner.entries.get(key) {
            Some(e) => match &e.value {
                ValueObject::String(s) => parse_f64(s)?,
                _ => return Err(KvError::WrongType),
            },
            None => 0.0,
        };
        let updated = current + delta;
        if !updated.is_finite() {
            return Err(KvError::NotFloat);
        }
        inner.bump_version(key);
        inner.entries.insert(
            key.to_vec(),
            KeyEntry {
                value: ValueObject::String(format_f64(updated).into_bytes()),
            },
        );
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TestClock;
    use std::sync::Arc;
    use std::time::Duration;

    fn ks() -> Keyspace {
        Keyspace::new(Arc::new(TestClock::default()))
    }

    #[test]
    fn set_and_get_roundtrip() {
        let ks = ks();
        assert!(ks.set(b"k", b"v".to_vec(), &SetOptions::new()));
        assert_eq!(ks.get(b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn nx_fails_when_present() {
        let ks = ks();
        ks.set(b"k", b"v".to_vec(), &SetOptions::new());
        assert!(!ks.set(b"k", b"v2".to_vec(), &SetOptions::new().nx()));
        assert_eq!(ks.get(b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn set_without_ttl_clears_previous_ttl() {
        let ks = ks();
        ks.set(b"k", b"v".to_vec(), &SetOptions { ttl: Some(Duration::from_secs(10)), ..Default::default() });
        assert!(ks.ttl_ms(b"k").is_some());
        ks.set(b"k", b"v2".to_vec(), &SetOptions::new());
        assert!(ks.ttl_ms(b"k").is_none());
    }

    #[test]
    fn incrby_overflow_errors_and_leaves_value_unchanged() {
        let ks = ks();
        ks.set(b"n", b"9223372036854775806".to_vec(), &SetOptions::new());
        assert_eq!(ks.incrby(b"n", 1).unwrap(), 9223372036854775807);
        assert!(ks.incrby(b"n", 1).is_err());
        assert_eq!(ks.get(b"n").unwrap(), Some(b"9223372036854775807".to_vec()));
    }

    #[test]
    fn incrbyfloat_formats_without_trailing_zeros() {
        let ks = ks();
        ks.set(b"f", b"10".to_vec(), &SetOptions::new());
        let v = ks.incrbyfloat(b"f", 0.1).unwrap();
        assert!((v - 10.1).abs() < 1e-9);
    }
}
