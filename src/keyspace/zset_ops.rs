use crate::error::{KvError, Result};
use crate::types::KeyType;
use crate::value::{SortedSet, ValueObject};

use super::{KeyEntry, Keyspace};

/// Parse a ZRANGEBYSCORE-style bound: `-inf`, `+inf`, or a float, optionally
/// prefixed with `(` for exclusive.
pub fn parse_score_bound(s: &str) -> Result<(f64, bool)> {
    let (excl, rest) = match s.strip_prefix('(') {
        Some(r) => (true, r),
        None => (false, s),
    };
    let value = match rest {
        "-inf" => f64::NEG_INFINITY,
        "+inf" | "inf" => f64::INFINITY,
        other => other.parse::<f64>().map_err(|_| KvError::NotFloat)?,
    };
    Ok((value, excl))
}

fn format_score(s: f64) -> String {
    if s.is_infinite() {
        if s > 0.0 { "inf".to_string() } else { "-inf".to_string() }
    } else if s == s.trunc() {
        format!("{}", s as i64)
    } else {
        let mut out = format!("{:.17}", s);
        while out.ends_with('0') {
            out.pop();
        }
        if out.ends_with('.') {
            out.pop();
        }
        out
    }
}

pub fn format_score_bytes(s: f64) -> Vec<u8> {
    format_score(s).into_bytes()
}

impl Keyspace {
    fn with_zset_mut<T>(
        &self,
        key: &[u8],
        default_if_missing: bool,
        f: impl FnOnce(&mut SortedSet) -> Result<T>,
    ) -> Result<T> {
        let now = self.now_ms();
        let mut inner = self.lock();
        Self::expire_if_due(&mut inner, key, now);
        if !inner.entries.contains_key(key) {
            if !default_if_missing {
                return f(&mut SortedSet::default());
            }
            inner.bump_version(key);
            inner.entries.insert(
                key.to_vec(),
                KeyEntry {
                    value: ValueObject::SortedSet(SortedSet::default()),
                },
            );
        }
        let entry = inner.entries.get_mut(key).expect("just inserted or present");
        let ValueObject::SortedSet(zset) = &mut entry.value else {
            return Err(KvError::WrongType);
        };
        let result = f(zset)?;
        inner.bump_version(key);
        Self::remove_if_empty(&mut inner, key);
        Ok(result)
    }

    fn read_zset(&self, key: &[u8]) -> Result<SortedSet> {
        match self.get_kind(key, KeyType::ZSet)? {
            Some(ValueObject::SortedSet(z)) => Ok(z),
            Some(_) => unreachable!(),
            None => Ok(SortedSet::default()),
        }
    }

    pub fn zadd(&self, key: &[u8], pairs: Vec<(f64, Vec<u8>)>) -> Result<i64> {
        self.with_zset_mut(key, true, |zset| {
            let mut added = 0;
            for (score, member) in pairs {
                if zset.insert(member, score) {
                    added += 1;
                }
            }
            Ok(added)
        })
    }

    pub fn zincrby(&self, key: &[u8], delta: f64, member: Vec<u8>) -> Result<f64> {
        self.with_zset_mut(key, true, |zset| {
            let current = zset.score(&member).unwrap_or(0.0);
            let updated = current + delta;
            if !updated.is_finite() {
                return Err(KvError::NotFloat);
            }
            zset.insert(member, updated);
            Ok(updated)
        })
    }

    pub fn zrem(&self, key: &[u8], members: &[Vec<u8>]) -> Result<i64> {
        self.with_zset_mut(key, false, |zset| {
            let mut removed = 0;
            for m in members {
                if zset.remove(m) {
                    removed += 1;
                }
            }
            Ok(removed)
        })
    }

    pub fn zscore(&self, key: &[u8], member: &[u8]) -> Result<Option<f64>> {
        Ok(self.read_zset(key)?.score(member))
    }

    pub fn zcard(&self, key: &[u8]) -> Result<i64> {
        Ok(self.read_zset(key)?.len() as i64)
    }

    pub fn zrank(&self, key: &[u8], member: &[u8]) -> Result<Option<usize>> {
        Ok(self.read_zset(key)?.rank(member))
    }

    pub fn zrevrank(&self, key: &[u8], member: &[u8]) -> Result<Option<usize>> {
        let zset = self.read_zset(key)?;
        Ok(zset.rank(member).map(|r| zset.len() - 1 - r))
    }

    /// 0-based ascending range by rank (ZRANGE semantics, negative indices
    /// count from the tail).
    pub fn zrange(&self, key: &[u8], start: i64, stop: i64) -> Result<Vec<(Vec<u8>, f64)>> {
        let zset = self.read_zset(key)?;
        let len = zset.len() as i64;
        if len == 0 {
            return Ok(Vec::new());
        }
        let norm = |i: i64| -> i64 { if i < 0 { (len + i).max(0) } else { i } };
        let start = norm(start).min(len - 1).max(0);
        let stop = norm(stop).min(len - 1);
        if start > stop {
            return Ok(Vec::new());
        }
        Ok(zset
            .iter_ascending()
            .skip(start as usize)
            .take((stop - start + 1) as usize)
            .map(|(m, s)| (m.clone(), s))
            .collect())
    }

    pub fn zrangebyscore(
        &self,
        key: &[u8],
        min: f64,
        min_excl: bool,
        max: f64,
        max_excl: bool,
    ) -> Result<Vec<(Vec<u8>, f64)>> {
        Ok(self.read_zset(key)?.range_by_score(min, min_excl, max, max_excl))
    }

    pub fn zcount(&self, key: &[u8], min: f64, min_excl: bool, max: f64, max_excl: bool) -> Result<i64> {
        Ok(self.zrangebyscore(key, min, min_excl, max, max_excl)?.len() as i64)
    }

    pub fn zremrangebyscore(
        &self,
        key: &[u8],
        min: f64,
        min_excl: bool,
        max: f64,
        max_excl: bool,
    ) -> Result<i64> {
        self.with_zset_mut(key, false, |zset| {
            let victims: Vec<Vec<u8>> = zset
                .range_by_score(min, min_excl, max, max_excl)
                .into_iter()
                .map(|(m, _)| m)
                .collect();
            for m in &victims {
                zset.remove(m);
            }
            Ok(victims.len() as i64)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TestClock;
    use std::sync::Arc;

    fn ks() -> Keyspace {
        Keyspace::new(Arc::new(TestClock::default()))
    }

    #[test]
    fn zadd_then_zrangebyscore_returns_inserted_member() {
        let ks = ks();
        ks.zadd(b"z", vec![(1.0, b"a".to_vec())]).unwrap();
        let r = ks.zrangebyscore(b"z", 1.0, false, 1.0, false).unwrap();
        assert_eq!(r, vec![(b"a".to_vec(), 1.0)]);
    }

    #[test]
    fn zrank_and_zrevrank_are_consistent() {
        let ks = ks();
        ks.zadd(b"z", vec![(1.0, b"a".to_vec()), (2.0, b"b".to_vec()), (3.0, b"c".to_vec())])
            .unwrap();
        assert_eq!(ks.zrank(b"z", b"a").unwrap(), Some(0));
        assert_eq!(ks.zrevrank(b"z", b"a").unwrap(), Some(2));
        assert_eq!(ks.zrank(b"z", b"missing").unwrap(), None);
    }

    #[test]
    fn parse_score_bound_handles_infinities_and_exclusive() {
        assert_eq!(parse_score_bound("-inf").unwrap(), (f64::NEG_INFINITY, false));
        assert_eq!(parse_score_bound("(5").unwrap(), (5.0, true));
    }

    #[test]
    fn zremrangebyscore_removes_and_empties_key() {
        let ks = ks();
        ks.zadd(b"z", vec![(1.0, b"a".to_vec())]).unwrap();
        let n = ks.zremrangebyscore(b"z", f64::NEG_INFINITY, false, f64::INFINITY, false).unwrap();
        assert_eq!(n, 1);
        assert!(!ks.exists(b"z"));
    }
}
