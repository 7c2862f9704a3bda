use std::collections::VecDeque;

use crate::error::{KvError, Result};
use crate::types::KeyType;
use crate::value::ValueObject;

use super::{KeyEntry, Keyspace};

/// Clamp a possibly-negative Redis-style index into `[0, len]`, or `None`
/// if it falls outside the list even after clamping from the tail.
fn normalize_index(idx: i64, len: i64) -> i64 {
    if idx < 0 {
        (len + idx).max(0)
    } else {
        idx
    }
}

impl Keyspace {
    fn with_list_mut<T>(
        &self,
        key: &[u8],
        default_if_missing: bool,
        f: impl FnOnce(&mut VecDeque<Vec<u8>>) -> Result<T>,
    ) -> Result<T> {
        let now = self.now_ms();
        let mut inner = self.lock();
        Self::expire_if_due(&mut inner, key, now);
        if !inner.entries.contains_key(key) {
            if !default_if_missing {
                return f(&mut VecDeque::new());
            }
            inner.bump_version(key);
            inner.entries.insert(
                key.to_vec(),
                KeyEntry {
                    value: ValueObject::List(VecDeque::new()),
                },
            );
        }
        let entry = inner.entries.get_mut(key).expect("just inserted or present");
        let ValueObject::List(list) = &mut entry.value else {
            return Err(KvError::WrongType);
        };
        let result = f(list)?;
        inner.bump_version(key);
        Self::remove_if_empty(&mut inner, key);
        drop(inner);
        self.notify_waiters(key);
        Ok(result)
    }

    pub fn lpush(&self, key: &[u8], values: Vec<Vec<u8>>) -> Result<i64> {
        self.with_list_mut(key, true, |list| {
            for v in values {
                list.push_front(v);
            }
            Ok(list.len() as i64)
        })
    }

    pub fn rpush(&self, key: &[u8], values: Vec<Vec<u8>>) -> Result<i64> {
        self.with_list_mut(key, true, |list| {
            for v in values {
                list.push_back(v);
            }
            Ok(list.len() as i64)
        })
    }

    pub fn lpop(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.with_list_mut(key, false, |list| Ok(list.pop_front()))
    }

    pub fn rpop(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.with_list_mut(key, false, |list| Ok(list.pop_back()))
    }

    pub fn llen(&self, key: &[u8]) -> Result<i64> {
        match self.get_kind(key, KeyType::List)? {
            Some(ValueObject::List(l)) => Ok(l.len() as i64),
            Some(_) => unreachable!(),
            None => Ok(0),
        }
    }

    pub fn lrange(&self, key: &[u8], start: i64, stop: i64) -> Result<Vec<Vec<u8>>> {
        match self.get_kind(key, KeyType::List)? {
            Some(ValueObject::List(list)) => {
                let len = list.len() as i64;
                if len == 0 {
                    return Ok(Vec::new());
                }
                let start = normalize_index(start, len).min(len - 1).max(0);
                let stop = normalize_index(stop, len).min(len - 1);
                if start > stop || stop < 0 {
                    return Ok(Vec::new());
                }
                Ok(list
                    .iter()
                    .skip(start as usize)
                    .take((stop - start + 1) as usize)
                    .cloned()
                    .collect())
            }
            Some(_) => unreachable!(),
            None => Ok(Vec::new()),
        }
    }

    pub fn lindex(&self, key: &[u8], index: i64) -> Result<Option<Vec<u8>>> {
        match self.get_kind(key, KeyType::List)? {
            Some(ValueObject::List(list)) => {
                let len = list.len() as i64;
                let idx = normalize_index(index, len);
                if idx < 0 || idx >= len {
                    Ok(None)
                } else {
                    Ok(list.get(idx as usize).cloned())
                }
            }
            Some(_) => unreachable!(),
            None => Ok(None),
        }
    }

    pub fn lset(&self, key: &[u8], index: i64, value: Vec<u8>) -> Result<()> {
        self.with_list_mut(key, false, |list| {
            if list.is_empty() {
                return Err(KvError::NoSuchKey);
            }
            let len = list.len() as i64;
            let idx = normalize_index(index, len);
            if idx < 0 || idx >= len {
                return Err(KvError::OutOfRange);
            }
            list[idx as usize] = value;
            Ok(())
        })
    }

    pub fn ltrim(&self, key: &[u8], start: i64, stop: i64) -> Result<()> {
        self.with_list_mut(key, false, |list| {
            let len = list.len() as i64;
            if len == 0 {
                return Ok(());
            }
            let start = normalize_index(start, len).max(0);
            let stop = normalize_index(stop, len).min(len - 1);
            if start > stop || start >= len {
                list.clear();
            } else {
                let kept: VecDeque<Vec<u8>> = list
                    .iter()
                    .skip(start as usize)
                    .take((stop - start + 1) as usize)
                    .cloned()
                    .collect();
                *list = kept;
            }
            Ok(())
        })
    }

    /// `count > 0`: remove from head, up to `count`. `count < 0`: remove
    /// from tail, up to `|count|`. `count == 0`: remove all occurrences.
    pub fn lrem(&self, key: &[u8], count: i64, value: &[u8]) -> Result<i64> {
        self.with_list_mut(key, false, |list| {
            let mut removed = 0;
            if count >= 0 {
                let limit = if count == 0 { usize::MAX } else { count as usize };
                let mut kept = VecDeque::with_capacity(list.len());
                for item in list.drain(..) {
                    if item == value && removed < limit {
                        removed += 1;
                    } else {
                        kept.push_back(item);
                    }
                }
                *list = kept;
            } else {
                let limit = (-count) as usize;
                let mut kept: VecDeque<Vec<u8>> = VecDeque::with_capacity(list.len());
                for item in list.drain(..).rev() {
                    if item == value && removed < limit {
                        removed += 1;
                    } else {
                        kept.push_front(item);
                    }
                }
                *list = kept;
            }
            Ok(removed as i64)
        })
    }
}
