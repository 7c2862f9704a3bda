use std::collections::HashSet;

use crate::error::{KvError, Result};
use crate::types::KeyType;
use crate::value::ValueObject;

use super::{KeyEntry, Keyspace};

impl Keyspace {
    fn with_set_mut<T>(
        &self,
        key: &[u8],
        default_if_missing: bool,
        f: impl FnOnce(&mut HashSet<Vec<u8>>) -> Result<T>,
    ) -> Result<T> {
        let now = self.now_ms();
        let mut inner = self.lock();
        Self::expire_if_due(&mut inner, key, now);
        if !inner.entries.contains_key(key) {
            if !default_if_missing {
                return f(&mut HashSet::new());
            }
            inner.bump_version(key);
            inner.entries.insert(
                key.to_vec(),
                KeyEntry {
                    value: ValueObject::Set(HashSet::new()),
                },
            );
        }
        let entry = inner.entries.get_mut(key).expect("just inserted or present");
        let ValueObject::Set(set) = &mut entry.value else {
            return Err(KvError::WrongType);
        };
        let result = f(set)?;
        inner.bump_version(key);
        Self::remove_if_empty(&mut inner, key);
        Ok(result)
    }

    fn read_set(&self, key: &[u8]) -> Result<HashSet<Vec<u8>>> {
        match self.get_kind(key, KeyType::Set)? {
            Some(ValueObject::Set(s)) => Ok(s),
            Some(_) => unreachable!(),
            None => Ok(HashSet::new()),
        }
    }

    pub fn sadd(&self, key: &[u8], members: Vec<Vec<u8>>) -> Result<i64> {
        self.with_set_mut(key, true, |set| {
            let mut added = 0;
            for m in members {
                if set.insert(m) {
                    added += 1;
                }
            }
            Ok(added)
        })
    }

    pub fn srem(&self, key: &[u8], members: &[Vec<u8>]) -> Result<i64> {
        self.with_set_mut(key, false, |set| {
            let mut removed = 0;
            for m in members {
                if set.remove(m.as_slice()) {
                    removed += 1;
                }
            }
            Ok(removed)
        })
    }

    pub fn smembers(&self, key: &[u8]) -> Result<Vec<Vec<u8>>> {
        Ok(self.read_set(key)?.into_iter().collect())
    }

    pub fn scard(&self, key: &[u8]) -> Result<i64> {
        Ok(self.read_set(key)?.len() as i64)
    }

    pub fn sismember(&self, key: &[u8], member: &[u8]) -> Result<bool> {
        Ok(self.read_set(key)?.contains(member))
    }

    pub fn sunion(&self, keys: &[Vec<u8>]) -> Result<HashSet<Vec<u8>>> {
        let mut out = HashSet::new();
        for k in keys {
            out.extend(self.read_set(k)?);
        }
        Ok(out)
    }

    pub fn sinter(&self, keys: &[Vec<u8>]) -> Result<HashSet<Vec<u8>>> {
        let mut sets = Vec::with_capacity(keys.len());
        for k in keys {
            sets.push(self.read_set(k)?);
        }
        let Some((first, rest)) = sets.split_first() else {
            return Ok(HashSet::new());
        };
        Ok(first
            .iter()
            .filter(|m| rest.iter().all(|s| s.contains(*m)))
            .cloned()
            .collect())
    }

    pub fn sdiff(&self, keys: &[Vec<u8>]) -> Result<HashSet<Vec<u8>>> {
        let Some((first, rest)) = keys.split_first() else {
            return Ok(HashSet::new());
        };
        let first_set = self.read_set(first)?;
        let mut out = first_set;
        for k in rest {
            let other = self.read_set(k)?;
            out.retain(|m| !other.contains(m));
        }
        Ok(out)
    }

    fn store_set(&self, dest: &[u8], members: HashSet<Vec<u8>>) -> i64 {
        let now = self.now_ms();
        let mut inner = self.lock();
        Self::expire_if_due(&mut inner, dest, now);
        let len = members.len() as i64;
        inner.bump_version(dest);
        if members.is_empty() {
            inner.entries.remove(dest);
            inner.expiry.clear(dest);
        } else {
            inner.entries.insert(
                dest.to_vec(),
                KeyEntry {
                    value: ValueObject::Set(members),
                },
            );
            inner.expiry.clear(dest);
        }
        len
    }

    pub fn sunionstore(&self, dest: &[u8], keys: &[Vec<u8>]) -> Result<i64> {
        let members = self.sunion(keys)?;
        Ok(self.store_set(dest, members))
    }

    pub fn sinterstore(&self, dest: &[u8], keys: &[Vec<u8>]) -> Result<i64> {
        let members = self.sinter(keys)?;
        Ok(self.store_set(dest, members))
    }

    pub fn sdiffstore(&self, dest: &[u8], keys: &[Vec<u8>]) -> Result<i64> {
        let members = self.sdiff(keys)?;
        Ok(self.store_set(dest, members))
    }
}
