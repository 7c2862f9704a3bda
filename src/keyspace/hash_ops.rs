use indexmap::IndexMap;

use crate::error::{KvError, Result};
use crate::types::KeyType;
use crate::value::ValueObject;

use super::{KeyEntry, Keyspace};

impl Keyspace {
    fn with_hash_mut<T>(
        &self,
        key: &[u8],
        default_if_missing: bool,
        f: impl FnOnce(&mut IndexMap<Vec<u8>, Vec<u8>>) -> Result<T>,
    ) -> Result<T> {
        let now = self.now_ms();
        let mut inner = self.lock();
        Self::expire_if_due(&mut inner, key, now);
        if !inner.entries.contains_key(key) {
            if !default_if_missing {
                return f(&mut IndexMap::new());
            }
            inner.bump_version(key);
            inner.entries.insert(
                key.to_vec(),
                KeyEntry {
                    value: ValueObject::Hash(IndexMap::new()),
                },
            );
        }
        let entry = inner.entries.get_mut(key).expect("just inserted or present");
        let ValueObject::Hash(map) = &mut entry.value else {
            return Err(KvError::WrongType);
        };
        let result = f(map)?;
        inner.bump_version(key);
        Self::remove_if_empty(&mut inner, key);
        Ok(result)
    }

    pub fn hset(&self, key: &[u8], pairs: Vec<(Vec<u8>, Vec<u8>)>) -> Result<i64> {
        self.with_hash_mut(key, true, |map| {
            let mut created = 0;
            for (field, value) in pairs {
                if map.insert(field, value).is_none() {
                    created += 1;
                }
            }
            Ok(created)
        })
    }

    pub fn hsetnx(&self, key: &[u8], field: Vec<u8>, value: Vec<u8>) -> Result<bool> {
        self.with_hash_mut(key, true, |map| {
            if map.contains_key(&field) {
                Ok(false)
            } else {
                map.insert(field, value);
                Ok(true)
            }
        })
    }

    pub fn hget(&self, key: &[u8], field: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.get_kind(key, KeyType::Hash)? {
            Some(ValueObject::Hash(map)) => Ok(map.get(field).cloned()),
            Some(_) => unreachable!(),
            None => Ok(None),
        }
    }

    pub fn hmget(&self, key: &[u8], fields: &[Vec<u8>]) -> Result<Vec<Option<Vec<u8>>>> {
        match self.get_kind(key, KeyType::Hash)? {
            Some(ValueObject::Hash(map)) => {
                Ok(fields.iter().map(|f| map.get(f.as_slice()).cloned()).collect())
            }
            Some(_) => unreachable!(),
            None => Ok(fields.iter().map(|_| None).collect()),
        }
    }

    pub fn hdel(&self, key: &[u8], fields: &[Vec<u8>]) -> Result<i64> {
        self.with_hash_mut(key, false, |map| {
            let mut removed = 0;
            for f in fields {
                if map.shift_remove(f.as_slice()).is_some() {
                    removed += 1;
                }
            }
            Ok(removed)
        })
    }

    pub fn hgetall(&self, key: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        match self.get_kind(key, KeyType::Hash)? {
            Some(ValueObject::Hash(map)) => Ok(map.into_iter().collect()),
            Some(_) => unreachable!(),
            None => Ok(Vec::new()),
        }
    }

    pub fn hexists(&self, key: &[u8], field: &[u8]) -> Result<bool> {
        match self.get_kind(key, KeyType::Hash)? {
            Some(ValueObject::Hash(map)) => Ok(map.contains_key(field)),
            Some(_) => unreachable!(),
            None => Ok(false),
        }
    }

    pub fn hlen(&self, key: &[u8]) -> Result<i64> {
        match self.get_kind(key, KeyType::Hash)? {
            Some(ValueObject::Hash(map)) => Ok(map.len() as i64),
            Some(_) => unreachable!(),
            None => Ok(0),
        }
    }

    pub fn hkeys(&self, key: &[u8]) -> Result<Vec<Vec<u8>>> {
        match self.get_kind(key, KeyType::Hash)? {
            Some(ValueObject::Hash(map)) => Ok(map.keys().cloned().collect()),
            Some(_) => unreachable!(),
            None => Ok(Vec::new()),
        }
    }

    pub fn hvals(&self, key: &[u8]) -> Result<Vec<Vec<u8>>> {
        match self.get_kind(key, KeyType::Hash)? {
            Some(ValueObject::Hash(map)) => Ok(map.values().cloned().collect()),
            Some(_) => unreachable!(),
            None => Ok(Vec::new()),
        }
    }

    pub fn hincrby(&self, key: &[u8], field: &[u8], delta: i64) -> Result<i64> {
        self.with_hash_mut(key, true, |map| {
            let current = match map.get(field) {
                Some(v) => std::str::from_utf8(v)
                    .ok()
                    .and_then(|s| s.parse::<i64>().ok())
                    .ok_or(KvError::NotInteger)?,
                None => 0,
            };
            let updated = current.checked_add(delta).ok_or(KvError::NotInteger)?;
            map.insert(field.to_vec(), updated.to_string().into_bytes());
            Ok(updated)
        })
    }
}
