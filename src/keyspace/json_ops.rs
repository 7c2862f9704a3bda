use serde_json::Value;

use crate::error::{KvError, Result};
use crate::json;
use crate::types::KeyType;
use crate::value::ValueObject;

use super::{KeyEntry, Keyspace};

impl Keyspace {
    fn with_json_mut<T>(
        &self,
        key: &[u8],
        create_if_missing: bool,
        f: impl FnOnce(&mut Value) -> Result<T>,
    ) -> Result<T> {
        let now = self.now_ms();
        let mut inner = self.lock();
        Self::expire_if_due(&mut inner, key, now);
        if !inner.entries.contains_key(key) {
            if !create_if_missing {
                return Err(KvError::NoSuchKey);
            }
            inner.bump_version(key);
            inner.entries.insert(
                key.to_vec(),
                KeyEntry {
                    value: ValueObject::Json(Value::Null),
                },
            );
        }
        let entry = inner.entries.get_mut(key).expect("just inserted or present");
        let ValueObject::Json(doc) = &mut entry.value else {
            return Err(KvError::WrongType);
        };
        let result = f(doc)?;
        inner.bump_version(key);
        Ok(result)
    }

    fn read_json(&self, key: &[u8]) -> Result<Option<Value>> {
        match self.get_kind(key, KeyType::Json)? {
            Some(ValueObject::Json(v)) => Ok(Some(v)),
            Some(_) => unreachable!(),
            None => Ok(None),
        }
    }

    pub fn json_set(&self, key: &[u8], path: &str, value: Value) -> Result<()> {
        if path == "$" || path.is_empty() {
            let now = self.now_ms();
            let mut inner = self.lock();
            Self::expire_if_due(&mut inner, key, now);
            inner.bump_version(key);
            inner
                .entries
                .insert(key.to_vec(), KeyEntry { value: ValueObject::Json(value) });
            inner.expiry.clear(key);
            return Ok(());
        }
        self.with_json_mut(key, true, |doc| json::set_path(doc, path, value))
    }

    pub fn json_get(&self, key: &[u8], path: &str) -> Result<Option<Value>> {
        match self.read_json(key)? {
            Some(doc) => Ok(json::get_path(&doc, path).cloned()),
            None => Ok(None),
        }
    }

    pub fn json_mget(&self, keys: &[Vec<u8>], path: &str) -> Result<Vec<Option<Value>>> {
        keys.iter().map(|k| self.json_get(k, path)).collect()
    }

    pub fn json_del(&self, key: &[u8], path: &str) -> Result<i64> {
        if path == "$" || path.is_empty() {
            return Ok(self.del(std::slice::from_ref(&key.to_vec())));
        }
        self.with_json_mut(key, false, |doc| Ok(json::del_path(doc, path) as i64))
    }

    pub fn json_type(&self, key: &[u8], path: &str) -> Result<Option<&'static str>> {
        match self.read_json(key)? {
            Some(doc) => Ok(json::get_path(&doc, path).map(json::type_name)),
            None => Ok(None),
        }
    }

    pub fn json_arrappend(&self, key: &[u8], path: &str, values: Vec<Value>) -> Result<i64> {
        self.with_json_mut(key, false, |doc| {
            json::arr_append(doc, path, values).map(|n| n as i64)
        })
    }

    pub fn json_arrinsert(&self, key: &[u8], path: &str, index: i64, values: Vec<Value>) -> Result<i64> {
        self.with_json_mut(key, false, |doc| {
            let len = json::get_path(doc, path)
                .and_then(|v| v.as_array())
                .map(|a| a.len() as i64)
                .ok_or(KvError::NoSuchKey)?;
            let idx = if index < 0 { (len + index).max(0) } else { index } as usize;
            json::arr_insert(doc, path, idx, values).map(|n| n as i64)
        })
    }

    pub fn json_arrtrim(&self, key: &[u8], path: &str, start: i64, stop: i64) -> Result<i64> {
        self.with_json_mut(key, false, |doc| {
            json::arr_trim(doc, path, start, stop).map(|n| n as i64)
        })
    }

    pub fn json_strappend(&self, key: &[u8], path: &str, suffix: &str) -> Result<i64> {
        self.with_json_mut(key, false, |doc| {
            json::str_append(doc, path, suffix).map(|n| n as i64)
        })
    }

    pub fn json_numincrby(&self, key: &[u8], path: &str, delta: f64) -> Result<f64> {
        self.with_json_mut(key, false, |doc| json::num_incrby(doc, path, delta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TestClock;
    use serde_json::json;
    use std::sync::Arc;

    fn ks() -> Keyspace {
        Keyspace::new(Arc::new(TestClock::default()))
    }

    #[test]
    fn json_set_root_then_nested_path() {
        let ks = ks();
        ks.json_set(b"d", "$", json!({"a": 1})).unwrap();
        ks.json_set(b"d", "$.b", json!(2)).unwrap();
        assert_eq!(ks.json_get(b"d", "$.b").unwrap(), Some(json!(2)));
    }

    #[test]
    fn json_type_reports_redis_style_names() {
        let ks = ks();
        ks.json_set(b"d", "$", json!({"a": [1, "s", true, null]})).unwrap();
        assert_eq!(ks.json_type(b"d", "$.a").unwrap(), Some("array"));
        assert_eq!(ks.json_type(b"d", "$.a[1]").unwrap(), Some("string"));
        assert_eq!(ks.json_type(b"d", "$.a[3]").unwrap(), Some("null"));
    }

    #[test]
    fn json_numincrby_mutates_in_place() {
        let ks = ks();
        ks.json_set(b"d", "$", json!({"n": 1})).unwrap();
        let v = ks.json_numincrby(b"d", "$.n", 4.5).unwrap();
        assert_eq!(v, 5.5);
    }
}
