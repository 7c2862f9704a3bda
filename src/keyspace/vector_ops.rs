use crate::error::{KvError, Result};
use crate::types::{DistanceMetric, KeyType, VectorSearchResult};
use crate::value::{ValueObject, VectorIndex};
use crate::vector;

use super::{KeyEntry, Keyspace};

impl Keyspace {
    fn with_vector_mut<T>(
        &self,
        key: &[u8],
        default_if_missing: bool,
        f: impl FnOnce(&mut VectorIndex) -> Result<T>,
    ) -> Result<T> {
        let now = self.now_ms();
        let mut inner = self.lock();
        Self::expire_if_due(&mut inner, key, now);
        if !inner.entries.contains_key(key) {
            if !default_if_missing {
                return f(&mut VectorIndex::new(0));
            }
            inner.bump_version(key);
            inner.entries.insert(
                key.to_vec(),
                KeyEntry {
                    value: ValueObject::Vector(VectorIndex::new(0)),
                },
            );
        }
        let entry = inner.entries.get_mut(key).expect("just inserted or present");
        let ValueObject::Vector(idx) = &mut entry.value else {
            return Err(KvError::WrongType);
        };
        let result = f(idx)?;
        inner.bump_version(key);
        Self::remove_if_empty(&mut inner, key);
        Ok(result)
    }

    fn read_vector_index(&self, key: &[u8]) -> Result<Option<VectorIndex>> {
        match self.get_kind(key, KeyType::Vector)? {
            Some(ValueObject::Vector(v)) => Ok(Some(v)),
            Some(_) => unreachable!(),
            None => Ok(None),
        }
    }

    pub fn vset(&self, key: &[u8], element: String, vec: Vec<f32>) -> Result<()> {
        self.with_vector_mut(key, true, |idx| {
            if idx.vectors.is_empty() && idx.dim == 0 {
                idx.dim = vec.len();
            } else if idx.dim != vec.len() {
                return Err(KvError::generic("vector dimension mismatch"));
            }
            idx.vectors.insert(element, vec);
            Ok(())
        })
    }

    pub fn vrem(&self, key: &[u8], element: &str) -> Result<bool> {
        self.with_vector_mut(key, false, |idx| Ok(idx.vectors.shift_remove(element).is_some()))
    }

    pub fn vdim(&self, key: &[u8]) -> Result<usize> {
        Ok(self.read_vector_index(key)?.map(|v| v.dim).unwrap_or(0))
    }

    pub fn vcard(&self, key: &[u8]) -> Result<i64> {
        Ok(self.read_vector_index(key)?.map(|v| v.vectors.len() as i64).unwrap_or(0))
    }

    pub fn vsim(
        &self,
        key: &[u8],
        query: &[f32],
        metric: DistanceMetric,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<VectorSearchResult>> {
        match self.read_vector_index(key)? {
            Some(idx) => {
                if idx.dim != query.len() {
                    return Err(KvError::generic("vector dimension mismatch"));
                }
                Ok(vector::top_k(&idx, query, metric, offset, limit))
            }
            None => Ok(Vec::new()),
        }
    }
}
