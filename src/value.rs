//! Tagged value kinds held by the keyspace. Every command dispatches on a
//! `ValueObject`'s variant rather than probing the data for its shape.

use indexmap::IndexMap;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use crate::stream::StreamState;
use crate::types::KeyType;

/// The in-memory sorted set representation: a member->score side table for
/// O(1) point lookup plus a `(score, member)`-ordered index for O(log n)
/// rank/range queries (the order-statistic-tree role from the design notes,
/// realized with a standard `BTreeMap` rather than a bespoke skip list).
#[derive(Debug, Clone, Default)]
pub struct SortedSet {
    scores: HashMap<Vec<u8>, f64>,
    by_score: BTreeMap<(ScoreKey, Vec<u8>), ()>,
}

/// `f64` wrapper giving scores a total order for use as a `BTreeMap` key.
/// NaN never appears: commands reject non-finite increments before they
/// reach here, and source floats always came from a previous valid score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreKey(pub f64);

impl Eq for ScoreKey {}
impl PartialOrd for ScoreKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for ScoreKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.partial_cmp(&other.0).unwrap_or(std::cmp::Ordering::Equal)
    }
}

impl SortedSet {
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn score(&self, member: &[u8]) -> Option<f64> {
        self.scores.get(member).copied()
    }

    /// Insert or update a member's score. Returns `true` if the member was
    /// newly added (didn't exist before).
    pub fn insert(&mut self, member: Vec<u8>, score: f64) -> bool {
        let added = match self.scores.get(&member) {
            Some(&old) => {
                self.by_score.remove(&(ScoreKey(old), member.clone()));
                false
            }
            None => true,
        };
        self.by_score.insert((ScoreKey(score), member.clone()), ());
        self.scores.insert(member, score);
        added
    }

    pub fn remove(&mut self, member: &[u8]) -> bool {
        if let Some(score) = self.scores.remove(member) {
            self.by_score.remove(&(ScoreKey(score), member.to_vec()));
            true
        } else {
            false
        }
    }

    /// 0-based rank in ascending (score, member) order.
    pub fn rank(&self, member: &[u8]) -> Option<usize> {
        let score = self.score(member)?;
        let key = (ScoreKey(score), member.to_vec());
        Some(self.by_score.range(..key).count())
    }

    /// Iterate all (member, score) pairs in ascending order.
    pub fn iter_ascending(&self) -> impl Iterator<Item = (&Vec<u8>, f64)> {
        self.by_score
            .keys()
            .map(move |(ScoreKey(s), m)| (m, *s))
    }

    pub fn range_by_score(&self, min: f64, min_excl: bool, max: f64, max_excl: bool) -> Vec<(Vec<u8>, f64)> {
        self.iter_ascending()
            .filter(|&(_, s)| {
                let ge_min = if min_excl { s > min } else { s >= min };
                let le_max = if max_excl { s < max } else { s <= max };
                ge_min && le_max
            })
            .map(|(m, s)| (m.clone(), s))
            .collect()
    }
}

/// Consumer group bookkeeping is owned by `StreamState` (see `stream.rs`);
/// `ValueObject::Stream` just wraps it so the keyspace can kind-tag it.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    pub dim: usize,
    pub vectors: IndexMap<String, Vec<f32>>,
}

impl VectorIndex {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            vectors: IndexMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ValueObject {
    String(Vec<u8>),
    Hash(IndexMap<Vec<u8>, Vec<u8>>),
    List(VecDeque<Vec<u8>>),
    Set(HashSet<Vec<u8>>),
    SortedSet(SortedSet),
    Stream(StreamState),
    Json(serde_json::Value),
    Vector(VectorIndex),
}

impl ValueObject {
    pub fn kind(&self) -> KeyType {
        match self {
            ValueObject::String(_) => KeyType::String,
            ValueObject::Hash(_) => KeyType::Hash,
            ValueObject::List(_) => KeyType::List,
            ValueObject::Set(_) => KeyType::Set,
            ValueObject::SortedSet(_) => KeyType::ZSet,
            ValueObject::Stream(_) => KeyType::Stream,
            ValueObject::Json(_) => KeyType::Json,
            ValueObject::Vector(_) => KeyType::Vector,
        }
    }

    /// Whether this value counts as "logically empty" and should be evicted
    /// from the keyspace per the empty-container invariant. A drained
    /// stream (no entries, no consumer groups) is evicted like any other
    /// empty container; its `last_id` survives separately as a tombstone
    /// in `Inner::stream_tombstones` so later auto-IDs stay monotonic.
    pub fn is_logically_empty(&self) -> bool {
        match self {
            ValueObject::String(_) => false,
            ValueObject::Hash(h) => h.is_empty(),
            ValueObject::List(l) => l.is_empty(),
            ValueObject::Set(s) => s.is_empty(),
            ValueObject::SortedSet(z) => z.is_empty(),
            ValueObject::Stream(s) => s.is_logically_empty(),
            ValueObject::Json(_) => false,
            ValueObject::Vector(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorted_set_orders_by_score_then_member() {
        let mut z = SortedSet::default();
        z.insert(b"b".to_vec(), 1.0);
        z.insert(b"a".to_vec(), 1.0);
        z.insert(b"c".to_vec(), 0.5);
        let order: Vec<Vec<u8>> = z.iter_ascending().map(|(m, _)| m.clone()).collect();
        assert_eq!(order, vec![b"c".to_vec(), b"a".to_vec(), b"b".to_vec()]);
    }

    #[test]
    fn sorted_set_rank_and_reinsert() {
        let mut z = SortedSet::default();
        z.insert(b"a".to_vec(), 1.0);
        z.insert(b"b".to_vec(), 2.0);
        assert_eq!(z.rank(b"b"), Some(1));
        z.insert(b"b".to_vec(), 0.0);
        assert_eq!(z.rank(b"b"), Some(0));
        assert_eq!(z.len(), 2);
    }
}
