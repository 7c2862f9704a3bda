//! Stream value kind: ordered entries, consumer groups, and pending-entry
//! tracking. Blocked-reader wait queues live alongside the keyspace (see
//! `keyspace::Keyspace::waiters`) since they must be parked and woken
//! without holding the keyspace lock.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::{KvError, Result};
use crate::types::{
    ConsumerGroupInfo, ConsumerInfo, PendingEntry, PendingSummary, StreamEntry, StreamId,
    StreamInfo,
};

#[derive(Debug, Clone)]
pub struct PendingEntryRecord {
    pub consumer: String,
    pub delivery_time_ms: i64,
    pub delivery_count: i64,
}

#[derive(Debug, Clone, Default)]
pub struct Consumer {
    pub seen_time_ms: i64,
    pub pending: HashSet<StreamId>,
}

#[derive(Debug, Clone)]
pub struct ConsumerGroup {
    pub last_delivered_id: StreamId,
    pub consumers: HashMap<String, Consumer>,
    pub pel: BTreeMap<StreamId, PendingEntryRecord>,
}

impl ConsumerGroup {
    fn new(start: StreamId) -> Self {
        Self {
            last_delivered_id: start,
            consumers: HashMap::new(),
            pel: BTreeMap::new(),
        }
    }

    fn consumer_mut(&mut self, name: &str, now_ms: i64) -> &mut Consumer {
        let c = self.consumers.entry(name.to_string()).or_default();
        c.seen_time_ms = now_ms;
        c
    }
}

#[derive(Debug, Clone, Default)]
pub struct StreamState {
    pub entries: BTreeMap<StreamId, StreamEntry>,
    pub last_id: StreamId,
    pub max_deleted_id: StreamId,
    pub groups: HashMap<String, ConsumerGroup>,
}

impl StreamState {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh stream re-created after its predecessor was evicted, seeded
    /// with the tombstoned `last_id` so auto-IDs stay monotonic.
    pub fn with_last_id(last_id: StreamId) -> Self {
        Self {
            last_id,
            ..Self::default()
        }
    }

    pub fn len(&self) -> i64 {
        self.entries.len() as i64
    }

    /// Whether this stream should be evicted from the keyspace: no entries
    /// and no consumer groups keeping it alive. A group created via
    /// `XGROUP CREATE ... MKSTREAM` before any `XADD` must not vanish the
    /// instant it's created just because the entry list is still empty.
    pub fn is_logically_empty(&self) -> bool {
        self.entries.is_empty() && self.groups.is_empty()
    }

    /// Resolve the ID for an XADD: an explicit ID must exceed `last_id`;
    /// `None` (the `*` form) auto-generates from `now_ms`.
    pub fn next_id(&self, explicit: Option<StreamId>, now_ms: i64) -> Result<StreamId> {
        match explicit {
            Some(id) => {
                if id <= self.last_id {
                    Err(KvError::StreamIdTooSmall)
                } else {
                    Ok(id)
                }
            }
            None => {
                if now_ms > self.last_id.ms {
                    Ok(StreamId::new(now_ms, 0))
                } else {
                    Ok(StreamId::new(self.last_id.ms, self.last_id.seq + 1))
                }
            }
        }
    }

    pub fn add_entry(&mut self, id: StreamId, fields: Vec<(Vec<u8>, Vec<u8>)>) {
        self.entries.insert(id, StreamEntry::new(id, fields));
        self.last_id = id;
    }

    pub fn trim_maxlen(&mut self, maxlen: i64) -> i64 {
        let maxlen = maxlen.max(0) as usize;
        let mut removed = 0;
        while self.entries.len() > maxlen {
            if let Some((&id, _)) = self.entries.iter().next() {
                self.entries.remove(&id);
                if id > self.max_deleted_id {
                    self.max_deleted_id = id;
                }
                removed += 1;
            } else {
                break;
            }
        }
        removed
    }

    pub fn trim_minid(&mut self, minid: StreamId) -> i64 {
        let to_remove: Vec<StreamId> = self
            .entries
            .range(..minid)
            .map(|(&id, _)| id)
            .collect();
        for id in &to_remove {
            self.entries.remove(id);
            if *id > self.max_deleted_id {
                self.max_deleted_id = *id;
            }
        }
        to_remove.len() as i64
    }

    pub fn delete_ids(&mut self, ids: &[StreamId]) -> i64 {
        let mut removed = 0;
        for id in ids {
            if self.entries.remove(id).is_some() {
                if *id > self.max_deleted_id {
                    self.max_deleted_id = *id;
                }
                removed += 1;
            }
        }
        removed
    }

    pub fn range(&self, start: StreamId, end: StreamId, count: Option<usize>) -> Vec<StreamEntry> {
        let iter = self.entries.range(start..=end).map(|(_, e)| e.clone());
        match count {
            Some(n) => iter.take(n).collect(),
            None => iter.collect(),
        }
    }

    pub fn rev_range(&self, start: StreamId, end: StreamId, count: Option<usize>) -> Vec<StreamEntry> {
        let iter = self.entries.range(start..=end).rev().map(|(_, e)| e.clone());
        match count {
            Some(n) => iter.take(n).collect(),
            None => iter.collect(),
        }
    }

    /// Entries strictly after `after`, used by XREAD / XREADGROUP's `>` form.
    pub fn after(&self, after: StreamId, count: Option<usize>) -> Vec<StreamEntry> {
        let iter = self
            .entries
            .range(after.next()..)
            .map(|(_, e)| e.clone());
        match count {
            Some(n) => iter.take(n).collect(),
            None => iter.collect(),
        }
    }

    pub fn info(&self) -> StreamInfo {
        StreamInfo {
            length: self.len(),
            last_generated_id: self.last_id,
            max_deleted_entry_id: self.max_deleted_id,
            first_entry: self.entries.values().next().cloned(),
            last_entry: self.entries.values().next_back().cloned(),
            groups: self.groups.len() as i64,
        }
    }

    // --- consumer groups ---

    pub fn group_create(&mut self, name: &str, start: StreamId) -> Result<()> {
        if self.groups.contains_key(name) {
            return Err(KvError::BusyGroup);
        }
        self.groups.insert(name.to_string(), ConsumerGroup::new(start));
        Ok(())
    }

    pub fn group_destroy(&mut self, name: &str) -> bool {
        self.groups.remove(name).is_some()
    }

    pub fn group_setid(&mut self, name: &str, id: StreamId) -> Result<()> {
        let group = self.group_mut(name)?;
        group.last_delivered_id = id;
        Ok(())
    }

    pub fn group_createconsumer(&mut self, name: &str, consumer: &str, now_ms: i64) -> Result<bool> {
        let group = self.group_mut(name)?;
        let existed = group.consumers.contains_key(consumer);
        group.consumer_mut(consumer, now_ms);
        Ok(!existed)
    }

    /// Remove a consumer and its PEL entries; returns the count deleted.
    pub fn group_delconsumer(&mut self, name: &str, consumer: &str) -> Result<i64> {
        let group = self.group_mut(name)?;
        let Some(c) = group.consumers.remove(consumer) else {
            return Ok(0);
        };
        let n = c.pending.len() as i64;
        for id in c.pending {
            group.pel.remove(&id);
        }
        Ok(n)
    }

    pub fn group(&self, name: &str) -> Option<&ConsumerGroup> {
        self.groups.get(name)
    }

    fn group_mut(&mut self, name: &str) -> Result<&mut ConsumerGroup> {
        self.groups.get_mut(name).ok_or(KvError::NoSuchKey)
    }

    /// XREADGROUP with id `>`: deliver new entries and track them in the PEL.
    pub fn group_read_new(
        &mut self,
        group_name: &str,
        consumer: &str,
        count: Option<usize>,
        noack: bool,
        now_ms: i64,
    ) -> Result<Vec<StreamEntry>> {
        let after = self.groups.get(group_name).ok_or(KvError::NoSuchKey)?.last_delivered_id;
        let delivered = self.after(after, count);
        let group = self.group_mut(group_name)?;
        for e in &delivered {
            group.last_delivered_id = e.id;
            if !noack {
                group.pel.insert(
                    e.id,
                    PendingEntryRecord {
                        consumer: consumer.to_string(),
                        delivery_time_ms: now_ms,
                        delivery_count: 1,
                    },
                );
            }
        }
        let pending_ids: Vec<StreamId> = if noack { vec![] } else { delivered.iter().map(|e| e.id).collect() };
        group.consumer_mut(consumer, now_ms).pending.extend(pending_ids);
        Ok(delivered)
    }

    /// XREADGROUP with an explicit id: redeliver this consumer's own PEL
    /// entries greater than the given id; never creates new deliveries.
    pub fn group_read_pending(
        &mut self,
        group_name: &str,
        consumer: &str,
        after: StreamId,
        count: Option<usize>,
        now_ms: i64,
    ) -> Result<Vec<StreamEntry>> {
        let group = self.group_mut(group_name)?;
        let mut ids: Vec<StreamId> = group
            .consumers
            .get(consumer)
            .map(|c| c.pending.iter().filter(|id| **id > after).copied().collect())
            .unwrap_or_default();
        ids.sort();
        if let Some(n) = count {
            ids.truncate(n);
        }
        let mut out = Vec::with_capacity(ids.len());
        for id in &ids {
            if let Some(rec) = group.pel.get_mut(id) {
                rec.delivery_time_ms = now_ms;
                rec.delivery_count += 1;
            }
            if let Some(entry) = self.entries.get(id) {
                out.push(entry.clone());
            }
        }
        Ok(out)
    }

    pub fn ack(&mut self, group_name: &str, ids: &[StreamId]) -> Result<i64> {
        let group = self.group_mut(group_name)?;
        let mut removed = 0;
        for id in ids {
            if let Some(rec) = group.pel.remove(id) {
                if let Some(c) = group.consumers.get_mut(&rec.consumer) {
                    c.pending.remove(id);
                }
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub fn pending_summary(&self, group_name: &str) -> Result<PendingSummary> {
        let group = self.groups.get(group_name).ok_or(KvError::NoSuchKey)?;
        if group.pel.is_empty() {
            return Ok(PendingSummary::default());
        }
        let mut per_consumer: HashMap<String, i64> = HashMap::new();
        for rec in group.pel.values() {
            *per_consumer.entry(rec.consumer.clone()).or_insert(0) += 1;
        }
        let mut consumers: Vec<(String, i64)> = per_consumer.into_iter().collect();
        consumers.sort();
        Ok(PendingSummary {
            count: group.pel.len() as i64,
            smallest_id: group.pel.keys().next().copied(),
            largest_id: group.pel.keys().next_back().copied(),
            consumers,
        })
    }

    pub fn pending_range(
        &self,
        group_name: &str,
        start: StreamId,
        end: StreamId,
        count: usize,
        consumer: Option<&str>,
        min_idle_ms: Option<i64>,
        now_ms: i64,
    ) -> Result<Vec<PendingEntry>> {
        let group = self.groups.get(group_name).ok_or(KvError::NoSuchKey)?;
        let mut out = Vec::new();
        for (&id, rec) in group.pel.range(start..=end) {
            if let Some(c) = consumer {
                if rec.consumer != c {
                    continue;
                }
            }
            let idle = now_ms - rec.delivery_time_ms;
            if let Some(min_idle) = min_idle_ms {
                if idle < min_idle {
                    continue;
                }
            }
            out.push(PendingEntry {
                id,
                consumer: rec.consumer.clone(),
                idle,
                delivery_count: rec.delivery_count,
            });
            if out.len() >= count {
                break;
            }
        }
        Ok(out)
    }

    /// XCLAIM: transfer ownership of `ids` to `consumer`. An id is eligible
    /// if it's in the PEL with idle time >= `min_idle_ms`, or if `force` is
    /// set and the id exists in the stream (creating a PEL entry).
    #[allow(clippy::too_many_arguments)]
    pub fn claim(
        &mut self,
        group_name: &str,
        consumer: &str,
        ids: &[StreamId],
        min_idle_ms: i64,
        set_idle_ms: Option<i64>,
        set_time_ms: Option<i64>,
        set_retry: Option<i64>,
        force: bool,
        now_ms: i64,
    ) -> Result<Vec<StreamId>> {
        let entries_have = |id: &StreamId, entries: &BTreeMap<StreamId, StreamEntry>| entries.contains_key(id);
        let entries = self.entries.clone();
        let group = self.group_mut(group_name)?;
        let mut claimed = Vec::new();
        for id in ids {
            let idle = group.pel.get(id).map(|r| now_ms - r.delivery_time_ms);
            let eligible = match idle {
                Some(i) => i >= min_idle_ms,
                None => force && entries_have(id, &entries),
            };
            if !eligible {
                continue;
            }
            if let Some(old) = group.pel.get(id) {
                if let Some(c) = group.consumers.get_mut(&old.consumer) {
                    c.pending.remove(id);
                }
            }
            let delivery_time_ms = set_time_ms.unwrap_or_else(|| now_ms - set_idle_ms.unwrap_or(0));
            let prior_count = group.pel.get(id).map(|r| r.delivery_count).unwrap_or(0);
            group.pel.insert(
                *id,
                PendingEntryRecord {
                    consumer: consumer.to_string(),
                    delivery_time_ms,
                    delivery_count: set_retry.unwrap_or(prior_count + 1),
                },
            );
            group.consumer_mut(consumer, now_ms).pending.insert(*id);
            claimed.push(*id);
        }
        Ok(claimed)
    }

    pub fn group_info(&self, name: &str) -> ConsumerGroupInfo {
        let g = &self.groups[name];
        ConsumerGroupInfo {
            name: name.to_string(),
            consumers: g.consumers.len() as i64,
            pending: g.pel.len() as i64,
            last_delivered_id: g.last_delivered_id,
        }
    }

    pub fn consumer_infos(&self, group_name: &str, now_ms: i64) -> Result<Vec<ConsumerInfo>> {
        let group = self.groups.get(group_name).ok_or(KvError::NoSuchKey)?;
        let mut out: Vec<ConsumerInfo> = group
            .consumers
            .iter()
            .map(|(name, c)| ConsumerInfo {
                name: name.clone(),
                pending: c.pending.len() as i64,
                idle: now_ms - c.seen_time_ms,
            })
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }
}
