//! Per-connection transaction context: the queue MULTI fills, the WATCH
//! set, and the error/dirty flags EXEC consults. Each queued command is
//! still its own independent keyspace operation — EXEC does not hold one
//! lock across the whole batch — so what's guaranteed is per-command
//! atomicity plus the WATCH dirty check taken at EXEC start, not isolation
//! from concurrent writers landing between two commands of the same batch.

use std::collections::HashMap;

use crate::keyspace::Keyspace;

/// A command captured verbatim while queued under MULTI, replayed at EXEC.
pub type QueuedCommand = Vec<Vec<u8>>;

#[derive(Debug, Default)]
pub struct TransactionState {
    pub in_multi: bool,
    pub errored: bool,
    pub queued: Vec<QueuedCommand>,
    /// Version tag recorded per watched key at WATCH time.
    watched: HashMap<Vec<u8>, u64>,
}

impl TransactionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn watch(&mut self, keyspace: &Keyspace, keys: &[Vec<u8>]) {
        for key in keys {
            let tag = keyspace.version_of(key);
            self.watched.entry(key.clone()).or_insert(tag);
        }
    }

    pub fn unwatch(&mut self) {
        self.watched.clear();
    }

    pub fn multi(&mut self) {
        self.in_multi = true;
        self.errored = false;
        self.queued.clear();
    }

    pub fn queue(&mut self, cmd: QueuedCommand) {
        self.queued.push(cmd);
    }

    pub fn mark_errored(&mut self) {
        self.errored = true;
    }

    /// Whether any watched key's version tag has moved since WATCH.
    pub fn is_dirty(&self, keyspace: &Keyspace) -> bool {
        self.watched
            .iter()
            .any(|(key, tag)| keyspace.version_of(key) != *tag)
    }

    /// Clear queued commands, MULTI mode, and the error flag. Does not
    /// touch the watch set — callers that also want UNWATCH semantics
    /// call `unwatch` separately (EXEC/DISCARD do both; plain command
    /// failures inside MULTI do not).
    pub fn reset_multi(&mut self) {
        self.in_multi = false;
        self.errored = false;
        self.queued.clear();
    }

    pub fn has_watches(&self) -> bool {
        !self.watched.is_empty()
    }
}
