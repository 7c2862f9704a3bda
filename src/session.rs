//! Per-connection state: transaction context, subscriptions, and the
//! handful of connection-scoped flags (auth, client name) the dispatcher
//! consults but never shares across connections.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::transaction::TransactionState;

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

pub struct Session {
    pub id: u64,
    pub authenticated: bool,
    pub name: Option<String>,
    pub db: i64,
    pub tx: TransactionState,
    pub subscribed_channels: HashSet<Vec<u8>>,
    pub subscribed_patterns: HashSet<Vec<u8>>,
}

impl Session {
    pub fn new(requires_auth: bool) -> Self {
        Self {
            id: NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed),
            authenticated: !requires_auth,
            name: None,
            db: 0,
            tx: TransactionState::new(),
            subscribed_channels: HashSet::new(),
            subscribed_patterns: HashSet::new(),
        }
    }

    pub fn subscription_count(&self) -> usize {
        self.subscribed_channels.len() + self.subscribed_patterns.len()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription_count() > 0
    }

    /// In subscriber mode, only this restricted command set is permitted.
    pub fn allowed_while_subscribed(cmd_upper: &str) -> bool {
        matches!(
            cmd_upper,
            "SUBSCRIBE" | "UNSUBSCRIBE" | "PSUBSCRIBE" | "PUNSUBSCRIBE" | "PING" | "QUIT" | "RESET"
        )
    }

    pub fn reset(&mut self) {
        self.name = None;
        self.db = 0;
        self.tx = TransactionState::new();
        self.subscribed_channels.clear();
        self.subscribed_patterns.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_session_is_authenticated_when_no_password_set() {
        let s = Session::new(false);
        assert!(s.authenticated);
    }

    #[test]
    fn fresh_session_requires_auth_when_password_set() {
        let s = Session::new(true);
        assert!(!s.authenticated);
    }

    #[test]
    fn subscriber_mode_restricts_command_set() {
        assert!(Session::allowed_while_subscribed("PING"));
        assert!(Session::allowed_while_subscribed("SUBSCRIBE"));
        assert!(!Session::allowed_while_subscribed("GET"));
    }
}
