//! Live-connection bookkeeping for CLIENT LIST/INFO. One row per session,
//! registered on connect and removed on disconnect by the server's
//! connection task; shaped after the channel/pattern maps in
//! [`crate::pubsub::PubSubRegistry`].

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::RwLock;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub id: u64,
    pub addr: Option<SocketAddr>,
    pub name: Option<String>,
    pub connected_at: Instant,
}

#[derive(Default)]
pub struct ConnectionPool {
    connections: RwLock<HashMap<u64, ConnectionInfo>>,
}

impl ConnectionPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: u64, addr: Option<SocketAddr>) {
        self.connections.write().expect("connection pool lock poisoned").insert(
            id,
            ConnectionInfo {
                id,
                addr,
                name: None,
                connected_at: Instant::now(),
            },
        );
    }

    pub fn unregister(&self, id: u64) {
        self.connections.write().expect("connection pool lock poisoned").remove(&id);
    }

    pub fn set_name(&self, id: u64, name: Option<String>) {
        if let Some(conn) = self.connections.write().expect("connection pool lock poisoned").get_mut(&id) {
            conn.name = name;
        }
    }

    pub fn len(&self) -> usize {
        self.connections.read().expect("connection pool lock poisoned").len()
    }

    /// Snapshot of every live connection, ordered by id, for CLIENT LIST.
    pub fn list(&self) -> Vec<ConnectionInfo> {
        let map = self.connections.read().expect("connection pool lock poisoned");
        let mut out: Vec<_> = map.values().cloned().collect();
        out.sort_by_key(|c| c.id);
        out
    }
}
