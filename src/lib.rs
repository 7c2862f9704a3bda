//! redcore - an in-memory, multi-model RESP server.
//!
//! The keyspace holds typed values (strings, hashes, lists, sets, sorted
//! sets, streams, JSON documents, and vectors) behind a single mutex, with
//! lazy + periodic TTL expiry, a stream engine with consumer groups, and
//! MULTI/EXEC/WATCH transactions. [`dispatcher`] turns RESP command frames
//! into keyspace operations; [`server`] drives the TCP accept loop.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use redcore::clock::SystemClock;
//! use redcore::keyspace::Keyspace;
//! use redcore::types::SetOptions;
//!
//! let ks = Keyspace::new(Arc::new(SystemClock));
//! ks.set(b"key", b"value".to_vec(), &SetOptions::new());
//! assert_eq!(ks.get(b"key").unwrap(), Some(b"value".to_vec()));
//! ```

pub mod clock;
pub mod conn_pool;
pub mod dispatcher;
pub mod error;
pub mod expiry;
pub mod json;
pub mod keyspace;
pub mod pubsub;
pub mod resp;
pub mod server;
pub mod session;
pub mod stream;
pub mod transaction;
pub mod types;
pub mod value;
pub mod vector;

pub use conn_pool::ConnectionPool;
pub use dispatcher::Engine;
pub use error::{KvError, Result};
pub use keyspace::Keyspace;
pub use pubsub::PubSubRegistry;
pub use resp::RespValue;
pub use server::Server;
pub use session::Session;
pub use types::{DistanceMetric, KeyType, SetOptions, StreamId, ZMember};
