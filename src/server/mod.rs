//! TCP accept loop and per-connection task.
//!
//! Each connection runs `handle_connection`, which alternates between
//! reading a command off the wire and draining any pub/sub pushes queued
//! on its `mpsc` channel. Subscribing to a channel/pattern spawns a small
//! forwarder task that copies messages from the registry's broadcast
//! receiver onto that channel; unsubscribing drops the forwarder, which
//! aborts the task.

use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::clock::SystemClock;
use crate::dispatcher::{self, Engine, Outcome};
use crate::keyspace::Keyspace;
use crate::pubsub::{PubSubMessage, PubSubRegistry};
use crate::resp::{RespReader, RespValue};
use crate::session::Session;

const SWEEP_INTERVAL_MS: u64 = 100;
const SWEEP_BATCH: usize = 20;

pub struct Server {
    engine: Arc<Engine>,
}

impl Server {
    pub fn new(password: Option<String>) -> Self {
        let keyspace = Arc::new(Keyspace::new(Arc::new(SystemClock)));
        let pubsub = Arc::new(PubSubRegistry::new());
        Self { engine: Arc::new(Engine::new(keyspace, pubsub, password)) }
    }

    pub async fn run(&self, addr: &str) -> anyhow::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(%addr, "listening");

        let sweep_engine = self.engine.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_millis(SWEEP_INTERVAL_MS));
            loop {
                ticker.tick().await;
                sweep_engine.keyspace.sweep_expired(SWEEP_BATCH);
            }
        });

        loop {
            let (socket, peer) = listener.accept().await?;
            let engine = self.engine.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(engine, socket).await {
                    tracing::debug!(%peer, error = %e, "connection closed with error");
                }
            });
        }
    }
}

/// A forwarder task copying one broadcast subscription onto the
/// connection's push channel. Dropping it aborts the task, which is how
/// UNSUBSCRIBE/PUNSUBSCRIBE tear it down.
struct Forwarder {
    handle: JoinHandle<()>,
}

impl Drop for Forwarder {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Unregisters a session from the engine's connection pool on drop, so the
/// entry disappears from CLIENT LIST/INFO regardless of which `?`/`break`
/// exit path the connection task takes.
struct ConnGuard {
    engine: Arc<Engine>,
    id: u64,
}

impl Drop for ConnGuard {
    fn drop(&mut self) {
        self.engine.connections.unregister(self.id);
    }
}

async fn handle_connection(engine: Arc<Engine>, socket: TcpStream) -> anyhow::Result<()> {
    let peer = socket.peer_addr().ok();
    let (read_half, mut write_half) = socket.into_split();
    let mut reader = RespReader::new(read_half);
    let mut session = Session::new(engine.password.is_some());

    engine.connections.register(session.id, peer);
    let _conn_guard = ConnGuard { engine: engine.clone(), id: session.id };

    let (push_tx, mut push_rx) = mpsc::channel::<RespValue>(256);
    let mut channel_forwarders: std::collections::HashMap<Vec<u8>, Forwarder> = std::collections::HashMap::new();
    let mut pattern_forwarders: std::collections::HashMap<Vec<u8>, Forwarder> = std::collections::HashMap::new();

    loop {
        tokio::select! {
            biased;

            push = push_rx.recv() => {
                let Some(reply) = push else { continue };
                write_half.write_all(&reply.encode()).await?;
            }

            cmd = reader.read_command() => {
                let Some(args) = cmd? else { break };
                if args.is_empty() {
                    continue;
                }

                match dispatcher::dispatch(&engine, &mut session, args).await {
                    Outcome::Reply(reply) => {
                        write_half.write_all(&reply.encode()).await?;
                    }
                    Outcome::Quit(reply) => {
                        write_half.write_all(&reply.encode()).await?;
                        break;
                    }
                    Outcome::Subscribe { channels, patterns, replies } => {
                        for ch in channels {
                            channel_forwarders.entry(ch.clone()).or_insert_with(|| {
                                spawn_channel_forwarder(&engine, ch, push_tx.clone())
                            });
                        }
                        for pat in patterns {
                            pattern_forwarders.entry(pat.clone()).or_insert_with(|| {
                                spawn_pattern_forwarder(&engine, pat, push_tx.clone())
                            });
                        }
                        for reply in replies {
                            write_half.write_all(&reply.encode()).await?;
                        }
                    }
                    Outcome::Unsubscribe { channels, patterns, replies } => {
                        for ch in channels {
                            channel_forwarders.remove(&ch);
                        }
                        for pat in patterns {
                            pattern_forwarders.remove(&pat);
                        }
                        for reply in replies {
                            write_half.write_all(&reply.encode()).await?;
                        }
                    }
                }
            }
        }
    }

    tracing::debug!(?peer, "connection closed");
    Ok(())
}

fn spawn_channel_forwarder(engine: &Engine, channel: Vec<u8>, tx: mpsc::Sender<RespValue>) -> Forwarder {
    let mut rx = engine.pubsub.subscribe_channel(&channel);
    let handle = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(PubSubMessage::Message { channel, payload }) => {
                    let push = RespValue::Push(vec![
                        RespValue::from_string("message".to_string()),
                        RespValue::from_bytes(channel),
                        RespValue::from_bytes(payload),
                    ]);
                    if tx.send(push).await.is_err() {
                        break;
                    }
                }
                Ok(PubSubMessage::PMessage { .. }) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
    Forwarder { handle }
}

fn spawn_pattern_forwarder(engine: &Engine, pattern: Vec<u8>, tx: mpsc::Sender<RespValue>) -> Forwarder {
    let mut rx = engine.pubsub.subscribe_pattern(&pattern);
    let handle = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(PubSubMessage::PMessage { pattern, channel, payload }) => {
                    let push = RespValue::Push(vec![
                        RespValue::from_string("pmessage".to_string()),
                        RespValue::from_bytes(pattern),
                        RespValue::from_bytes(channel),
                        RespValue::from_bytes(payload),
                    ]);
                    if tx.send(push).await.is_err() {
                        break;
                    }
                }
                Ok(PubSubMessage::Message { .. }) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
    Forwarder { handle }
}
