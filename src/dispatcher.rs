//! Command dispatch: one `cmd_*` helper per RESP command, fanned out from
//! a single match in [`execute`]. [`dispatch`] sits in front of that and
//! handles the connection-scoped concerns that aren't really "commands" in
//! the data-engine sense — authentication, MULTI queuing, WATCH/EXEC, and
//! pub/sub subscription bookkeeping — before handing off to `execute` for
//! everything else.
//!
//! Blocking reads (XREAD/XREADGROUP BLOCK) loop on the keyspace's per-key
//! `Notify` inside their handler rather than returning control to the
//! caller: the connection task just awaits one `dispatch` call at a time,
//! same as it would for any other command.

use std::future::Future;
use std::sync::Arc;
use std::task::Poll;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::Notify;

use crate::conn_pool::ConnectionPool;
use crate::error::{KvError, Result};
use crate::keyspace::{Keyspace, TrimSpec};
use crate::pubsub::PubSubRegistry;
use crate::resp::RespValue;
use crate::session::Session;
use crate::types::{DistanceMetric, SetOptions, StreamId};

/// Shared engine state handed to every connection: the keyspace, the
/// pub/sub registry, the configured AUTH password (if any), and the
/// connection registry CLIENT LIST/INFO read from.
pub struct Engine {
    pub keyspace: Arc<Keyspace>,
    pub pubsub: Arc<PubSubRegistry>,
    pub password: Option<String>,
    pub connections: Arc<ConnectionPool>,
    pub started_at: Instant,
}

impl Engine {
    pub fn new(keyspace: Arc<Keyspace>, pubsub: Arc<PubSubRegistry>, password: Option<String>) -> Self {
        Self {
            keyspace,
            pubsub,
            password,
            connections: Arc::new(ConnectionPool::new()),
            started_at: Instant::now(),
        }
    }
}

/// What the connection task should do after a dispatched command.
pub enum Outcome {
    Reply(RespValue),
    /// New channel/pattern subscriptions to open, plus the confirmation
    /// replies already carrying the post-subscribe counts.
    Subscribe { channels: Vec<Vec<u8>>, patterns: Vec<Vec<u8>>, replies: Vec<RespValue> },
    /// Channel/pattern subscriptions to tear down, plus confirmations.
    Unsubscribe { channels: Vec<Vec<u8>>, patterns: Vec<Vec<u8>>, replies: Vec<RespValue> },
    Quit(RespValue),
}

pub async fn dispatch(engine: &Engine, session: &mut Session, args: Vec<Vec<u8>>) -> Outcome {
    if args.is_empty() {
        return Outcome::Reply(RespValue::error("empty command"));
    }
    let cmd = String::from_utf8_lossy(&args[0]).to_uppercase();
    let cmd_args = &args[1..];

    if cmd == "AUTH" {
        return Outcome::Reply(cmd_auth(engine, session, cmd_args));
    }
    if !session.authenticated {
        return Outcome::Reply(RespValue::Error("NOAUTH Authentication required.".to_string()));
    }
    if cmd == "RESET" {
        session.reset();
        return Outcome::Reply(RespValue::SimpleString("RESET".to_string()));
    }
    if session.is_subscribed() && !Session::allowed_while_subscribed(&cmd) {
        return Outcome::Reply(RespValue::error(format!(
            "Can't execute '{}': only (P)SUBSCRIBE / (P)UNSUBSCRIBE / PING / QUIT / RESET are allowed in this context",
            cmd.to_lowercase()
        )));
    }

    if session.tx.in_multi {
        match cmd.as_str() {
            "MULTI" => return Outcome::Reply(RespValue::error("MULTI calls can not be nested")),
            "EXEC" => return Outcome::Reply(exec_transaction(engine, session).await),
            "DISCARD" => {
                session.tx.reset_multi();
                session.tx.unwatch();
                return Outcome::Reply(RespValue::ok());
            }
            "WATCH" => return Outcome::Reply(RespValue::error("WATCH inside MULTI is not allowed")),
            "SUBSCRIBE" | "UNSUBSCRIBE" | "PSUBSCRIBE" | "PUNSUBSCRIBE" => {
                return Outcome::Reply(RespValue::error("SUBSCRIBE is not allowed in transactions"));
            }
            "XREAD" | "XREADGROUP" => {
                return Outcome::Reply(RespValue::error(format!(
                    "{} is not allowed in transactions",
                    cmd.to_lowercase()
                )));
            }
            _ => {
                if !is_known_command(&cmd) {
                    session.tx.mark_errored();
                    return Outcome::Reply(RespValue::error(format!("unknown command '{}'", cmd.to_lowercase())));
                }
                if cmd_args.len() < min_arity(&cmd) {
                    session.tx.mark_errored();
                    return Outcome::Reply(RespValue::Error(KvError::arity(&cmd.to_lowercase()).to_resp_string()));
                }
                session.tx.queue(args.clone());
                return Outcome::Reply(RespValue::SimpleString("QUEUED".to_string()));
            }
        }
    }

    match cmd.as_str() {
        "MULTI" => {
            session.tx.multi();
            Outcome::Reply(RespValue::ok())
        }
        "EXEC" => Outcome::Reply(RespValue::error("EXEC without MULTI")),
        "DISCARD" => Outcome::Reply(RespValue::error("DISCARD without MULTI")),
        "WATCH" => Outcome::Reply(cmd_watch(engine, session, cmd_args)),
        "UNWATCH" => {
            session.tx.unwatch();
            Outcome::Reply(RespValue::ok())
        }
        "SUBSCRIBE" => cmd_subscribe(session, cmd_args),
        "PSUBSCRIBE" => cmd_psubscribe(session, cmd_args),
        "UNSUBSCRIBE" => cmd_unsubscribe(session, cmd_args),
        "PUNSUBSCRIBE" => cmd_punsubscribe(session, cmd_args),
        "QUIT" => Outcome::Quit(RespValue::ok()),
        _ => Outcome::Reply(execute(engine, session, &cmd, cmd_args, true).await),
    }
}

async fn exec_transaction(engine: &Engine, session: &mut Session) -> RespValue {
    if session.tx.errored {
        session.tx.reset_multi();
        session.tx.unwatch();
        return RespValue::Error(KvError::ExecAbort.to_resp_string());
    }
    if session.tx.is_dirty(&engine.keyspace) {
        session.tx.reset_multi();
        session.tx.unwatch();
        return RespValue::Array(None);
    }
    let queued = std::mem::take(&mut session.tx.queued);
    session.tx.reset_multi();
    session.tx.unwatch();

    let mut replies = Vec::with_capacity(queued.len());
    for cmd in queued {
        let name = String::from_utf8_lossy(&cmd[0]).to_uppercase();
        replies.push(execute(engine, session, &name, &cmd[1..], false).await);
    }
    RespValue::Array(Some(replies))
}

/// Commands accepted for MULTI queuing. Anything not here (including
/// typos) aborts the transaction immediately, matching Redis's refusal to
/// queue an unrecognized command. XREAD/XREADGROUP are handled by an
/// earlier match arm (blocking reads are rejected outright, never queued)
/// so they're deliberately absent here.
fn is_known_command(cmd: &str) -> bool {
    const NAMES: &[&str] = &[
        "PING", "ECHO", "SELECT", "CLIENT", "DBSIZE", "FLUSHALL", "FLUSHDB", "INFO", "COMMAND",
        "CONFIG", "PUBSUB", "PUBLISH", "READONLY", "READWRITE",
        "GET", "SET", "DEL", "UNLINK", "TYPE", "EXISTS", "KEYS", "RENAME", "RENAMENX", "COPY",
        "RANDOMKEY", "EXPIRE", "PEXPIRE", "TTL", "PTTL", "PERSIST",
        "INCR", "DECR", "INCRBY", "DECRBY", "INCRBYFLOAT", "MGET", "MSET",
        "HSET", "HSETNX", "HGET", "HMGET", "HDEL", "HGETALL", "HEXISTS", "HLEN", "HKEYS", "HVALS",
        "HINCRBY",
        "LPUSH", "RPUSH", "LPOP", "RPOP", "LLEN", "LRANGE", "LINDEX", "LSET", "LTRIM", "LREM",
        "SADD", "SREM", "SMEMBERS", "SCARD", "SISMEMBER", "SUNION", "SINTER", "SDIFF",
        "SUNIONSTORE", "SINTERSTORE", "SDIFFSTORE",
        "ZADD", "ZINCRBY", "ZREM", "ZSCORE", "ZCARD", "ZRANK", "ZREVRANK", "ZRANGE",
        "ZRANGEBYSCORE", "ZCOUNT", "ZREMRANGEBYSCORE",
        "XADD", "XLEN", "XDEL", "XRANGE", "XREVRANGE", "XINFO", "XGROUP",
        "XACK", "XPENDING", "XCLAIM", "XAUTOCLAIM",
        "JSON.SET", "JSON.GET", "JSON.MGET", "JSON.DEL", "JSON.TYPE", "JSON.ARRAPPEND",
        "JSON.ARRINSERT", "JSON.ARRTRIM", "JSON.STRAPPEND", "JSON.NUMINCRBY",
        "VSET", "VREM", "VDIM", "VCARD", "VSIM", "VSEARCH",
    ];
    NAMES.contains(&cmd)
}

/// Minimum trailing-argument count for MULTI-time queueing, one entry per
/// name in [`is_known_command`]. This mirrors each handler's own
/// `KvError::arity` guard closely enough to catch the common case (too few
/// args) at queue time; finer syntax errors (wrong option combinations, odd
/// counts for paired args) still only surface inside the EXEC reply array,
/// same as any other runtime error.
fn min_arity(cmd: &str) -> usize {
    match cmd {
        "PING" | "DBSIZE" | "FLUSHALL" | "FLUSHDB" | "INFO" | "COMMAND" | "RANDOMKEY"
        | "READONLY" | "READWRITE" => 0,
        "ECHO" | "SELECT" | "CLIENT" | "CONFIG" | "PUBSUB" | "GET" | "DEL" | "UNLINK" | "TYPE"
        | "EXISTS" | "KEYS" | "TTL" | "PTTL" | "PERSIST" | "INCR" | "DECR" | "MGET" | "HGETALL"
        | "HLEN" | "HKEYS" | "HVALS" | "LPOP" | "RPOP" | "LLEN" | "SMEMBERS" | "SCARD" | "SUNION"
        | "SINTER" | "SDIFF" | "ZCARD" | "XLEN" | "XINFO" | "XGROUP" | "VDIM" | "VCARD"
        | "JSON.GET" | "JSON.DEL" | "JSON.TYPE" => 1,
        "SET" | "PUBLISH" | "RENAME" | "RENAMENX" | "COPY" | "EXPIRE" | "PEXPIRE" | "INCRBY"
        | "DECRBY" | "INCRBYFLOAT" | "MSET" | "HGET" | "HMGET" | "HDEL" | "HEXISTS" | "LPUSH"
        | "RPUSH" | "LINDEX" | "SADD" | "SREM" | "SISMEMBER" | "SUNIONSTORE" | "SINTERSTORE"
        | "SDIFFSTORE" | "ZREM" | "ZSCORE" | "ZRANK" | "ZREVRANK" | "XDEL" | "XPENDING"
        | "JSON.MGET" | "VREM" => 2,
        "HSET" | "HSETNX" | "HINCRBY" | "LRANGE" | "LSET" | "LTRIM" | "LREM" | "ZADD"
        | "ZINCRBY" | "ZRANGE" | "ZRANGEBYSCORE" | "ZCOUNT" | "ZREMRANGEBYSCORE" | "XRANGE"
        | "XREVRANGE" | "XACK" | "JSON.SET" | "JSON.ARRAPPEND" | "JSON.STRAPPEND"
        | "JSON.NUMINCRBY" | "VSET" | "VSIM" | "VSEARCH" => 3,
        "JSON.ARRINSERT" | "JSON.ARRTRIM" => 4,
        "XCLAIM" | "XAUTOCLAIM" => 5,
        "XADD" => 1,
        _ => 0,
    }
}

/// The data-engine command table. `blocking_allowed` is false when running
/// inside EXEC, where blocking commands execute as if BLOCK were absent.
async fn execute(engine: &Engine, session: &mut Session, cmd: &str, args: &[Vec<u8>], blocking_allowed: bool) -> RespValue {
    let ks = &engine.keyspace;
    match cmd {
        "PING" => cmd_ping(args, session.is_subscribed()),
        "ECHO" => reply(cmd_echo(args)),
        "SELECT" => reply(cmd_select(args)),
        "CLIENT" => reply(cmd_client(engine, session, args)),
        "DBSIZE" => RespValue::Integer(ks.dbsize()),
        "FLUSHALL" | "FLUSHDB" => {
            ks.flush_all();
            RespValue::ok()
        }
        "INFO" => RespValue::from_string(info_text(engine)),
        "COMMAND" => RespValue::Array(Some(Vec::new())),
        "CONFIG" => reply(cmd_config(args)),
        "READONLY" | "READWRITE" => RespValue::ok(),
        "PUBSUB" => reply(cmd_pubsub(engine, args)),
        "PUBLISH" => reply(cmd_publish(engine, args)),

        "GET" => reply(one_key(args, "get").and_then(|k| ks.get(k)).map(RespValue::from)),
        "SET" => reply(cmd_set(ks, args)),
        "DEL" => RespValue::Integer(ks.del(args)),
        "UNLINK" => RespValue::Integer(ks.unlink(args)),
        "TYPE" => RespValue::SimpleString(
            one_key(args, "type").ok().and_then(|k| ks.key_type(k)).map(|t| t.as_str().to_string()).unwrap_or_else(|| "none".to_string()),
        ),
        "EXISTS" => RespValue::Integer(args.iter().filter(|k| ks.exists(k)).count() as i64),
        "KEYS" => reply(one_key(args, "keys").map(|p| {
            RespValue::Array(Some(ks.keys_matching(&String::from_utf8_lossy(p)).into_iter().map(RespValue::from_bytes).collect()))
        })),
        "RENAME" => reply(cmd_rename(ks, args)),
        "RENAMENX" => reply(cmd_renamenx(ks, args)),
        "COPY" => reply(cmd_copy(ks, args)),
        "RANDOMKEY" => RespValue::from(ks.random_key()),
        "EXPIRE" => reply(cmd_expire(ks, args, 1000)),
        "PEXPIRE" => reply(cmd_expire(ks, args, 1)),
        "TTL" => reply(cmd_ttl(ks, args, 1000)),
        "PTTL" => reply(cmd_ttl(ks, args, 1)),
        "PERSIST" => reply(one_key(args, "persist").map(|k| RespValue::from(ks.persist(k)))),

        "INCR" => reply(one_key(args, "incr").and_then(|k| ks.incrby(k, 1)).map(RespValue::Integer)),
        "DECR" => reply(one_key(args, "decr").and_then(|k| ks.decrby(k, 1)).map(RespValue::Integer)),
        "INCRBY" => reply(cmd_incrby(ks, args)),
        "DECRBY" => reply(cmd_decrby(ks, args)),
        "INCRBYFLOAT" => reply(cmd_incrbyfloat(ks, args)),
        "MGET" => RespValue::Array(Some(args.iter().map(|k| RespValue::from(ks.get(k).unwrap_or(None))).collect())),
        "MSET" => reply(cmd_mset(ks, args)),

        "HSET" => reply(cmd_hset(ks, args)),
        "HSETNX" => reply(cmd_hsetnx(ks, args)),
        "HGET" => reply(cmd_hget(ks, args)),
        "HMGET" => reply(cmd_hmget(ks, args)),
        "HDEL" => reply(cmd_hdel(ks, args)),
        "HGETALL" => reply(one_key(args, "hgetall").and_then(|k| ks.hgetall(k)).map(encode_pairs)),
        "HEXISTS" => reply(cmd_hexists(ks, args)),
        "HLEN" => reply(one_key(args, "hlen").and_then(|k| ks.hlen(k)).map(RespValue::Integer)),
        "HKEYS" => reply(one_key(args, "hkeys").and_then(|k| ks.hkeys(k)).map(encode_bulk_vec)),
        "HVALS" => reply(one_key(args, "hvals").and_then(|k| ks.hvals(k)).map(encode_bulk_vec)),
        "HINCRBY" => reply(cmd_hincrby(ks, args)),

        "LPUSH" => reply(cmd_list_push(ks, args, true)),
        "RPUSH" => reply(cmd_list_push(ks, args, false)),
        "LPOP" => reply(one_key(args, "lpop").and_then(|k| ks.lpop(k)).map(RespValue::from)),
        "RPOP" => reply(one_key(args, "rpop").and_then(|k| ks.rpop(k)).map(RespValue::from)),
        "LLEN" => reply(one_key(args, "llen").and_then(|k| ks.llen(k)).map(RespValue::Integer)),
        "LRANGE" => reply(cmd_lrange(ks, args)),
        "LINDEX" => reply(cmd_lindex(ks, args)),
        "LSET" => reply(cmd_lset(ks, args)),
        "LTRIM" => reply(cmd_ltrim(ks, args)),
        "LREM" => reply(cmd_lrem(ks, args)),

        "SADD" => reply(cmd_set_add(ks, args)),
        "SREM" => reply(cmd_srem(ks, args)),
        "SMEMBERS" => reply(one_key(args, "smembers").and_then(|k| ks.smembers(k)).map(encode_bulk_vec)),
        "SCARD" => reply(one_key(args, "scard").and_then(|k| ks.scard(k)).map(RespValue::Integer)),
        "SISMEMBER" => reply(cmd_sismember(ks, args)),
        "SUNION" => reply(ks.sunion(args).map(encode_bulk_set)),
        "SINTER" => reply(ks.sinter(args).map(encode_bulk_set)),
        "SDIFF" => reply(ks.sdiff(args).map(encode_bulk_set)),
        "SUNIONSTORE" => reply(cmd_setop_store(ks, args, SetOp::Union)),
        "SINTERSTORE" => reply(cmd_setop_store(ks, args, SetOp::Inter)),
        "SDIFFSTORE" => reply(cmd_setop_store(ks, args, SetOp::Diff)),

        "ZADD" => reply(cmd_zadd(ks, args)),
        "ZINCRBY" => reply(cmd_zincrby(ks, args)),
        "ZREM" => reply(cmd_zrem(ks, args)),
        "ZSCORE" => reply(cmd_zscore(ks, args)),
        "ZCARD" => reply(one_key(args, "zcard").and_then(|k| ks.zcard(k)).map(RespValue::Integer)),
        "ZRANK" => reply(cmd_zrank(ks, args, false)),
        "ZREVRANK" => reply(cmd_zrank(ks, args, true)),
        "ZRANGE" => reply(cmd_zrange(ks, args)),
        "ZRANGEBYSCORE" => reply(cmd_zrangebyscore(ks, args)),
        "ZCOUNT" => reply(cmd_zcount(ks, args)),
        "ZREMRANGEBYSCORE" => reply(cmd_zremrangebyscore(ks, args)),

        "XADD" => reply(cmd_xadd(ks, args)),
        "XLEN" => reply(one_key(args, "xlen").and_then(|k| ks.xlen(k)).map(RespValue::Integer)),
        "XDEL" => reply(cmd_xdel(ks, args)),
        "XRANGE" => reply(cmd_xrange(ks, args, false)),
        "XREVRANGE" => reply(cmd_xrange(ks, args, true)),
        "XREAD" => reply(cmd_xread(ks, args, blocking_allowed).await),
        "XREADGROUP" => reply(cmd_xreadgroup(ks, args, blocking_allowed).await),
        "XGROUP" => reply(cmd_xgroup(ks, args)),
        "XACK" => reply(cmd_xack(ks, args)),
        "XPENDING" => reply(cmd_xpending(ks, args)),
        "XCLAIM" => reply(cmd_xclaim(ks, args)),
        "XAUTOCLAIM" => reply(cmd_xautoclaim(ks, args)),
        "XINFO" => reply(cmd_xinfo(ks, args)),

        "JSON.SET" => reply(cmd_json_set(ks, args)),
        "JSON.GET" => reply(cmd_json_get(ks, args)),
        "JSON.MGET" => reply(cmd_json_mget(ks, args)),
        "JSON.DEL" => reply(cmd_json_del(ks, args)),
        "JSON.TYPE" => reply(cmd_json_type(ks, args)),
        "JSON.ARRAPPEND" => reply(cmd_json_arrappend(ks, args)),
        "JSON.ARRINSERT" => reply(cmd_json_arrinsert(ks, args)),
        "JSON.ARRTRIM" => reply(cmd_json_arrtrim(ks, args)),
        "JSON.STRAPPEND" => reply(cmd_json_strappend(ks, args)),
        "JSON.NUMINCRBY" => reply(cmd_json_numincrby(ks, args)),

        "VSET" => reply(cmd_vset(ks, args)),
        "VREM" => reply(cmd_vrem(ks, args)),
        "VDIM" => reply(one_key(args, "vdim").and_then(|k| ks.vdim(k)).map(|d| RespValue::Integer(d as i64))),
        "VCARD" => reply(one_key(args, "vcard").and_then(|k| ks.vcard(k)).map(RespValue::Integer)),
        "VSIM" | "VSEARCH" => reply(cmd_vsim(ks, args)),

        _ => RespValue::error(format!("unknown command '{}'", cmd.to_lowercase())),
    }
}

fn reply(r: Result<RespValue>) -> RespValue {
    match r {
        Ok(v) => v,
        Err(e) => RespValue::Error(e.to_resp_string()),
    }
}

fn one_key<'a>(args: &'a [Vec<u8>], cmd: &str) -> Result<&'a [u8]> {
    args.first().map(|k| k.as_slice()).ok_or_else(|| KvError::arity(cmd))
}

fn parse_i64(b: &[u8]) -> Result<i64> {
    std::str::from_utf8(b).ok().and_then(|s| s.parse().ok()).ok_or(KvError::NotInteger)
}

fn parse_f64(b: &[u8]) -> Result<f64> {
    std::str::from_utf8(b).ok().and_then(|s| s.parse().ok()).ok_or(KvError::NotFloat)
}

fn parse_usize(b: &[u8]) -> Result<usize> {
    let n = parse_i64(b)?;
    if n < 0 { Err(KvError::OutOfRange) } else { Ok(n as usize) }
}

fn encode_bulk_vec(items: Vec<Vec<u8>>) -> RespValue {
    RespValue::Array(Some(items.into_iter().map(RespValue::from_bytes).collect()))
}

fn encode_bulk_set(items: std::collections::HashSet<Vec<u8>>) -> RespValue {
    RespValue::Array(Some(items.into_iter().map(RespValue::from_bytes).collect()))
}

fn encode_pairs(pairs: Vec<(Vec<u8>, Vec<u8>)>) -> RespValue {
    let mut out = Vec::with_capacity(pairs.len() * 2);
    for (k, v) in pairs {
        out.push(RespValue::from_bytes(k));
        out.push(RespValue::from_bytes(v));
    }
    RespValue::Array(Some(out))
}

// ---------------------------------------------------------------------
// Server / admin

fn cmd_auth(engine: &Engine, session: &mut Session, args: &[Vec<u8>]) -> RespValue {
    let Some(expected) = &engine.password else {
        return RespValue::error("Client sent AUTH, but no password is set.");
    };
    let Some(given) = args.last() else {
        return RespValue::Error(KvError::arity("auth").to_resp_string());
    };
    if given.as_slice() == expected.as_bytes() {
        session.authenticated = true;
        RespValue::ok()
    } else {
        RespValue::error("invalid password")
    }
}

fn cmd_ping(args: &[Vec<u8>], subscribed: bool) -> RespValue {
    let payload = args.first().cloned();
    if subscribed {
        RespValue::Push(vec![
            RespValue::from_string("pong".to_string()),
            payload.map(RespValue::from_bytes).unwrap_or_else(|| RespValue::from_string(String::new())),
        ])
    } else {
        match payload {
            Some(p) => RespValue::from_bytes(p),
            None => RespValue::pong(),
        }
    }
}

fn cmd_echo(args: &[Vec<u8>]) -> Result<RespValue> {
    one_key(args, "echo").map(|b| RespValue::from_bytes(b.to_vec()))
}

fn cmd_select(args: &[Vec<u8>]) -> Result<RespValue> {
    let idx = parse_i64(one_key(args, "select")?)?;
    if idx == 0 {
        Ok(RespValue::ok())
    } else {
        Err(KvError::generic("DB index is out of range"))
    }
}

fn cmd_client(engine: &Engine, session: &mut Session, args: &[Vec<u8>]) -> Result<RespValue> {
    let sub = String::from_utf8_lossy(one_key(args, "client")?).to_uppercase();
    match sub.as_str() {
        "SETNAME" => {
            let name = args.get(1).ok_or_else(|| KvError::arity("client|setname"))?;
            let name = String::from_utf8_lossy(name).into_owned();
            session.name = Some(name.clone());
            engine.connections.set_name(session.id, Some(name));
            Ok(RespValue::ok())
        }
        "GETNAME" => Ok(session.name.clone().map(RespValue::from_string).unwrap_or_else(RespValue::null)),
        "ID" => Ok(RespValue::Integer(session.id as i64)),
        "SETINFO" => Ok(RespValue::ok()),
        "LIST" => Ok(RespValue::from_string(client_list_text(engine))),
        "NO-EVICT" | "NO-TOUCH" => Ok(RespValue::ok()),
        _ => Err(KvError::generic(format!("Unknown CLIENT subcommand '{}'", sub.to_lowercase()))),
    }
}

/// One `id=... addr=... name=...` line per live connection, oldest first.
fn client_list_text(engine: &Engine) -> String {
    let mut out = String::new();
    for conn in engine.connections.list() {
        let addr = conn.addr.map(|a| a.to_string()).unwrap_or_else(|| "?:0".to_string());
        out.push_str(&format!(
            "id={} addr={} name={} age={} cmd=client|list\n",
            conn.id,
            addr,
            conn.name.unwrap_or_default(),
            conn.connected_at.elapsed().as_secs(),
        ));
    }
    out
}

fn cmd_config(args: &[Vec<u8>]) -> Result<RespValue> {
    let sub = String::from_utf8_lossy(one_key(args, "config")?).to_uppercase();
    match sub.as_str() {
        "GET" => {
            let param = args.get(1).map(|b| String::from_utf8_lossy(b).into_owned()).unwrap_or_default();
            Ok(RespValue::Array(Some(vec![RespValue::from_string(param), RespValue::from_string(String::new())])))
        }
        "SET" => Ok(RespValue::ok()),
        _ => Err(KvError::generic(format!("Unknown CONFIG subcommand '{}'", sub.to_lowercase()))),
    }
}

fn info_text(engine: &Engine) -> String {
    format!(
        "# Server\r\nredis_version:7.4.0\r\nredcore_mode:standalone\r\nrole:master\r\nuptime_in_seconds:{}\r\n\r\n# Clients\r\nconnected_clients:{}\r\n",
        engine.started_at.elapsed().as_secs(),
        engine.connections.len(),
    )
}

fn cmd_pubsub(engine: &Engine, args: &[Vec<u8>]) -> Result<RespValue> {
    let sub = String::from_utf8_lossy(one_key(args, "pubsub")?).to_uppercase();
    match sub.as_str() {
        "CHANNELS" => {
            let pattern = args.get(1).map(|p| p.clone());
            let names = engine.pubsub.channels_matching(pattern.as_deref());
            Ok(encode_bulk_vec(names))
        }
        "NUMSUB" => {
            let mut out = Vec::new();
            for ch in &args[1..] {
                out.push(RespValue::from_bytes(ch.clone()));
                out.push(RespValue::Integer(engine.pubsub.numsub(ch)));
            }
            Ok(RespValue::Array(Some(out)))
        }
        "NUMPAT" => Ok(RespValue::Integer(engine.pubsub.numpat())),
        _ => Err(KvError::generic(format!("Unknown PUBSUB subcommand '{}'", sub.to_lowercase()))),
    }
}

fn cmd_publish(engine: &Engine, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() != 2 {
        return Err(KvError::arity("publish"));
    }
    Ok(RespValue::Integer(engine.pubsub.publish(&args[0], &args[1])))
}

// ---------------------------------------------------------------------
// Transactions / pub-sub bookkeeping

fn cmd_watch(engine: &Engine, session: &mut Session, args: &[Vec<u8>]) -> RespValue {
    if args.is_empty() {
        return RespValue::Error(KvError::arity("watch").to_resp_string());
    }
    session.tx.watch(&engine.keyspace, args);
    RespValue::ok()
}

fn cmd_subscribe(session: &mut Session, args: &[Vec<u8>]) -> Outcome {
    if args.is_empty() {
        return Outcome::Reply(RespValue::Error(KvError::arity("subscribe").to_resp_string()));
    }
    let mut replies = Vec::with_capacity(args.len());
    for ch in args {
        session.subscribed_channels.insert(ch.clone());
        replies.push(RespValue::Push(vec![
            RespValue::from_string("subscribe".to_string()),
            RespValue::from_bytes(ch.clone()),
            RespValue::Integer(session.subscription_count() as i64),
        ]));
    }
    Outcome::Subscribe { channels: args.to_vec(), patterns: Vec::new(), replies }
}

fn cmd_psubscribe(session: &mut Session, args: &[Vec<u8>]) -> Outcome {
    if args.is_empty() {
        return Outcome::Reply(RespValue::Error(KvError::arity("psubscribe").to_resp_string()));
    }
    let mut replies = Vec::with_capacity(args.len());
    for pat in args {
        session.subscribed_patterns.insert(pat.clone());
        replies.push(RespValue::Push(vec![
            RespValue::from_string("psubscribe".to_string()),
            RespValue::from_bytes(pat.clone()),
            RespValue::Integer(session.subscription_count() as i64),
        ]));
    }
    Outcome::Subscribe { channels: Vec::new(), patterns: args.to_vec(), replies }
}

fn cmd_unsubscribe(session: &mut Session, args: &[Vec<u8>]) -> Outcome {
    let targets: Vec<Vec<u8>> = if args.is_empty() {
        session.subscribed_channels.iter().cloned().collect()
    } else {
        args.to_vec()
    };
    let mut replies = Vec::new();
    if targets.is_empty() {
        replies.push(unsub_reply("unsubscribe", None, 0));
    }
    for ch in &targets {
        session.subscribed_channels.remove(ch);
        replies.push(unsub_reply("unsubscribe", Some(ch.clone()), session.subscription_count() as i64));
    }
    Outcome::Unsubscribe { channels: targets, patterns: Vec::new(), replies }
}

fn cmd_punsubscribe(session: &mut Session, args: &[Vec<u8>]) -> Outcome {
    let targets: Vec<Vec<u8>> = if args.is_empty() {
        session.subscribed_patterns.iter().cloned().collect()
    } else {
        args.to_vec()
    };
    let mut replies = Vec::new();
    if targets.is_empty() {
        replies.push(unsub_reply("punsubscribe", None, 0));
    }
    for pat in &targets {
        session.subscribed_patterns.remove(pat);
        replies.push(unsub_reply("punsubscribe", Some(pat.clone()), session.subscription_count() as i64));
    }
    Outcome::Unsubscribe { channels: Vec::new(), patterns: targets, replies }
}

fn unsub_reply(kind: &str, name: Option<Vec<u8>>, count: i64) -> RespValue {
    RespValue::Push(vec![
        RespValue::from_string(kind.to_string()),
        name.map(RespValue::from_bytes).unwrap_or_else(RespValue::null),
        RespValue::Integer(count),
    ])
}

// ---------------------------------------------------------------------
// Strings / expiry

fn cmd_set(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() < 2 {
        return Err(KvError::arity("set"));
    }
    let key = &args[0];
    let value = args[1].clone();
    let mut opts = SetOptions::new();
    let mut i = 2;
    while i < args.len() {
        match String::from_utf8_lossy(&args[i]).to_uppercase().as_str() {
            "NX" => {
                opts = opts.nx();
                i += 1;
            }
            "XX" => {
                opts = opts.xx();
                i += 1;
            }
            "EX" => {
                let secs = parse_i64(args.get(i + 1).ok_or(KvError::SyntaxError)?)?;
                opts.ttl = Some(Duration::from_millis((secs.max(0) as u64) * 1000));
                i += 2;
            }
            "PX" => {
                let ms = parse_i64(args.get(i + 1).ok_or(KvError::SyntaxError)?)?;
                opts.ttl = Some(Duration::from_millis(ms.max(0) as u64));
                i += 2;
            }
            _ => return Err(KvError::SyntaxError),
        }
    }
    if ks.set(key, value, &opts) {
        Ok(RespValue::ok())
    } else {
        Ok(RespValue::null())
    }
}

fn cmd_incrby(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() != 2 {
        return Err(KvError::arity("incrby"));
    }
    ks.incrby(&args[0], parse_i64(&args[1])?).map(RespValue::Integer)
}

fn cmd_decrby(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() != 2 {
        return Err(KvError::arity("decrby"));
    }
    ks.decrby(&args[0], parse_i64(&args[1])?).map(RespValue::Integer)
}

fn cmd_incrbyfloat(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() != 2 {
        return Err(KvError::arity("incrbyfloat"));
    }
    ks.incrbyfloat(&args[0], parse_f64(&args[1])?).map(|f| RespValue::from_string(format!("{}", f)))
}

fn cmd_mset(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.is_empty() || args.len() % 2 != 0 {
        return Err(KvError::arity("mset"));
    }
    for pair in args.chunks(2) {
        ks.set(&pair[0], pair[1].clone(), &SetOptions::new());
    }
    Ok(RespValue::ok())
}

fn cmd_rename(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() != 2 {
        return Err(KvError::arity("rename"));
    }
    ks.rename(&args[0], &args[1])?;
    Ok(RespValue::ok())
}

fn cmd_renamenx(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() != 2 {
        return Err(KvError::arity("renamenx"));
    }
    ks.renamenx(&args[0], &args[1]).map(RespValue::from)
}

fn cmd_copy(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() < 2 {
        return Err(KvError::arity("copy"));
    }
    let replace = args.get(2).map(|a| a.eq_ignore_ascii_case(b"REPLACE")).unwrap_or(false);
    ks.copy(&args[0], &args[1], replace).map(RespValue::from)
}

fn cmd_expire(ks: &Keyspace, args: &[Vec<u8>], unit_ms: i64) -> Result<RespValue> {
    if args.len() != 2 {
        return Err(KvError::arity("expire"));
    }
    let delta = parse_i64(&args[1])?;
    let at = ks.now_ms() + delta * unit_ms;
    Ok(RespValue::from(ks.expire_at_ms(&args[0], at)))
}

fn cmd_ttl(ks: &Keyspace, args: &[Vec<u8>], unit_ms: i64) -> Result<RespValue> {
    let key = one_key(args, "ttl")?;
    if !ks.exists(key) {
        return Ok(RespValue::Integer(-2));
    }
    match ks.ttl_ms(key) {
        None => Ok(RespValue::Integer(-1)),
        Some(ms) => Ok(RespValue::Integer((ms + unit_ms - 1) / unit_ms)),
    }
}

// ---------------------------------------------------------------------
// Hash

fn cmd_hset(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() < 3 || args.len() % 2 != 1 {
        return Err(KvError::arity("hset"));
    }
    let pairs = args[1..].chunks(2).map(|c| (c[0].clone(), c[1].clone())).collect();
    ks.hset(&args[0], pairs).map(RespValue::Integer)
}

fn cmd_hsetnx(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() != 3 {
        return Err(KvError::arity("hsetnx"));
    }
    ks.hsetnx(&args[0], args[1].clone(), args[2].clone()).map(RespValue::from)
}

fn cmd_hget(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() != 2 {
        return Err(KvError::arity("hget"));
    }
    ks.hget(&args[0], &args[1]).map(RespValue::from)
}

fn cmd_hmget(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() < 2 {
        return Err(KvError::arity("hmget"));
    }
    ks.hmget(&args[0], &args[1..]).map(|vs| RespValue::Array(Some(vs.into_iter().map(RespValue::from).collect())))
}

fn cmd_hdel(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() < 2 {
        return Err(KvError::arity("hdel"));
    }
    ks.hdel(&args[0], &args[1..]).map(RespValue::Integer)
}

fn cmd_hexists(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() != 2 {
        return Err(KvError::arity("hexists"));
    }
    ks.hexists(&args[0], &args[1]).map(RespValue::from)
}

fn cmd_hincrby(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() != 3 {
        return Err(KvError::arity("hincrby"));
    }
    ks.hincrby(&args[0], &args[1], parse_i64(&args[2])?).map(RespValue::Integer)
}

// ---------------------------------------------------------------------
// List

fn cmd_list_push(ks: &Keyspace, args: &[Vec<u8>], left: bool) -> Result<RespValue> {
    if args.len() < 2 {
        return Err(KvError::arity(if left { "lpush" } else { "rpush" }));
    }
    let values = args[1..].to_vec();
    if left {
        ks.lpush(&args[0], values)
    } else {
        ks.rpush(&args[0], values)
    }
    .map(RespValue::Integer)
}

fn cmd_lrange(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() != 3 {
        return Err(KvError::arity("lrange"));
    }
    ks.lrange(&args[0], parse_i64(&args[1])?, parse_i64(&args[2])?).map(encode_bulk_vec)
}

fn cmd_lindex(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() != 2 {
        return Err(KvError::arity("lindex"));
    }
    ks.lindex(&args[0], parse_i64(&args[1])?).map(RespValue::from)
}

fn cmd_lset(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() != 3 {
        return Err(KvError::arity("lset"));
    }
    ks.lset(&args[0], parse_i64(&args[1])?, args[2].clone())?;
    Ok(RespValue::ok())
}

fn cmd_ltrim(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() != 3 {
        return Err(KvError::arity("ltrim"));
    }
    ks.ltrim(&args[0], parse_i64(&args[1])?, parse_i64(&args[2])?)?;
    Ok(RespValue::ok())
}

fn cmd_lrem(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() != 3 {
        return Err(KvError::arity("lrem"));
    }
    ks.lrem(&args[0], parse_i64(&args[1])?, &args[2]).map(RespValue::Integer)
}

// ---------------------------------------------------------------------
// Set

fn cmd_set_add(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() < 2 {
        return Err(KvError::arity("sadd"));
    }
    ks.sadd(&args[0], args[1..].to_vec()).map(RespValue::Integer)
}

fn cmd_srem(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() < 2 {
        return Err(KvError::arity("srem"));
    }
    ks.srem(&args[0], &args[1..]).map(RespValue::Integer)
}

fn cmd_sismember(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() != 2 {
        return Err(KvError::arity("sismember"));
    }
    ks.sismember(&args[0], &args[1]).map(RespValue::from)
}

enum SetOp {
    Union,
    Inter,
    Diff,
}

fn cmd_setop_store(ks: &Keyspace, args: &[Vec<u8>], op: SetOp) -> Result<RespValue> {
    if args.len() < 2 {
        return Err(KvError::arity("sunionstore"));
    }
    let dest = &args[0];
    let keys = &args[1..];
    match op {
        SetOp::Union => ks.sunionstore(dest, keys),
        SetOp::Inter => ks.sinterstore(dest, keys),
        SetOp::Diff => ks.sdiffstore(dest, keys),
    }
    .map(RespValue::Integer)
}

// ---------------------------------------------------------------------
// Sorted set

fn cmd_zadd(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() < 3 || args.len() % 2 != 1 {
        return Err(KvError::arity("zadd"));
    }
    let mut pairs = Vec::with_capacity(args.len() / 2);
    for c in args[1..].chunks(2) {
        pairs.push((parse_f64(&c[0])?, c[1].clone()));
    }
    ks.zadd(&args[0], pairs).map(RespValue::Integer)
}

fn cmd_zincrby(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() != 3 {
        return Err(KvError::arity("zincrby"));
    }
    ks.zincrby(&args[0], parse_f64(&args[1])?, args[2].clone())
        .map(|f| RespValue::from_bytes(crate::keyspace::format_score_bytes(f)))
}

fn cmd_zrem(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() < 2 {
        return Err(KvError::arity("zrem"));
    }
    ks.zrem(&args[0], &args[1..]).map(RespValue::Integer)
}

fn cmd_zscore(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() != 2 {
        return Err(KvError::arity("zscore"));
    }
    ks.zscore(&args[0], &args[1]).map(|opt| match opt {
        Some(f) => RespValue::from_bytes(crate::keyspace::format_score_bytes(f)),
        None => RespValue::null(),
    })
}

fn cmd_zrank(ks: &Keyspace, args: &[Vec<u8>], rev: bool) -> Result<RespValue> {
    if args.len() != 2 {
        return Err(KvError::arity("zrank"));
    }
    let rank = if rev { ks.zrevrank(&args[0], &args[1])? } else { ks.zrank(&args[0], &args[1])? };
    Ok(match rank {
        Some(r) => RespValue::Integer(r as i64),
        None => RespValue::null(),
    })
}

fn cmd_zrange(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() < 3 {
        return Err(KvError::arity("zrange"));
    }
    let withscores = args.get(3).map(|a| a.eq_ignore_ascii_case(b"WITHSCORES")).unwrap_or(false);
    let members = ks.zrange(&args[0], parse_i64(&args[1])?, parse_i64(&args[2])?)?;
    Ok(encode_zmembers(members, withscores))
}

fn cmd_zrangebyscore(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() < 3 {
        return Err(KvError::arity("zrangebyscore"));
    }
    let (min, min_excl) = crate::keyspace::parse_score_bound(&String::from_utf8_lossy(&args[1]))?;
    let (max, max_excl) = crate::keyspace::parse_score_bound(&String::from_utf8_lossy(&args[2]))?;
    let mut withscores = false;
    let mut offset = None;
    let mut count = None;
    let mut i = 3;
    while i < args.len() {
        match String::from_utf8_lossy(&args[i]).to_uppercase().as_str() {
            "WITHSCORES" => {
                withscores = true;
                i += 1;
            }
            "LIMIT" => {
                offset = Some(parse_i64(args.get(i + 1).ok_or(KvError::SyntaxError)?)?);
                count = Some(parse_i64(args.get(i + 2).ok_or(KvError::SyntaxError)?)?);
                i += 3;
            }
            _ => return Err(KvError::SyntaxError),
        }
    }
    let mut members = ks.zrangebyscore(&args[0], min, min_excl, max, max_excl)?;
    if let (Some(off), Some(cnt)) = (offset, count) {
        let off = off.max(0) as usize;
        members = members.into_iter().skip(off).take(if cnt < 0 { usize::MAX } else { cnt as usize }).collect();
    }
    Ok(encode_zmembers(members, withscores))
}

fn cmd_zcount(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() != 3 {
        return Err(KvError::arity("zcount"));
    }
    let (min, min_excl) = crate::keyspace::parse_score_bound(&String::from_utf8_lossy(&args[1]))?;
    let (max, max_excl) = crate::keyspace::parse_score_bound(&String::from_utf8_lossy(&args[2]))?;
    ks.zcount(&args[0], min, min_excl, max, max_excl).map(RespValue::Integer)
}

fn cmd_zremrangebyscore(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() != 3 {
        return Err(KvError::arity("zremrangebyscore"));
    }
    let (min, min_excl) = crate::keyspace::parse_score_bound(&String::from_utf8_lossy(&args[1]))?;
    let (max, max_excl) = crate::keyspace::parse_score_bound(&String::from_utf8_lossy(&args[2]))?;
    ks.zremrangebyscore(&args[0], min, min_excl, max, max_excl).map(RespValue::Integer)
}

fn encode_zmembers(members: Vec<(Vec<u8>, f64)>, withscores: bool) -> RespValue {
    let mut out = Vec::with_capacity(members.len() * if withscores { 2 } else { 1 });
    for (member, score) in members {
        out.push(RespValue::from_bytes(member));
        if withscores {
            out.push(RespValue::from_bytes(crate::keyspace::format_score_bytes(score)));
        }
    }
    RespValue::Array(Some(out))
}

// ---------------------------------------------------------------------
// Streams

fn parse_stream_id(b: &[u8]) -> Result<StreamId> {
    StreamId::parse(&String::from_utf8_lossy(b)).ok_or(KvError::SyntaxError)
}

fn cmd_xadd(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.is_empty() {
        return Err(KvError::arity("xadd"));
    }
    let key = &args[0];
    let mut i = 1;
    let mut nomkstream = false;
    let mut trim = None;
    loop {
        let Some(tok) = args.get(i) else { break };
        match String::from_utf8_lossy(tok).to_uppercase().as_str() {
            "NOMKSTREAM" => {
                nomkstream = true;
                i += 1;
            }
            "MAXLEN" => {
                i += 1;
                if matches!(args.get(i).map(|v| v.as_slice()), Some(b"~") | Some(b"=")) {
                    i += 1;
                }
                trim = Some(TrimSpec::MaxLen(parse_i64(args.get(i).ok_or(KvError::SyntaxError)?)?));
                i += 1;
            }
            "MINID" => {
                i += 1;
                if matches!(args.get(i).map(|v| v.as_slice()), Some(b"~") | Some(b"=")) {
                    i += 1;
                }
                trim = Some(TrimSpec::MinId(parse_stream_id(args.get(i).ok_or(KvError::SyntaxError)?)?));
                i += 1;
            }
            "LIMIT" => {
                i += 2;
            }
            _ => break,
        }
    }
    let id_tok = args.get(i).ok_or_else(|| KvError::arity("xadd"))?;
    let id = if id_tok.as_slice() == b"*" { None } else { Some(parse_stream_id(id_tok)?) };
    i += 1;
    let rest = &args[i..];
    if rest.is_empty() || rest.len() % 2 != 0 {
        return Err(KvError::SyntaxError);
    }
    let fields = rest.chunks(2).map(|c| (c[0].clone(), c[1].clone())).collect();
    match ks.xadd(key, id, fields, nomkstream, trim)? {
        Some(id) => Ok(RespValue::from_string(id.to_string())),
        None => Ok(RespValue::null()),
    }
}

fn cmd_xdel(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() < 2 {
        return Err(KvError::arity("xdel"));
    }
    let ids: Vec<StreamId> = args[1..].iter().map(|b| parse_stream_id(b)).collect::<Result<_>>()?;
    ks.xdel(&args[0], &ids).map(RespValue::Integer)
}

fn cmd_xrange(ks: &Keyspace, args: &[Vec<u8>], rev: bool) -> Result<RespValue> {
    if args.len() < 3 {
        return Err(KvError::arity("xrange"));
    }
    // XRANGE takes (start, end) with start as the lower bound; XREVRANGE
    // takes (end, start) — the first positional argument is always the
    // higher bound there. Either way, resolve to (lower, upper) before
    // calling into the keyspace.
    let (lower_tok, upper_tok) = if rev { (&args[2], &args[1]) } else { (&args[1], &args[2]) };
    let start = StreamId::parse_range(&String::from_utf8_lossy(lower_tok), true).ok_or(KvError::SyntaxError)?;
    let end = StreamId::parse_range(&String::from_utf8_lossy(upper_tok), false).ok_or(KvError::SyntaxError)?;
    let count = match args.get(3) {
        Some(tok) if tok.eq_ignore_ascii_case(b"COUNT") => Some(parse_usize(args.get(4).ok_or(KvError::SyntaxError)?)?),
        _ => None,
    };
    let entries = if rev { ks.xrevrange(&args[0], start, end, count)? } else { ks.xrange(&args[0], start, end, count)? };
    Ok(encode_entries(entries))
}

fn encode_entries(entries: Vec<crate::types::StreamEntry>) -> RespValue {
    RespValue::Array(Some(entries.into_iter().map(encode_stream_entry).collect()))
}

fn encode_stream_entry(e: crate::types::StreamEntry) -> RespValue {
    let mut fields = Vec::with_capacity(e.fields.len() * 2);
    for (f, v) in e.fields {
        fields.push(RespValue::from_bytes(f));
        fields.push(RespValue::from_bytes(v));
    }
    RespValue::Array(Some(vec![RespValue::from_string(e.id.to_string()), RespValue::Array(Some(fields))]))
}

/// Race a set of per-key wake signals; resolves as soon as any one fires.
async fn notified_any(waiters: &[Arc<Notify>]) {
    let mut futs: Vec<_> = waiters.iter().map(|w| Box::pin(w.notified())).collect();
    std::future::poll_fn(move |cx| {
        for fut in futs.iter_mut() {
            if fut.as_mut().poll(cx).is_ready() {
                return Poll::Ready(());
            }
        }
        Poll::Pending
    })
    .await
}

struct StreamsClause {
    keys: Vec<Vec<u8>>,
    ids: Vec<Vec<u8>>,
    count: Option<usize>,
    block_ms: Option<i64>,
}

fn parse_streams_clause(args: &[Vec<u8>]) -> Result<StreamsClause> {
    let mut i = 0;
    let mut count = None;
    let mut block_ms = None;
    loop {
        let Some(tok) = args.get(i) else { return Err(KvError::SyntaxError) };
        match String::from_utf8_lossy(tok).to_uppercase().as_str() {
            "COUNT" => {
                count = Some(parse_usize(args.get(i + 1).ok_or(KvError::SyntaxError)?)?);
                i += 2;
            }
            "BLOCK" => {
                block_ms = Some(parse_i64(args.get(i + 1).ok_or(KvError::SyntaxError)?)?);
                i += 2;
            }
            "NOACK" => {
                i += 1;
            }
            "STREAMS" => {
                i += 1;
                break;
            }
            _ => return Err(KvError::SyntaxError),
        }
    }
    let rest = &args[i..];
    if rest.is_empty() || rest.len() % 2 != 0 {
        return Err(KvError::SyntaxError);
    }
    let n = rest.len() / 2;
    Ok(StreamsClause {
        keys: rest[..n].to_vec(),
        ids: rest[n..].to_vec(),
        count,
        block_ms,
    })
}

async fn cmd_xread(ks: &Keyspace, args: &[Vec<u8>], blocking_allowed: bool) -> Result<RespValue> {
    let clause = parse_streams_clause(args)?;
    let mut after_ids = Vec::with_capacity(clause.keys.len());
    for (key, id_tok) in clause.keys.iter().zip(clause.ids.iter()) {
        let after = if id_tok.as_slice() == b"$" {
            ks.xinfo_stream(key).map(|info| info.last_generated_id).unwrap_or_else(|_| StreamId::min())
        } else {
            parse_stream_id(id_tok)?
        };
        after_ids.push(after);
    }

    let deadline_ms = if blocking_allowed { clause.block_ms } else { None };
    // `deadline` is computed once: a spurious wake (e.g. a write to a
    // different key in the STREAMS clause) must not re-arm the full BLOCK
    // duration on every loop iteration.
    let deadline = deadline_ms.filter(|&ms| ms > 0).map(|ms| tokio::time::Instant::now() + Duration::from_millis(ms as u64));
    loop {
        let mut out = Vec::new();
        for (key, after) in clause.keys.iter().zip(after_ids.iter()) {
            let entries = ks.xread(key, *after, clause.count)?;
            if !entries.is_empty() {
                out.push(RespValue::Array(Some(vec![RespValue::from_bytes(key.clone()), encode_entries(entries)])));
            }
        }
        if !out.is_empty() {
            return Ok(RespValue::Array(Some(out)));
        }
        match deadline_ms {
            None => return Ok(RespValue::Array(None)),
            Some(0) => {
                let waiters: Vec<_> = clause.keys.iter().map(|k| ks.waiter_for(k)).collect();
                notified_any(&waiters).await;
            }
            Some(_) => {
                let waiters: Vec<_> = clause.keys.iter().map(|k| ks.waiter_for(k)).collect();
                if tokio::time::timeout_at(deadline.expect("deadline set for nonzero block"), notified_any(&waiters))
                    .await
                    .is_err()
                {
                    return Ok(RespValue::Array(None));
                }
            }
        }
    }
}

async fn cmd_xreadgroup(ks: &Keyspace, args: &[Vec<u8>], blocking_allowed: bool) -> Result<RespValue> {
    if args.len() < 2 || !args[0].eq_ignore_ascii_case(b"GROUP") {
        return Err(KvError::SyntaxError);
    }
    let group = String::from_utf8_lossy(&args[1]).into_owned();
    let consumer = String::from_utf8_lossy(args.get(2).ok_or(KvError::SyntaxError)?).into_owned();
    let noack = args.iter().any(|a| a.eq_ignore_ascii_case(b"NOACK"));
    let clause = parse_streams_clause(&args[3..])?;
    let deadline_ms = if blocking_allowed { clause.block_ms } else { None };
    let deadline = deadline_ms.filter(|&ms| ms > 0).map(|ms| tokio::time::Instant::now() + Duration::from_millis(ms as u64));

    loop {
        let mut out = Vec::new();
        for (key, id_tok) in clause.keys.iter().zip(clause.ids.iter()) {
            let entries = if id_tok.as_slice() == b">" {
                remap_nogroup(ks.xreadgroup_new(key, &group, &consumer, clause.count, noack), key, &group)?
            } else {
                let after = parse_stream_id(id_tok)?;
                remap_nogroup(ks.xreadgroup_pending(key, &group, &consumer, after, clause.count), key, &group)?
            };
            if !entries.is_empty() {
                out.push(RespValue::Array(Some(vec![RespValue::from_bytes(key.clone()), encode_entries(entries)])));
            }
        }
        if !out.is_empty() || clause.ids.iter().any(|id| id.as_slice() != b">") {
            // explicit-id reads never block, even if empty
            return Ok(if out.is_empty() { RespValue::Array(None) } else { RespValue::Array(Some(out)) });
        }
        match deadline_ms {
            None => return Ok(RespValue::Array(None)),
            Some(0) => {
                let waiters: Vec<_> = clause.keys.iter().map(|k| ks.waiter_for(k)).collect();
                notified_any(&waiters).await;
            }
            Some(_) => {
                let waiters: Vec<_> = clause.keys.iter().map(|k| ks.waiter_for(k)).collect();
                if tokio::time::timeout_at(deadline.expect("deadline set for nonzero block"), notified_any(&waiters))
                    .await
                    .is_err()
                {
                    return Ok(RespValue::Array(None));
                }
            }
        }
    }
}

fn remap_nogroup<T>(r: Result<T>, key: &[u8], group: &str) -> Result<T> {
    match r {
        Err(KvError::NoSuchKey) | Err(KvError::NoStream) => Err(KvError::NoGroup {
            key: String::from_utf8_lossy(key).into_owned(),
            group: group.to_string(),
        }),
        other => other,
    }
}

fn cmd_xgroup(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    let sub = String::from_utf8_lossy(one_key(args, "xgroup")?).to_uppercase();
    match sub.as_str() {
        "CREATE" => {
            if args.len() < 4 {
                return Err(KvError::arity("xgroup"));
            }
            let mkstream = args.iter().any(|a| a.eq_ignore_ascii_case(b"MKSTREAM"));
            let id = if args[3].as_slice() == b"$" {
                StreamId::max()
            } else {
                parse_stream_id(&args[3])?
            };
            ks.xgroup_create(&args[1], &String::from_utf8_lossy(&args[2]), id, mkstream)?;
            Ok(RespValue::ok())
        }
        "DESTROY" => {
            if args.len() != 3 {
                return Err(KvError::arity("xgroup"));
            }
            ks.xgroup_destroy(&args[1], &String::from_utf8_lossy(&args[2])).map(RespValue::from)
        }
        "SETID" => {
            if args.len() != 4 {
                return Err(KvError::arity("xgroup"));
            }
            let id = if args[3].as_slice() == b"$" {
                StreamId::max()
            } else {
                parse_stream_id(&args[3])?
            };
            let group = String::from_utf8_lossy(&args[2]).into_owned();
            remap_nogroup(ks.xgroup_setid(&args[1], &group, id), &args[1], &group)?;
            Ok(RespValue::ok())
        }
        "CREATECONSUMER" => {
            if args.len() != 4 {
                return Err(KvError::arity("xgroup"));
            }
            let group = String::from_utf8_lossy(&args[2]).into_owned();
            remap_nogroup(ks.xgroup_createconsumer(&args[1], &group, &String::from_utf8_lossy(&args[3])), &args[1], &group)
                .map(RespValue::from)
        }
        "DELCONSUMER" => {
            if args.len() != 4 {
                return Err(KvError::arity("xgroup"));
            }
            let group = String::from_utf8_lossy(&args[2]).into_owned();
            remap_nogroup(ks.xgroup_delconsumer(&args[1], &group, &String::from_utf8_lossy(&args[3])), &args[1], &group)
                .map(RespValue::Integer)
        }
        _ => Err(KvError::generic(format!("Unknown XGROUP subcommand '{}'", sub.to_lowercase()))),
    }
}

fn cmd_xack(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() < 3 {
        return Err(KvError::arity("xack"));
    }
    let group = String::from_utf8_lossy(&args[1]).into_owned();
    let ids: Vec<StreamId> = args[2..].iter().map(|b| parse_stream_id(b)).collect::<Result<_>>()?;
    remap_nogroup(ks.xack(&args[0], &group, &ids), &args[0], &group).map(RespValue::Integer)
}

fn cmd_xpending(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() < 2 {
        return Err(KvError::arity("xpending"));
    }
    let key = &args[0];
    let group = String::from_utf8_lossy(&args[1]).into_owned();
    if args.len() == 2 {
        let summary = remap_nogroup(ks.xpending_summary(key, &group), key, &group)?;
        return Ok(RespValue::Array(Some(vec![
            RespValue::Integer(summary.count),
            summary.smallest_id.map(|id| RespValue::from_string(id.to_string())).unwrap_or_else(RespValue::null),
            summary.largest_id.map(|id| RespValue::from_string(id.to_string())).unwrap_or_else(RespValue::null),
            if summary.consumers.is_empty() {
                RespValue::Array(None)
            } else {
                RespValue::Array(Some(
                    summary
                        .consumers
                        .into_iter()
                        .map(|(name, count)| {
                            RespValue::Array(Some(vec![RespValue::from_string(name), RespValue::from_string(count.to_string())]))
                        })
                        .collect(),
                ))
            },
        ])));
    }

    let mut i = 2;
    let mut min_idle_ms = None;
    if args.get(i).map(|a| a.eq_ignore_ascii_case(b"IDLE")).unwrap_or(false) {
        min_idle_ms = Some(parse_i64(args.get(i + 1).ok_or(KvError::SyntaxError)?)?);
        i += 2;
    }
    let start = StreamId::parse_range(&String::from_utf8_lossy(args.get(i).ok_or(KvError::SyntaxError)?), true).ok_or(KvError::SyntaxError)?;
    let end = StreamId::parse_range(&String::from_utf8_lossy(args.get(i + 1).ok_or(KvError::SyntaxError)?), false).ok_or(KvError::SyntaxError)?;
    let count = parse_usize(args.get(i + 2).ok_or(KvError::SyntaxError)?)?;
    let consumer = args.get(i + 3).map(|b| String::from_utf8_lossy(b).into_owned());
    let entries = remap_nogroup(
        ks.xpending_range(key, &group, start, end, count, consumer.as_deref(), min_idle_ms),
        key,
        &group,
    )?;
    Ok(RespValue::Array(Some(
        entries
            .into_iter()
            .map(|e| {
                RespValue::Array(Some(vec![
                    RespValue::from_string(e.id.to_string()),
                    RespValue::from_string(e.consumer),
                    RespValue::Integer(e.idle),
                    RespValue::Integer(e.delivery_count),
                ]))
            })
            .collect(),
    )))
}

fn cmd_xclaim(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() < 5 {
        return Err(KvError::arity("xclaim"));
    }
    let key = args[0].clone();
    let group = String::from_utf8_lossy(&args[1]).into_owned();
    let consumer = String::from_utf8_lossy(&args[2]).into_owned();
    let min_idle_ms = parse_i64(&args[3])?;
    let mut i = 4;
    let mut ids = Vec::new();
    while let Some(tok) = args.get(i) {
        match parse_stream_id(tok) {
            Ok(id) => {
                ids.push(id);
                i += 1;
            }
            Err(_) => break,
        }
    }
    let mut set_idle_ms = None;
    let mut set_time_ms = None;
    let mut set_retry = None;
    let mut force = false;
    while let Some(tok) = args.get(i) {
        match String::from_utf8_lossy(tok).to_uppercase().as_str() {
            "IDLE" => {
                set_idle_ms = Some(parse_i64(args.get(i + 1).ok_or(KvError::SyntaxError)?)?);
                i += 2;
            }
            "TIME" => {
                set_time_ms = Some(parse_i64(args.get(i + 1).ok_or(KvError::SyntaxError)?)?);
                i += 2;
            }
            "RETRYCOUNT" => {
                set_retry = Some(parse_i64(args.get(i + 1).ok_or(KvError::SyntaxError)?)?);
                i += 2;
            }
            "FORCE" => {
                force = true;
                i += 1;
            }
            "JUSTID" => {
                i += 1;
            }
            _ => return Err(KvError::SyntaxError),
        }
    }
    let claimed = remap_nogroup(
        ks.xclaim(&key, &group, &consumer, &ids, min_idle_ms, set_idle_ms, set_time_ms, set_retry, force),
        &key,
        &group,
    )?;
    Ok(RespValue::Array(Some(claimed.into_iter().map(|id| RespValue::from_string(id.to_string())).collect())))
}

fn cmd_xautoclaim(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() < 5 {
        return Err(KvError::arity("xautoclaim"));
    }
    let key = args[0].clone();
    let group = String::from_utf8_lossy(&args[1]).into_owned();
    let consumer = String::from_utf8_lossy(&args[2]).into_owned();
    let min_idle_ms = parse_i64(&args[3])?;
    let cursor = parse_stream_id(&args[4])?;
    let mut count = 100usize;
    if args.get(5).map(|a| a.eq_ignore_ascii_case(b"COUNT")).unwrap_or(false) {
        count = parse_usize(args.get(6).ok_or(KvError::SyntaxError)?)?;
    }
    let (next_cursor, claimed, deleted) = remap_nogroup(ks.xautoclaim(&key, &group, &consumer, min_idle_ms, cursor, count), &key, &group)?;
    Ok(RespValue::Array(Some(vec![
        RespValue::from_string(next_cursor.to_string()),
        RespValue::Array(Some(claimed.into_iter().map(|id| RespValue::from_string(id.to_string())).collect())),
        RespValue::Array(Some(deleted.into_iter().map(|id| RespValue::from_string(id.to_string())).collect())),
    ])))
}

fn cmd_xinfo(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    let sub = String::from_utf8_lossy(one_key(args, "xinfo")?).to_uppercase();
    match sub.as_str() {
        "STREAM" => {
            let key = args.get(1).ok_or(KvError::SyntaxError)?;
            let info = ks.xinfo_stream(key)?;
            Ok(RespValue::Array(Some(vec![
                RespValue::from_string("length".to_string()),
                RespValue::Integer(info.length),
                RespValue::from_string("last-generated-id".to_string()),
                RespValue::from_string(info.last_generated_id.to_string()),
                RespValue::from_string("max-deleted-entry-id".to_string()),
                RespValue::from_string(info.max_deleted_entry_id.to_string()),
                RespValue::from_string("groups".to_string()),
                RespValue::Integer(info.groups),
                RespValue::from_string("first-entry".to_string()),
                info.first_entry.map(encode_stream_entry).unwrap_or_else(RespValue::null),
                RespValue::from_string("last-entry".to_string()),
                info.last_entry.map(encode_stream_entry).unwrap_or_else(RespValue::null),
            ])))
        }
        "GROUPS" => {
            let key = args.get(1).ok_or(KvError::SyntaxError)?;
            let groups = ks.xinfo_groups(key)?;
            Ok(RespValue::Array(Some(
                groups
                    .into_iter()
                    .map(|g| {
                        RespValue::Array(Some(vec![
                            RespValue::from_string("name".to_string()),
                            RespValue::from_string(g.name),
                            RespValue::from_string("consumers".to_string()),
                            RespValue::Integer(g.consumers),
                            RespValue::from_string("pending".to_string()),
                            RespValue::Integer(g.pending),
                            RespValue::from_string("last-delivered-id".to_string()),
                            RespValue::from_string(g.last_delivered_id.to_string()),
                        ]))
                    })
                    .collect(),
            )))
        }
        "CONSUMERS" => {
            let key = args.get(1).ok_or(KvError::SyntaxError)?;
            let group = String::from_utf8_lossy(args.get(2).ok_or(KvError::SyntaxError)?).into_owned();
            let consumers = remap_nogroup(ks.xinfo_consumers(key, &group), key, &group)?;
            Ok(RespValue::Array(Some(
                consumers
                    .into_iter()
                    .map(|c| {
                        RespValue::Array(Some(vec![
                            RespValue::from_string("name".to_string()),
                            RespValue::from_string(c.name),
                            RespValue::from_string("pending".to_string()),
                            RespValue::Integer(c.pending),
                            RespValue::from_string("idle".to_string()),
                            RespValue::Integer(c.idle),
                        ]))
                    })
                    .collect(),
            )))
        }
        _ => Err(KvError::generic(format!("Unknown XINFO subcommand '{}'", sub.to_lowercase()))),
    }
}

// ---------------------------------------------------------------------
// JSON

fn parse_json_arg(b: &[u8]) -> Result<Value> {
    serde_json::from_slice(b).map_err(|e| KvError::generic(format!("json parse error: {e}")))
}

fn default_path(args: &[Vec<u8>], idx: usize) -> String {
    args.get(idx).map(|b| String::from_utf8_lossy(b).into_owned()).unwrap_or_else(|| "$".to_string())
}

fn cmd_json_set(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() != 3 {
        return Err(KvError::arity("json.set"));
    }
    let path = String::from_utf8_lossy(&args[1]).into_owned();
    let value = parse_json_arg(&args[2])?;
    ks.json_set(&args[0], &path, value)?;
    Ok(RespValue::ok())
}

fn cmd_json_get(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    let key = one_key(args, "json.get")?;
    let path = default_path(args, 1);
    match ks.json_get(key, &path)? {
        Some(v) => Ok(RespValue::from_string(v.to_string())),
        None => Ok(RespValue::null()),
    }
}

fn cmd_json_mget(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() < 2 {
        return Err(KvError::arity("json.mget"));
    }
    let path = String::from_utf8_lossy(args.last().unwrap()).into_owned();
    let keys = &args[..args.len() - 1];
    let values = ks.json_mget(keys, &path)?;
    Ok(RespValue::Array(Some(
        values
            .into_iter()
            .map(|v| v.map(|v| RespValue::from_string(v.to_string())).unwrap_or_else(RespValue::null))
            .collect(),
    )))
}

fn cmd_json_del(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    let key = one_key(args, "json.del")?;
    let path = default_path(args, 1);
    ks.json_del(key, &path).map(RespValue::Integer)
}

fn cmd_json_type(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    let key = one_key(args, "json.type")?;
    let path = default_path(args, 1);
    Ok(ks.json_type(key, &path)?.map(RespValue::from_string).unwrap_or_else(RespValue::null))
}

fn cmd_json_arrappend(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() < 3 {
        return Err(KvError::arity("json.arrappend"));
    }
    let path = String::from_utf8_lossy(&args[1]).into_owned();
    let values = args[2..].iter().map(|b| parse_json_arg(b)).collect::<Result<Vec<_>>>()?;
    ks.json_arrappend(&args[0], &path, values).map(RespValue::Integer)
}

fn cmd_json_arrinsert(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() < 4 {
        return Err(KvError::arity("json.arrinsert"));
    }
    let path = String::from_utf8_lossy(&args[1]).into_owned();
    let index = parse_i64(&args[2])?;
    let values = args[3..].iter().map(|b| parse_json_arg(b)).collect::<Result<Vec<_>>>()?;
    ks.json_arrinsert(&args[0], &path, index, values).map(RespValue::Integer)
}

fn cmd_json_arrtrim(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() != 4 {
        return Err(KvError::arity("json.arrtrim"));
    }
    let path = String::from_utf8_lossy(&args[1]).into_owned();
    ks.json_arrtrim(&args[0], &path, parse_i64(&args[2])?, parse_i64(&args[3])?).map(RespValue::Integer)
}

fn cmd_json_strappend(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() != 3 {
        return Err(KvError::arity("json.strappend"));
    }
    let path = String::from_utf8_lossy(&args[1]).into_owned();
    let suffix = match serde_json::from_slice::<String>(&args[2]) {
        Ok(s) => s,
        Err(_) => String::from_utf8_lossy(&args[2]).into_owned(),
    };
    ks.json_strappend(&args[0], &path, &suffix).map(RespValue::Integer)
}

fn cmd_json_numincrby(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() != 3 {
        return Err(KvError::arity("json.numincrby"));
    }
    let path = String::from_utf8_lossy(&args[1]).into_owned();
    ks.json_numincrby(&args[0], &path, parse_f64(&args[2])?).map(|f| RespValue::from_string(format!("{}", f)))
}

// ---------------------------------------------------------------------
// Vector

fn cmd_vset(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() < 3 {
        return Err(KvError::arity("vset"));
    }
    let element = String::from_utf8_lossy(&args[1]).into_owned();
    let vec: Vec<f32> = args[2..].iter().map(|b| parse_f64(b).map(|f| f as f32)).collect::<Result<_>>()?;
    ks.vset(&args[0], element, vec)?;
    Ok(RespValue::ok())
}

fn cmd_vrem(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() != 2 {
        return Err(KvError::arity("vrem"));
    }
    ks.vrem(&args[0], &String::from_utf8_lossy(&args[1])).map(RespValue::from)
}

fn cmd_vsim(ks: &Keyspace, args: &[Vec<u8>]) -> Result<RespValue> {
    if args.len() < 3 {
        return Err(KvError::arity("vsim"));
    }
    let metric = DistanceMetric::parse(&String::from_utf8_lossy(&args[1])).ok_or(KvError::SyntaxError)?;
    let mut i = 2;
    let mut query = Vec::new();
    while let Some(tok) = args.get(i) {
        match parse_f64(tok) {
            Ok(f) => {
                query.push(f as f32);
                i += 1;
            }
            Err(_) => break,
        }
    }
    let mut limit = 10usize;
    let mut offset = 0usize;
    while i < args.len() {
        match String::from_utf8_lossy(&args[i]).to_uppercase().as_str() {
            "LIMIT" => {
                limit = parse_usize(args.get(i + 1).ok_or(KvError::SyntaxError)?)?;
                i += 2;
            }
            "OFFSET" => {
                offset = parse_usize(args.get(i + 1).ok_or(KvError::SyntaxError)?)?;
                i += 2;
            }
            "WITHSCORES" => {
                i += 1;
            }
            _ => return Err(KvError::SyntaxError),
        }
    }
    let results = ks.vsim(&args[0], &query, metric, offset, limit)?;
    Ok(RespValue::Array(Some(
        results
            .into_iter()
            .flat_map(|r| vec![RespValue::from_string(r.element), RespValue::from_string(format!("{}", r.score))])
            .collect(),
    )))
}
