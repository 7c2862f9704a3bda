//! Integration tests for the redcore server.
//!
//! Run these tests with: cargo test --test integration
//!
//! Note: these start a TCP server and may conflict with other services on
//! the ports below. Run with --test-threads=1 if needed.

use std::process::{Child, Command};
use std::thread;
use std::time::Duration;

struct ServerProcess(Child);

impl Drop for ServerProcess {
    fn drop(&mut self) {
        let _ = self.0.kill();
    }
}

fn start_server(port: u16) -> ServerProcess {
    let child = Command::new("./target/release/redcore")
        .args([&format!("--addr=127.0.0.1:{}", port)])
        .spawn()
        .or_else(|_| {
            Command::new("./target/debug/redcore")
                .args([&format!("--addr=127.0.0.1:{}", port)])
                .spawn()
        })
        .expect("Failed to start server - run `cargo build --release` first");

    thread::sleep(Duration::from_millis(200));

    ServerProcess(child)
}

fn redis_cli(port: u16, args: &[&str]) -> String {
    let output = Command::new("redis-cli")
        .arg("-p")
        .arg(port.to_string())
        .args(args)
        .output()
        .expect("Failed to run redis-cli");

    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

#[test]
fn test_ping() {
    let _server = start_server(16380);
    let result = redis_cli(16380, &["PING"]);
    assert_eq!(result, "PONG");
}

#[test]
fn test_echo() {
    let _server = start_server(16381);
    let result = redis_cli(16381, &["ECHO", "hello"]);
    assert_eq!(result, "hello");
}

#[test]
fn test_set_get() {
    let _server = start_server(16382);

    let set_result = redis_cli(16382, &["SET", "foo", "bar"]);
    assert_eq!(set_result, "OK");

    let get_result = redis_cli(16382, &["GET", "foo"]);
    assert_eq!(get_result, "bar");
}

#[test]
fn test_get_nonexistent() {
    let _server = start_server(16383);
    let result = redis_cli(16383, &["GET", "nonexistent"]);
    assert!(result.is_empty() || result == "(nil)");
}

#[test]
fn test_set_overwrite() {
    let _server = start_server(16384);

    redis_cli(16384, &["SET", "key", "value1"]);
    redis_cli(16384, &["SET", "key", "value2"]);
    let result = redis_cli(16384, &["GET", "key"]);

    assert_eq!(result, "value2");
}

#[test]
fn test_set_nx() {
    let _server = start_server(16385);

    let result1 = redis_cli(16385, &["SET", "nxkey", "value1", "NX"]);
    assert_eq!(result1, "OK");

    let result2 = redis_cli(16385, &["SET", "nxkey", "value2", "NX"]);
    assert!(result2.is_empty() || result2 == "(nil)");

    let value = redis_cli(16385, &["GET", "nxkey"]);
    assert_eq!(value, "value1");
}

#[test]
fn test_set_xx() {
    let _server = start_server(16386);

    let result1 = redis_cli(16386, &["SET", "xxkey", "value1", "XX"]);
    assert!(result1.is_empty() || result1 == "(nil)");

    redis_cli(16386, &["SET", "xxkey", "original"]);

    let result2 = redis_cli(16386, &["SET", "xxkey", "updated", "XX"]);
    assert_eq!(result2, "OK");

    let value = redis_cli(16386, &["GET", "xxkey"]);
    assert_eq!(value, "updated");
}

#[test]
fn test_expire_and_ttl() {
    let _server = start_server(16387);

    redis_cli(16387, &["SET", "k", "v", "EX", "100"]);
    let ttl = redis_cli(16387, &["TTL", "k"]);
    let ttl: i64 = ttl.parse().expect("TTL should be an integer");
    assert!(ttl > 0 && ttl <= 100);

    redis_cli(16387, &["PERSIST", "k"]);
    let ttl_after_persist = redis_cli(16387, &["TTL", "k"]);
    assert_eq!(ttl_after_persist, "-1");
}

#[test]
fn test_incr_overflow() {
    let _server = start_server(16388);

    redis_cli(16388, &["SET", "counter", "9223372036854775807"]);
    let result = redis_cli(16388, &["INCR", "counter"]);
    assert!(
        result.to_lowercase().contains("overflow") || result.starts_with('-'),
        "INCR past i64::MAX should error, got: {result}"
    );
}

#[test]
fn test_xadd_monotonic_rejects_smaller_id() {
    let _server = start_server(16389);

    let first_id = redis_cli(16389, &["XADD", "stream", "1-1", "field", "value"]);
    assert_eq!(first_id, "1-1");

    let result = redis_cli(16389, &["XADD", "stream", "1-0", "field", "value"]);
    assert!(
        result.to_lowercase().contains("equal or smaller"),
        "XADD with a smaller ID should be rejected, got: {result}"
    );
}

#[test]
fn test_hash_roundtrip() {
    let _server = start_server(16390);

    redis_cli(16390, &["HSET", "h", "f1", "v1", "f2", "v2"]);
    assert_eq!(redis_cli(16390, &["HGET", "h", "f1"]), "v1");
    assert_eq!(redis_cli(16390, &["HLEN", "h"]), "2");
}
