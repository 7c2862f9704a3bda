//! Channel and pattern subscription registry. One `broadcast::Sender` per
//! channel/pattern key, grounded in the teacher's `pubsub_channels` map;
//! fan-out copies the relevant senders under the registry lock, then sends
//! outside it so delivery never holds up a command.

use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::broadcast;

/// A message pushed to a subscribed connection.
#[derive(Debug, Clone)]
pub enum PubSubMessage {
    Message { channel: Vec<u8>, payload: Vec<u8> },
    PMessage { pattern: Vec<u8>, channel: Vec<u8>, payload: Vec<u8> },
}

const CHANNEL_CAPACITY: usize = 256;

#[derive(Default)]
pub struct PubSubRegistry {
    channels: RwLock<HashMap<Vec<u8>, broadcast::Sender<PubSubMessage>>>,
    patterns: RwLock<HashMap<Vec<u8>, broadcast::Sender<PubSubMessage>>>,
}

impl PubSubRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe_channel(&self, channel: &[u8]) -> broadcast::Receiver<PubSubMessage> {
        let mut map = self.channels.write().expect("pubsub channels lock poisoned");
        map.entry(channel.to_vec())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    pub fn subscribe_pattern(&self, pattern: &[u8]) -> broadcast::Receiver<PubSubMessage> {
        let mut map = self.patterns.write().expect("pubsub patterns lock poisoned");
        map.entry(pattern.to_vec())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Deliver `payload` on `channel` to exact subscribers and every
    /// matching pattern subscriber. Returns the total recipient count.
    pub fn publish(&self, channel: &[u8], payload: &[u8]) -> i64 {
        let mut delivered = 0i64;

        if let Some(sender) = self.channels.read().expect("pubsub channels lock poisoned").get(channel) {
            let msg = PubSubMessage::Message {
                channel: channel.to_vec(),
                payload: payload.to_vec(),
            };
            if let Ok(n) = sender.send(msg) {
                delivered += n as i64;
            }
        }

        let matching: Vec<(Vec<u8>, broadcast::Sender<PubSubMessage>)> = self
            .patterns
            .read()
            .expect("pubsub patterns lock poisoned")
            .iter()
            .filter(|(pattern, _)| glob_match(pattern, channel))
            .map(|(p, s)| (p.clone(), s.clone()))
            .collect();

        for (pattern, sender) in matching {
            let msg = PubSubMessage::PMessage {
                pattern,
                channel: channel.to_vec(),
                payload: payload.to_vec(),
            };
            if let Ok(n) = sender.send(msg) {
                delivered += n as i64;
            }
        }

        delivered
    }

    pub fn channels_matching(&self, pattern: Option<&[u8]>) -> Vec<Vec<u8>> {
        let map = self.channels.read().expect("pubsub channels lock poisoned");
        map.iter()
            .filter(|(name, sender)| sender.receiver_count() > 0 && pattern.map_or(true, |p| glob_match(p, name)))
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn numsub(&self, channel: &[u8]) -> i64 {
        self.channels
            .read()
            .expect("pubsub channels lock poisoned")
            .get(channel)
            .map(|s| s.receiver_count() as i64)
            .unwrap_or(0)
    }

    pub fn numpat(&self) -> i64 {
        self.patterns
            .read()
            .expect("pubsub patterns lock poisoned")
            .values()
            .filter(|s| s.receiver_count() > 0)
            .count() as i64
    }
}

/// Glob match supporting `*`, `?`, `[...]` character classes with ranges
/// and `^`/`!` negation. Operates on raw bytes since channel names and
/// keys are not guaranteed to be UTF-8.
pub fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    glob_match_at(pattern, text)
}

fn glob_match_at(pattern: &[u8], text: &[u8]) -> bool {
    let mut p = 0;
    let mut t = 0;
    let mut star_p: Option<usize> = None;
    let mut star_t = 0;

    while t < text.len() {
        if p < pattern.len() && pattern[p] == b'*' {
            star_p = Some(p);
            star_t = t;
            p += 1;
        } else if p < pattern.len() && pattern[p] == b'?' {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == b'[' {
            match match_class(pattern, p, text[t]) {
                Some((matched, next_p)) => {
                    if matched {
                        p = next_p;
                        t += 1;
                    } else if let Some(sp) = star_p {
                        p = sp + 1;
                        star_t += 1;
                        t = star_t;
                    } else {
                        return false;
                    }
                }
                None => return false,
            }
        } else if p < pattern.len() && (pattern[p] == text[t] || pattern[p] == b'\\' && p + 1 < pattern.len()) {
            if pattern[p] == b'\\' && p + 1 < pattern.len() {
                if pattern[p + 1] != text[t] {
                    if let Some(sp) = star_p {
                        p = sp + 1;
                        star_t += 1;
                        t = star_t;
                        continue;
                    }
                    return false;
                }
                p += 2;
                t += 1;
            } else {
                p += 1;
                t += 1;
            }
        } else if let Some(sp) = star_p {
            p = sp + 1;
            star_t += 1;
            t = star_t;
        } else {
            return false;
        }
    }

    while p < pattern.len() && pattern[p] == b'*' {
        p += 1;
    }
    p == pattern.len()
}

/// Match a `[...]` class starting at `pattern[start]` (the `[`) against a
/// single byte. Returns `(matched, index_after_class)`.
fn match_class(pattern: &[u8], start: usize, c: u8) -> Option<(bool, usize)> {
    let mut i = start + 1;
    let negate = i < pattern.len() && (pattern[i] == b'^' || pattern[i] == b'!');
    if negate {
        i += 1;
    }
    let mut found = false;
    let mut first = true;
    while i < pattern.len() && (pattern[i] != b']' || first) {
        first = false;
        if i + 2 < pattern.len() && pattern[i + 1] == b'-' && pattern[i + 2] != b']' {
            let (lo, hi) = (pattern[i], pattern[i + 2]);
            if lo <= c && c <= hi {
                found = true;
            }
            i += 3;
        } else {
            if pattern[i] == c {
                found = true;
            }
            i += 1;
        }
    }
    if i >= pattern.len() {
        return None;
    }
    Some((found != negate, i + 1))
}
