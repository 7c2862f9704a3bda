use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum KeyType {
    String = 1,
    Hash = 2,
    List = 3,
    Set = 4,
    ZSet = 5,
    Stream = 6,
    Json = 7,
    Vector = 8,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::String => "string",
            KeyType::Hash => "hash",
            KeyType::List => "list",
            KeyType::Set => "set",
            KeyType::ZSet => "zset",
            KeyType::Stream => "stream",
            KeyType::Json => "ReJSON-RL",
            KeyType::Vector => "vectorset",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ZMember {
    pub score: f64,
    pub member: Vec<u8>,
}

impl ZMember {
    pub fn new(score: f64, member: impl Into<Vec<u8>>) -> Self {
        Self {
            score,
            member: member.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    pub ttl: Option<Duration>,
    pub nx: bool,
    pub xx: bool,
}

impl SetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nx(mut self) -> Self {
        self.nx = true;
        self
    }

    pub fn xx(mut self) -> Self {
        self.xx = true;
        self
    }
}

/// Stream entry ID (timestamp-sequence)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct StreamId {
    pub ms: i64,
    pub seq: i64,
}

impl StreamId {
    pub fn new(ms: i64, seq: i64) -> Self {
        Self { ms, seq }
    }

    /// Parse a stream ID from a string like "1234567890123-0". Returns `None`
    /// for the special tokens `-`, `+`, `$`, `>` — callers interpret those
    /// themselves since their meaning depends on command context.
    pub fn parse(s: &str) -> Option<Self> {
        if s == "-" {
            return Some(Self::min());
        }
        if s == "+" {
            return Some(Self::max());
        }
        if s == "$" || s == ">" {
            return None;
        }

        let parts: Vec<&str> = s.split('-').collect();
        match parts.len() {
            1 => {
                let ms = parts[0].parse().ok()?;
                Some(Self { ms, seq: 0 })
            }
            2 => {
                let ms = parts[0].parse().ok()?;
                let seq = parts[1].parse().ok()?;
                Some(Self { ms, seq })
            }
            _ => None,
        }
    }

    /// Parse a range-bound ID, expanding a bare millisecond to its
    /// implicit sequence bound (0 for a lower bound, i64::MAX for upper).
    pub fn parse_range(s: &str, is_lower: bool) -> Option<Self> {
        if s == "-" {
            return Some(Self::min());
        }
        if s == "+" {
            return Some(Self::max());
        }
        let s = s.strip_prefix('(').unwrap_or(s);
        if !s.contains('-') {
            let ms: i64 = s.parse().ok()?;
            return Some(if is_lower {
                Self::new(ms, 0)
            } else {
                Self::new(ms, i64::MAX)
            });
        }
        Self::parse(s)
    }

    pub fn min() -> Self {
        Self { ms: 0, seq: 0 }
    }

    pub fn max() -> Self {
        Self {
            ms: i64::MAX,
            seq: i64::MAX,
        }
    }

    /// The smallest ID strictly greater than `self`, used for XREAD's
    /// exclusive "after this ID" semantics.
    pub fn next(&self) -> Self {
        if self.seq == i64::MAX {
            Self::new(self.ms + 1, 0)
        } else {
            Self::new(self.ms, self.seq + 1)
        }
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

/// A stream entry with ID and field-value pairs
#[derive(Debug, Clone)]
pub struct StreamEntry {
    pub id: StreamId,
    pub fields: Vec<(Vec<u8>, Vec<u8>)>,
}

impl StreamEntry {
    pub fn new(id: StreamId, fields: Vec<(Vec<u8>, Vec<u8>)>) -> Self {
        Self { id, fields }
    }
}

/// Stream info (returned by XINFO STREAM)
#[derive(Debug, Clone)]
pub struct StreamInfo {
    pub length: i64,
    pub last_generated_id: StreamId,
    pub max_deleted_entry_id: StreamId,
    pub first_entry: Option<StreamEntry>,
    pub last_entry: Option<StreamEntry>,
    pub groups: i64,
}

/// Consumer group info (returned by XINFO GROUPS)
#[derive(Debug, Clone)]
pub struct ConsumerGroupInfo {
    pub name: String,
    pub consumers: i64,
    pub pending: i64,
    pub last_delivered_id: StreamId,
}

/// Consumer info (returned by XINFO CONSUMERS)
#[derive(Debug, Clone)]
pub struct ConsumerInfo {
    pub name: String,
    pub pending: i64,
    pub idle: i64,
}

/// Pending entry info (returned by XPENDING's extended form)
#[derive(Debug, Clone)]
pub struct PendingEntry {
    pub id: StreamId,
    pub consumer: String,
    pub idle: i64,
    pub delivery_count: i64,
}

/// Summary for XPENDING without range arguments
#[derive(Debug, Clone, Default)]
pub struct PendingSummary {
    pub count: i64,
    pub smallest_id: Option<StreamId>,
    pub largest_id: Option<StreamId>,
    pub consumers: Vec<(String, i64)>,
}

/// Similarity metric for vector search (VSIM / VSEARCH)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceMetric {
    Cosine,
    Dot,
    L2,
}

impl DistanceMetric {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "COSINE" => Some(DistanceMetric::Cosine),
            "DOT" => Some(DistanceMetric::Dot),
            "L2" => Some(DistanceMetric::L2),
            _ => None,
        }
    }

    /// Whether higher scores rank first under this metric.
    pub fn descending(&self) -> bool {
        !matches!(self, DistanceMetric::L2)
    }
}

/// A single VSIM/VSEARCH result.
#[derive(Debug, Clone)]
pub struct VectorSearchResult {
    pub element: String,
    pub score: f64,
}
