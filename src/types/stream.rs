use crate::error::{LedisError, LedisResult};
use std::collections::VecDeque;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// A stream entry ID: millisecond timestamp plus a sequence number.
/// Ordering is lexicographic on `(ms, seq)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct StreamId {
    pub ms: u64,
    pub seq: u64,
}

impl StreamId {
    pub const ZERO: StreamId = StreamId { ms: 0, seq: 0 };
    pub const MAX: StreamId = StreamId {
        ms: u64::MAX,
        seq: u64::MAX,
    };

    pub fn new(ms: u64, seq: u64) -> Self {
        StreamId { ms, seq }
    }

    /// Parse "1234-5" or a bare "1234" (sequence defaults to `default_seq`).
    /// The `-` / `+` range sentinels are handled by the callers.
    pub fn parse(s: &str, default_seq: u64) -> Option<Self> {
        if let Some((ms_str, seq_str)) = s.split_once('-') {
            let ms = ms_str.parse::<u64>().ok()?;
            let seq = seq_str.parse::<u64>().ok()?;
            Some(StreamId { ms, seq })
        } else {
            let ms = s.parse::<u64>().ok()?;
            Some(StreamId {
                ms,
                seq: default_seq,
            })
        }
    }

    /// Parse a range boundary, honouring the `-` and `+` sentinels.
    pub fn parse_range_start(s: &str) -> Option<Self> {
        if s == "-" {
            Some(StreamId::ZERO)
        } else {
            StreamId::parse(s, 0)
        }
    }

    pub fn parse_range_end(s: &str) -> Option<Self> {
        if s == "+" {
            Some(StreamId::MAX)
        } else {
            StreamId::parse(s, u64::MAX)
        }
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

#[derive(Debug, Clone)]
pub struct StreamEntry {
    pub id: StreamId,
    /// Flat field/value list: k1, v1, k2, v2, ...
    pub fields: Vec<Vec<u8>>,
}

/// Append-only log keyed by strictly increasing stream IDs.
#[derive(Debug, Clone, Default)]
pub struct Stream {
    entries: VecDeque<StreamEntry>,
    last_id: StreamId,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before UNIX epoch")
        .as_millis() as u64
}

impl Stream {
    pub fn new() -> Self {
        Stream {
            entries: VecDeque::new(),
            last_id: StreamId::ZERO,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last_id(&self) -> StreamId {
        self.last_id
    }

    /// Append an entry. `id_spec` is `*` for an auto-generated ID, otherwise
    /// an explicit ID that must be strictly greater than the last one and
    /// different from `0-0`.
    pub fn add(&mut self, id_spec: &str, fields: Vec<Vec<u8>>) -> LedisResult<StreamId> {
        let id = if id_spec == "*" {
            let ms = now_ms().max(self.last_id.ms);
            let seq = if ms == self.last_id.ms {
                self.last_id.seq + 1
            } else {
                0
            };
            StreamId::new(ms, seq)
        } else {
            StreamId::parse(id_spec, 0).ok_or(LedisError::StreamIdInvalid)?
        };

        if id == StreamId::ZERO || id <= self.last_id {
            return Err(LedisError::StreamIdInvalid);
        }

        self.entries.push_back(StreamEntry { id, fields });
        self.last_id = id;
        Ok(id)
    }

    /// Drop oldest entries until the length is at most `max_len`.
    /// Returns the number of entries removed.
    pub fn trim_to(&mut self, max_len: usize) -> usize {
        let mut removed = 0;
        while self.entries.len() > max_len {
            self.entries.pop_front();
            removed += 1;
        }
        removed
    }

    /// Entries with `start <= id <= end`, in insertion order.
    pub fn range(&self, start: StreamId, end: StreamId) -> Vec<StreamEntry> {
        self.entries
            .iter()
            .filter(|e| e.id >= start && e.id <= end)
            .cloned()
            .collect()
    }

    /// Entries with `start <= id <= end`, newest first.
    pub fn rev_range(&self, start: StreamId, end: StreamId) -> Vec<StreamEntry> {
        self.entries
            .iter()
            .rev()
            .filter(|e| e.id >= start && e.id <= end)
            .cloned()
            .collect()
    }

    /// Entries with `id > after`, capped at `count` (0 = unlimited).
    pub fn read_after(&self, after: StreamId, count: usize) -> Vec<StreamEntry> {
        let mut out = Vec::new();
        for e in &self.entries {
            if e.id > after {
                out.push(e.clone());
                if count > 0 && out.len() >= count {
                    break;
                }
            }
        }
        out
    }
}
