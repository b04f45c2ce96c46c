use crate::types::list::LinkedList;
use crate::types::skiplist::SortedSet;
use crate::types::stream::Stream;
use roaring::RoaringTreemap;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::RwLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::oneshot;

/// A blocked list pop waiting for a value: a one-shot single-value channel
/// plus a ticket so the owner can remove itself from the queue on timeout.
#[derive(Debug)]
pub struct Waiter {
    pub id: u64,
    pub tx: oneshot::Sender<Vec<u8>>,
}

/// List payload: the element buffer plus the queue of blocked pops, oldest
/// first. A push hands values to waiters before touching the buffer.
#[derive(Debug, Default)]
pub struct ListValue {
    pub list: LinkedList,
    pub waiters: VecDeque<Waiter>,
}

/// The concrete payload of an item. The discriminant is the key's type and
/// never changes for the lifetime of an item.
#[derive(Debug)]
pub enum Value {
    Str(Vec<u8>),
    List(ListValue),
    Hash(HashMap<Vec<u8>, Vec<u8>>),
    Set(HashSet<Vec<u8>>),
    ZSet(SortedSet),
    Bitmap(RoaringTreemap),
    Stream(Stream),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Hash(_) => "hash",
            Value::Set(_) => "set",
            Value::ZSet(_) => "zset",
            Value::Bitmap(_) => "bitmap",
            Value::Stream(_) => "stream",
        }
    }
}

/// The value object for a single key.
///
/// Shared as `Arc<Item>`: the shard map holds the strong reference and any
/// in-flight operation holds a transient one, so a deleted key's item lives
/// until the last reader releases it. The payload is guarded by the per-item
/// lock; `expires_at` is fixed at creation (string rewrites go through a
/// whole-item swap).
#[derive(Debug)]
pub struct Item {
    /// Absolute expiry in nanoseconds since the epoch; 0 means no expiry.
    pub expires_at: u64,
    pub value: RwLock<Value>,
}

impl Item {
    pub fn new(value: Value) -> Self {
        Item {
            expires_at: 0,
            value: RwLock::new(value),
        }
    }

    pub fn with_ttl(value: Value, ttl: Option<Duration>) -> Self {
        let expires_at = match ttl {
            Some(d) if !d.is_zero() => now_nanos() + d.as_nanos() as u64,
            _ => 0,
        };
        Item {
            expires_at,
            value: RwLock::new(value),
        }
    }

    pub fn is_expired(&self, now: u64) -> bool {
        self.expires_at > 0 && self.expires_at < now
    }

    pub fn kind(&self) -> &'static str {
        self.value.read().unwrap().kind()
    }
}

/// Current time in nanoseconds since the UNIX epoch.
pub fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before UNIX epoch")
        .as_nanos() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry() {
        let item = Item::with_ttl(Value::Str(b"v".to_vec()), Some(Duration::from_millis(10)));
        let now = now_nanos();
        assert!(!item.is_expired(now));
        assert!(item.is_expired(now + 20_000_000));

        let forever = Item::new(Value::Str(b"v".to_vec()));
        assert!(!forever.is_expired(u64::MAX));
    }

    #[test]
    fn test_kind() {
        assert_eq!(Item::new(Value::Str(Vec::new())).kind(), "string");
        assert_eq!(Item::new(Value::List(ListValue::default())).kind(), "list");
        assert_eq!(Item::new(Value::ZSet(SortedSet::new())).kind(), "zset");
    }
}
