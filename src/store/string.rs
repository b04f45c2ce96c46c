use super::item::{now_nanos, Item, Value};
use super::Store;
use crate::error::{LedisError, LedisResult};
use std::sync::{Arc, RwLock};
use std::time::Duration;

fn string_item(value: Vec<u8>, expires_at: u64) -> Arc<Item> {
    Arc::new(Item {
        expires_at,
        value: RwLock::new(Value::Str(value)),
    })
}

fn parse_i64(bytes: &[u8]) -> LedisResult<i64> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(LedisError::NotInteger)
}

impl Store {
    /// SET: overwrite unconditionally. Any prior TTL is dropped unless a new
    /// one is given.
    pub fn set_string(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) {
        let item = Arc::new(Item::with_ttl(Value::Str(value), ttl));
        self.shard(key).store(key.to_string(), item);
        self.notify(key);
    }

    pub fn get_string(&self, key: &str) -> LedisResult<Option<Vec<u8>>> {
        match self.get(key) {
            Some(item) => match &*item.value.read().unwrap() {
                Value::Str(s) => Ok(Some(s.clone())),
                _ => Err(LedisError::WrongType),
            },
            None => Ok(None),
        }
    }

    /// GETSET: swap in the new value and return the prior one. The prior TTL
    /// is discarded. The witness-CAS loop keeps the type check and the swap
    /// atomic.
    pub fn getset(&self, key: &str, value: Vec<u8>) -> LedisResult<Option<Vec<u8>>> {
        let shard = self.shard(key);
        let new = string_item(value, 0);
        loop {
            match shard.load(key) {
                Some(old) => {
                    let expired = old.is_expired(now_nanos());
                    let prior = if expired {
                        None
                    } else {
                        match &*old.value.read().unwrap() {
                            Value::Str(s) => Some(s.clone()),
                            _ => return Err(LedisError::WrongType),
                        }
                    };
                    if shard.compare_and_swap(key, &old, new.clone()) {
                        self.notify(key);
                        return Ok(prior);
                    }
                }
                None => {
                    let (_, loaded) = shard.load_or_store(key, new.clone());
                    if !loaded {
                        self.notify(key);
                        return Ok(None);
                    }
                }
            }
        }
    }

    /// INCR/INCRBY/DECR/DECRBY: load, parse, add, compare-and-swap; retry on
    /// contention so concurrent increments never lose updates. The TTL of the
    /// old item carries over.
    pub fn incr_by(&self, key: &str, delta: i64) -> LedisResult<i64> {
        let shard = self.shard(key);
        loop {
            match shard.load(key) {
                Some(old) => {
                    let (current, expires_at) = if old.is_expired(now_nanos()) {
                        (0, 0)
                    } else {
                        let value = match &*old.value.read().unwrap() {
                            Value::Str(s) => parse_i64(s)?,
                            _ => return Err(LedisError::NotInteger),
                        };
                        (value, old.expires_at)
                    };
                    let next = current.checked_add(delta).ok_or(LedisError::NotInteger)?;
                    let new = string_item(next.to_string().into_bytes(), expires_at);
                    if shard.compare_and_swap(key, &old, new) {
                        self.notify(key);
                        return Ok(next);
                    }
                }
                None => {
                    let next = delta;
                    let new = string_item(next.to_string().into_bytes(), 0);
                    let (_, loaded) = shard.load_or_store(key, new);
                    if !loaded {
                        self.notify(key);
                        return Ok(next);
                    }
                }
            }
        }
    }

    /// APPEND with the same CAS-retry pattern. Returns the new length.
    pub fn append(&self, key: &str, suffix: &[u8]) -> LedisResult<usize> {
        let shard = self.shard(key);
        loop {
            match shard.load(key) {
                Some(old) => {
                    let (mut current, expires_at) = if old.is_expired(now_nanos()) {
                        (Vec::new(), 0)
                    } else {
                        match &*old.value.read().unwrap() {
                            Value::Str(s) => (s.clone(), old.expires_at),
                            _ => return Err(LedisError::NotString),
                        }
                    };
                    current.extend_from_slice(suffix);
                    let len = current.len();
                    let new = string_item(current, expires_at);
                    if shard.compare_and_swap(key, &old, new) {
                        self.notify(key);
                        return Ok(len);
                    }
                }
                None => {
                    let new = string_item(suffix.to_vec(), 0);
                    let (_, loaded) = shard.load_or_store(key, new);
                    if !loaded {
                        self.notify(key);
                        return Ok(suffix.len());
                    }
                }
            }
        }
    }

    pub fn strlen(&self, key: &str) -> LedisResult<usize> {
        match self.get(key) {
            Some(item) => match &*item.value.read().unwrap() {
                Value::Str(s) => Ok(s.len()),
                _ => Err(LedisError::NotString),
            },
            None => Ok(0),
        }
    }
}
