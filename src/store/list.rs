use super::item::{now_nanos, Item, ListValue, Value, Waiter};
use super::Store;
use crate::error::{LedisError, LedisResult};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

static NEXT_WAITER_ID: AtomicU64 = AtomicU64::new(1);

enum WaitOutcome {
    Value(Vec<u8>),
    Closed,
    TimedOut,
}

impl Store {
    fn get_list(&self, key: &str) -> LedisResult<Option<Arc<Item>>> {
        match self.get(key) {
            Some(item) => {
                if !matches!(&*item.value.read().unwrap(), Value::List(_)) {
                    return Err(LedisError::WrongType);
                }
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }

    fn get_or_create_list(&self, key: &str) -> LedisResult<Arc<Item>> {
        let shard = self.shard(key);
        loop {
            if let Some(item) = shard.load(key) {
                if item.is_expired(now_nanos()) {
                    if shard.remove_if_expired(key, now_nanos()) {
                        self.notify(key);
                    }
                    continue;
                }
                if !matches!(&*item.value.read().unwrap(), Value::List(_)) {
                    return Err(LedisError::WrongType);
                }
                return Ok(item);
            }
            let fresh = Arc::new(Item::new(Value::List(ListValue::default())));
            let (item, loaded) = shard.load_or_store(key, fresh);
            if !loaded {
                self.notify(key);
                return Ok(item);
            }
            // Someone else stored first; loop to re-validate what's there.
        }
    }

    /// Delete the key if this item is still resident and holds an empty list
    /// with no waiters.
    fn drop_if_empty_list(&self, key: &str, item: &Arc<Item>) {
        let empty = match &*item.value.read().unwrap() {
            Value::List(lv) => lv.list.is_empty() && lv.waiters.is_empty(),
            _ => false,
        };
        if empty && self.shard(key).remove_if_same(key, item) {
            self.notify(key);
        }
    }

    /// LPUSH/RPUSH. Values are handed to blocked waiters first (head-order
    /// for a left push); whatever remains lands in the buffer. Returns the
    /// resulting list length.
    pub fn push(&self, key: &str, values: Vec<Vec<u8>>, left: bool) -> LedisResult<usize> {
        let item = self.get_or_create_list(key)?;
        let size = {
            let mut guard = item.value.write().unwrap();
            let lv = match &mut *guard {
                Value::List(lv) => lv,
                _ => return Err(LedisError::WrongType),
            };

            let mut pending: VecDeque<Vec<u8>> = if left {
                values.into_iter().rev().collect()
            } else {
                values.into()
            };

            // A handed-off value bypasses the buffer. A dead waiter gives the
            // value back, so it is retried on the next waiter instead of lost.
            while !lv.waiters.is_empty() && !pending.is_empty() {
                let waiter = lv.waiters.pop_front().unwrap();
                let value = pending.pop_front().unwrap();
                if let Err(value) = waiter.tx.send(value) {
                    pending.push_front(value);
                }
            }

            if left {
                for value in pending.into_iter().rev() {
                    lv.list.push_front(value);
                }
            } else {
                for value in pending {
                    lv.list.push_back(value);
                }
            }
            lv.list.len()
        };
        if size == 0 {
            self.drop_if_empty_list(key, &item);
        }
        self.notify(key);
        Ok(size)
    }

    /// LPUSHX/RPUSHX: no-op returning 0 when the key does not exist.
    pub fn pushx(&self, key: &str, values: Vec<Vec<u8>>, left: bool) -> LedisResult<usize> {
        if self.get_list(key)?.is_none() {
            return Ok(0);
        }
        self.push(key, values, left)
    }

    pub fn pop(&self, key: &str, left: bool) -> LedisResult<Option<Vec<u8>>> {
        let item = match self.get_list(key)? {
            Some(item) => item,
            None => return Ok(None),
        };
        let (value, now_empty) = {
            let mut guard = item.value.write().unwrap();
            let lv = match &mut *guard {
                Value::List(lv) => lv,
                _ => return Err(LedisError::WrongType),
            };
            let value = if left {
                lv.list.pop_front()
            } else {
                lv.list.pop_back()
            };
            (value, lv.list.is_empty() && lv.waiters.is_empty())
        };
        match value {
            Some(value) => {
                if now_empty {
                    self.shard(key).remove_if_same(key, &item);
                }
                self.notify(key);
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// BLPOP/BRPOP: try non-blocking first, then queue a one-shot waiter on
    /// the (possibly freshly created) list and suspend until a push hands us
    /// a value or the deadline passes. `None` timeout blocks indefinitely.
    pub async fn block_pop(
        &self,
        key: &str,
        timeout: Option<Duration>,
        left: bool,
    ) -> LedisResult<Vec<u8>> {
        let deadline = timeout.map(|d| tokio::time::Instant::now() + d);
        loop {
            if let Some(value) = self.pop(key, left)? {
                return Ok(value);
            }

            let item = self.get_or_create_list(key)?;
            let waiter_id = NEXT_WAITER_ID.fetch_add(1, Ordering::Relaxed);
            let mut rx = {
                let mut guard = item.value.write().unwrap();
                let lv = match &mut *guard {
                    Value::List(lv) => lv,
                    _ => return Err(LedisError::WrongType),
                };
                if !lv.list.is_empty() {
                    // A push slipped in between the failed pop and the lock.
                    drop(guard);
                    continue;
                }
                let (tx, rx) = oneshot::channel();
                lv.waiters.push_back(Waiter { id: waiter_id, tx });
                rx
            };

            let outcome = match deadline {
                Some(at) => match tokio::time::timeout_at(at, &mut rx).await {
                    Ok(Ok(value)) => WaitOutcome::Value(value),
                    Ok(Err(_)) => WaitOutcome::Closed,
                    Err(_) => WaitOutcome::TimedOut,
                },
                None => match (&mut rx).await {
                    Ok(value) => WaitOutcome::Value(value),
                    Err(_) => WaitOutcome::Closed,
                },
            };

            match outcome {
                WaitOutcome::Value(value) => return Ok(value),
                // The item (and our sender) was dropped, e.g. by DEL. Start
                // over on whatever replaces it.
                WaitOutcome::Closed => continue,
                WaitOutcome::TimedOut => {
                    let mut raced = None;
                    {
                        let mut guard = item.value.write().unwrap();
                        if let Value::List(lv) = &mut *guard {
                            let before = lv.waiters.len();
                            lv.waiters.retain(|w| w.id != waiter_id);
                            if lv.waiters.len() == before {
                                // A push already popped our waiter; the value
                                // is sitting in the channel.
                                raced = rx.try_recv().ok();
                            }
                        }
                    }
                    if let Some(value) = raced {
                        return Ok(value);
                    }
                    self.drop_if_empty_list(key, &item);
                    return Err(LedisError::Timeout);
                }
            }
        }
    }

    pub fn llen(&self, key: &str) -> LedisResult<usize> {
        match self.get_list(key)? {
            Some(item) => match &*item.value.read().unwrap() {
                Value::List(lv) => Ok(lv.list.len()),
                _ => Err(LedisError::WrongType),
            },
            None => Ok(0),
        }
    }

    pub fn lrange(&self, key: &str, start: i64, stop: i64) -> LedisResult<Vec<Vec<u8>>> {
        let item = match self.get_list(key)? {
            Some(item) => item,
            None => return Ok(Vec::new()),
        };
        let guard = item.value.read().unwrap();
        let lv = match &*guard {
            Value::List(lv) => lv,
            _ => return Err(LedisError::WrongType),
        };
        match effective_range(start, stop, lv.list.len()) {
            Some((start, stop)) => Ok(lv.list.range(start, stop)),
            None => Ok(Vec::new()),
        }
    }

    pub fn lindex(&self, key: &str, index: i64) -> LedisResult<Option<Vec<u8>>> {
        let item = match self.get_list(key)? {
            Some(item) => item,
            None => return Ok(None),
        };
        let guard = item.value.read().unwrap();
        let lv = match &*guard {
            Value::List(lv) => lv,
            _ => return Err(LedisError::WrongType),
        };
        match effective_index(index, lv.list.len()) {
            Some(i) => Ok(lv.list.get(i).map(|v| v.to_vec())),
            None => Ok(None),
        }
    }

    pub fn lset(&self, key: &str, index: i64, value: Vec<u8>) -> LedisResult<()> {
        let item = match self.get_list(key)? {
            Some(item) => item,
            None => return Err(LedisError::NoSuchKey),
        };
        {
            let mut guard = item.value.write().unwrap();
            let lv = match &mut *guard {
                Value::List(lv) => lv,
                _ => return Err(LedisError::WrongType),
            };
            let i = effective_index(index, lv.list.len()).ok_or(LedisError::IndexOutOfRange)?;
            if !lv.list.set(i, value) {
                return Err(LedisError::IndexOutOfRange);
            }
        }
        self.notify(key);
        Ok(())
    }

    pub fn ltrim(&self, key: &str, start: i64, stop: i64) -> LedisResult<()> {
        let item = match self.get_list(key)? {
            Some(item) => item,
            None => return Ok(()),
        };
        let now_empty = {
            let mut guard = item.value.write().unwrap();
            let lv = match &mut *guard {
                Value::List(lv) => lv,
                _ => return Err(LedisError::WrongType),
            };
            match effective_range(start, stop, lv.list.len()) {
                Some((start, stop)) => lv.list.trim(start, stop),
                None => lv.list.clear(),
            }
            lv.list.is_empty() && lv.waiters.is_empty()
        };
        if now_empty {
            self.shard(key).remove_if_same(key, &item);
        }
        self.notify(key);
        Ok(())
    }

    pub fn lrem(&self, key: &str, count: i64, value: &[u8]) -> LedisResult<i64> {
        let item = match self.get_list(key)? {
            Some(item) => item,
            None => return Ok(0),
        };
        let (removed, now_empty) = {
            let mut guard = item.value.write().unwrap();
            let lv = match &mut *guard {
                Value::List(lv) => lv,
                _ => return Err(LedisError::WrongType),
            };
            let removed = lv.list.remove_occurrences(count, value);
            (removed, lv.list.is_empty() && lv.waiters.is_empty())
        };
        if removed > 0 {
            if now_empty {
                self.shard(key).remove_if_same(key, &item);
            }
            self.notify(key);
        }
        Ok(removed)
    }
}

/// Fold a possibly-negative index into `0..len`.
fn effective_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let i = if index < 0 { len + index } else { index };
    if i < 0 || i >= len {
        None
    } else {
        Some(i as usize)
    }
}

/// Fold a `[start, stop]` pair into effective positions. `None` means the
/// range is empty.
fn effective_range(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    if len == 0 {
        return None;
    }
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let mut stop = if stop < 0 { len + stop } else { stop };
    if stop >= len {
        stop = len - 1;
    }
    if start > stop || start >= len || stop < 0 {
        return None;
    }
    Some((start as usize, stop as usize))
}
