use super::item::{now_nanos, Item, Value};
use super::Store;
use crate::error::{LedisError, LedisResult};
use crate::types::stream::{Stream, StreamEntry, StreamId};
use std::sync::Arc;

impl Store {
    fn get_stream(&self, key: &str) -> LedisResult<Option<Arc<Item>>> {
        match self.get(key) {
            Some(item) => {
                if !matches!(&*item.value.read().unwrap(), Value::Stream(_)) {
                    return Err(LedisError::WrongType);
                }
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }

    fn get_or_create_stream(&self, key: &str) -> LedisResult<Arc<Item>> {
        let shard = self.shard(key);
        loop {
            if let Some(item) = shard.load(key) {
                if item.is_expired(now_nanos()) {
                    if shard.remove_if_expired(key, now_nanos()) {
                        self.notify(key);
                    }
                    continue;
                }
                if !matches!(&*item.value.read().unwrap(), Value::Stream(_)) {
                    return Err(LedisError::WrongType);
                }
                return Ok(item);
            }
            let fresh = Arc::new(Item::new(Value::Stream(Stream::new())));
            let (item, loaded) = shard.load_or_store(key, fresh);
            if !loaded {
                self.notify(key);
                return Ok(item);
            }
        }
    }

    /// XADD. A non-zero `max_len` trims the oldest entries after the append
    /// so the stream never exceeds it.
    pub fn xadd(
        &self,
        key: &str,
        id_spec: &str,
        fields: Vec<Vec<u8>>,
        max_len: usize,
    ) -> LedisResult<StreamId> {
        let item = self.get_or_create_stream(key)?;
        let id = {
            let mut guard = item.value.write().unwrap();
            let stream = match &mut *guard {
                Value::Stream(s) => s,
                _ => return Err(LedisError::WrongType),
            };
            let id = stream.add(id_spec, fields)?;
            if max_len > 0 {
                stream.trim_to(max_len);
            }
            id
        };
        self.notify(key);
        Ok(id)
    }

    pub fn xlen(&self, key: &str) -> LedisResult<usize> {
        match self.get_stream(key)? {
            Some(item) => match &*item.value.read().unwrap() {
                Value::Stream(s) => Ok(s.len()),
                _ => Err(LedisError::WrongType),
            },
            None => Ok(0),
        }
    }

    pub fn xrange(
        &self,
        key: &str,
        start: StreamId,
        end: StreamId,
        reverse: bool,
    ) -> LedisResult<Vec<StreamEntry>> {
        match self.get_stream(key)? {
            Some(item) => match &*item.value.read().unwrap() {
                Value::Stream(s) => Ok(if reverse {
                    s.rev_range(start, end)
                } else {
                    s.range(start, end)
                }),
                _ => Err(LedisError::WrongType),
            },
            None => Ok(Vec::new()),
        }
    }

    /// XREAD: for each (key, last-seen id) return the entries strictly after
    /// it, capped per stream at `count` (0 = unlimited). Streams with nothing
    /// new are omitted.
    pub fn xread(
        &self,
        queries: &[(String, StreamId)],
        count: usize,
    ) -> LedisResult<Vec<(String, Vec<StreamEntry>)>> {
        let mut out = Vec::new();
        for (key, after) in queries {
            let entries = match self.get_stream(key)? {
                Some(item) => match &*item.value.read().unwrap() {
                    Value::Stream(s) => s.read_after(*after, count),
                    _ => return Err(LedisError::WrongType),
                },
                None => continue,
            };
            if !entries.is_empty() {
                out.push((key.clone(), entries));
            }
        }
        Ok(out)
    }

    /// XTRIM to a target length. Returns the number of entries removed.
    pub fn xtrim(&self, key: &str, max_len: usize) -> LedisResult<usize> {
        let item = match self.get_stream(key)? {
            Some(item) => item,
            None => return Ok(0),
        };
        let (removed, now_empty) = {
            let mut guard = item.value.write().unwrap();
            let stream = match &mut *guard {
                Value::Stream(s) => s,
                _ => return Err(LedisError::WrongType),
            };
            let removed = stream.trim_to(max_len);
            (removed, stream.is_empty())
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn small() -> Config {
        Config {
            shards: 8,
            ..Default::default()
        }
    }

    fn fields(kv: &[&[u8]]) -> Vec<Vec<u8>> {
        kv.iter().map(|v| v.to_vec()).collect()
    }

    #[tokio::test]
    async fn test_xadd_auto_ids_increase() {
        let store = Store::new(&small());
        let mut last = StreamId::ZERO;
        for _ in 0..5 {
            let id = store.xadd("s", "*", fields(&[b"k", b"v"]), 0).unwrap();
            assert!(id > last);
            last = id;
        }
        assert_eq!(store.xlen("s").unwrap(), 5);
        store.close().await;
    }

    #[tokio::test]
    async fn test_xadd_rejects_stale_id() {
        let store = Store::new(&small());
        store.xadd("s", "9-9", fields(&[]), 0).unwrap();
        assert!(matches!(
            store.xadd("s", "9-9", fields(&[]), 0),
            Err(LedisError::StreamIdInvalid)
        ));
        assert!(matches!(
            store.xadd("s2", "0-0", fields(&[]), 0),
            Err(LedisError::StreamIdInvalid)
        ));
        store.close().await;
    }

    #[tokio::test]
    async fn test_xadd_maxlen_trims() {
        let store = Store::new(&small());
        let mut ids = Vec::new();
        for i in 0..5 {
            let id = store
                .xadd("s", "*", fields(&[b"i", i.to_string().as_bytes()]), 3)
                .unwrap();
            ids.push(id);
        }
        assert_eq!(store.xlen("s").unwrap(), 3);
        let entries = store
            .xrange("s", StreamId::ZERO, StreamId::MAX, false)
            .unwrap();
        let got: Vec<StreamId> = entries.iter().map(|e| e.id).collect();
        assert_eq!(got, ids[2..].to_vec());
        store.close().await;
    }

    #[tokio::test]
    async fn test_xread_strictly_greater() {
        let store = Store::new(&small());
        let id1 = store.xadd("s", "1-1", fields(&[]), 0).unwrap();
        let id2 = store.xadd("s", "2-1", fields(&[]), 0).unwrap();

        let got = store.xread(&[("s".to_string(), id1)], 0).unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].1.len(), 1);
        assert_eq!(got[0].1[0].id, id2);

        // Caught-up stream is omitted.
        let got = store.xread(&[("s".to_string(), id2)], 0).unwrap();
        assert!(got.is_empty());
        store.close().await;
    }

    #[tokio::test]
    async fn test_xtrim_to_zero_deletes_key() {
        let store = Store::new(&small());
        store.xadd("s", "*", fields(&[b"k", b"v"]), 0).unwrap();
        assert_eq!(store.xtrim("s", 0).unwrap(), 1);
        assert!(!store.exists("s"));
        store.close().await;
    }
}
