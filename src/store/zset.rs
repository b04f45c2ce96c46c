use super::item::{now_nanos, Item, Value};
use super::Store;
use crate::error::{LedisError, LedisResult};
use crate::types::skiplist::SortedSet;
use std::collections::HashMap;
use std::sync::Arc;

impl Store {
    fn get_zset(&self, key: &str) -> LedisResult<Option<Arc<Item>>> {
        match self.get(key) {
            Some(item) => {
                if !matches!(&*item.value.read().unwrap(), Value::ZSet(_)) {
                    return Err(LedisError::WrongType);
                }
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }

    fn get_or_create_zset(&self, key: &str) -> LedisResult<Arc<Item>> {
        let shard = self.shard(key);
        loop {
            if let Some(item) = shard.load(key) {
                if item.is_expired(now_nanos()) {
                    if shard.remove_if_expired(key, now_nanos()) {
                        self.notify(key);
                    }
                    continue;
                }
                if !matches!(&*item.value.read().unwrap(), Value::ZSet(_)) {
                    return Err(LedisError::WrongType);
                }
                return Ok(item);
            }
            let fresh = Arc::new(Item::new(Value::ZSet(SortedSet::new())));
            let (item, loaded) = shard.load_or_store(key, fresh);
            if !loaded {
                self.notify(key);
                return Ok(item);
            }
        }
    }

    /// ZADD one member. Returns 1 on insert, 0 on score update.
    pub fn zadd(&self, key: &str, score: f64, member: Vec<u8>) -> LedisResult<usize> {
        let item = self.get_or_create_zset(key)?;
        let added = {
            let mut guard = item.value.write().unwrap();
            let z = match &mut *guard {
                Value::ZSet(z) => z,
                _ => return Err(LedisError::WrongType),
            };
            usize::from(z.insert(member, score))
        };
        self.notify(key);
        Ok(added)
    }

    pub fn zrem(&self, key: &str, members: &[Vec<u8>]) -> LedisResult<usize> {
        let item = match self.get_zset(key)? {
            Some(item) => item,
            None => return Ok(0),
        };
        let (removed, now_empty) = {
            let mut guard = item.value.write().unwrap();
            let z = match &mut *guard {
                Value::ZSet(z) => z,
                _ => return Err(LedisError::WrongType),
            };
            let mut removed = 0;
            for member in members {
                if z.remove(member) {
                    removed += 1;
                }
            }
            (removed, z.is_empty())
        };
        if removed > 0 {
            if now_empty {
                self.shard(key).remove_if_same(key, &item);
            }
            self.notify(key);
        }
        Ok(removed)
    }

    pub fn zscore(&self, key: &str, member: &[u8]) -> LedisResult<Option<f64>> {
        match self.get_zset(key)? {
            Some(item) => match &*item.value.read().unwrap() {
                Value::ZSet(z) => Ok(z.score(member)),
                _ => Err(LedisError::WrongType),
            },
            None => Ok(None),
        }
    }

    pub fn zcard(&self, key: &str) -> LedisResult<usize> {
        match self.get_zset(key)? {
            Some(item) => match &*item.value.read().unwrap() {
                Value::ZSet(z) => Ok(z.len()),
                _ => Err(LedisError::WrongType),
            },
            None => Ok(0),
        }
    }

    pub fn zincrby(&self, key: &str, delta: f64, member: Vec<u8>) -> LedisResult<f64> {
        let item = self.get_or_create_zset(key)?;
        let score = {
            let mut guard = item.value.write().unwrap();
            let z = match &mut *guard {
                Value::ZSet(z) => z,
                _ => return Err(LedisError::WrongType),
            };
            z.incr_by(member, delta)
        };
        self.notify(key);
        Ok(score)
    }

    /// ZRANGE / ZREVRANGE by rank, negative indices folding from the end.
    pub fn zrange(
        &self,
        key: &str,
        start: i64,
        stop: i64,
        reverse: bool,
    ) -> LedisResult<Vec<(Vec<u8>, f64)>> {
        match self.get_zset(key)? {
            Some(item) => match &*item.value.read().unwrap() {
                Value::ZSet(z) => Ok(z.range(start, stop, reverse)),
                _ => Err(LedisError::WrongType),
            },
            None => Ok(Vec::new()),
        }
    }

    pub fn zrange_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
        reverse: bool,
    ) -> LedisResult<Vec<(Vec<u8>, f64)>> {
        match self.get_zset(key)? {
            Some(item) => match &*item.value.read().unwrap() {
                Value::ZSet(z) => Ok(z.range_by_score(min, max, reverse)),
                _ => Err(LedisError::WrongType),
            },
            None => Ok(Vec::new()),
        }
    }

    pub fn zrank(&self, key: &str, member: &[u8], reverse: bool) -> LedisResult<Option<u64>> {
        match self.get_zset(key)? {
            Some(item) => match &*item.value.read().unwrap() {
                Value::ZSet(z) => Ok(if reverse {
                    z.rev_rank(member)
                } else {
                    z.rank(member)
                }),
                _ => Err(LedisError::WrongType),
            },
            None => Ok(None),
        }
    }

    /// ZINTERSTORE with SUM aggregation. Plain sets participate with every
    /// member scored 1.0. The smallest source drives the intersection. An
    /// empty result deletes the destination.
    pub fn zinterstore(&self, destination: &str, keys: &[String]) -> LedisResult<usize> {
        if keys.is_empty() {
            return Ok(0);
        }

        let mut sources: Vec<HashMap<Vec<u8>, f64>> = Vec::with_capacity(keys.len());
        for key in keys {
            let item = match self.get(key) {
                Some(item) => item,
                None => {
                    self.del(destination);
                    return Ok(0);
                }
            };
            let guard = item.value.read().unwrap();
            let map = match &*guard {
                Value::ZSet(z) => z.scores().clone(),
                Value::Set(set) => set.iter().map(|m| (m.clone(), 1.0)).collect(),
                _ => return Err(LedisError::WrongType),
            };
            sources.push(map);
        }

        let smallest = sources
            .iter()
            .enumerate()
            .min_by_key(|(_, m)| m.len())
            .map(|(i, _)| i)
            .unwrap();

        let mut result = SortedSet::new();
        'members: for member in sources[smallest].keys() {
            let mut sum = 0.0;
            for source in &sources {
                match source.get(member) {
                    Some(score) => sum += score,
                    None => continue 'members,
                }
            }
            result.insert(member.clone(), sum);
        }

        let len = result.len();
        if len == 0 {
            self.del(destination);
            return Ok(0);
        }
        let item = Arc::new(Item::new(Value::ZSet(result)));
        self.shard(destination).store(destination.to_string(), item);
        self.notify(destination);
        Ok(len)
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

    #[tokio::test]
    async fn test_zadd_zscore() {
        let store = Store::new(&small());
        assert_eq!(store.zadd("z", 1.5, b"a".to_vec()).unwrap(), 1);
        assert_eq!(store.zadd("z", 2.5, b"a".to_vec()).unwrap(), 0);
        assert_eq!(store.zscore("z", b"a").unwrap(), Some(2.5));
        assert_eq!(store.zscore("z", b"x").unwrap(), None);
        assert_eq!(store.zcard("z").unwrap(), 1);
        store.close().await;
    }

    #[tokio::test]
    async fn test_zrank_identity() {
        let store = Store::new(&small());
        for (m, s) in [(b"a", 1.0), (b"b", 2.0), (b"c", 3.0)] {
            store.zadd("z", s, m.to_vec()).unwrap();
        }
        let card = store.zcard("z").unwrap() as u64;
        for m in [b"a", b"b", b"c"] {
            let rank = store.zrank("z", m, false).unwrap().unwrap();
            let rev = store.zrank("z", m, true).unwrap().unwrap();
            assert_eq!(rank + rev, card - 1);
        }
        store.close().await;
    }

    #[tokio::test]
    async fn test_zrange_and_rev() {
        let store = Store::new(&small());
        for (m, s) in [(&b"a"[..], 1.0), (&b"b"[..], 2.0), (&b"c"[..], 3.0)] {
            store.zadd("z", s, m.to_vec()).unwrap();
        }
        let asc: Vec<Vec<u8>> = store
            .zrange("z", 0, -1, false)
            .unwrap()
            .into_iter()
            .map(|(m, _)| m)
            .collect();
        assert_eq!(asc, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
        let desc: Vec<Vec<u8>> = store
            .zrange("z", 0, 0, true)
            .unwrap()
            .into_iter()
            .map(|(m, _)| m)
            .collect();
        assert_eq!(desc, vec![b"c".to_vec()]);
        store.close().await;
    }

    #[tokio::test]
    async fn test_zrem_empty_deletes_key() {
        let store = Store::new(&small());
        store.zadd("z", 1.0, b"a".to_vec()).unwrap();
        assert_eq!(store.zrem("z", &[b"a".to_vec()]).unwrap(), 1);
        assert!(!store.exists("z"));
        store.close().await;
    }

    #[tokio::test]
    async fn test_zincrby() {
        let store = Store::new(&small());
        assert_eq!(store.zincrby("z", 2.0, b"m".to_vec()).unwrap(), 2.0);
        assert_eq!(store.zincrby("z", 3.0, b"m".to_vec()).unwrap(), 5.0);
        store.close().await;
    }

    #[tokio::test]
    async fn test_zrange_by_score() {
        let store = Store::new(&small());
        for i in 0..10 {
            store
                .zadd("z", i as f64, format!("m{i}").into_bytes())
                .unwrap();
        }
        let got = store.zrange_by_score("z", 3.0, 5.0, false).unwrap();
        assert_eq!(got.len(), 3);
        assert_eq!(got[0].0, b"m3".to_vec());
        store.close().await;
    }

    #[tokio::test]
    async fn test_zinterstore_with_plain_set() {
        let store = Store::new(&small());
        store.zadd("z", 5.0, b"a".to_vec()).unwrap();
        store.zadd("z", 7.0, b"b".to_vec()).unwrap();
        store.sadd("s", vec![b"a".to_vec(), b"c".to_vec()]).unwrap();

        let n = store
            .zinterstore("dst", &["z".to_string(), "s".to_string()])
            .unwrap();
        assert_eq!(n, 1);
        // SUM aggregation: 5.0 from the zset + 1.0 from the set.
        assert_eq!(store.zscore("dst", b"a").unwrap(), Some(6.0));
        store.close().await;
    }

    #[tokio::test]
    async fn test_zinterstore_missing_source() {
        let store = Store::new(&small());
        store.zadd("z", 1.0, b"a".to_vec()).unwrap();
        store.zadd("dst", 1.0, b"stale".to_vec()).unwrap();
        let n = store
            .zinterstore("dst", &["z".to_string(), "missing".to_string()])
            .unwrap();
        assert_eq!(n, 0);
        assert!(!store.exists("dst"));
        store.close().await;
    }
}
