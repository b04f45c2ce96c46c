use super::item::{now_nanos, Item, Value};
use super::Store;
use crate::error::{LedisError, LedisResult};
use std::collections::HashMap;
use std::sync::Arc;

impl Store {
    fn get_hash(&self, key: &str) -> LedisResult<Option<Arc<Item>>> {
        match self.get(key) {
            Some(item) => {
                if !matches!(&*item.value.read().unwrap(), Value::Hash(_)) {
                    return Err(LedisError::WrongType);
                }
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }

    fn get_or_create_hash(&self, key: &str) -> LedisResult<Arc<Item>> {
        let shard = self.shard(key);
        loop {
            if let Some(item) = shard.load(key) {
                if item.is_expired(now_nanos()) {
                    if shard.remove_if_expired(key, now_nanos()) {
                        self.notify(key);
                    }
                    continue;
                }
                if !matches!(&*item.value.read().unwrap(), Value::Hash(_)) {
                    return Err(LedisError::WrongType);
                }
                return Ok(item);
            }
            let fresh = Arc::new(Item::new(Value::Hash(HashMap::new())));
            let (item, loaded) = shard.load_or_store(key, fresh);
            if !loaded {
                self.notify(key);
                return Ok(item);
            }
        }
    }

    /// HSET/HMSET. Returns the number of fields newly created.
    pub fn hset(&self, key: &str, pairs: Vec<(Vec<u8>, Vec<u8>)>) -> LedisResult<usize> {
        let item = self.get_or_create_hash(key)?;
        let created = {
            let mut guard = item.value.write().unwrap();
            let map = match &mut *guard {
                Value::Hash(map) => map,
                _ => return Err(LedisError::WrongType),
            };
            let mut created = 0;
            for (field, value) in pairs {
                if map.insert(field, value).is_none() {
                    created += 1;
                }
            }
            created
        };
        self.notify(key);
        Ok(created)
    }

    pub fn hget(&self, key: &str, field: &[u8]) -> LedisResult<Option<Vec<u8>>> {
        match self.get_hash(key)? {
            Some(item) => match &*item.value.read().unwrap() {
                Value::Hash(map) => Ok(map.get(field).cloned()),
                _ => Err(LedisError::WrongType),
            },
            None => Ok(None),
        }
    }

    /// HDEL. Deleting the last field deletes the key.
    pub fn hdel(&self, key: &str, fields: &[Vec<u8>]) -> LedisResult<usize> {
        let item = match self.get_hash(key)? {
            Some(item) => item,
            None => return Ok(0),
        };
        let (removed, now_empty) = {
            let mut guard = item.value.write().unwrap();
            let map = match &mut *guard {
                Value::Hash(map) => map,
                _ => return Err(LedisError::WrongType),
            };
            let mut removed = 0;
            for field in fields {
                if map.remove(field.as_slice()).is_some() {
                    removed += 1;
                }
            }
            (removed, map.is_empty())
        };
        if removed > 0 {
            if now_empty {
                self.shard(key).remove_if_same(key, &item);
            }
            self.notify(key);
        }
        Ok(removed)
    }

    pub fn hexists(&self, key: &str, field: &[u8]) -> LedisResult<bool> {
        Ok(self.hget(key, field)?.is_some())
    }

    pub fn hlen(&self, key: &str) -> LedisResult<usize> {
        match self.get_hash(key)? {
            Some(item) => match &*item.value.read().unwrap() {
                Value::Hash(map) => Ok(map.len()),
                _ => Err(LedisError::WrongType),
            },
            None => Ok(0),
        }
    }

    /// HGETALL returns a snapshot copy, so the caller sees an isolated view.
    pub fn hgetall(&self, key: &str) -> LedisResult<Vec<(Vec<u8>, Vec<u8>)>> {
        match self.get_hash(key)? {
            Some(item) => match &*item.value.read().unwrap() {
                Value::Hash(map) => Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
                _ => Err(LedisError::WrongType),
            },
            None => Ok(Vec::new()),
        }
    }

    pub fn hkeys(&self, key: &str) -> LedisResult<Vec<Vec<u8>>> {
        Ok(self.hgetall(key)?.into_iter().map(|(k, _)| k).collect())
    }

    pub fn hvals(&self, key: &str) -> LedisResult<Vec<Vec<u8>>> {
        Ok(self.hgetall(key)?.into_iter().map(|(_, v)| v).collect())
    }

    pub fn hmget(&self, key: &str, fields: &[Vec<u8>]) -> LedisResult<Vec<Option<Vec<u8>>>> {
        match self.get_hash(key)? {
            Some(item) => match &*item.value.read().unwrap() {
                Value::Hash(map) => Ok(fields
                    .iter()
                    .map(|f| map.get(f.as_slice()).cloned())
                    .collect()),
                _ => Err(LedisError::WrongType),
            },
            None => Ok(fields.iter().map(|_| None).collect()),
        }
    }

    /// HINCRBY: an absent field counts as 0.
    pub fn hincrby(&self, key: &str, field: &[u8], delta: i64) -> LedisResult<i64> {
        let item = self.get_or_create_hash(key)?;
        let next = {
            let mut guard = item.value.write().unwrap();
            let map = match &mut *guard {
                Value::Hash(map) => map,
                _ => return Err(LedisError::WrongType),
            };
            let current = match map.get(field) {
                Some(raw) => std::str::from_utf8(raw)
                    .ok()
                    .and_then(|s| s.parse::<i64>().ok())
                    .ok_or(LedisError::NotInteger)?,
                None => 0,
            };
            let next = current.checked_add(delta).ok_or(LedisError::NotInteger)?;
            map.insert(field.to_vec(), next.to_string().into_bytes());
            next
        };
        self.notify(key);
        Ok(next)
    }
}
