use super::item::{now_nanos, Item, Value};
use super::Store;
use crate::error::{LedisError, LedisResult};
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;

impl Store {
    fn get_set(&self, key: &str) -> LedisResult<Option<Arc<Item>>> {
        match self.get(key) {
            Some(item) => {
                if !matches!(&*item.value.read().unwrap(), Value::Set(_)) {
                    return Err(LedisError::WrongType);
                }
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }

    fn get_or_create_set(&self, key: &str) -> LedisResult<Arc<Item>> {
        let shard = self.shard(key);
        loop {
            if let Some(item) = shard.load(key) {
                if item.is_expired(now_nanos()) {
                    if shard.remove_if_expired(key, now_nanos()) {
                        self.notify(key);
                    }
                    continue;
                }
                if !matches!(&*item.value.read().unwrap(), Value::Set(_)) {
                    return Err(LedisError::WrongType);
                }
                return Ok(item);
            }
            let fresh = Arc::new(Item::new(Value::Set(HashSet::new())));
            let (item, loaded) = shard.load_or_store(key, fresh);
            if !loaded {
                self.notify(key);
                return Ok(item);
            }
        }
    }

    /// Snapshot of a key's members; `None` when the key is absent.
    fn set_snapshot(&self, key: &str) -> LedisResult<Option<HashSet<Vec<u8>>>> {
        match self.get_set(key)? {
            Some(item) => match &*item.value.read().unwrap() {
                Value::Set(set) => Ok(Some(set.clone())),
                _ => Err(LedisError::WrongType),
            },
            None => Ok(None),
        }
    }

    pub fn sadd(&self, key: &str, members: Vec<Vec<u8>>) -> LedisResult<usize> {
        let item = self.get_or_create_set(key)?;
        let added = {
            let mut guard = item.value.write().unwrap();
            let set = match &mut *guard {
                Value::Set(set) => set,
                _ => return Err(LedisError::WrongType),
            };
            let mut added = 0;
            for member in members {
                if set.insert(member) {
                    added += 1;
                }
            }
            added
        };
        self.notify(key);
        Ok(added)
    }

    pub fn srem(&self, key: &str, members: &[Vec<u8>]) -> LedisResult<usize> {
        let item = match self.get_set(key)? {
            Some(item) => item,
            None => return Ok(0),
        };
        let (removed, now_empty) = {
            let mut guard = item.value.write().unwrap();
            let set = match &mut *guard {
                Value::Set(set) => set,
                _ => return Err(LedisError::WrongType),
            };
            let mut removed = 0;
            for member in members {
                if set.remove(member.as_slice()) {
                    removed += 1;
                }
            }
            (removed, set.is_empty())
        };
        if removed > 0 {
            if now_empty {
                self.shard(key).remove_if_same(key, &item);
            }
            self.notify(key);
        }
        Ok(removed)
    }

    pub fn sismember(&self, key: &str, member: &[u8]) -> LedisResult<bool> {
        match self.get_set(key)? {
            Some(item) => match &*item.value.read().unwrap() {
                Value::Set(set) => Ok(set.contains(member)),
                _ => Err(LedisError::WrongType),
            },
            None => Ok(false),
        }
    }

    pub fn smembers(&self, key: &str) -> LedisResult<Vec<Vec<u8>>> {
        Ok(self
            .set_snapshot(key)?
            .map(|set| set.into_iter().collect())
            .unwrap_or_default())
    }

    pub fn scard(&self, key: &str) -> LedisResult<usize> {
        match self.get_set(key)? {
            Some(item) => match &*item.value.read().unwrap() {
                Value::Set(set) => Ok(set.len()),
                _ => Err(LedisError::WrongType),
            },
            None => Ok(0),
        }
    }

    /// SPOP: remove and return an arbitrary member (hash iteration order
    /// supplies the randomness).
    pub fn spop(&self, key: &str) -> LedisResult<Option<Vec<u8>>> {
        let item = match self.get_set(key)? {
            Some(item) => item,
            None => return Ok(None),
        };
        let (popped, now_empty) = {
            let mut guard = item.value.write().unwrap();
            let set = match &mut *guard {
                Value::Set(set) => set,
                _ => return Err(LedisError::WrongType),
            };
            let member = set.iter().next().cloned();
            if let Some(m) = &member {
                set.remove(m.as_slice());
            }
            (member, set.is_empty())
        };
        match popped {
            Some(member) => {
                if now_empty {
                    self.shard(key).remove_if_same(key, &item);
                }
                self.notify(key);
                Ok(Some(member))
            }
            None => Ok(None),
        }
    }

    /// SRANDMEMBER: positive count returns distinct members clamped to the
    /// set size; negative count allows repetition.
    pub fn srandmember(&self, key: &str, count: i64) -> LedisResult<Vec<Vec<u8>>> {
        let members: Vec<Vec<u8>> = match self.set_snapshot(key)? {
            Some(set) => set.into_iter().collect(),
            None => return Ok(Vec::new()),
        };
        if members.is_empty() || count == 0 {
            return Ok(Vec::new());
        }
        if count > 0 {
            Ok(members.into_iter().take(count as usize).collect())
        } else {
            let mut rng = rand::thread_rng();
            let n = count.unsigned_abs() as usize;
            Ok((0..n)
                .map(|_| members[rng.gen_range(0..members.len())].clone())
                .collect())
        }
    }

    /// SMOVE is SREM-then-SADD and is not atomic across the two keys. If the
    /// add fails, the member is put back into the source as best effort.
    pub fn smove(&self, source: &str, destination: &str, member: &[u8]) -> LedisResult<bool> {
        if self.srem(source, &[member.to_vec()])? == 0 {
            return Ok(false);
        }
        match self.sadd(destination, vec![member.to_vec()]) {
            Ok(_) => Ok(true),
            Err(e) => {
                let _ = self.sadd(source, vec![member.to_vec()]);
                Err(e)
            }
        }
    }

    /// SDIFF: members of the first set minus every successor set.
    pub fn sdiff(&self, keys: &[String]) -> LedisResult<Vec<Vec<u8>>> {
        let first = match keys.first() {
            Some(k) => k,
            None => return Ok(Vec::new()),
        };
        let mut base = match self.set_snapshot(first)? {
            Some(set) => set,
            None => return Ok(Vec::new()),
        };
        for key in &keys[1..] {
            if let Some(other) = self.set_snapshot(key)? {
                base.retain(|m| !other.contains(m));
            }
        }
        Ok(base.into_iter().collect())
    }

    /// SINTER starts from the smallest set and filters through the rest.
    pub fn sinter(&self, keys: &[String]) -> LedisResult<Vec<Vec<u8>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut sets = Vec::with_capacity(keys.len());
        for key in keys {
            match self.set_snapshot(key)? {
                Some(set) => sets.push(set),
                // One missing source empties the intersection.
                None => return Ok(Vec::new()),
            }
        }
        let smallest = sets
            .iter()
            .enumerate()
            .min_by_key(|(_, s)| s.len())
            .map(|(i, _)| i)
            .unwrap();
        let base = sets.swap_remove(smallest);
        Ok(base
            .into_iter()
            .filter(|m| sets.iter().all(|s| s.contains(m)))
            .collect())
    }

    pub fn sunion(&self, keys: &[String]) -> LedisResult<Vec<Vec<u8>>> {
        let mut out: HashSet<Vec<u8>> = HashSet::new();
        for key in keys {
            if let Some(set) = self.set_snapshot(key)? {
                out.extend(set);
            }
        }
        Ok(out.into_iter().collect())
    }

    /// Store `members` as a fresh set at `destination`; an empty result
    /// deletes the destination instead. Returns the stored cardinality.
    pub(crate) fn store_set_result(
        &self,
        destination: &str,
        members: Vec<Vec<u8>>,
    ) -> usize {
        let len = members.len();
        if len == 0 {
            self.del(destination);
            return 0;
        }
        let set: HashSet<Vec<u8>> = members.into_iter().collect();
        let item = Arc::new(Item::new(Value::Set(set)));
        self.shard(destination).store(destination.to_string(), item);
        self.notify(destination);
        len
    }

    pub fn sdiffstore(&self, destination: &str, keys: &[String]) -> LedisResult<usize> {
        let members = self.sdiff(keys)?;
        Ok(self.store_set_result(destination, members))
    }

    pub fn sinterstore(&self, destination: &str, keys: &[String]) -> LedisResult<usize> {
        let members = self.sinter(keys)?;
        Ok(self.store_set_result(destination, members))
    }

    pub fn sunionstore(&self, destination: &str, keys: &[String]) -> LedisResult<usize> {
        let members = self.sunion(keys)?;
        Ok(self.store_set_result(destination, members))
    }
}
