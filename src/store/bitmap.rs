use super::item::{now_nanos, Item, Value};
use super::Store;
use crate::error::{LedisError, LedisResult};
use roaring::RoaringTreemap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitOp {
    And,
    Or,
    Xor,
    Not,
}

impl BitOp {
    pub fn parse(s: &str) -> Option<BitOp> {
        match s.to_ascii_uppercase().as_str() {
            "AND" => Some(BitOp::And),
            "OR" => Some(BitOp::Or),
            "XOR" => Some(BitOp::Xor),
            "NOT" => Some(BitOp::Not),
            _ => None,
        }
    }
}

impl Store {
    fn get_bitmap(&self, key: &str) -> LedisResult<Option<Arc<Item>>> {
        match self.get(key) {
            Some(item) => {
                if !matches!(&*item.value.read().unwrap(), Value::Bitmap(_)) {
                    return Err(LedisError::WrongType);
                }
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }

    fn get_or_create_bitmap(&self, key: &str) -> LedisResult<Arc<Item>> {
        let shard = self.shard(key);
        loop {
            if let Some(item) = shard.load(key) {
                if item.is_expired(now_nanos()) {
                    if shard.remove_if_expired(key, now_nanos()) {
                        self.notify(key);
                    }
                    continue;
                }
                if !matches!(&*item.value.read().unwrap(), Value::Bitmap(_)) {
                    return Err(LedisError::WrongType);
                }
                return Ok(item);
            }
            let fresh = Arc::new(Item::new(Value::Bitmap(RoaringTreemap::new())));
            let (item, loaded) = shard.load_or_store(key, fresh);
            if !loaded {
                self.notify(key);
                return Ok(item);
            }
        }
    }

    fn bitmap_snapshot(&self, key: &str) -> LedisResult<Option<RoaringTreemap>> {
        match self.get_bitmap(key)? {
            Some(item) => match &*item.value.read().unwrap() {
                Value::Bitmap(bm) => Ok(Some(bm.clone())),
                _ => Err(LedisError::WrongType),
            },
            None => Ok(None),
        }
    }

    /// SETBIT: set or clear a position, returning the prior bit.
    pub fn setbit(&self, key: &str, offset: u64, value: bool) -> LedisResult<bool> {
        let item = self.get_or_create_bitmap(key)?;
        let prior = {
            let mut guard = item.value.write().unwrap();
            let bm = match &mut *guard {
                Value::Bitmap(bm) => bm,
                _ => return Err(LedisError::WrongType),
            };
            let prior = bm.contains(offset);
            if value {
                bm.insert(offset);
            } else {
                bm.remove(offset);
            }
            prior
        };
        self.notify(key);
        Ok(prior)
    }

    pub fn getbit(&self, key: &str, offset: u64) -> LedisResult<bool> {
        match self.get_bitmap(key)? {
            Some(item) => match &*item.value.read().unwrap() {
                Value::Bitmap(bm) => Ok(bm.contains(offset)),
                _ => Err(LedisError::WrongType),
            },
            None => Ok(false),
        }
    }

    /// BITCOUNT: cardinality of the set positions.
    pub fn bitcount(&self, key: &str) -> LedisResult<u64> {
        match self.get_bitmap(key)? {
            Some(item) => match &*item.value.read().unwrap() {
                Value::Bitmap(bm) => Ok(bm.len()),
                _ => Err(LedisError::WrongType),
            },
            None => Ok(0),
        }
    }

    /// BITOP: combine sources into `destination` and return the resulting
    /// cardinality. NOT takes exactly one source and flips `[0, max+1)`;
    /// a missing source collapses an AND to empty. An empty result deletes
    /// the destination.
    pub fn bitop(&self, op: BitOp, destination: &str, keys: &[String]) -> LedisResult<u64> {
        let result = match op {
            BitOp::Not => {
                if keys.len() != 1 {
                    return Err(LedisError::Syntax);
                }
                match self.bitmap_snapshot(&keys[0])? {
                    Some(src) => match src.max() {
                        Some(max) => {
                            let mut full = RoaringTreemap::new();
                            full.insert_range(0..=max);
                            full -= src;
                            full
                        }
                        None => RoaringTreemap::new(),
                    },
                    None => RoaringTreemap::new(),
                }
            }
            _ => {
                let mut acc: Option<RoaringTreemap> = None;
                for key in keys {
                    let bm = match self.bitmap_snapshot(key)? {
                        Some(bm) => bm,
                        None => {
                            if op == BitOp::And {
                                acc = None;
                                break;
                            }
                            continue;
                        }
                    };
                    match &mut acc {
                        None => acc = Some(bm),
                        Some(prev) => match op {
                            BitOp::And => *prev &= bm,
                            BitOp::Or => *prev |= bm,
                            BitOp::Xor => *prev ^= bm,
                            BitOp::Not => unreachable!(),
                        },
                    }
                }
                acc.unwrap_or_else(RoaringTreemap::new)
            }
        };

        let cardinality = result.len();
        if cardinality == 0 {
            self.del(destination);
        } else {
            let item = Arc::new(Item::new(Value::Bitmap(result)));
            self.shard(destination).store(destination.to_string(), item);
            self.notify(destination);
        }
        Ok(cardinality)
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

    fn k(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_setbit_getbit() {
        let store = Store::new(&small());
        assert!(!store.setbit("b", 7, true).unwrap());
        assert!(store.getbit("b", 7).unwrap());
        assert!(store.setbit("b", 7, false).unwrap());
        assert!(!store.getbit("b", 7).unwrap());
        assert!(!store.getbit("missing", 0).unwrap());
        store.close().await;
    }

    #[tokio::test]
    async fn test_bitcount() {
        let store = Store::new(&small());
        assert_eq!(store.bitcount("b").unwrap(), 0);
        for offset in [0u64, 100, 1 << 40] {
            store.setbit("b", offset, true).unwrap();
        }
        assert_eq!(store.bitcount("b").unwrap(), 3);
        store.close().await;
    }

    #[tokio::test]
    async fn test_bitop_and_or_xor() {
        let store = Store::new(&small());
        store.setbit("a", 1, true).unwrap();
        store.setbit("a", 2, true).unwrap();
        store.setbit("b", 2, true).unwrap();
        store.setbit("b", 3, true).unwrap();

        assert_eq!(store.bitop(BitOp::And, "d", &k(&["a", "b"])).unwrap(), 1);
        assert!(store.getbit("d", 2).unwrap());

        assert_eq!(store.bitop(BitOp::Or, "d", &k(&["a", "b"])).unwrap(), 3);
        assert_eq!(store.bitop(BitOp::Xor, "d", &k(&["a", "b"])).unwrap(), 2);
        assert!(store.getbit("d", 1).unwrap());
        assert!(!store.getbit("d", 2).unwrap());
        store.close().await;
    }

    #[tokio::test]
    async fn test_bitop_and_missing_source_collapses() {
        let store = Store::new(&small());
        store.setbit("a", 1, true).unwrap();
        store.setbit("d", 9, true).unwrap();
        assert_eq!(
            store.bitop(BitOp::And, "d", &k(&["a", "missing"])).unwrap(),
            0
        );
        // Empty result removed the destination.
        assert!(!store.exists("d"));
        store.close().await;
    }

    #[tokio::test]
    async fn test_bitop_not() {
        let store = Store::new(&small());
        store.setbit("a", 0, true).unwrap();
        store.setbit("a", 2, true).unwrap();
        // Flip [0, 3): bits 1 remains.
        assert_eq!(store.bitop(BitOp::Not, "d", &k(&["a"])).unwrap(), 1);
        assert!(store.getbit("d", 1).unwrap());
        assert!(!store.getbit("d", 0).unwrap());

        assert!(store.bitop(BitOp::Not, "d", &k(&["a", "b"])).is_err());
        assert_eq!(store.bitop(BitOp::Not, "d", &k(&["missing"])).unwrap(), 0);
        store.close().await;
    }
}
