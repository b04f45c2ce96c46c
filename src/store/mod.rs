pub mod bitmap;
pub mod hash;
pub mod item;
pub mod list;
pub mod set;
pub mod string;
pub mod stream;
pub mod zset;

use crate::config::Config;
use crate::pubsub::PubSub;
use crate::tracker::Tracker;
use item::{now_nanos, Item};
use std::collections::hash_map::RandomState;
use std::collections::HashMap;
use std::hash::BuildHasher;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// One slot of the key space: an independently locked map from key to item.
///
/// The per-key operations mirror a concurrent map surface (`load`, `store`,
/// `load_or_store`, `compare_and_swap`, `swap`, `load_and_delete`) so the
/// string CAS-retry loops have something to swing against.
#[derive(Debug, Default)]
pub struct Shard {
    entries: RwLock<HashMap<String, Arc<Item>>>,
}

impl Shard {
    pub fn load(&self, key: &str) -> Option<Arc<Item>> {
        self.entries.read().unwrap().get(key).cloned()
    }

    pub fn store(&self, key: String, item: Arc<Item>) {
        self.entries.write().unwrap().insert(key, item);
    }

    /// Insert `item` unless the key is present. Returns the resident item and
    /// whether it was already there.
    pub fn load_or_store(&self, key: &str, item: Arc<Item>) -> (Arc<Item>, bool) {
        let mut map = self.entries.write().unwrap();
        match map.get(key) {
            Some(existing) => (existing.clone(), true),
            None => {
                map.insert(key.to_string(), item.clone());
                (item, false)
            }
        }
    }

    /// Replace the item only if the resident one is still `current`
    /// (pointer identity). Returns whether the swap happened.
    pub fn compare_and_swap(&self, key: &str, current: &Arc<Item>, new: Arc<Item>) -> bool {
        let mut map = self.entries.write().unwrap();
        match map.get(key) {
            Some(existing) if Arc::ptr_eq(existing, current) => {
                map.insert(key.to_string(), new);
                true
            }
            _ => false,
        }
    }

    /// Unconditionally replace, returning the previous item if any.
    pub fn swap(&self, key: &str, new: Arc<Item>) -> Option<Arc<Item>> {
        self.entries.write().unwrap().insert(key.to_string(), new)
    }

    pub fn load_and_delete(&self, key: &str) -> Option<Arc<Item>> {
        self.entries.write().unwrap().remove(key)
    }

    /// Remove the key only if the resident item is still `item`
    /// (pointer identity). Guards empty-container cleanup against racing
    /// re-creations of the key.
    fn remove_if_same(&self, key: &str, item: &Arc<Item>) -> bool {
        let mut map = self.entries.write().unwrap();
        match map.get(key) {
            Some(existing) if Arc::ptr_eq(existing, item) => {
                map.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Remove the key only if the entry is expired at `now`.
    fn remove_if_expired(&self, key: &str, now: u64) -> bool {
        let mut map = self.entries.write().unwrap();
        if let Some(item) = map.get(key) {
            if item.is_expired(now) {
                map.remove(key);
                return true;
            }
        }
        false
    }

    /// Keys of expired entries, visiting at most `limit` entries
    /// (`None` scans the whole shard). Iteration starts wherever the map
    /// iterator starts; the sampler only needs the traversal to be bounded.
    fn collect_expired(&self, now: u64, limit: Option<usize>) -> Vec<String> {
        let map = self.entries.read().unwrap();
        let mut out = Vec::new();
        for (i, (key, item)) in map.iter().enumerate() {
            if let Some(limit) = limit {
                if i >= limit {
                    break;
                }
            }
            if item.is_expired(now) {
                out.push(key.clone());
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The shard-striped key space plus the services hanging off it: the pub/sub
/// bus, the invalidation registry, and the background eviction task.
#[derive(Debug)]
pub struct Store {
    shards: Vec<Shard>,
    mask: u64,
    hasher: RandomState,
    pub pubsub: PubSub,
    pub tracker: Tracker,
    sample_rate: usize,
    rest_period: Duration,
    shutdown: CancellationToken,
    evict_task: Mutex<Option<JoinHandle<()>>>,
}

impl Store {
    /// Build the store and spawn its eviction task. The shard count is
    /// rounded up to a power of two; the hash seed is drawn once and stays
    /// stable for the life of the store.
    pub fn new(config: &Config) -> Arc<Store> {
        let size = config.shards.max(1).next_power_of_two();
        let mut shards = Vec::with_capacity(size);
        for _ in 0..size {
            shards.push(Shard::default());
        }

        let store = Arc::new(Store {
            shards,
            mask: (size - 1) as u64,
            hasher: RandomState::new(),
            pubsub: PubSub::new(config.pubsub_queue_depth),
            tracker: Tracker::new(),
            sample_rate: config.evict_sample_rate,
            rest_period: config.sweep_rest_period,
            shutdown: CancellationToken::new(),
            evict_task: Mutex::new(None),
        });

        let handle = tokio::spawn(evict_loop(store.clone(), store.shutdown.clone()));
        *store.evict_task.lock().unwrap() = Some(handle);
        store
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn shard_index(&self, key: &str) -> usize {
        (self.hasher.hash_one(key) & self.mask) as usize
    }

    pub(crate) fn shard(&self, key: &str) -> &Shard {
        &self.shards[self.shard_index(key)]
    }

    /// One-shot invalidation of every observer tracked on `key`. Called by
    /// every mutating operation and by expiry on any path.
    pub fn notify(&self, key: &str) {
        self.tracker.notify(key);
    }

    /// Fetch the item for `key`, removing it first if it has expired.
    pub fn get(&self, key: &str) -> Option<Arc<Item>> {
        let shard = self.shard(key);
        let item = shard.load(key)?;
        if item.is_expired(now_nanos()) {
            if shard.remove_if_expired(key, now_nanos()) {
                self.notify(key);
            }
            return None;
        }
        Some(item)
    }

    /// Delete a key. Returns true if it existed.
    pub fn del(&self, key: &str) -> bool {
        let shard = self.shard(key);
        if let Some(item) = shard.load_and_delete(key) {
            self.notify(key);
            // An expired entry counts as already gone.
            return !item.is_expired(now_nanos());
        }
        false
    }

    pub fn exists(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Remaining time to live in whole seconds: -2 when the key is missing or
    /// expired, -1 when it has no expiry.
    pub fn ttl(&self, key: &str) -> i64 {
        let item = match self.get(key) {
            Some(item) => item,
            None => return -2,
        };
        if item.expires_at == 0 {
            return -1;
        }
        ((item.expires_at - now_nanos()) / 1_000_000_000) as i64
    }

    /// Cancel the eviction task and wait for it to exit.
    pub async fn close(&self) {
        self.shutdown.cancel();
        let handle = self.evict_task.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

/// Background eviction: every second, run a bounded expiry sample over every
/// shard, and sweep one shard exhaustively in round-robin order. After a full
/// sweep cycle the sweeper rests before starting over.
async fn evict_loop(store: Arc<Store>, shutdown: CancellationToken) {
    let mut tick = tokio::time::interval(Duration::from_secs(1));
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let mut current_shard = 0usize;
    let mut sweeping = true;
    let mut rest_until = tokio::time::Instant::now();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = tick.tick() => {}
        }

        let now = now_nanos();

        // Strategy 1: bounded sample of every shard.
        let mut removed = 0usize;
        for shard in &store.shards {
            for key in shard.collect_expired(now, Some(store.sample_rate)) {
                if shard.remove_if_expired(&key, now) {
                    store.notify(&key);
                    removed += 1;
                }
            }
        }

        // Strategy 2: exhaustive sweep of one shard per tick.
        if sweeping {
            let shard = &store.shards[current_shard];
            for key in shard.collect_expired(now, None) {
                if shard.remove_if_expired(&key, now) {
                    store.notify(&key);
                    removed += 1;
                }
            }
            current_shard += 1;
            if current_shard >= store.shards.len() {
                current_shard = 0;
                sweeping = false;
                rest_until = tokio::time::Instant::now() + store.rest_period;
            }
        } else if tokio::time::Instant::now() >= rest_until {
            sweeping = true;
        }

        if removed > 0 {
            debug!("evicted {removed} expired keys");
        }
    }
}
