use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex};

/// Something that wants to hear about mutations of tracked keys — in practice
/// a client connection. `invalidate` is called with no store or item lock
/// held; implementations must not call back into the registry.
pub trait Observer: Send + Sync {
    fn invalidate(&self, key: &str);
}

struct ObserverEntry {
    handle: Arc<dyn Observer>,
    keys: HashSet<String>,
}

#[derive(Default)]
struct Registry {
    /// key -> observers interested in it
    tracked: HashMap<String, HashSet<u64>>,
    /// observer id -> handle + reverse index of its keys
    observers: HashMap<u64, ObserverEntry>,
}

/// Per-key observer registry with one-shot notification semantics, backing
/// both client-side-caching invalidation and WATCH dirty-flag signalling.
pub struct Tracker {
    inner: Mutex<Registry>,
}

impl Tracker {
    pub fn new() -> Self {
        Tracker {
            inner: Mutex::new(Registry::default()),
        }
    }

    pub fn register(&self, id: u64, observer: Arc<dyn Observer>) {
        let mut reg = self.inner.lock().unwrap();
        reg.observers.entry(id).or_insert_with(|| ObserverEntry {
            handle: observer,
            keys: HashSet::new(),
        });
    }

    /// Drop an observer and every edge pointing at it.
    pub fn unregister(&self, id: u64) {
        let mut reg = self.inner.lock().unwrap();
        if let Some(entry) = reg.observers.remove(&id) {
            for key in entry.keys {
                if let Some(ids) = reg.tracked.get_mut(&key) {
                    ids.remove(&id);
                    if ids.is_empty() {
                        reg.tracked.remove(&key);
                    }
                }
            }
        }
    }

    /// Interest of `id` in `key`. A no-op for unregistered observers.
    pub fn track(&self, key: &str, id: u64) {
        let mut reg = self.inner.lock().unwrap();
        if !reg.observers.contains_key(&id) {
            return;
        }
        reg.tracked.entry(key.to_string()).or_default().insert(id);
        if let Some(entry) = reg.observers.get_mut(&id) {
            entry.keys.insert(key.to_string());
        }
    }

    /// Invoke `invalidate(key)` on every observer tracked on `key` and drop
    /// all edges for the key (one-shot). The callbacks run after the registry
    /// lock is released.
    pub fn notify(&self, key: &str) {
        let handles: Vec<Arc<dyn Observer>> = {
            let mut reg = self.inner.lock().unwrap();
            let ids = match reg.tracked.remove(key) {
                Some(ids) => ids,
                None => return,
            };
            let mut handles = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(entry) = reg.observers.get_mut(&id) {
                    entry.keys.remove(key);
                    handles.push(entry.handle.clone());
                }
            }
            handles
        };
        for handle in handles {
            handle.invalidate(key);
        }
    }

    /// Number of observers currently tracked on `key`.
    pub fn tracked_count(&self, key: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .tracked
            .get(key)
            .map_or(0, |ids| ids.len())
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reg = self.inner.lock().unwrap();
        f.debug_struct("Tracker")
            .field("tracked_keys", &reg.tracked.len())
            .field("observers", &reg.observers.len())
            .finish()
    }
}
