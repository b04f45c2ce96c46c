use crate::resp::RespValue;
use crate::tracker::Observer;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

/// WATCH state, shared between the connection task and the invalidation path.
#[derive(Debug, Default)]
pub struct WatchState {
    pub watching: HashSet<String>,
    pub dirty: bool,
}

/// The shared half of a connection: everything other tasks may touch.
///
/// Registered as the connection's [`Observer`]; an invalidation flags the
/// dirty bit for watched keys and, when tracking is on, enqueues a RESP3
/// push frame for the connection task to write.
#[derive(Debug)]
pub struct Session {
    pub id: u64,
    pub addr: String,
    pub name: Mutex<Option<String>>,
    tracking: AtomicBool,
    pub watch: Mutex<WatchState>,
    push_tx: mpsc::UnboundedSender<RespValue>,
}

impl Session {
    pub fn new(addr: String, push_tx: mpsc::UnboundedSender<RespValue>) -> Self {
        Session {
            id: NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed),
            addr,
            name: Mutex::new(None),
            tracking: AtomicBool::new(false),
            watch: Mutex::new(WatchState::default()),
            push_tx,
        }
    }

    pub fn tracking(&self) -> bool {
        self.tracking.load(Ordering::Relaxed)
    }

    pub fn set_tracking(&self, on: bool) {
        self.tracking.store(on, Ordering::Relaxed);
    }

    /// Enqueue an out-of-band frame for the connection task to write.
    pub fn push(&self, frame: RespValue) {
        let _ = self.push_tx.send(frame);
    }
}

impl Observer for Session {
    fn invalidate(&self, key: &str) {
        {
            let mut watch = self.watch.lock().unwrap();
            if watch.watching.contains(key) {
                watch.dirty = true;
            }
        }
        if self.tracking() {
            self.push(RespValue::Push(vec![
                RespValue::bulk(b"invalidate".to_vec()),
                RespValue::Array(vec![RespValue::bulk(key.as_bytes().to_vec())]),
            ]));
        }
    }
}

/// State owned exclusively by the connection task.
#[derive(Debug)]
pub struct ClientState {
    /// Negotiated protocol version (HELLO); informational.
    pub proto: u8,
    pub in_tx: bool,
    pub queue: Vec<(String, Vec<RespValue>)>,
    /// Pub/sub subscriber id for this connection.
    pub sub_id: u64,
    pub should_close: bool,
}

impl ClientState {
    pub fn new(sub_id: u64) -> Self {
        ClientState {
            proto: 2,
            in_tx: false,
            queue: Vec::new(),
            sub_id,
            should_close: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalidate_sets_dirty_only_for_watched_keys() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let sess = Session::new("test".to_string(), tx);
        sess.watch.lock().unwrap().watching.insert("k".to_string());

        sess.invalidate("other");
        assert!(!sess.watch.lock().unwrap().dirty);

        sess.invalidate("k");
        assert!(sess.watch.lock().unwrap().dirty);
    }

    #[test]
    fn test_invalidate_pushes_frame_when_tracking() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sess = Session::new("test".to_string(), tx);

        sess.invalidate("k1");
        assert!(rx.try_recv().is_err());

        sess.set_tracking(true);
        sess.invalidate("k1");
        let frame = rx.try_recv().unwrap();
        assert_eq!(
            frame.serialize(),
            b">2\r\n$10\r\ninvalidate\r\n*1\r\n$2\r\nk1\r\n"
        );
    }
}
