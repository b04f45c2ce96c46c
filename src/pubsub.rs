use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tokio::sync::mpsc;

/// A delivered message: the channel it was published on and the payload.
pub type PubSubMessage = (String, Vec<u8>);

#[derive(Debug, Default)]
struct Inner {
    /// channel -> subscriber id -> that subscriber's queue
    channels: HashMap<String, HashMap<u64, mpsc::Sender<PubSubMessage>>>,
    /// subscriber id -> channels it is subscribed to
    subscriber_channels: HashMap<u64, HashSet<String>>,
    next_id: u64,
}

/// Channel fan-out bus. Delivery is loss-tolerant: a publish enqueues
/// non-blocking into each subscriber's bounded queue and drops the message
/// for any subscriber whose queue is full — it never blocks the publisher.
#[derive(Debug)]
pub struct PubSub {
    inner: Mutex<Inner>,
    queue_depth: usize,
}

impl PubSub {
    pub fn new(queue_depth: usize) -> Self {
        PubSub {
            inner: Mutex::new(Inner {
                next_id: 1,
                ..Default::default()
            }),
            queue_depth: queue_depth.max(1),
        }
    }

    /// Allocate a subscriber: an id plus its bounded message queue. The
    /// sender half is registered per channel on `subscribe`.
    pub fn new_subscriber(
        &self,
    ) -> (u64, mpsc::Sender<PubSubMessage>, mpsc::Receiver<PubSubMessage>) {
        let id = {
            let mut inner = self.inner.lock().unwrap();
            let id = inner.next_id;
            inner.next_id += 1;
            id
        };
        let (tx, rx) = mpsc::channel(self.queue_depth);
        (id, tx, rx)
    }

    /// Subscribe `id` to `channel`. Returns the subscriber's channel count.
    pub fn subscribe(&self, id: u64, channel: &str, tx: mpsc::Sender<PubSubMessage>) -> usize {
        let mut inner = self.inner.lock().unwrap();
        inner
            .channels
            .entry(channel.to_string())
            .or_default()
            .insert(id, tx);
        let set = inner.subscriber_channels.entry(id).or_default();
        set.insert(channel.to_string());
        set.len()
    }

    /// Unsubscribe `id` from `channel`. Returns the remaining channel count.
    pub fn unsubscribe(&self, id: u64, channel: &str) -> usize {
        let mut inner = self.inner.lock().unwrap();
        if let Some(subs) = inner.channels.get_mut(channel) {
            subs.remove(&id);
            if subs.is_empty() {
                inner.channels.remove(channel);
            }
        }
        match inner.subscriber_channels.get_mut(&id) {
            Some(set) => {
                set.remove(channel);
                let len = set.len();
                if len == 0 {
                    inner.subscriber_channels.remove(&id);
                }
                len
            }
            None => 0,
        }
    }

    /// Remove the subscriber from every channel.
    pub fn unsubscribe_all(&self, id: u64) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(channels) = inner.subscriber_channels.remove(&id) {
            for channel in channels {
                if let Some(subs) = inner.channels.get_mut(&channel) {
                    subs.remove(&id);
                    if subs.is_empty() {
                        inner.channels.remove(&channel);
                    }
                }
            }
        }
    }

    /// Deliver to every subscriber of `channel`. Returns how many queues
    /// accepted the message.
    pub fn publish(&self, channel: &str, payload: &[u8]) -> usize {
        let inner = self.inner.lock().unwrap();
        let subs = match inner.channels.get(channel) {
            Some(subs) => subs,
            None => return 0,
        };
        let mut delivered = 0;
        for tx in subs.values() {
            if tx
                .try_send((channel.to_string(), payload.to_vec()))
                .is_ok()
            {
                delivered += 1;
            }
        }
        delivered
    }

    /// Channels with at least one subscriber.
    pub fn channels(&self) -> Vec<String> {
        self.inner.lock().unwrap().channels.keys().cloned().collect()
    }

    /// Subscriber counts for the named channels.
    pub fn numsub(&self, names: &[String]) -> Vec<(String, usize)> {
        let inner = self.inner.lock().unwrap();
        names
            .iter()
            .map(|ch| (ch.clone(), inner.channels.get(ch).map_or(0, |s| s.len())))
            .collect()
    }

    /// Channels a given subscriber is subscribed to.
    pub fn subscription_count(&self, id: u64) -> usize {
        self.inner
            .lock()
            .unwrap()
            .subscriber_channels
            .get(&id)
            .map_or(0, |s| s.len())
    }
}
