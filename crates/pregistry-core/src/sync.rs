//! Cross-tab invalidation.
//!
//! A [`BroadcastHub`] is the per-profile analogue of same-origin broadcast
//! channels: any number of endpoints may open a channel by name, and a message
//! posted by one endpoint is delivered to every *other* endpoint of that name.
//! Messages travel as JSON text and carry no row data.
//!
//! [`SyncChannel`] is the registry's use of it: it posts
//! `{"type":"invalidate","timestamp":...}` after writes and runs a listener
//! thread that fans incoming invalidations out to the tab's subscribers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use serde::{Deserialize, Serialize};

use crate::subscribers::SubscriberRegistry;

/// Message exchanged between tabs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SyncMessage {
    /// Something changed; re-fetch. `timestamp` is epoch milliseconds.
    Invalidate { timestamp: i64 },
}

impl SyncMessage {
    pub fn invalidate_now() -> Self {
        SyncMessage::Invalidate {
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

struct Peer {
    id: u64,
    tx: Sender<String>,
}

/// Named broadcast channels shared by every tab of a profile.
#[derive(Default)]
pub struct BroadcastHub {
    channels: Mutex<HashMap<String, Vec<Peer>>>,
    next_id: AtomicU64,
}

impl BroadcastHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Join channel `name`. The returned receiver yields messages posted by
    /// other endpoints until the endpoint is dropped.
    pub fn open(self: &Arc<Self>, name: &str) -> (BroadcastEndpoint, Receiver<String>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel();
        self.channels()
            .entry(name.to_string())
            .or_default()
            .push(Peer { id, tx });

        let endpoint = BroadcastEndpoint {
            hub: Arc::clone(self),
            name: name.to_string(),
            id,
        };
        (endpoint, rx)
    }

    /// Number of endpoints currently open on `name`.
    pub fn peer_count(&self, name: &str) -> usize {
        self.channels().get(name).map_or(0, Vec::len)
    }

    fn deliver(&self, name: &str, sender: u64, data: &str) -> usize {
        let mut channels = self.channels();
        let Some(peers) = channels.get_mut(name) else {
            return 0;
        };

        let mut delivered = 0;
        peers.retain(|peer| {
            if peer.id == sender {
                return true;
            }
            match peer.tx.send(data.to_string()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => {
                    tracing::warn!(channel = name, peer = peer.id, "dropping closed broadcast peer");
                    false
                }
            }
        });
        delivered
    }

    fn close(&self, name: &str, id: u64) {
        let mut channels = self.channels();
        if let Some(peers) = channels.get_mut(name) {
            peers.retain(|peer| peer.id != id);
            if peers.is_empty() {
                channels.remove(name);
            }
        }
    }

    fn channels(&self) -> MutexGuard<'_, HashMap<String, Vec<Peer>>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Sending half of one joined channel. Leaves the channel when dropped.
pub struct BroadcastEndpoint {
    hub: Arc<BroadcastHub>,
    name: String,
    id: u64,
}

impl BroadcastEndpoint {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Deliver `data` to every other endpoint; returns how many received it.
    pub fn post(&self, data: &str) -> usize {
        self.hub.deliver(&self.name, self.id, data)
    }
}

impl Drop for BroadcastEndpoint {
    fn drop(&mut self) {
        self.hub.close(&self.name, self.id);
    }
}

/// A tab's membership in the sync channel.
pub struct SyncChannel {
    endpoint: BroadcastEndpoint,
}

impl SyncChannel {
    /// Join `name` on `hub` and start delivering remote invalidations to
    /// `subscribers`.
    pub fn open(
        hub: &Arc<BroadcastHub>,
        name: &str,
        subscribers: Arc<SubscriberRegistry>,
    ) -> std::io::Result<Self> {
        let (endpoint, rx) = hub.open(name);

        // Exits once the endpoint is dropped and the hub releases its sender.
        thread::Builder::new()
            .name(format!("pregistry-sync-{}", endpoint.id))
            .spawn(move || listen(rx, subscribers))?;

        Ok(Self { endpoint })
    }

    /// Broadcast an invalidation to the other tabs. The sender's own listener
    /// never sees it.
    pub fn post_invalidate(&self) -> usize {
        let message = SyncMessage::invalidate_now();
        match serde_json::to_string(&message) {
            Ok(data) => self.endpoint.post(&data),
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode sync message");
                0
            }
        }
    }
}

fn listen(rx: Receiver<String>, subscribers: Arc<SubscriberRegistry>) {
    for data in rx {
        match serde_json::from_str::<SyncMessage>(&data) {
            Ok(SyncMessage::Invalidate { timestamp }) => {
                tracing::debug!(timestamp, "remote invalidation");
                subscribers.notify();
            }
            Err(e) => {
                tracing::debug!(error = %e, "ignoring unrecognized sync message");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn test_message_wire_shape() {
        let json = serde_json::to_value(SyncMessage::Invalidate { timestamp: 42 }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "invalidate", "timestamp": 42}));
    }

    #[test]
    fn test_post_skips_sender() {
        let hub = BroadcastHub::new();
        let (a, a_rx) = hub.open("chan");
        let (_b, b_rx) = hub.open("chan");

        assert_eq!(a.post("hello"), 1);
        assert_eq!(b_rx.recv_timeout(Duration::from_secs(1)).unwrap(), "hello");
        assert!(a_rx.try_recv().is_err());
    }

    #[test]
    fn test_channels_are_isolated_by_name() {
        let hub = BroadcastHub::new();
        let (a, _a_rx) = hub.open("one");
        let (_b, b_rx) = hub.open("two");

        assert_eq!(a.post("x"), 0);
        assert!(b_rx.try_recv().is_err());
    }

    #[test]
    fn test_drop_leaves_channel() {
        let hub = BroadcastHub::new();
        let (a, _a_rx) = hub.open("chan");
        let (b, _b_rx) = hub.open("chan");
        assert_eq!(hub.peer_count("chan"), 2);

        drop(b);
        assert_eq!(hub.peer_count("chan"), 1);
        assert_eq!(a.post("x"), 0);
    }

    #[test]
    fn test_sync_channel_notifies_remote_subscribers() {
        let hub = BroadcastHub::new();
        let local = SubscriberRegistry::new();
        let remote = SubscriberRegistry::new();

        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        remote.subscribe(move || {
            let _ = tx.lock().unwrap().send(());
        });
        let local_hits = Arc::new(AtomicUsize::new(0));
        let hits = Arc::clone(&local_hits);
        local.subscribe(move || {
            hits.fetch_add(1, Ordering::SeqCst);
        });

        let sender = SyncChannel::open(&hub, "sync", Arc::clone(&local)).unwrap();
        let _receiver = SyncChannel::open(&hub, "sync", Arc::clone(&remote)).unwrap();

        assert_eq!(sender.post_invalidate(), 1);
        rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(local_hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unknown_message_ignored() {
        let hub = BroadcastHub::new();
        let subscribers = SubscriberRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        subscribers.subscribe(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });

        let _channel = SyncChannel::open(&hub, "sync", subscribers).unwrap();
        let (raw, _rx) = hub.open("sync");
        raw.post(r#"{"type":"refresh"}"#);
        raw.post(r#"{"type":"invalidate","timestamp":1}"#);

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while hits.load(Ordering::SeqCst) == 0 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
