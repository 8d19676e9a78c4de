//! Same-device broadcast hub shared by execution contexts.
//!
//! A hub is a named tokio broadcast channel. Every context posts encoded
//! frames tagged with its own id and reads everyone else's. Frames are not
//! persisted: a receiver created after a post never sees it.
//!
//! ```text
//! context A ──post──┐                  ┌──► receiver A (skips A's frames)
//!                   ├── hub "prism" ───┼──► receiver B
//! context B ──post──┘                  └──► receiver C
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

/// Channel name contexts meet on unless told otherwise.
pub const DEFAULT_CHANNEL: &str = "prism_collab";

/// Frames buffered per receiver before slow readers start losing them.
pub const DEFAULT_CAPACITY: usize = 256;

/// One encoded message and the context that posted it.
#[derive(Debug, Clone)]
pub struct Frame {
    pub origin: Uuid,
    pub bytes: Vec<u8>,
}

/// Snapshot of hub counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubStats {
    pub frames_posted: u64,
    pub frames_dropped: u64,
    pub receivers: usize,
}

struct AtomicHubStats {
    frames_posted: AtomicU64,
    frames_dropped: AtomicU64,
}

/// A named broadcast channel.
pub struct BroadcastHub {
    name: String,
    sender: broadcast::Sender<Arc<Frame>>,
    capacity: usize,
    stats: Arc<AtomicHubStats>,
}

impl BroadcastHub {
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            name: name.into(),
            sender,
            capacity,
            stats: Arc::new(AtomicHubStats {
                frames_posted: AtomicU64::new(0),
                frames_dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Post a frame to every current receiver. Never blocks.
    ///
    /// Returns the number of receivers, including the poster's own if it
    /// has one. Zero receivers is not an error.
    pub fn post(&self, origin: Uuid, bytes: Vec<u8>) -> usize {
        let count = self
            .sender
            .send(Arc::new(Frame { origin, bytes }))
            .unwrap_or(0);
        self.stats.frames_posted.fetch_add(1, Ordering::Relaxed);
        count
    }

    /// Receive frames posted by contexts other than `context`.
    pub fn subscribe(&self, context: Uuid) -> HubReceiver {
        HubReceiver {
            context,
            hub: self.name.clone(),
            rx: self.sender.subscribe(),
            stats: self.stats.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn stats(&self) -> HubStats {
        HubStats {
            frames_posted: self.stats.frames_posted.load(Ordering::Relaxed),
            frames_dropped: self.stats.frames_dropped.load(Ordering::Relaxed),
            receivers: self.sender.receiver_count(),
        }
    }
}

/// Receiving end of a hub for one context.
pub struct HubReceiver {
    context: Uuid,
    hub: String,
    rx: broadcast::Receiver<Arc<Frame>>,
    stats: Arc<AtomicHubStats>,
}

impl HubReceiver {
    /// Next frame from another context, or `None` once the hub is gone.
    ///
    /// Frames lost to lag are counted and skipped.
    pub async fn recv(&mut self) -> Option<Arc<Frame>> {
        loop {
            match self.rx.recv().await {
                Ok(frame) if frame.origin == self.context => continue,
                Ok(frame) => return Some(frame),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!(
                        "Context {} lagged on hub {}; {skipped} frames dropped",
                        self.context,
                        self.hub
                    );
                    self.stats
                        .frames_dropped
                        .fetch_add(skipped, Ordering::Relaxed);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn context(&self) -> Uuid {
        self.context
    }
}

/// Hands out hubs by channel name.
///
/// Contexts that ask for the same name share one hub, like tabs opening the
/// same browser broadcast channel. The registry is an ordinary value passed
/// to whoever needs it, not a global.
pub struct HubRegistry {
    hubs: Arc<RwLock<HashMap<String, Arc<BroadcastHub>>>>,
    default_capacity: usize,
}

impl Default for HubRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl HubRegistry {
    pub fn new(default_capacity: usize) -> Self {
        Self {
            hubs: Arc::new(RwLock::new(HashMap::new())),
            default_capacity,
        }
    }

    /// Get or create the hub for `name`.
    pub async fn open(&self, name: &str) -> Arc<BroadcastHub> {
        // Fast path: read lock
        {
            let hubs = self.hubs.read().await;
            if let Some(hub) = hubs.get(name) {
                return hub.clone();
            }
        }

        let mut hubs = self.hubs.write().await;
        if let Some(hub) = hubs.get(name) {
            return hub.clone();
        }

        log::debug!("Opening hub {name}");
        let hub = Arc::new(BroadcastHub::new(name, self.default_capacity));
        hubs.insert(name.to_string(), hub.clone());
        hub
    }

    /// Drop a hub nobody listens on any more.
    pub async fn remove_if_unused(&self, name: &str) -> bool {
        let mut hubs = self.hubs.write().await;
        match hubs.get(name) {
            Some(hub) if hub.receiver_count() == 0 => {
                hubs.remove(name);
                true
            }
            _ => false,
        }
    }

    pub async fn hub_count(&self) -> usize {
        self.hubs.read().await.len()
    }

    pub async fn channel_names(&self) -> Vec<String> {
        self.hubs.read().await.keys().cloned().collect()
    }
}
