//! Presence bus: identity, lifecycle and content-sync events for one
//! execution context.
//!
//! ## Architecture
//!
//! ```text
//! join()/leave()/heartbeat()/sync_code()/sync_cursor()
//!       │
//!       ▼
//! CollabMessage::encode()  ──►  BroadcastHub  ──►  other contexts
//!
//! other contexts  ──►  HubReceiver  ──►  pump task
//!                                            │  decode, in receipt order
//!                                            ▼
//!                          listener 1, listener 2, … (registration order)
//! ```
//!
//! A bus is constructed explicitly per context and dropped with it. Without
//! a hub it runs in solo mode: publishing is a no-op and no remote
//! participant is ever observed.

use std::sync::atomic::{AtomicU64, Ordering};
use rand::seq::IndexedRandom;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use prism_core::now_millis;

use crate::hub::{BroadcastHub, HubReceiver};
use crate::protocol::{
    CodeUpdate, CollabEvent, CollabMessage, Collaborator, CursorPosition, Incoming,
};

/// Display names a context picks from.
pub const USER_NAMES: [&str; 8] = [
    "Alex", "Sam", "Jordan", "Taylor", "Casey", "Riley", "Morgan", "Quinn",
];

/// Display colors a context picks from.
pub const USER_COLORS: [&str; 6] = [
    "#f87171", "#fbbf24", "#34d399", "#60a5fa", "#a78bfa", "#f472b6",
];

/// Who this context is. Fixed for the lifetime of the context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub id: Uuid,
    pub name: String,
    pub color: String,
}

impl SessionIdentity {
    /// Fresh id with a name and color drawn at random from the pools.
    pub fn random() -> Self {
        let mut rng = rand::rng();
        let name = USER_NAMES.choose(&mut rng).copied().unwrap_or(USER_NAMES[0]);
        let color = USER_COLORS.choose(&mut rng).copied().unwrap_or(USER_COLORS[0]);
        Self::with_id(Uuid::new_v4(), name, color)
    }

    /// Create with an explicit id (for testing).
    pub fn with_id(id: Uuid, name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            color: color.into(),
        }
    }

    /// This identity as a collaborator record, `last_active` set to now.
    pub fn collaborator(&self) -> Collaborator {
        Collaborator {
            id: self.id,
            name: self.name.clone(),
            color: self.color.clone(),
            cursor_position: None,
            file: None,
            last_active: now_millis(),
        }
    }
}

/// Handle returned by [`PresenceBus::subscribe`].
pub type SubscriptionId = u64;

/// A registered listener's receiving end.
pub struct Subscription {
    pub id: SubscriptionId,
    rx: mpsc::UnboundedReceiver<Incoming>,
}

impl Subscription {
    /// Next event delivered to this listener. `None` once unsubscribed and
    /// drained, or once the bus is gone.
    pub async fn recv(&mut self) -> Option<Incoming> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Incoming> {
        self.rx.try_recv().ok()
    }
}

/// Callback run on the pump task for every delivered event.
pub type Callback = Box<dyn Fn(&Incoming) + Send + Sync>;

enum Sink {
    Channel(mpsc::UnboundedSender<Incoming>),
    Callback(Callback),
}

struct Listener {
    id: SubscriptionId,
    sink: Sink,
}

impl Listener {
    /// `false` once the receiving end is gone.
    fn deliver(&self, incoming: &Incoming) -> bool {
        match &self.sink {
            Sink::Channel(tx) => tx.send(incoming.clone()).is_ok(),
            Sink::Callback(f) => {
                f(incoming);
                true
            }
        }
    }
}

type Listeners = Arc<RwLock<Vec<Listener>>>;

/// One context's presence/sync channel.
pub struct PresenceBus {
    identity: SessionIdentity,
    hub: Option<Arc<BroadcastHub>>,
    listeners: Listeners,
    next_subscription: AtomicU64,
    published: AtomicU64,
    /// Task forwarding hub frames to listeners. Aborted on drop.
    pump: Option<JoinHandle<()>>,
}

impl PresenceBus {
    /// Attach to a hub. Must be called inside a tokio runtime.
    pub fn open(identity: SessionIdentity, hub: Arc<BroadcastHub>) -> Self {
        let listeners: Listeners = Arc::new(RwLock::new(Vec::new()));
        let receiver = hub.subscribe(identity.id);
        let pump = tokio::spawn(pump(receiver, listeners.clone()));
        log::debug!(
            "Presence bus for {} ({}) attached to hub {}",
            identity.name,
            identity.id,
            hub.name()
        );

        Self {
            identity,
            hub: Some(hub),
            listeners,
            next_subscription: AtomicU64::new(1),
            published: AtomicU64::new(0),
            pump: Some(pump),
        }
    }

    /// A bus with no transport: nothing is sent and nothing arrives.
    pub fn solo(identity: SessionIdentity) -> Self {
        log::info!("Presence unavailable; {} runs in solo mode", identity.name);
        Self {
            identity,
            hub: None,
            listeners: Arc::new(RwLock::new(Vec::new())),
            next_subscription: AtomicU64::new(1),
            published: AtomicU64::new(0),
            pump: None,
        }
    }

    /// Attach to `hub` when one is available, otherwise run solo.
    pub fn open_or_solo(identity: SessionIdentity, hub: Option<Arc<BroadcastHub>>) -> Self {
        match hub {
            Some(hub) => Self::open(identity, hub),
            None => Self::solo(identity),
        }
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    pub fn is_solo(&self) -> bool {
        self.hub.is_none()
    }

    /// Number of events published so far.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Register a listener. Events arriving from now on are delivered to it
    /// after all earlier-registered listeners.
    pub async fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.register(Sink::Channel(tx)).await;
        Subscription { id, rx }
    }

    /// Register a callback listener. It runs on the pump task, so it must
    /// not block. Stays registered until [`unsubscribe`](Self::unsubscribe).
    pub async fn subscribe_with<F>(&self, f: F) -> SubscriptionId
    where
        F: Fn(&Incoming) + Send + Sync + 'static,
    {
        self.register(Sink::Callback(Box::new(f))).await
    }

    async fn register(&self, sink: Sink) -> SubscriptionId {
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        self.listeners.write().await.push(Listener { id, sink });
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub async fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write().await;
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        listeners.len() != before
    }

    pub async fn listener_count(&self) -> usize {
        self.listeners.read().await.len()
    }

    /// Announce entry.
    pub fn join(&self) -> usize {
        self.publish(CollabEvent::Join(self.identity.collaborator()))
    }

    /// Announce exit.
    pub fn leave(&self) -> usize {
        self.publish(CollabEvent::Leave {
            id: self.identity.id,
        })
    }

    /// Liveness signal.
    pub fn heartbeat(&self) -> usize {
        self.publish(CollabEvent::Heartbeat(self.identity.collaborator()))
    }

    /// Broadcast new content for one virtual file of a project.
    pub fn sync_code(
        &self,
        project_id: Uuid,
        file_name: impl Into<String>,
        new_code: impl Into<String>,
    ) -> usize {
        self.publish(CollabEvent::CodeUpdate(CodeUpdate {
            project_id,
            file_name: file_name.into(),
            new_code: new_code.into(),
        }))
    }

    /// Broadcast this context's cursor.
    pub fn sync_cursor(&self, file_name: impl Into<String>, position: CursorPosition) -> usize {
        let mut info = self.identity.collaborator();
        info.file = Some(file_name.into());
        info.cursor_position = Some(position);
        self.publish(CollabEvent::CursorMove(info))
    }

    /// Fire and forget. Returns how many receivers the frame reached;
    /// failures are logged, never returned.
    fn publish(&self, event: CollabEvent) -> usize {
        let Some(hub) = &self.hub else {
            return 0;
        };

        let encoded = CollabMessage::new(self.identity.id, &event).and_then(|msg| msg.encode());
        match encoded {
            Ok(bytes) => {
                self.published.fetch_add(1, Ordering::Relaxed);
                hub.post(self.identity.id, bytes)
            }
            Err(e) => {
                log::error!("Dropping {} event: {e}", event.event_type());
                0
            }
        }
    }
}

impl Drop for PresenceBus {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

/// Forward hub frames to listeners until the hub closes.
async fn pump(mut receiver: HubReceiver, listeners: Listeners) {
    while let Some(frame) = receiver.recv().await {
        let incoming = match CollabMessage::decode(&frame.bytes).and_then(|msg| msg.incoming()) {
            Ok(incoming) => incoming,
            Err(e) => {
                log::warn!("Skipping undecodable frame from {}: {e}", frame.origin);
                continue;
            }
        };
        deliver(&listeners, incoming).await;
    }
    log::debug!("Hub closed for context {}", receiver.context());
}

/// Hand one event to every listener in registration order, pruning
/// listeners whose receiving end is gone.
async fn deliver(listeners: &Listeners, incoming: Incoming) {
    let mut listeners = listeners.write().await;
    listeners.retain(|listener| listener.deliver(&incoming));
}
