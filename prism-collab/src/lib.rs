//! # prism-collab: Same-device collaboration layer for Prism
//!
//! Keeps several execution contexts (tabs, windows) editing one project in
//! step, and shows who else is there.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐                         ┌──────────────┐
//! │ CollabSession│                         │ CollabSession│
//! │ (context A)  │                         │ (context B)  │
//! └──────┬───────┘                         └──────┬───────┘
//!        │ SyncCoordinator                        │
//!        ▼                                        ▼
//! ┌──────────────┐   CollabMessage frames  ┌──────────────┐
//! │ PresenceBus  │ ◄─────────────────────► │ PresenceBus  │
//! └──────┬───────┘                         └──────┬───────┘
//!        └──────────────┐       ┌─────────────────┘
//!                       ▼       ▼
//!                 ┌─────────────────┐
//!                 │ BroadcastHub    │  from HubRegistry, by name
//!                 └─────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`]: Event envelope and payloads (bincode)
//! - [`hub`]: Named broadcast hubs and their registry
//! - [`presence`]: Per-context identity and publish/subscribe bus
//! - [`coordinator`]: Roster, liveness sweep, last-writer-wins merge
//! - [`session`]: Session task owning the timers and the document
//! - [`generator`]: App generator collaborator
//! - [`storage`]: RocksDB project persistence

pub mod protocol;
pub mod hub;
pub mod presence;
pub mod coordinator;
pub mod session;
pub mod generator;
pub mod storage;

// Re-exports for convenience
pub use protocol::{
    CodeUpdate, CollabEvent, CollabMessage, Collaborator, CursorPosition, EventType, Incoming,
    ProtocolError,
};
pub use hub::{BroadcastHub, HubRegistry, HubStats, DEFAULT_CAPACITY, DEFAULT_CHANNEL};
pub use presence::{PresenceBus, SessionIdentity, Subscription, SubscriptionId};
pub use coordinator::{Outcome, Roster, SyncCoordinator, SyncState};
pub use session::{CollabSession, SessionConfig, SessionError, SessionEvent, SessionSnapshot};
pub use generator::{Generator, GeneratorError};
pub use storage::{ProjectStore, StoreConfig, StoreError};
