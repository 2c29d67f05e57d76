//! # tabhub-tracker
//!
//! The presence tracking engine. Tracks which tabs across a user's devices
//! are alive by writing periodic heartbeats and classifying every known
//! tab as active, idle, or stale from wall-clock deltas — tolerating
//! delivery delay, out-of-order updates, and the absence of any shared
//! clock.
//!
//! ## Modules
//!
//! - `identity` — durable device id, process-scoped tab id
//! - `classify` — pure liveness classification
//! - `gateway` — the only boundary to the durable store and push channel
//! - `heartbeat` — period-adaptive heartbeat scheduler
//! - `reconciler` — single-owner view of all known tabs
//! - `view` — derived, presentation-facing snapshots
//! - `label` — pure label formatting helpers
//! - `tracker` — lifecycle facade bound to auth identity changes

pub mod classify;
pub mod gateway;
pub mod heartbeat;
pub mod identity;
pub mod label;
pub mod reconciler;
pub mod tracker;
pub mod view;

pub use gateway::{PgPresenceGateway, PresenceGateway};
pub use identity::{IdentityStore, LocalIdentity};
pub use tracker::{TabTracker, TrackerContext};
pub use view::{DerivedTab, DeviceGroup, TabsView};
