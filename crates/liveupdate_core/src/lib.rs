//! Live Update Reconciliation Engine
//!
//! Tracks long-lived, frequently-mutated entities ("Live Updates": sports
//! scores, delivery trackers) whose state arrives as a stream of possibly
//! out-of-order, possibly duplicated events. A single serializing worker
//! reconciles events into durable, monotonically-ordered per-entity state
//! and fans accepted operations out to handler dispatch, notification
//! cancellation, and remote-channel sync.
//!
//! # Architecture
//!
//! - [`LiveUpdateProcessor`]: the actor, an unbounded operation queue with
//!   one sequential worker applying timestamp-ordering rules against an
//!   [`EntityStore`](liveupdate_store::EntityStore).
//! - [`LiveUpdateRegistrar`]: consumes the processor's output streams,
//!   drives registered [`LiveUpdateHandler`]s, posts and cancels platform
//!   notifications, and reconciles against externally-cleared notifications.
//! - [`LiveUpdateManager`]: the thin public facade that stamps operations
//!   with the current time and enqueues them.

pub mod channel;
pub mod error;
pub mod handler;
pub mod manager;
pub mod operation;
pub mod platform;
pub mod processor;
pub mod push;
pub mod registrar;
pub mod update;

pub use channel::{ChannelMutation, ChannelSink, ChannelSyncConfig};
pub use error::{LiveUpdateError, Result};
pub use handler::{HandlerKind, HandlerOutcome, LiveUpdateHandler, Renderable};
pub use manager::LiveUpdateManager;
pub use operation::Operation;
pub use platform::NotificationPlatform;
pub use processor::{HandlerCallback, LiveUpdateProcessor, NotificationCancel, ProcessorEvents};
pub use push::{LiveUpdatePayload, PushMessage};
pub use registrar::LiveUpdateRegistrar;
pub use update::{notification_tag, LiveUpdate, LiveUpdateEvent};
