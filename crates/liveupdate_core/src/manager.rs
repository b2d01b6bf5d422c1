//! Public fire-and-forget facade over the registrar.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use liveupdate_store::EntityStore;

use crate::channel::{ChannelSink, ChannelSyncConfig};
use crate::handler::LiveUpdateHandler;
use crate::platform::NotificationPlatform;
use crate::registrar::LiveUpdateRegistrar;

/// The host-facing API for Live Updates.
///
/// Every call builds an operation stamped with the current time and hands it
/// to the processor queue; nothing here blocks or returns failure. Losing
/// one Live Update frame is preferable to blocking or crashing the host.
pub struct LiveUpdateManager {
    registrar: Arc<LiveUpdateRegistrar>,
}

impl LiveUpdateManager {
    /// Build the manager and its registrar at the composition root.
    pub fn new(
        store: Arc<dyn EntityStore>,
        platform: Arc<dyn NotificationPlatform>,
        channel_sink: Arc<dyn ChannelSink>,
    ) -> Self {
        let registrar = LiveUpdateRegistrar::new(
            store,
            platform,
            channel_sink,
            ChannelSyncConfig::default(),
        );
        Self {
            registrar: Arc::new(registrar),
        }
    }

    /// Register the handler for a Live Update type. Must happen before any
    /// event for that type can be delivered.
    pub fn register(&self, update_type: impl Into<String>, handler: Arc<dyn LiveUpdateHandler>) {
        self.registrar.register(update_type, handler);
    }

    /// Start tracking a Live Update as of now.
    pub fn start(
        &self,
        name: impl Into<String>,
        update_type: impl Into<String>,
        payload: Value,
        dismissal_time: Option<i64>,
    ) {
        self.registrar
            .start(name, update_type, payload, now(), dismissal_time, None);
    }

    /// Update a tracked Live Update's content as of now.
    pub fn update(&self, name: impl Into<String>, payload: Value, dismissal_time: Option<i64>) {
        self.registrar.update(name, payload, now(), dismissal_time, None);
    }

    /// End a tracked Live Update as of now, optionally with a final payload.
    pub fn end(&self, name: impl Into<String>, payload: Option<Value>, dismissal_time: Option<i64>) {
        self.registrar.stop(name, payload, now(), dismissal_time, None);
    }

    /// Clear the notification for a Live Update without ending it.
    pub fn cancel(&self, name: impl Into<String>) {
        self.registrar.cancel(name, now());
    }

    /// Terminate every active Live Update and wipe storage.
    pub fn clear_all(&self) {
        self.registrar.clear_all(now());
    }

    /// The underlying registrar, for push ingestion and reconciliation.
    pub fn registrar(&self) -> &Arc<LiveUpdateRegistrar> {
        &self.registrar
    }
}

fn now() -> i64 {
    Utc::now().timestamp_millis()
}
