//! Handler dispatch and notification reconciliation.
//!
//! The registrar consumes the processor's three output streams: handler
//! callbacks become handler invocations (and notification posts), cancel
//! requests clear platform notifications directly, and channel mutations go
//! to the batched sync task. It also owns the recovery paths for
//! notifications that disappear outside the engine's knowledge: explicit
//! dismissal reports and the periodic orphan sweep.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use liveupdate_store::EntityStore;

use crate::channel::{spawn_channel_sync, ChannelSink, ChannelSyncConfig};
use crate::error::Result;
use crate::handler::{HandlerKind, HandlerOutcome, LiveUpdateHandler};
use crate::operation::Operation;
use crate::platform::NotificationPlatform;
use crate::processor::{HandlerCallback, LiveUpdateProcessor, NotificationCancel, ProcessorEvents};
use crate::push::{LiveUpdatePayload, PushMessage};
use crate::update::{notification_tag, LiveUpdate, LiveUpdateEvent};

type HandlerMap = Arc<DashMap<String, Arc<dyn LiveUpdateHandler>>>;

/// Manages Live Update handlers and feeds the processor's operation queue.
///
/// Construct one instance at application startup and hold it for the process
/// lifetime; everything that needs to enqueue operations or register
/// handlers should be handed a reference to it.
pub struct LiveUpdateRegistrar {
    processor: LiveUpdateProcessor,
    store: Arc<dyn EntityStore>,
    platform: Arc<dyn NotificationPlatform>,
    handlers: HandlerMap,
    tasks: Vec<JoinHandle<()>>,
}

impl LiveUpdateRegistrar {
    pub fn new(
        store: Arc<dyn EntityStore>,
        platform: Arc<dyn NotificationPlatform>,
        channel_sink: Arc<dyn ChannelSink>,
        sync_config: ChannelSyncConfig,
    ) -> Self {
        let (processor, events) = LiveUpdateProcessor::new(store.clone());
        let ProcessorEvents {
            handler_callbacks,
            notification_cancels,
            channel_mutations,
        } = events;

        let handlers: HandlerMap = Arc::new(DashMap::new());

        let tasks = vec![
            tokio::spawn(run_callback_loop(
                handler_callbacks,
                handlers.clone(),
                platform.clone(),
            )),
            tokio::spawn(run_cancel_loop(notification_cancels, platform.clone())),
            spawn_channel_sync(channel_mutations, channel_sink, sync_config),
        ];

        Self {
            processor,
            store,
            platform,
            handlers,
            tasks,
        }
    }

    /// Register the handler for a Live Update type.
    ///
    /// Safe from any thread at any time, but callbacks emitted for a type
    /// before its handler registers are dropped, not replayed; register
    /// before push delivery can occur.
    pub fn register(&self, update_type: impl Into<String>, handler: Arc<dyn LiveUpdateHandler>) {
        self.handlers.insert(update_type.into(), handler);
    }

    /// Begin tracking a Live Update.
    ///
    /// Refused up front if no handler is registered for the type: the start
    /// callback would have nowhere to land, leaving a tracked entity that
    /// can never render.
    pub fn start(
        &self,
        name: impl Into<String>,
        update_type: impl Into<String>,
        payload: serde_json::Value,
        timestamp: i64,
        dismissal_time: Option<i64>,
        message: Option<PushMessage>,
    ) {
        let name = name.into();
        let update_type = update_type.into();
        if !self.handlers.contains_key(&update_type) {
            error!(
                "Can't start live update '{}': no handler registered for type '{}'",
                name, update_type
            );
            return;
        }
        self.processor.enqueue(Operation::Start {
            name,
            update_type,
            payload,
            timestamp,
            dismissal_time,
            message,
        });
    }

    /// Update the content of a tracked Live Update.
    pub fn update(
        &self,
        name: impl Into<String>,
        payload: serde_json::Value,
        timestamp: i64,
        dismissal_time: Option<i64>,
        message: Option<PushMessage>,
    ) {
        self.processor.enqueue(Operation::Update {
            name: name.into(),
            payload,
            timestamp,
            dismissal_time,
            message,
        });
    }

    /// End a tracked Live Update, optionally with a final payload.
    pub fn stop(
        &self,
        name: impl Into<String>,
        payload: Option<serde_json::Value>,
        timestamp: i64,
        dismissal_time: Option<i64>,
        message: Option<PushMessage>,
    ) {
        self.processor.enqueue(Operation::Stop {
            name: name.into(),
            payload,
            timestamp,
            dismissal_time,
            message,
        });
    }

    /// Clear the platform notification for a Live Update without ending it.
    pub fn cancel(&self, name: impl Into<String>, timestamp: i64) {
        self.processor.enqueue(Operation::Cancel {
            name: name.into(),
            timestamp,
        });
    }

    /// Terminate every active Live Update and wipe storage.
    pub fn clear_all(&self, timestamp: i64) {
        self.processor.enqueue(Operation::ClearAll { timestamp });
    }

    /// Dispatch a decoded push-carried Live Update event.
    pub fn on_push_received(&self, message: PushMessage, payload: LiveUpdatePayload) {
        let LiveUpdatePayload {
            event,
            name,
            update_type,
            content,
            timestamp,
            dismissal_date,
        } = payload;
        match event {
            LiveUpdateEvent::Start => match update_type {
                Some(update_type) => self.start(
                    name,
                    update_type,
                    content,
                    timestamp,
                    dismissal_date,
                    Some(message),
                ),
                None => {
                    warn!("Unable to start live update '{}': missing required type", name);
                }
            },
            LiveUpdateEvent::Update => {
                self.update(name, content, timestamp, dismissal_date, Some(message));
            }
            LiveUpdateEvent::End => {
                // A content-less end keeps the last known payload; `null`
                // decodes from an absent field and is not a final payload.
                let payload = if content.is_null() { None } else { Some(content) };
                self.stop(name, payload, timestamp, dismissal_date, Some(message));
            }
        }
    }

    /// All currently-active Live Updates that have content to show.
    pub async fn get_all_active_updates(&self) -> Result<Vec<LiveUpdate>> {
        let active = self.store.get_all_active().await?;
        Ok(active
            .iter()
            .filter_map(|entry| {
                entry
                    .content
                    .as_ref()
                    .map(|content| LiveUpdate::from_records(&entry.state, content))
            })
            .collect())
    }

    /// End any Live Updates whose notification is no longer displayed.
    ///
    /// The OS can clear notifications without the app ever seeing a
    /// dismissal (app update, storage pressure). Diff the active set against
    /// the platform's displayed tags and synthesize a stop for every entity
    /// whose tag is missing. Entities owned by custom handlers are skipped,
    /// since there is no platform notification to check.
    pub async fn stop_for_cleared_notifications(&self) -> Result<()> {
        let displayed: HashSet<String> = self.platform.active_tags().await?.into_iter().collect();

        for entry in self.store.get_all_active().await? {
            let state = entry.state;
            let is_notification = self
                .handlers
                .get(&state.update_type)
                .map(|h| h.kind() == HandlerKind::Notification)
                .unwrap_or(false);
            if !is_notification {
                continue;
            }
            if displayed.contains(&notification_tag(&state.update_type, &state.name)) {
                continue;
            }

            debug!(
                "Live update '{}' notification no longer displayed; stopping",
                state.name
            );
            self.stop(
                state.name,
                entry.content.map(|c| c.payload),
                state.timestamp,
                state.dismissal_time,
                None,
            );
        }
        Ok(())
    }

    /// Report that the user dismissed the notification backing `name`.
    ///
    /// Same recovery as the orphan sweep, for the one notification the host
    /// actually observed going away.
    pub async fn on_notification_dismissed(&self, name: &str) -> Result<()> {
        let stored = self.store.get(name).await?;
        match stored.state {
            Some(state) if state.is_active => {
                self.stop(
                    name.to_string(),
                    stored.content.map(|c| c.payload),
                    state.timestamp,
                    state.dismissal_time,
                    None,
                );
            }
            _ => debug!("Dismissed notification '{}' had no active live update", name),
        }
        Ok(())
    }

    /// Whether the processor worker is currently resident.
    pub fn is_processing(&self) -> bool {
        self.processor.is_processing()
    }

    /// Abort the stream-consumption tasks. Pending queue contents are
    /// dropped; nothing unflushed is durable.
    pub fn shutdown(mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

async fn run_callback_loop(
    mut callbacks: UnboundedReceiver<HandlerCallback>,
    handlers: HandlerMap,
    platform: Arc<dyn NotificationPlatform>,
) {
    while let Some(callback) = callbacks.recv().await {
        handle_callback(callback, &handlers, &platform).await;
    }
}

async fn handle_callback(
    callback: HandlerCallback,
    handlers: &HandlerMap,
    platform: &Arc<dyn NotificationPlatform>,
) {
    let update = callback.update;
    let handler = match handlers.get(&update.update_type) {
        Some(entry) => entry.value().clone(),
        None => {
            // The event is permanently lost; registering later does not
            // replay it.
            error!(
                "No handler registered for live update type '{}'; dropping event for '{}'",
                update.update_type, update.name
            );
            return;
        }
    };

    let outcome = match handler.on_update(callback.event, &update).await {
        Ok(outcome) => outcome,
        Err(e) => {
            // A failed handler must not strand the entity: treat as
            // no-change and keep whatever is currently displayed.
            warn!(
                "Live update handler '{}' failed for '{}', leaving notification unchanged: {e}",
                update.update_type, update.name
            );
            HandlerOutcome::NoChange
        }
    };

    match (handler.kind(), outcome) {
        (HandlerKind::Notification, HandlerOutcome::Render(renderable)) => {
            let tag = update.notification_tag();
            if let Err(e) = platform
                .post(&tag, &update.name, renderable, update.dismissal_time)
                .await
            {
                error!("Failed to post live update notification '{tag}': {e}");
            }
        }
        (HandlerKind::Notification, HandlerOutcome::Cancel) => {
            let tag = update.notification_tag();
            if let Err(e) = platform.cancel(&tag).await {
                error!("Failed to cancel live update notification '{tag}': {e}");
            }
        }
        (HandlerKind::Custom, HandlerOutcome::Render(_)) => {
            debug!(
                "Custom handler for '{}' returned a renderable; nothing to post",
                update.name
            );
        }
        (HandlerKind::Custom, HandlerOutcome::Cancel) => {
            // Custom handlers have no platform notification to clear.
        }
        (_, HandlerOutcome::NoChange) => {}
    }
}

async fn run_cancel_loop(
    mut cancels: UnboundedReceiver<NotificationCancel>,
    platform: Arc<dyn NotificationPlatform>,
) {
    while let Some(cancel) = cancels.recv().await {
        let tag = notification_tag(&cancel.update_type, &cancel.name);
        if let Err(e) = platform.cancel(&tag).await {
            error!("Failed to cancel live update notification '{tag}': {e}");
        }
    }
}
