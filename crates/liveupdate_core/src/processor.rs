//! The reconciliation engine.
//!
//! A single lazily-started worker drains an unbounded operation queue,
//! applying each operation to the entity store under the per-name timestamp
//! rules. That one worker is the only writer, which is what makes the
//! check-then-write sequences below safe without locks around the store.
//!
//! Accepted operations fan out into three independent unbounded streams:
//! handler callbacks, notification cancels, and channel mutations. Streams
//! are ordered individually but carry no cross-stream ordering guarantee:
//! a slow consumer of one (handler dispatch doing network work, say) must
//! not hold up the others, or the worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use liveupdate_store::{ContentRecord, EntityStore, StateRecord};

use crate::channel::ChannelMutation;
use crate::error::Result;
use crate::operation::Operation;
use crate::push::PushMessage;
use crate::update::{LiveUpdate, LiveUpdateEvent};

/// An accepted operation, projected for handler dispatch.
#[derive(Debug, Clone)]
pub struct HandlerCallback {
    pub event: LiveUpdateEvent,
    pub update: LiveUpdate,
    /// The push message that triggered the operation, if any.
    pub message: Option<PushMessage>,
}

/// A request to clear the platform notification for an entity without
/// touching its tracked state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationCancel {
    pub update_type: String,
    pub name: String,
}

/// The processor's output streams.
///
/// Each stream delivers in the order the worker emitted; nothing is implied
/// about ordering between streams, even for the same entity.
pub struct ProcessorEvents {
    pub handler_callbacks: UnboundedReceiver<HandlerCallback>,
    pub notification_cancels: UnboundedReceiver<NotificationCancel>,
    pub channel_mutations: UnboundedReceiver<ChannelMutation>,
}

/// Serializes Live Update mutations against the entity store.
#[derive(Clone)]
pub struct LiveUpdateProcessor {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn EntityStore>,
    ops_tx: UnboundedSender<Operation>,
    ops_rx: Mutex<UnboundedReceiver<Operation>>,
    /// Whether a worker task currently exists. A liveness hint, not the
    /// serialization mechanism; that is the `ops_rx` mutex.
    running: AtomicBool,
    callbacks_tx: UnboundedSender<HandlerCallback>,
    cancels_tx: UnboundedSender<NotificationCancel>,
    mutations_tx: UnboundedSender<ChannelMutation>,
}

impl LiveUpdateProcessor {
    pub fn new(store: Arc<dyn EntityStore>) -> (Self, ProcessorEvents) {
        let (ops_tx, ops_rx) = mpsc::unbounded_channel();
        let (callbacks_tx, handler_callbacks) = mpsc::unbounded_channel();
        let (cancels_tx, notification_cancels) = mpsc::unbounded_channel();
        let (mutations_tx, channel_mutations) = mpsc::unbounded_channel();

        let processor = Self {
            inner: Arc::new(Inner {
                store,
                ops_tx,
                ops_rx: Mutex::new(ops_rx),
                running: AtomicBool::new(false),
                callbacks_tx,
                cancels_tx,
                mutations_tx,
            }),
        };
        let events = ProcessorEvents {
            handler_callbacks,
            notification_cancels,
            channel_mutations,
        };
        (processor, events)
    }

    /// Add an operation to the queue. Never blocks.
    ///
    /// Starts the worker if it is idle. Failures while applying the
    /// operation are logged and the operation is lost; nothing is surfaced
    /// to the caller.
    pub fn enqueue(&self, operation: Operation) {
        // Send before checking the worker flag: a worker observed as running
        // has not yet done its final queue check, so it will see this
        // operation before exiting.
        let _ = self.inner.ops_tx.send(operation);
        self.ensure_worker();
    }

    /// Whether the worker is currently resident.
    ///
    /// The worker exits once the queue is drained and the store reports no
    /// active entities; it stays resident (parked on the queue) while
    /// anything is active.
    pub fn is_processing(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    fn ensure_worker(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner.run_worker().await;
        });
    }
}

impl Inner {
    /// The sequential consumer loop. At most one instance makes progress at
    /// a time; a racing spawn blocks on the receiver mutex until the current
    /// worker exits, then finds the queue empty and exits too.
    async fn run_worker(self: Arc<Self>) {
        let mut ops_rx = self.ops_rx.lock().await;

        loop {
            let operation = match ops_rx.try_recv() {
                Ok(op) => op,
                Err(TryRecvError::Disconnected) => {
                    self.running.store(false, Ordering::SeqCst);
                    return;
                }
                Err(TryRecvError::Empty) => {
                    let any_active = match self.store.is_any_active().await {
                        Ok(active) => active,
                        Err(e) => {
                            // Can't tell; stay resident rather than strand a
                            // tracked entity with no worker.
                            warn!("Failed to check for active live updates: {e}");
                            true
                        }
                    };

                    if any_active {
                        // Queue is dry but entities are active; park until
                        // the next operation arrives.
                        match ops_rx.recv().await {
                            Some(op) => op,
                            None => {
                                self.running.store(false, Ordering::SeqCst);
                                return;
                            }
                        }
                    } else {
                        // Nothing pending and nothing active: go idle. Mark
                        // idle first, then re-check the queue once: an
                        // enqueue that raced us either lands in that check
                        // or saw the cleared flag and spawned a new worker.
                        self.running.store(false, Ordering::SeqCst);
                        match ops_rx.try_recv() {
                            Ok(op) => {
                                self.running.store(true, Ordering::SeqCst);
                                op
                            }
                            Err(_) => return,
                        }
                    }
                }
            };

            if let Err(e) = self.process(operation).await {
                // The operation is lost; the queue keeps moving.
                error!("Failed to process live update operation: {e}");
            }
        }
    }

    async fn process(&self, operation: Operation) -> Result<()> {
        debug!("Processing live update operation: {:?}", operation);
        match operation {
            Operation::Start {
                name,
                update_type,
                payload,
                timestamp,
                dismissal_time,
                message,
            } => {
                self.process_start(name, update_type, payload, timestamp, dismissal_time, message)
                    .await
            }
            Operation::Update {
                name,
                payload,
                timestamp,
                dismissal_time,
                message,
            } => {
                self.process_update(name, payload, timestamp, dismissal_time, message)
                    .await
            }
            Operation::Stop {
                name,
                payload,
                timestamp,
                dismissal_time,
                message,
            } => {
                self.process_stop(name, payload, timestamp, dismissal_time, message)
                    .await
            }
            Operation::Cancel { name, .. } => self.process_cancel(name).await,
            Operation::ClearAll { .. } => self.process_clear_all().await,
        }
    }

    async fn process_start(
        &self,
        name: String,
        update_type: String,
        payload: Value,
        timestamp: i64,
        dismissal_time: Option<i64>,
        message: Option<PushMessage>,
    ) -> Result<()> {
        if let Some(state) = self.store.get_state(&name).await? {
            if timestamp < state.timestamp {
                warn!("Ignoring stale start for live update '{}' at {}", name, timestamp);
                return Ok(());
            }
            if state.is_active {
                if state.update_type == update_type {
                    debug!("Live update '{}' already started, ignoring duplicate start", name);
                    return Ok(());
                }
                // Type switch: stop the current update, then replay this
                // start. Both land behind whatever is already queued, which
                // keeps the worker's total order intact without recursing.
                debug!(
                    "Live update '{}' changed type from '{}' to '{}'; stopping and restarting",
                    name, state.update_type, update_type
                );
                self.requeue(Operation::Stop {
                    name: name.clone(),
                    payload: None,
                    timestamp,
                    dismissal_time: None,
                    message: None,
                });
                self.requeue(Operation::Start {
                    name,
                    update_type,
                    payload,
                    timestamp,
                    dismissal_time,
                    message,
                });
                return Ok(());
            }
        }

        let state = StateRecord {
            name: name.clone(),
            update_type,
            timestamp,
            is_active: true,
            dismissal_time,
        };
        let content = ContentRecord {
            name: name.clone(),
            payload,
            timestamp,
        };
        self.store.upsert(Some(&state), Some(&content)).await?;

        self.send_mutation(ChannelMutation::Set {
            name,
            start_time: timestamp,
        });
        self.send_callback(
            LiveUpdateEvent::Start,
            LiveUpdate::from_records(&state, &content),
            message,
        );
        Ok(())
    }

    async fn process_update(
        &self,
        name: String,
        payload: Value,
        timestamp: i64,
        dismissal_time: Option<i64>,
        message: Option<PushMessage>,
    ) -> Result<()> {
        let stored = self.store.get(&name).await?;

        // Content clock, falling back to the state clock once a stop has
        // deleted the content row. Equal timestamps are stale: an update
        // must be strictly newer than the last accepted write.
        let clock = stored
            .content
            .as_ref()
            .map(|c| c.timestamp)
            .or_else(|| stored.state.as_ref().map(|s| s.timestamp));
        if let Some(clock) = clock {
            if clock >= timestamp {
                warn!("Ignoring stale content for live update '{}' at {}", name, timestamp);
                return Ok(());
            }
        }

        let content = ContentRecord {
            name: name.clone(),
            payload,
            timestamp,
        };
        let state = stored.state.map(|state| StateRecord {
            dismissal_time: dismissal_time.or(state.dismissal_time),
            ..state
        });
        self.store.upsert(state.as_ref(), Some(&content)).await?;

        match state {
            Some(state) if state.is_active => {
                self.send_callback(
                    LiveUpdateEvent::Update,
                    LiveUpdate::from_records(&state, &content),
                    message,
                );
            }
            _ => {
                // Content is stored so a later start or stop sees the latest
                // payload, but there is no active subscription to notify.
                warn!("No active live update '{}'; content stored without delivery", name);
            }
        }
        Ok(())
    }

    async fn process_stop(
        &self,
        name: String,
        payload: Option<Value>,
        timestamp: i64,
        dismissal_time: Option<i64>,
        message: Option<PushMessage>,
    ) -> Result<()> {
        let stored = self.store.get(&name).await?;
        let (Some(state), Some(content)) = (stored.state, stored.content) else {
            warn!("No live update '{}' to stop", name);
            return Ok(());
        };
        if !state.is_active {
            warn!("Live update '{}' is not active, ignoring stop", name);
            return Ok(());
        }
        if timestamp < state.timestamp {
            warn!("Ignoring stale stop for live update '{}' at {}", name, timestamp);
            return Ok(());
        }

        let start_time = state.timestamp;
        let stopped_state = StateRecord {
            is_active: false,
            timestamp,
            dismissal_time: dismissal_time.or(state.dismissal_time),
            ..state
        };
        // A final payload replaces the content only if it is newer on the
        // content clock; the state and content clocks are independent.
        let stopped_content = match payload {
            Some(payload) if timestamp > content.timestamp => ContentRecord {
                name: name.clone(),
                payload,
                timestamp,
            },
            _ => content,
        };

        self.store
            .upsert(Some(&stopped_state), Some(&stopped_content))
            .await?;
        self.store.delete_content(&name).await?;

        self.send_mutation(ChannelMutation::Remove { name, start_time });
        self.send_callback(
            LiveUpdateEvent::End,
            LiveUpdate::from_records(&stopped_state, &stopped_content),
            message,
        );
        Ok(())
    }

    async fn process_cancel(&self, name: String) -> Result<()> {
        let Some(state) = self.store.get_state(&name).await? else {
            warn!("No live update '{}' to cancel notification for", name);
            return Ok(());
        };
        let _ = self.cancels_tx.send(NotificationCancel {
            update_type: state.update_type,
            name,
        });
        Ok(())
    }

    async fn process_clear_all(&self) -> Result<()> {
        // Unconditional terminal sweep: every active entity ends, no
        // per-entity timestamp checks.
        let active = self.store.get_all_active().await?;
        debug!("Clearing {} active live updates", active.len());
        for entry in &active {
            match &entry.content {
                Some(content) => {
                    self.send_callback(
                        LiveUpdateEvent::End,
                        LiveUpdate::from_records(&entry.state, content),
                        None,
                    );
                }
                None => {
                    warn!("Active live update '{}' has no content; ending without callback", entry.state.name);
                }
            }
        }
        self.store.delete_all().await?;
        Ok(())
    }

    /// Enqueue from inside the worker. The worker is resident while this
    /// runs, so no liveness bookkeeping is needed.
    fn requeue(&self, operation: Operation) {
        let _ = self.ops_tx.send(operation);
    }

    fn send_callback(&self, event: LiveUpdateEvent, update: LiveUpdate, message: Option<PushMessage>) {
        let _ = self.callbacks_tx.send(HandlerCallback {
            event,
            update,
            message,
        });
    }

    fn send_mutation(&self, mutation: ChannelMutation) {
        let _ = self.mutations_tx.send(mutation);
    }
}
