//! Shared recording collaborators for integration tests.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use liveupdate_core::{
    ChannelMutation, ChannelSink, HandlerKind, HandlerOutcome, LiveUpdate, LiveUpdateError,
    LiveUpdateEvent, LiveUpdateHandler, NotificationPlatform, Renderable, Result,
};
use liveupdate_store::{
    ActiveUpdate, ContentRecord, EntityStore, MemoryStore, StateRecord, StoreError, StoreResult,
    StoredUpdate,
};

/// What a [`RecordingHandler`] should answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerMode {
    Render,
    NoChange,
    Cancel,
    Fail,
}

/// Handler that records every event it sees and answers per its mode.
pub struct RecordingHandler {
    kind: HandlerKind,
    mode: Mutex<HandlerMode>,
    pub events: Mutex<Vec<(LiveUpdateEvent, LiveUpdate)>>,
}

impl RecordingHandler {
    pub fn notification() -> Arc<Self> {
        Arc::new(Self {
            kind: HandlerKind::Notification,
            mode: Mutex::new(HandlerMode::Render),
            events: Mutex::new(Vec::new()),
        })
    }

    pub fn custom() -> Arc<Self> {
        Arc::new(Self {
            kind: HandlerKind::Custom,
            mode: Mutex::new(HandlerMode::NoChange),
            events: Mutex::new(Vec::new()),
        })
    }

    pub fn set_mode(&self, mode: HandlerMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn events(&self) -> Vec<(LiveUpdateEvent, LiveUpdate)> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl LiveUpdateHandler for RecordingHandler {
    fn kind(&self) -> HandlerKind {
        self.kind
    }

    async fn on_update(
        &self,
        event: LiveUpdateEvent,
        update: &LiveUpdate,
    ) -> Result<HandlerOutcome> {
        self.events.lock().unwrap().push((event, update.clone()));
        match *self.mode.lock().unwrap() {
            HandlerMode::Render => Ok(HandlerOutcome::Render(Renderable::new(
                update.payload.clone(),
            ))),
            HandlerMode::NoChange => Ok(HandlerOutcome::NoChange),
            HandlerMode::Cancel => Ok(HandlerOutcome::Cancel),
            HandlerMode::Fail => Err(LiveUpdateError::Handler {
                update_type: update.update_type.clone(),
                cause: "injected handler failure".into(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostedNotification {
    pub tag: String,
    pub name: String,
    pub dismissal_time: Option<i64>,
}

/// Platform that records posts/cancels and tracks displayed tags.
#[derive(Default)]
pub struct RecordingPlatform {
    pub posted: Mutex<Vec<PostedNotification>>,
    pub canceled: Mutex<Vec<String>>,
    displayed: Mutex<HashSet<String>>,
}

impl RecordingPlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Simulate the OS clearing a notification without telling the app.
    pub fn clear_displayed(&self, tag: &str) {
        self.displayed.lock().unwrap().remove(tag);
    }

    pub fn posted_count(&self) -> usize {
        self.posted.lock().unwrap().len()
    }

    pub fn canceled_tags(&self) -> Vec<String> {
        self.canceled.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationPlatform for RecordingPlatform {
    async fn post(
        &self,
        tag: &str,
        name: &str,
        _renderable: Renderable,
        dismissal_time: Option<i64>,
    ) -> Result<()> {
        self.posted.lock().unwrap().push(PostedNotification {
            tag: tag.to_string(),
            name: name.to_string(),
            dismissal_time,
        });
        self.displayed.lock().unwrap().insert(tag.to_string());
        Ok(())
    }

    async fn cancel(&self, tag: &str) -> Result<()> {
        self.canceled.lock().unwrap().push(tag.to_string());
        self.displayed.lock().unwrap().remove(tag);
        Ok(())
    }

    async fn active_tags(&self) -> Result<Vec<String>> {
        Ok(self.displayed.lock().unwrap().iter().cloned().collect())
    }
}

/// Sink that records every batch it receives.
#[derive(Default)]
pub struct RecordingSink {
    pub batches: Mutex<Vec<Vec<ChannelMutation>>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    pub fn all_mutations(&self) -> Vec<ChannelMutation> {
        self.batches.lock().unwrap().iter().flatten().cloned().collect()
    }
}

#[async_trait]
impl ChannelSink for RecordingSink {
    async fn apply(&self, mutations: Vec<ChannelMutation>) -> Result<()> {
        self.batches.lock().unwrap().push(mutations);
        Ok(())
    }
}

/// Store wrapper that fails writes for one poisoned entity name.
pub struct FailingStore {
    inner: MemoryStore,
    poisoned: String,
}

impl FailingStore {
    pub fn new(poisoned: impl Into<String>) -> Self {
        Self {
            inner: MemoryStore::new(),
            poisoned: poisoned.into(),
        }
    }

    fn injected() -> StoreError {
        StoreError::Io(std::io::Error::other("injected storage failure"))
    }
}

#[async_trait]
impl EntityStore for FailingStore {
    async fn get_state(&self, name: &str) -> StoreResult<Option<StateRecord>> {
        self.inner.get_state(name).await
    }

    async fn get(&self, name: &str) -> StoreResult<StoredUpdate> {
        self.inner.get(name).await
    }

    async fn upsert(
        &self,
        state: Option<&StateRecord>,
        content: Option<&ContentRecord>,
    ) -> StoreResult<()> {
        let name = state
            .map(|s| s.name.as_str())
            .or(content.map(|c| c.name.as_str()));
        if name == Some(self.poisoned.as_str()) {
            return Err(Self::injected());
        }
        self.inner.upsert(state, content).await
    }

    async fn delete_content(&self, name: &str) -> StoreResult<()> {
        self.inner.delete_content(name).await
    }

    async fn delete_all(&self) -> StoreResult<()> {
        self.inner.delete_all().await
    }

    async fn get_all_active(&self) -> StoreResult<Vec<ActiveUpdate>> {
        self.inner.get_all_active().await
    }

    async fn is_any_active(&self) -> StoreResult<bool> {
        self.inner.is_any_active().await
    }
}

/// Install a test-writer tracing subscriber so `RUST_LOG` works in tests.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Poll until `cond` holds, panicking after five seconds.
pub async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        if Instant::now() > deadline {
            panic!("timed out waiting for: {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
