//! Remote-channel synchronization.
//!
//! The processor emits one [`ChannelMutation`] per accepted start/stop. The
//! sync task batches them into fewer remote calls: it waits for the first
//! mutation, collects the burst that follows within the batch window, keeps
//! only the last mutation per name, and hands the batch to the host's
//! [`ChannelSink`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error};

use crate::error::Result;

/// A tracked-entity change to mirror onto the remote channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ChannelMutation {
    /// The entity became active at `start_time`.
    Set { name: String, start_time: i64 },
    /// The entity that became active at `start_time` has ended.
    Remove { name: String, start_time: i64 },
}

impl ChannelMutation {
    pub fn name(&self) -> &str {
        match self {
            Self::Set { name, .. } | Self::Remove { name, .. } => name,
        }
    }
}

/// Receives coalesced mutation batches for the remote channel.
#[async_trait]
pub trait ChannelSink: Send + Sync {
    async fn apply(&self, mutations: Vec<ChannelMutation>) -> Result<()>;
}

/// Batching knobs for the sync task.
#[derive(Debug, Clone)]
pub struct ChannelSyncConfig {
    /// How long to keep collecting after the first mutation of a burst.
    pub batch_window: Duration,

    /// Maximum mutations per batch before flushing early.
    pub max_batch: usize,
}

impl Default for ChannelSyncConfig {
    fn default() -> Self {
        Self {
            batch_window: Duration::from_millis(500),
            max_batch: 50,
        }
    }
}

/// Spawn the sync task consuming the processor's mutation stream.
///
/// Runs until the stream closes. Sink failures are logged and the batch is
/// dropped; retry policy belongs to the sink.
pub fn spawn_channel_sync(
    rx: UnboundedReceiver<ChannelMutation>,
    sink: Arc<dyn ChannelSink>,
    config: ChannelSyncConfig,
) -> JoinHandle<()> {
    tokio::spawn(run_channel_sync(rx, sink, config))
}

async fn run_channel_sync(
    mut rx: UnboundedReceiver<ChannelMutation>,
    sink: Arc<dyn ChannelSink>,
    config: ChannelSyncConfig,
) {
    while let Some(first) = rx.recv().await {
        let mut batch = vec![first];
        let deadline = Instant::now() + config.batch_window;

        while batch.len() < config.max_batch {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match tokio::time::timeout(remaining, rx.recv()).await {
                Ok(Some(mutation)) => batch.push(mutation),
                // Stream closed; flush what we have and end after.
                Ok(None) => break,
                // Window elapsed.
                Err(_) => break,
            }
        }

        let batch = coalesce(batch);
        debug!("Syncing {} channel mutations", batch.len());
        if let Err(e) = sink.apply(batch).await {
            error!("Channel sync failed, dropping batch: {e}");
        }
    }
}

/// Keep only the last mutation per name, preserving relative order of the
/// survivors.
fn coalesce(batch: Vec<ChannelMutation>) -> Vec<ChannelMutation> {
    let mut last_index: HashMap<String, usize> = HashMap::new();
    for (i, mutation) in batch.iter().enumerate() {
        last_index.insert(mutation.name().to_string(), i);
    }
    batch
        .into_iter()
        .enumerate()
        .filter(|(i, mutation)| last_index[mutation.name()] == *i)
        .map(|(_, mutation)| mutation)
        .collect()
}
