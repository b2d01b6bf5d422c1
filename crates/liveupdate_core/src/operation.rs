//! The unit of work enqueued into the processor.

use serde_json::Value;

use crate::push::PushMessage;

/// A single requested mutation, carrying the timestamp used for ordering.
///
/// Operations are applied by the processor's single worker in enqueue order;
/// the per-name timestamp rules decide whether each one is accepted or
/// dropped as stale.
#[derive(Debug, Clone)]
pub enum Operation {
    /// Begin tracking an entity, or restart a stopped one.
    Start {
        name: String,
        update_type: String,
        payload: Value,
        timestamp: i64,
        dismissal_time: Option<i64>,
        message: Option<PushMessage>,
    },
    /// Replace the entity's content.
    Update {
        name: String,
        payload: Value,
        timestamp: i64,
        dismissal_time: Option<i64>,
        message: Option<PushMessage>,
    },
    /// End tracking, optionally with a final payload.
    Stop {
        name: String,
        payload: Option<Value>,
        timestamp: i64,
        dismissal_time: Option<i64>,
        message: Option<PushMessage>,
    },
    /// Clear the platform notification without changing tracked state.
    Cancel { name: String, timestamp: i64 },
    /// Terminate every active entity and wipe storage.
    ClearAll { timestamp: i64 },
}

impl Operation {
    /// The ordering timestamp this operation carries.
    pub fn timestamp(&self) -> i64 {
        match self {
            Self::Start { timestamp, .. }
            | Self::Update { timestamp, .. }
            | Self::Stop { timestamp, .. }
            | Self::Cancel { timestamp, .. }
            | Self::ClearAll { timestamp } => *timestamp,
        }
    }
}
