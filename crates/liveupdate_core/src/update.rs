//! The read-only Live Update view delivered to handlers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use liveupdate_store::{ContentRecord, StateRecord};

/// Lifecycle event delivered alongside a [`LiveUpdate`] view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiveUpdateEvent {
    Start,
    Update,
    End,
}

/// Snapshot of one tracked entity, combining its state and content rows.
///
/// Never persisted directly; constructed on demand when the engine emits a
/// handler callback or a caller lists the active set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveUpdate {
    pub name: String,
    pub update_type: String,
    pub payload: Value,
    /// Epoch millis of the last accepted content write.
    pub last_content_update_time: i64,
    /// Epoch millis of the last accepted start/stop transition.
    pub last_state_change_time: i64,
    /// Optional auto-expire instant, epoch millis.
    pub dismissal_time: Option<i64>,
}

impl LiveUpdate {
    /// Project a state row joined with its content row into a view.
    pub fn from_records(state: &StateRecord, content: &ContentRecord) -> Self {
        Self {
            name: state.name.clone(),
            update_type: state.update_type.clone(),
            payload: content.payload.clone(),
            last_content_update_time: content.timestamp,
            last_state_change_time: state.timestamp,
            dismissal_time: state.dismissal_time,
        }
    }

    /// The platform notification tag for this update.
    pub fn notification_tag(&self) -> String {
        notification_tag(&self.update_type, &self.name)
    }
}

/// Tag correlating a Live Update with its platform notification.
///
/// The format is the only correlation key to the platform's notification
/// list and must stay stable across process restarts.
pub fn notification_tag(update_type: &str, name: &str) -> String {
    format!("{update_type}:{name}")
}
