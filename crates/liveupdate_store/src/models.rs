//! Storage records for tracked Live Updates.
//!
//! Each entity name owns up to two rows: a state row carrying the lifecycle
//! clock (time of the last accepted start/stop transition) and a content row
//! carrying the payload clock (time of the last accepted content write). The
//! two clocks are independent; content can be newer than the last state
//! change and vice versa.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle state for one Live Update entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecord {
    /// Caller-supplied unique key for the entity.
    pub name: String,
    /// Handler type that owns this entity.
    pub update_type: String,
    /// Epoch millis of the last accepted start/stop transition.
    pub timestamp: i64,
    /// True between an accepted start and the matching accepted stop.
    pub is_active: bool,
    /// Optional auto-expire instant, epoch millis.
    pub dismissal_time: Option<i64>,
}

/// Latest payload for one Live Update entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub name: String,
    pub payload: Value,
    /// Epoch millis of the last accepted content write.
    pub timestamp: i64,
}

/// State and content rows for a name, either of which may be absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredUpdate {
    pub state: Option<StateRecord>,
    pub content: Option<ContentRecord>,
}

/// An active state row joined with its content row, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveUpdate {
    pub state: StateRecord,
    pub content: Option<ContentRecord>,
}
