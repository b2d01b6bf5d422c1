//! Push ingestion boundary.
//!
//! Push decoding itself lives with the host; this module defines the decoded
//! shape the registrar consumes and the opaque source-message wrapper that is
//! threaded through handler callbacks.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::update::LiveUpdateEvent;

/// The raw push message a Live Update event arrived in.
///
/// Carried through handler callbacks untouched so hosts can wire
/// message-specific behavior (open intents, analytics) into what they render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushMessage {
    raw: Value,
}

impl PushMessage {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }
}

/// A decoded Live Update event from a push body.
///
/// `update_type` is required only for `Start` events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveUpdatePayload {
    pub event: LiveUpdateEvent,
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub update_type: Option<String>,
    #[serde(default)]
    pub content: Value,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dismissal_date: Option<i64>,
}

impl LiveUpdatePayload {
    /// Decode a payload from the JSON body of a push.
    pub fn from_json(value: &Value) -> Result<Self> {
        Ok(serde_json::from_value(value.clone())?)
    }
}
