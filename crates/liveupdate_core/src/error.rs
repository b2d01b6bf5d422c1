//! Error types for the reconciliation engine.

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, LiveUpdateError>;

#[derive(Debug, Error, Diagnostic)]
pub enum LiveUpdateError {
    /// Entity store failure. Not retried; the affected operation is lost.
    #[error("Storage error: {0}")]
    #[diagnostic(
        code(liveupdate_core::storage),
        help("The operation that hit this error is dropped; later operations are unaffected")
    )]
    Store(#[from] liveupdate_store::StoreError),

    /// Notification platform failure while posting, canceling, or listing.
    #[error("Notification platform error: {0}")]
    #[diagnostic(code(liveupdate_core::platform))]
    Platform(String),

    /// A host-supplied handler failed while materializing an update.
    #[error("Handler for type '{update_type}' failed: {cause}")]
    #[diagnostic(
        code(liveupdate_core::handler),
        help("Handler failures are treated as a no-change result; the tracked entity stays deliverable")
    )]
    Handler { update_type: String, cause: String },

    /// Remote channel sync failure for a batch of mutations.
    #[error("Channel sync error: {0}")]
    #[diagnostic(code(liveupdate_core::channel_sync))]
    ChannelSync(String),

    /// A push-carried payload could not be decoded.
    #[error("Invalid live update payload: {0}")]
    #[diagnostic(
        code(liveupdate_core::payload),
        help("Expected {{event, name, type?, content, timestamp, dismissal_date?}}")
    )]
    Payload(#[from] serde_json::Error),
}
