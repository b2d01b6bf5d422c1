//! Host-supplied handler contract.
//!
//! Handlers convert a Live Update event into something the host can show:
//! a platform notification payload for notification handlers, or whatever a
//! custom handler decides to do with it. The engine treats the produced
//! renderable as opaque.

use std::any::Any;
use std::fmt;

use async_trait::async_trait;

use crate::error::Result;
use crate::update::{LiveUpdate, LiveUpdateEvent};

/// Whether a handler's output is backed by a platform notification.
///
/// Only notification handlers participate in posting, tag-based cancellation,
/// and the orphan sweep; custom handlers own their update's presentation
/// entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    Notification,
    Custom,
}

/// An opaque, host-defined notification payload produced by a handler.
///
/// The engine never inspects this; it is handed to the
/// [`NotificationPlatform`](crate::platform::NotificationPlatform) as-is,
/// which may downcast it back to the concrete type the handler built.
pub struct Renderable {
    inner: Box<dyn Any + Send>,
}

impl Renderable {
    pub fn new<T: Any + Send>(value: T) -> Self {
        Self {
            inner: Box::new(value),
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref()
    }

    pub fn downcast<T: Any>(self) -> std::result::Result<Box<T>, Self> {
        match self.inner.downcast() {
            Ok(value) => Ok(value),
            Err(inner) => Err(Self { inner }),
        }
    }
}

impl fmt::Debug for Renderable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Renderable(..)")
    }
}

/// What the registrar should do with the platform notification after a
/// handler has seen an event.
#[derive(Debug)]
pub enum HandlerOutcome {
    /// Post or update the notification with this renderable.
    Render(Renderable),
    /// Leave any existing notification untouched. Lets a handler abstain
    /// from an intermediate update without disturbing what is displayed.
    NoChange,
    /// Cancel the notification for this update.
    Cancel,
}

/// Converts Live Update events into renderable results.
///
/// Invoked at most once per accepted operation per registered type, on the
/// registrar's dispatch task. Implementations may perform slow work (image
/// decode, network fetch); that never blocks the processor's worker.
#[async_trait]
pub trait LiveUpdateHandler: Send + Sync {
    fn kind(&self) -> HandlerKind;

    async fn on_update(
        &self,
        event: LiveUpdateEvent,
        update: &LiveUpdate,
    ) -> Result<HandlerOutcome>;
}
