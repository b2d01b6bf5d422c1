//! Platform notification boundary.

use async_trait::async_trait;

use crate::error::Result;
use crate::handler::Renderable;

/// The host's notification surface.
///
/// Tags follow the `"{type}:{name}"` format from
/// [`notification_tag`](crate::update::notification_tag); the engine relies
/// on [`active_tags`](NotificationPlatform::active_tags) returning those same
/// tags so the orphan sweep can diff displayed notifications against the
/// active entity set.
#[async_trait]
pub trait NotificationPlatform: Send + Sync {
    /// Post or update the notification for `tag`.
    ///
    /// `name` identifies the backing Live Update so the host can report a
    /// user dismissal back through
    /// [`LiveUpdateRegistrar::on_notification_dismissed`](crate::registrar::LiveUpdateRegistrar::on_notification_dismissed).
    /// A `dismissal_time` (epoch millis) asks the platform to expire the
    /// notification on its own at that instant.
    async fn post(
        &self,
        tag: &str,
        name: &str,
        renderable: Renderable,
        dismissal_time: Option<i64>,
    ) -> Result<()>;

    /// Cancel the notification for `tag`, if one is displayed.
    async fn cancel(&self, tag: &str) -> Result<()>;

    /// Tags of all currently-displayed notifications.
    async fn active_tags(&self) -> Result<Vec<String>>;
}
