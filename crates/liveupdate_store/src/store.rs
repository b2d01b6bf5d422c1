//! The async storage contract consumed by the reconciliation engine.

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::models::{ActiveUpdate, ContentRecord, StateRecord, StoredUpdate};

/// Durable key-value storage of Live Update state and content rows.
///
/// Every method is individually atomic; the engine serializes all mutation
/// through a single worker, so implementations never see concurrent writers
/// and no multi-row transaction discipline is required.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Fetch just the state row for a name.
    async fn get_state(&self, name: &str) -> StoreResult<Option<StateRecord>>;

    /// Fetch the state and content rows for a name.
    async fn get(&self, name: &str) -> StoreResult<StoredUpdate>;

    /// Insert or replace the given rows. Either argument may be `None` to
    /// leave that row untouched.
    async fn upsert(
        &self,
        state: Option<&StateRecord>,
        content: Option<&ContentRecord>,
    ) -> StoreResult<()>;

    /// Delete the content row for a name, leaving any state row in place.
    async fn delete_content(&self, name: &str) -> StoreResult<()>;

    /// Delete every state and content row.
    async fn delete_all(&self) -> StoreResult<()>;

    /// All active state rows, each joined with its content row if present.
    async fn get_all_active(&self) -> StoreResult<Vec<ActiveUpdate>>;

    /// Whether any entity is currently active.
    async fn is_any_active(&self) -> StoreResult<bool>;
}
