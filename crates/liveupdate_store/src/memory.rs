//! In-memory entity store for tests and hosts without durable storage.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreResult;
use crate::models::{ActiveUpdate, ContentRecord, StateRecord, StoredUpdate};
use crate::store::EntityStore;

#[derive(Debug, Default)]
struct Tables {
    states: HashMap<String, StateRecord>,
    contents: HashMap<String, ContentRecord>,
}

/// Entity store backed by process memory. Contents do not survive restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn get_state(&self, name: &str) -> StoreResult<Option<StateRecord>> {
        Ok(self.tables.read().await.states.get(name).cloned())
    }

    async fn get(&self, name: &str) -> StoreResult<StoredUpdate> {
        let tables = self.tables.read().await;
        Ok(StoredUpdate {
            state: tables.states.get(name).cloned(),
            content: tables.contents.get(name).cloned(),
        })
    }

    async fn upsert(
        &self,
        state: Option<&StateRecord>,
        content: Option<&ContentRecord>,
    ) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(state) = state {
            tables.states.insert(state.name.clone(), state.clone());
        }
        if let Some(content) = content {
            tables.contents.insert(content.name.clone(), content.clone());
        }
        Ok(())
    }

    async fn delete_content(&self, name: &str) -> StoreResult<()> {
        self.tables.write().await.contents.remove(name);
        Ok(())
    }

    async fn delete_all(&self) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.states.clear();
        tables.contents.clear();
        Ok(())
    }

    async fn get_all_active(&self) -> StoreResult<Vec<ActiveUpdate>> {
        let tables = self.tables.read().await;
        let mut active: Vec<ActiveUpdate> = tables
            .states
            .values()
            .filter(|s| s.is_active)
            .map(|s| ActiveUpdate {
                state: s.clone(),
                content: tables.contents.get(&s.name).cloned(),
            })
            .collect();
        // Stable output order for callers that diff against platform state.
        active.sort_by(|a, b| a.state.name.cmp(&b.state.name));
        Ok(active)
    }

    async fn is_any_active(&self) -> StoreResult<bool> {
        Ok(self.tables.read().await.states.values().any(|s| s.is_active))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn tracks_state_and_content_independently() {
        let store = MemoryStore::new();

        let state = StateRecord {
            name: "ride-1".into(),
            update_type: "eta".into(),
            timestamp: 10,
            is_active: true,
            dismissal_time: Some(99),
        };
        store.upsert(Some(&state), None).await.unwrap();

        let stored = store.get("ride-1").await.unwrap();
        assert_eq!(stored.state, Some(state));
        assert!(stored.content.is_none());

        let content = ContentRecord {
            name: "ride-1".into(),
            payload: json!({"eta": 5}),
            timestamp: 20,
        };
        store.upsert(None, Some(&content)).await.unwrap();
        assert_eq!(store.get("ride-1").await.unwrap().content, Some(content));

        store.delete_content("ride-1").await.unwrap();
        let stored = store.get("ride-1").await.unwrap();
        assert!(stored.state.is_some());
        assert!(stored.content.is_none());
    }

    #[tokio::test]
    async fn active_set_is_sorted_by_name() {
        let store = MemoryStore::new();
        for name in ["b", "a", "c"] {
            let state = StateRecord {
                name: name.into(),
                update_type: "eta".into(),
                timestamp: 1,
                is_active: name != "c",
                dismissal_time: None,
            };
            store.upsert(Some(&state), None).await.unwrap();
        }

        let names: Vec<_> = store
            .get_all_active()
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.state.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
