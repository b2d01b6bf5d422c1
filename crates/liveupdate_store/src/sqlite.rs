//! SQLite-backed entity store.

use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::{debug, info};

use crate::error::StoreResult;
use crate::models::{ActiveUpdate, ContentRecord, StateRecord, StoredUpdate};
use crate::store::EntityStore;

/// Entity store over a SQLite database file.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open or create a Live Update database at the given path.
    ///
    /// Creates the file if missing, runs pending migrations, and configures
    /// WAL journaling.
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        info!("Opening live update database: {}", path.to_string_lossy());

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .pragma("synchronous", "NORMAL")
            .pragma("temp_store", "MEMORY");

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Self::run_migrations(&pool).await?;

        Ok(Self { pool })
    }

    /// Open an in-memory database (for testing).
    pub async fn open_in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .journal_mode(SqliteJournalMode::Wal);

        // In-memory must be a single connection to share state.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Self::run_migrations(&pool).await?;

        Ok(Self { pool })
    }

    async fn run_migrations(pool: &SqlitePool) -> StoreResult<()> {
        debug!("Running live update store migrations");
        sqlx::migrate!("./migrations").run(pool).await?;
        Ok(())
    }

    /// Close the database connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn state_from_row(row: &SqliteRow) -> Result<StateRecord, sqlx::Error> {
    Ok(StateRecord {
        name: row.try_get("name")?,
        update_type: row.try_get("update_type")?,
        timestamp: row.try_get("timestamp")?,
        is_active: row.try_get("is_active")?,
        dismissal_time: row.try_get("dismissal_time")?,
    })
}

fn content_from_row(row: &SqliteRow) -> StoreResult<ContentRecord> {
    let payload: String = row.try_get("payload").map_err(crate::StoreError::from)?;
    Ok(ContentRecord {
        name: row.try_get("name").map_err(crate::StoreError::from)?,
        payload: serde_json::from_str(&payload)?,
        timestamp: row.try_get("timestamp").map_err(crate::StoreError::from)?,
    })
}

#[async_trait]
impl EntityStore for SqliteStore {
    async fn get_state(&self, name: &str) -> StoreResult<Option<StateRecord>> {
        let row = sqlx::query(
            "SELECT name, update_type, timestamp, is_active, dismissal_time \
             FROM live_update_state WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(state_from_row).transpose()?)
    }

    async fn get(&self, name: &str) -> StoreResult<StoredUpdate> {
        let state = self.get_state(name).await?;

        let content = sqlx::query(
            "SELECT name, payload, timestamp FROM live_update_content WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?
        .as_ref()
        .map(content_from_row)
        .transpose()?;

        Ok(StoredUpdate { state, content })
    }

    async fn upsert(
        &self,
        state: Option<&StateRecord>,
        content: Option<&ContentRecord>,
    ) -> StoreResult<()> {
        // Both rows land or neither does; a state row without its content
        // row would be invisible to end-of-life callbacks.
        let mut tx = self.pool.begin().await?;

        if let Some(state) = state {
            sqlx::query(
                "INSERT INTO live_update_state (name, update_type, timestamp, is_active, dismissal_time) \
                 VALUES (?, ?, ?, ?, ?) \
                 ON CONFLICT(name) DO UPDATE SET \
                     update_type = excluded.update_type, \
                     timestamp = excluded.timestamp, \
                     is_active = excluded.is_active, \
                     dismissal_time = excluded.dismissal_time",
            )
            .bind(&state.name)
            .bind(&state.update_type)
            .bind(state.timestamp)
            .bind(state.is_active)
            .bind(state.dismissal_time)
            .execute(&mut *tx)
            .await?;
        }

        if let Some(content) = content {
            let payload = serde_json::to_string(&content.payload)?;
            sqlx::query(
                "INSERT INTO live_update_content (name, payload, timestamp) \
                 VALUES (?, ?, ?) \
                 ON CONFLICT(name) DO UPDATE SET \
                     payload = excluded.payload, \
                     timestamp = excluded.timestamp",
            )
            .bind(&content.name)
            .bind(payload)
            .bind(content.timestamp)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_content(&self, name: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM live_update_content WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_all(&self) -> StoreResult<()> {
        sqlx::query("DELETE FROM live_update_state")
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM live_update_content")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_all_active(&self) -> StoreResult<Vec<ActiveUpdate>> {
        let rows = sqlx::query(
            "SELECT s.name AS name, s.update_type AS update_type, \
                    s.timestamp AS timestamp, s.is_active AS is_active, \
                    s.dismissal_time AS dismissal_time, \
                    c.payload AS payload, c.timestamp AS content_timestamp \
             FROM live_update_state s \
             LEFT JOIN live_update_content c ON c.name = s.name \
             WHERE s.is_active = 1 \
             ORDER BY s.name",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut active = Vec::with_capacity(rows.len());
        for row in &rows {
            let state = state_from_row(row)?;
            let payload: Option<String> = row.try_get("payload").map_err(crate::StoreError::from)?;
            let content = match payload {
                Some(payload) => Some(ContentRecord {
                    name: state.name.clone(),
                    payload: serde_json::from_str(&payload)?,
                    timestamp: row
                        .try_get("content_timestamp")
                        .map_err(crate::StoreError::from)?,
                }),
                None => None,
            };
            active.push(ActiveUpdate { state, content });
        }

        Ok(active)
    }

    async fn is_any_active(&self) -> StoreResult<bool> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM live_update_state WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;
        let n: i64 = row.try_get("n")?;
        Ok(n > 0)
    }
}
