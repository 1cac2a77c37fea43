//! SQLite subscriber store implementation

use async_trait::async_trait;
use feedwatch_domain::{
    DedupHistory, DeliveryTarget, Item, StatePatch, StoreError, Subscriber, SubscriberId,
    SubscriberState, SubscriberStore, WatchConfig,
};
use serde::{Serialize, de::DeserializeOwned};
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::path::Path;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// SQLite-backed subscriber store
pub struct SqliteSubscriberStore {
    pool: SqlitePool,
}

type SubscriberRow = (
    String,
    Option<String>,
    Option<String>,
    String,
    String,
    Option<String>,
);

impl SqliteSubscriberStore {
    /// Create a new SQLite store, initializing the database if needed
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref();

        // Create parent directories if needed
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Database(format!("Failed to create directory: {}", e)))?;
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing)
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS subscribers (
                id TEXT PRIMARY KEY,
                delivery_target TEXT,
                watch TEXT,
                notified TEXT NOT NULL DEFAULT '[]',
                prior_snapshot TEXT NOT NULL DEFAULT '[]',
                updated_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    /// Cheap connectivity probe used by health checks
    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn from_json<T: DeserializeOwned>(raw: &str) -> Result<T, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn subscriber_from_row(row: SubscriberRow) -> Result<Subscriber, StoreError> {
    let (id, delivery_target, watch, notified, prior_snapshot, updated_at) = row;

    let watch: Option<WatchConfig> = watch.as_deref().map(from_json).transpose()?;
    let notified: DedupHistory = from_json(&notified)?;
    let prior_snapshot: Vec<Item> = from_json(&prior_snapshot)?;
    let updated_at = updated_at
        .as_deref()
        .map(|s| OffsetDateTime::parse(s, &Rfc3339))
        .transpose()
        .map_err(|e| StoreError::Serialization(e.to_string()))?;

    Ok(Subscriber {
        id: SubscriberId::new(id),
        delivery_target: delivery_target.map(DeliveryTarget::new),
        watch,
        state: SubscriberState {
            notified,
            prior_snapshot,
            updated_at,
        },
    })
}

#[async_trait]
impl SubscriberStore for SqliteSubscriberStore {
    async fn list_subscribers(&self) -> Result<Vec<Subscriber>, StoreError> {
        let rows: Vec<SubscriberRow> = sqlx::query_as(
            r#"
            SELECT id, delivery_target, watch, notified, prior_snapshot, updated_at
            FROM subscribers
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        rows.into_iter().map(subscriber_from_row).collect()
    }

    async fn update_subscriber_state(
        &self,
        id: &SubscriberId,
        patch: &StatePatch,
    ) -> Result<(), StoreError> {
        let notified = patch.notified.as_ref().map(to_json).transpose()?;
        let prior_snapshot = patch
            .prior_snapshot
            .as_deref()
            .map(to_json)
            .transpose()?;
        let updated_at = patch
            .updated_at
            .format(&Rfc3339)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        // One statement so a patch is never half applied
        let result = sqlx::query(
            r#"
            UPDATE subscribers SET
                notified = COALESCE(?, notified),
                prior_snapshot = COALESCE(?, prior_snapshot),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(notified)
        .bind(prior_snapshot)
        .bind(updated_at)
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }

        Ok(())
    }

    async fn set_watch(&self, id: &SubscriberId, watch: &WatchConfig) -> Result<(), StoreError> {
        let watch = to_json(watch)?;

        sqlx::query(
            r#"
            INSERT INTO subscribers (id, watch)
            VALUES (?, ?)
            ON CONFLICT(id) DO UPDATE SET
                watch = excluded.watch,
                notified = CASE WHEN watch IS excluded.watch THEN notified ELSE '[]' END,
                prior_snapshot = CASE WHEN watch IS excluded.watch THEN prior_snapshot ELSE '[]' END,
                updated_at = CASE WHEN watch IS excluded.watch THEN updated_at ELSE NULL END
            "#,
        )
        .bind(id.as_str())
        .bind(watch)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    async fn bind_delivery_target(
        &self,
        id: &SubscriberId,
        target: &DeliveryTarget,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO subscribers (id, delivery_target)
            VALUES (?, ?)
            ON CONFLICT(id) DO UPDATE SET delivery_target = excluded.delivery_target
            "#,
        )
        .bind(id.as_str())
        .bind(target.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }
}
