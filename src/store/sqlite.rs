use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use uuid::Uuid;

use crate::config::{ITEM_RETENTION_SECS, NOTIFY_COOLDOWN_SECS};
use crate::error::{AppError, Result};
use crate::store::{ItemRow, NewItem, NewSubscription, Store, SubscriptionRow};

/// Opens (creating if missing) the database file and applies migrations.
pub async fn connect(db_path: &str) -> Result<SqlitePool> {
    let opts = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new().connect_with(opts).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn create_subscription(&self, params: NewSubscription) -> Result<SubscriptionRow> {
        let row = SubscriptionRow {
            id: Uuid::new_v4().to_string(),
            user_id: params.user_id,
            term: params.term,
            min_price: params.min_price,
            max_price: params.max_price,
            notify_minutes: params.notify_minutes,
            last_notified_at: None,
            created_at: now_secs(),
        };

        sqlx::query(
            r#"
            INSERT INTO subscriptions (id, user_id, term, min_price, max_price, notify_minutes, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.id)
        .bind(&row.user_id)
        .bind(&row.term)
        .bind(row.min_price)
        .bind(row.max_price)
        .bind(row.notify_minutes)
        .bind(row.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique(e, format!("subscription for term {:?}", row.term)))?;

        Ok(row)
    }

    async fn find_subscription(&self, id: &str) -> Result<SubscriptionRow> {
        sqlx::query_as::<_, SubscriptionRow>("SELECT * FROM subscriptions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("subscription {id}")))
    }

    async fn find_user_subscriptions(&self, user_id: &str) -> Result<Vec<SubscriptionRow>> {
        Ok(sqlx::query_as::<_, SubscriptionRow>(
            "SELECT * FROM subscriptions WHERE user_id = ? ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn delete_user_subscriptions(&self, user_id: &str, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql =
            format!("DELETE FROM subscriptions WHERE user_id = ? AND id IN ({placeholders})");

        let mut query = sqlx::query(&sql).bind(user_id);
        for id in ids {
            query = query.bind(id);
        }
        query.execute(&self.pool).await?;

        Ok(())
    }

    async fn find_subscriptions_to_notify(&self) -> Result<Vec<SubscriptionRow>> {
        let cutoff = now_secs() - NOTIFY_COOLDOWN_SECS;
        Ok(sqlx::query_as::<_, SubscriptionRow>(
            r#"
            SELECT * FROM subscriptions
            WHERE last_notified_at IS NULL OR last_notified_at <= ?
            ORDER BY created_at
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn set_subscription_last_notified_at(&self, id: &str) -> Result<()> {
        sqlx::query("UPDATE subscriptions SET last_notified_at = ? WHERE id = ?")
            .bind(now_secs())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_item(&self, params: NewItem) -> Result<ItemRow> {
        let row = ItemRow {
            id: Uuid::new_v4().to_string(),
            goodwill_id: params.goodwill_id,
            subscription_id: params.subscription_id,
            started_at: params.started_at.timestamp(),
            ends_at: params.ends_at.timestamp(),
            sent_final: false,
            created_at: now_secs(),
        };

        sqlx::query(
            r#"
            INSERT INTO items (id, goodwill_id, subscription_id, started_at, ends_at, sent_final, created_at)
            VALUES (?, ?, ?, ?, ?, 0, ?)
            "#,
        )
        .bind(&row.id)
        .bind(row.goodwill_id)
        .bind(&row.subscription_id)
        .bind(row.started_at)
        .bind(row.ends_at)
        .bind(row.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            map_unique(
                e,
                format!(
                    "item {} for subscription {}",
                    row.goodwill_id, row.subscription_id
                ),
            )
        })?;

        Ok(row)
    }

    async fn find_items_ending_soon(&self) -> Result<Vec<ItemRow>> {
        let now = now_secs();
        Ok(sqlx::query_as::<_, ItemRow>(
            r#"
            SELECT i.* FROM items i
            JOIN subscriptions s ON s.id = i.subscription_id
            WHERE i.sent_final = 0
              AND i.ends_at > ?
              AND i.ends_at <= ? + s.notify_minutes * 60
            ORDER BY i.ends_at
            "#,
        )
        .bind(now)
        .bind(now)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn set_items_sent_final(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("UPDATE items SET sent_final = 1 WHERE id IN ({placeholders})");

        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id);
        }
        query.execute(&self.pool).await?;

        Ok(())
    }

    async fn delete_expired_items(&self) -> Result<u64> {
        let cutoff = now_secs() - ITEM_RETENTION_SECS;
        let result = sqlx::query("DELETE FROM items WHERE ends_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn now_secs() -> i64 {
    Utc::now().timestamp()
}

fn map_unique(err: sqlx::Error, what: String) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Constraint(what),
        _ => AppError::Database(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    async fn test_store() -> SqliteStore {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")
            .unwrap()
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        SqliteStore::new(pool)
    }

    fn new_sub(user: &str, term: &str) -> NewSubscription {
        NewSubscription {
            user_id: user.to_string(),
            term: term.to_string(),
            min_price: None,
            max_price: None,
            notify_minutes: 10,
        }
    }

    fn item_ending_in(sub_id: &str, goodwill_id: i64, secs: i64) -> NewItem {
        let now = Utc::now();
        NewItem {
            goodwill_id,
            subscription_id: sub_id.to_string(),
            started_at: now - TimeDelta::hours(1),
            ends_at: now + TimeDelta::seconds(secs),
        }
    }

    #[tokio::test]
    async fn duplicate_subscription_is_constraint() {
        let store = test_store().await;
        store.create_subscription(new_sub("u1", "camera")).await.unwrap();

        let err = store
            .create_subscription(new_sub("u1", "camera"))
            .await
            .unwrap_err();
        assert!(err.is_constraint());

        // Same term for another user is fine.
        store.create_subscription(new_sub("u2", "camera")).await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_item_pair_leaves_first_row() {
        let store = test_store().await;
        let sub = store.create_subscription(new_sub("u1", "camera")).await.unwrap();

        let first = store
            .create_item(item_ending_in(&sub.id, 555, 3600))
            .await
            .unwrap();
        let err = store
            .create_item(item_ending_in(&sub.id, 555, 7200))
            .await
            .unwrap_err();
        assert!(err.is_constraint());

        // The first row survives untouched.
        let rows = sqlx::query_as::<_, ItemRow>("SELECT * FROM items")
            .fetch_all(&store.pool)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, first.id);
        assert_eq!(rows[0].ends_at, first.ends_at);
    }

    #[tokio::test]
    async fn ending_soon_respects_subscription_window() {
        let store = test_store().await;
        let sub = store.create_subscription(new_sub("u1", "camera")).await.unwrap();

        // 4 minutes out: inside the default 10 minute window.
        store.create_item(item_ending_in(&sub.id, 1, 240)).await.unwrap();
        // 30 minutes out: outside.
        store.create_item(item_ending_in(&sub.id, 2, 1800)).await.unwrap();
        // Already over: never reminded.
        store.create_item(item_ending_in(&sub.id, 3, -60)).await.unwrap();

        let soon = store.find_items_ending_soon().await.unwrap();
        assert_eq!(soon.len(), 1);
        assert_eq!(soon[0].goodwill_id, 1);
        assert!(!soon[0].sent_final);

        store
            .set_items_sent_final(&[soon[0].id.clone()])
            .await
            .unwrap();
        assert!(store.find_items_ending_soon().await.unwrap().is_empty());

        // Repeating the flag-set is a no-op.
        store
            .set_items_sent_final(&[soon[0].id.clone()])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn cleanup_deletes_only_past_retention() {
        let store = test_store().await;
        let sub = store.create_subscription(new_sub("u1", "camera")).await.unwrap();

        // Two days past end: beyond the 24h buffer.
        store
            .create_item(item_ending_in(&sub.id, 1, -2 * 86_400))
            .await
            .unwrap();
        // Ended an hour ago: still within the buffer.
        store.create_item(item_ending_in(&sub.id, 2, -3600)).await.unwrap();
        // Live item.
        store.create_item(item_ending_in(&sub.id, 3, 3600)).await.unwrap();

        let deleted = store.delete_expired_items().await.unwrap();
        assert_eq!(deleted, 1);

        let rows = sqlx::query_as::<_, ItemRow>("SELECT * FROM items ORDER BY goodwill_id")
            .fetch_all(&store.pool)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].goodwill_id, 2);
    }

    #[tokio::test]
    async fn delete_is_scoped_to_owner_and_cascades() {
        let store = test_store().await;
        let mine = store.create_subscription(new_sub("u1", "camera")).await.unwrap();
        let theirs = store.create_subscription(new_sub("u2", "camera")).await.unwrap();
        store.create_item(item_ending_in(&mine.id, 555, 3600)).await.unwrap();

        store
            .delete_user_subscriptions("u1", &[mine.id.clone(), theirs.id.clone()])
            .await
            .unwrap();

        let err = store.find_subscription(&mine.id).await.unwrap_err();
        assert!(err.is_not_found());
        store.find_subscription(&theirs.id).await.unwrap();

        let rows = sqlx::query_as::<_, ItemRow>("SELECT * FROM items")
            .fetch_all(&store.pool)
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn notify_due_honors_cooldown() {
        let store = test_store().await;
        let sub = store.create_subscription(new_sub("u1", "camera")).await.unwrap();

        // Fresh subscription: never notified, due immediately.
        let due = store.find_subscriptions_to_notify().await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, sub.id);

        store.set_subscription_last_notified_at(&sub.id).await.unwrap();
        assert!(store.find_subscriptions_to_notify().await.unwrap().is_empty());
    }
}
