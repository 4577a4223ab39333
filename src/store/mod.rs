pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::gw::Item;

pub use sqlite::SqliteStore;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SubscriptionRow {
    pub id: String,
    pub user_id: String,
    pub term: String,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    /// Ending-soon reminder window for this subscription, in minutes.
    pub notify_minutes: i64,
    /// Unix seconds of the last successful new-item notification.
    pub last_notified_at: Option<i64>,
    pub created_at: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ItemRow {
    pub id: String,
    /// The marketplace's listing id, distinct from our row id.
    pub goodwill_id: i64,
    pub subscription_id: String,
    pub started_at: i64,
    pub ends_at: i64,
    /// True once the ending-soon reminder for this row has been delivered.
    pub sent_final: bool,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub user_id: String,
    pub term: String,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub notify_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct NewItem {
    pub goodwill_id: i64,
    pub subscription_id: String,
    pub started_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

impl NewItem {
    pub fn from_listing(item: &Item, subscription_id: &str) -> Self {
        Self {
            goodwill_id: item.item_id,
            subscription_id: subscription_id.to_string(),
            started_at: item.start_time,
            ends_at: item.end_time,
        }
    }
}

/// Durable subscription/item state. These contracts are what the poll loops
/// lean on: in particular `create_item`'s unique-violation behavior is the
/// authoritative new-item dedup gate.
#[async_trait]
pub trait Store: Send + Sync {
    /// `Constraint` if the owner already subscribed to this term.
    async fn create_subscription(&self, params: NewSubscription) -> Result<SubscriptionRow>;

    /// `NotFound` if absent.
    async fn find_subscription(&self, id: &str) -> Result<SubscriptionRow>;

    async fn find_user_subscriptions(&self, user_id: &str) -> Result<Vec<SubscriptionRow>>;

    /// Deletes only rows owned by `user_id`; foreign ids are silently
    /// ignored. Item rows cascade.
    async fn delete_user_subscriptions(&self, user_id: &str, ids: &[String]) -> Result<()>;

    /// Subscriptions due a discovery poll: never notified, or last notified
    /// at least the cooldown ago.
    async fn find_subscriptions_to_notify(&self) -> Result<Vec<SubscriptionRow>>;

    async fn set_subscription_last_notified_at(&self, id: &str) -> Result<()>;

    /// `Constraint` if `(goodwill_id, subscription_id)` is already tracked;
    /// the first row is left untouched.
    async fn create_item(&self, params: NewItem) -> Result<ItemRow>;

    /// Unsent items inside their subscription's ending-soon window.
    async fn find_items_ending_soon(&self) -> Result<Vec<ItemRow>>;

    /// Idempotent batch flag-set.
    async fn set_items_sent_final(&self, ids: &[String]) -> Result<()>;

    /// Deletes rows past the retention buffer; returns the count deleted.
    async fn delete_expired_items(&self) -> Result<u64>;
}
