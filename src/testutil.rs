//! In-memory collaborators for exercising the poll loops and the
//! subscription service without a database or network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use uuid::Uuid;

use crate::config::{ITEM_RETENTION_SECS, NOTIFY_COOLDOWN_SECS};
use crate::error::{AppError, Result};
use crate::gw::{Item, SearchOption, SearchProvider};
use crate::notify::{Notice, Notifier};
use crate::store::{ItemRow, NewItem, NewSubscription, Store, SubscriptionRow};

pub fn make_item(goodwill_id: i64, price: f64, ends_in_secs: i64) -> Item {
    let now = Utc::now();
    Item {
        item_id: goodwill_id,
        category_id: 7,
        category_name: "Cameras".to_string(),
        category_full_name: "Electronics > Cameras".to_string(),
        title: format!("Listing {goodwill_id}"),
        current_price: price,
        num_bids: 0,
        buy_now_price: 0.0,
        image_url: String::new(),
        listing_type: 0,
        start_time: now - TimeDelta::hours(1),
        end_time: now + TimeDelta::seconds(ends_in_secs),
    }
}

#[derive(Default)]
struct MemoryState {
    subscriptions: Vec<SubscriptionRow>,
    items: Vec<ItemRow>,
}

/// Mirrors the SQLite store's contracts over a `Mutex<Vec<_>>`.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn items(&self) -> Vec<ItemRow> {
        self.state.lock().unwrap().items.clone()
    }

    pub fn subscriptions(&self) -> Vec<SubscriptionRow> {
        self.state.lock().unwrap().subscriptions.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_subscription(&self, params: NewSubscription) -> Result<SubscriptionRow> {
        let mut state = self.state.lock().unwrap();
        if state
            .subscriptions
            .iter()
            .any(|s| s.user_id == params.user_id && s.term == params.term)
        {
            return Err(AppError::Constraint(format!(
                "subscription for term {:?}",
                params.term
            )));
        }

        let row = SubscriptionRow {
            id: Uuid::new_v4().to_string(),
            user_id: params.user_id,
            term: params.term,
            min_price: params.min_price,
            max_price: params.max_price,
            notify_minutes: params.notify_minutes,
            last_notified_at: None,
            created_at: Utc::now().timestamp(),
        };
        state.subscriptions.push(row.clone());
        Ok(row)
    }

    async fn find_subscription(&self, id: &str) -> Result<SubscriptionRow> {
        self.state
            .lock()
            .unwrap()
            .subscriptions
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("subscription {id}")))
    }

    async fn find_user_subscriptions(&self, user_id: &str) -> Result<Vec<SubscriptionRow>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .subscriptions
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn delete_user_subscriptions(&self, user_id: &str, ids: &[String]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .subscriptions
            .retain(|s| !(s.user_id == user_id && ids.contains(&s.id)));
        let remaining: Vec<String> = state.subscriptions.iter().map(|s| s.id.clone()).collect();
        state.items.retain(|i| remaining.contains(&i.subscription_id));
        Ok(())
    }

    async fn find_subscriptions_to_notify(&self) -> Result<Vec<SubscriptionRow>> {
        let cutoff = Utc::now().timestamp() - NOTIFY_COOLDOWN_SECS;
        Ok(self
            .state
            .lock()
            .unwrap()
            .subscriptions
            .iter()
            .filter(|s| s.last_notified_at.map_or(true, |at| at <= cutoff))
            .cloned()
            .collect())
    }

    async fn set_subscription_last_notified_at(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(sub) = state.subscriptions.iter_mut().find(|s| s.id == id) {
            sub.last_notified_at = Some(Utc::now().timestamp());
        }
        Ok(())
    }

    async fn create_item(&self, params: NewItem) -> Result<ItemRow> {
        let mut state = self.state.lock().unwrap();
        if state
            .items
            .iter()
            .any(|i| i.goodwill_id == params.goodwill_id && i.subscription_id == params.subscription_id)
        {
            return Err(AppError::Constraint(format!(
                "item {} for subscription {}",
                params.goodwill_id, params.subscription_id
            )));
        }

        let row = ItemRow {
            id: Uuid::new_v4().to_string(),
            goodwill_id: params.goodwill_id,
            subscription_id: params.subscription_id,
            started_at: params.started_at.timestamp(),
            ends_at: params.ends_at.timestamp(),
            sent_final: false,
            created_at: Utc::now().timestamp(),
        };
        state.items.push(row.clone());
        Ok(row)
    }

    async fn find_items_ending_soon(&self) -> Result<Vec<ItemRow>> {
        let now = Utc::now().timestamp();
        let state = self.state.lock().unwrap();
        Ok(state
            .items
            .iter()
            .filter(|i| {
                let window = state
                    .subscriptions
                    .iter()
                    .find(|s| s.id == i.subscription_id)
                    .map(|s| s.notify_minutes * 60)
                    .unwrap_or(0);
                !i.sent_final && i.ends_at > now && i.ends_at <= now + window
            })
            .cloned()
            .collect())
    }

    async fn set_items_sent_final(&self, ids: &[String]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        for item in state.items.iter_mut() {
            if ids.contains(&item.id) {
                item.sent_final = true;
            }
        }
        Ok(())
    }

    async fn delete_expired_items(&self) -> Result<u64> {
        let cutoff = Utc::now().timestamp() - ITEM_RETENTION_SECS;
        let mut state = self.state.lock().unwrap();
        let before = state.items.len();
        state.items.retain(|i| i.ends_at >= cutoff);
        Ok((before - state.items.len()) as u64)
    }
}

/// Scripted marketplace: every search returns the same listing set, item
/// lookups hit a fixed detail map.
#[derive(Default)]
pub struct StubProvider {
    pub search_results: Mutex<Vec<Item>>,
    pub details: Mutex<HashMap<i64, Item>>,
}

impl StubProvider {
    pub fn add_detail(&self, item: Item) {
        self.details.lock().unwrap().insert(item.item_id, item);
    }
}

#[async_trait]
impl SearchProvider for StubProvider {
    async fn search(&self, _term: &str, _opts: &[SearchOption]) -> Result<Vec<Item>> {
        Ok(self.search_results.lock().unwrap().clone())
    }

    async fn find_item(&self, goodwill_id: i64) -> Result<Item> {
        self.details
            .lock()
            .unwrap()
            .get(&goodwill_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("listing {goodwill_id}")))
    }
}

pub struct SentBatch {
    pub recipient: String,
    pub notice: Notice,
    pub goodwill_ids: Vec<i64>,
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<SentBatch>>,
    pub fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn sent_batches(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_batch(&self, recipient: &str, notice: &Notice, items: &[Item]) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::NotFound("notifier offline".to_string()));
        }

        self.sent.lock().unwrap().push(SentBatch {
            recipient: recipient.to_string(),
            notice: notice.clone(),
            goodwill_ids: items.iter().map(|i| i.item_id).collect(),
        });
        Ok(())
    }
}
