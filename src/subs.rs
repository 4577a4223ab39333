use std::collections::HashMap;
use std::sync::Arc;

use tracing::{error, info};

use crate::config::{DEFAULT_NOTIFY_MINUTES, MAX_SUBSCRIPTIONS_PER_USER};
use crate::error::{AppError, Result};
use crate::gw::{options_from_subscription, Item, SearchOption, SearchProvider};
use crate::store::{NewItem, NewSubscription, Store, SubscriptionRow};

pub const TERM_MAX_CHARS: usize = 100;

#[derive(Debug, Clone, Default)]
pub struct SubscribeRequest {
    pub term: String,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub notify_minutes: Option<i64>,
}

/// Subscription lifecycle: validated creation with a seed pass, listing,
/// and owner-scoped removal. The chat surface that feeds this sits outside
/// the crate; it only ever deals in `SubscribeRequest`s.
pub struct SubscriptionService {
    store: Arc<dyn Store>,
    provider: Arc<dyn SearchProvider>,
}

impl SubscriptionService {
    pub fn new(store: Arc<dyn Store>, provider: Arc<dyn SearchProvider>) -> Self {
        Self { store, provider }
    }

    /// Creates a subscription and seeds it with currently-live matches so
    /// the first discovery poll only reports genuinely new listings.
    pub async fn subscribe(&self, user_id: &str, req: SubscribeRequest) -> Result<SubscriptionRow> {
        let term = req.term.trim().to_string();
        if term.is_empty() || term.chars().count() > TERM_MAX_CHARS {
            return Err(AppError::Validation(format!(
                "term must be between 1 and {TERM_MAX_CHARS} characters"
            )));
        }

        if let (Some(min), Some(max)) = (req.min_price, req.max_price) {
            if min > max {
                return Err(AppError::Validation(
                    "minimum price must be less than or equal to maximum price".to_string(),
                ));
            }
        }

        let notify_minutes = req.notify_minutes.unwrap_or(DEFAULT_NOTIFY_MINUTES);
        if notify_minutes < 1 {
            return Err(AppError::Validation(
                "notify window must be at least one minute".to_string(),
            ));
        }

        let existing = self.store.find_user_subscriptions(user_id).await?;
        if existing.len() as i64 >= MAX_SUBSCRIPTIONS_PER_USER {
            return Err(AppError::Validation(format!(
                "at most {MAX_SUBSCRIPTIONS_PER_USER} subscriptions per user"
            )));
        }

        let sub = self
            .store
            .create_subscription(NewSubscription {
                user_id: user_id.to_string(),
                term,
                min_price: req.min_price,
                max_price: req.max_price,
                notify_minutes,
            })
            .await?;

        info!(subscription_id = %sub.id, user_id = %sub.user_id, "created subscription");

        // The subscription exists either way; a failed seed just means the
        // first discovery poll announces the current catalog.
        match self.seed_items(&sub).await {
            Ok(count) => info!(subscription_id = %sub.id, count, "seeded items"),
            Err(err) => error!(subscription_id = %sub.id, "failed to seed items: {err}"),
        }

        Ok(sub)
    }

    pub async fn list(&self, user_id: &str) -> Result<Vec<SubscriptionRow>> {
        self.store.find_user_subscriptions(user_id).await
    }

    /// Removes the given subscriptions, ignoring ids the user doesn't own,
    /// and returns the rows that were actually removed.
    pub async fn unsubscribe(&self, user_id: &str, ids: &[String]) -> Result<Vec<SubscriptionRow>> {
        let owned = self.store.find_user_subscriptions(user_id).await?;
        self.store.delete_user_subscriptions(user_id, ids).await?;
        Ok(owned.into_iter().filter(|s| ids.contains(&s.id)).collect())
    }

    /// Both canonical discovery variants, merged by listing id: a single
    /// page of each sort order approximates "everything currently relevant"
    /// without walking the whole catalog.
    async fn seed_items(&self, sub: &SubscriptionRow) -> Result<usize> {
        let base = options_from_subscription(sub);

        let mut newest = base.clone();
        newest.push(SearchOption::Descending(true));
        let mut ending = base;
        ending.push(SearchOption::Descending(false));

        let mut merged: HashMap<i64, Item> = HashMap::new();
        for item in self.provider.search(&sub.term, &newest).await? {
            merged.insert(item.item_id, item);
        }
        for item in self.provider.search(&sub.term, &ending).await? {
            merged.insert(item.item_id, item);
        }

        let mut count = 0;
        for item in merged.values() {
            if item.ended() {
                continue;
            }
            match self
                .store
                .create_item(NewItem::from_listing(item, &sub.id))
                .await
            {
                Ok(_) => count += 1,
                Err(err) if err.is_constraint() => {}
                Err(err) => return Err(err),
            }
        }

        Ok(count)
    }
}
