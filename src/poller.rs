use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::{
    CHUNK_DELAY_SECS, MAX_ITEMS_PER_MESSAGE, TICK_CLEANUP_SECS, TICK_DISCOVERY_SECS,
    TICK_ENDING_SECS, UNIT_DELAY_SECS,
};
use crate::error::Result;
use crate::gw::{options_from_subscription, Item, SearchOption, SearchProvider};
use crate::notify::{chunk, Notice, Notifier};
use crate::store::{ItemRow, NewItem, Store, SubscriptionRow};

/// The orchestration heart: three independent periodic loops sharing the
/// Store but no in-process mutable state. Work inside a tick is strictly
/// sequential, with a fixed delay between subscriptions and item groups —
/// the marketplace rate-limits hard, so this pacing is load-bearing.
pub struct Poller {
    store: Arc<dyn Store>,
    provider: Arc<dyn SearchProvider>,
    notifier: Arc<dyn Notifier>,
}

impl Poller {
    pub fn new(
        store: Arc<dyn Store>,
        provider: Arc<dyn SearchProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            provider,
            notifier,
        }
    }

    /// New-item discovery. Polls each due subscription with a newest-first
    /// search; inserted rows are the dedup boundary, so only fresh listings
    /// get delivered.
    pub async fn run_discovery(&self, token: CancellationToken) {
        let mut ticker = interval(Duration::from_secs(TICK_DISCOVERY_SECS));
        ticker.tick().await; // fires immediately; the first poll should wait a full interval

        info!(tick_secs = TICK_DISCOVERY_SECS, "starting discovery loop");
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("discovery loop stopped");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(err) = self.discovery_tick().await {
                        error!("discovery tick failed: {err}");
                    }
                }
            }
        }
    }

    /// Ending-soon reminders for tracked items inside their subscription's
    /// notify window.
    pub async fn run_ending_soon(&self, token: CancellationToken) {
        let mut ticker = interval(Duration::from_secs(TICK_ENDING_SECS));
        ticker.tick().await;

        info!(tick_secs = TICK_ENDING_SECS, "starting ending-soon loop");
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("ending-soon loop stopped");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(err) = self.ending_soon_tick().await {
                        error!("ending-soon tick failed: {err}");
                    }
                }
            }
        }
    }

    /// Purges item rows well past their end time. The sole guard against
    /// unbounded storage growth; safe to run alongside the other loops since
    /// it only ever touches rows past their useful life.
    pub async fn run_cleanup(&self, token: CancellationToken) {
        let mut ticker = interval(Duration::from_secs(TICK_CLEANUP_SECS));
        ticker.tick().await;

        info!(tick_secs = TICK_CLEANUP_SECS, "starting cleanup loop");
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("cleanup loop stopped");
                    return;
                }
                _ = ticker.tick() => {
                    match self.store.delete_expired_items().await {
                        Ok(count) => info!(count, "deleted expired items"),
                        Err(err) => error!("failed to delete expired items: {err}"),
                    }
                }
            }
        }
    }

    async fn discovery_tick(&self) -> Result<()> {
        let subscriptions = self.store.find_subscriptions_to_notify().await?;

        for sub in subscriptions {
            sleep(Duration::from_secs(UNIT_DELAY_SECS)).await;
            if let Err(err) = self.poll_subscription(&sub).await {
                error!(
                    subscription_id = %sub.id,
                    user_id = %sub.user_id,
                    "subscription poll failed: {err}"
                );
            }
        }

        Ok(())
    }

    async fn poll_subscription(&self, sub: &SubscriptionRow) -> Result<()> {
        let mut opts = options_from_subscription(sub);
        opts.push(SearchOption::Descending(true));

        let items = self.provider.search(&sub.term, &opts).await?;
        if items.is_empty() {
            return Ok(());
        }

        let mut fresh = Vec::new();
        for item in items {
            match self
                .store
                .create_item(NewItem::from_listing(&item, &sub.id))
                .await
            {
                Ok(_) => fresh.push(item),
                // Already tracked for this subscription.
                Err(err) if err.is_constraint() => {}
                Err(err) => error!(
                    subscription_id = %sub.id,
                    goodwill_id = item.item_id,
                    "failed to store item: {err}"
                ),
            }
        }

        if fresh.is_empty() {
            return Ok(());
        }

        info!(
            subscription_id = %sub.id,
            user_id = %sub.user_id,
            count = fresh.len(),
            "new items found"
        );

        let notice = Notice::NewItems {
            term: sub.term.clone(),
        };
        self.deliver(&sub.user_id, &notice, &fresh).await?;
        self.store.set_subscription_last_notified_at(&sub.id).await
    }

    async fn ending_soon_tick(&self) -> Result<()> {
        let items = self.store.find_items_ending_soon().await?;

        let mut by_subscription: HashMap<String, Vec<ItemRow>> = HashMap::new();
        for row in items {
            by_subscription
                .entry(row.subscription_id.clone())
                .or_default()
                .push(row);
        }

        for (sub_id, rows) in by_subscription {
            sleep(Duration::from_secs(UNIT_DELAY_SECS)).await;
            if let Err(err) = self.remind_group(&sub_id, &rows).await {
                error!(subscription_id = %sub_id, "ending-soon group failed: {err}");
            }
        }

        Ok(())
    }

    async fn remind_group(&self, sub_id: &str, rows: &[ItemRow]) -> Result<()> {
        let sub = self.store.find_subscription(sub_id).await?;

        // Re-resolve each listing live: price and bid count at reminder
        // time, not whatever they were at discovery. A vanished listing is
        // dropped from the batch, not the whole group.
        let mut live = Vec::with_capacity(rows.len());
        for row in rows {
            match self.provider.find_item(row.goodwill_id).await {
                Ok(item) => live.push(item),
                Err(err) => error!(
                    subscription_id = %sub.id,
                    goodwill_id = row.goodwill_id,
                    "failed to resolve listing: {err}"
                ),
            }
        }

        if !live.is_empty() {
            let notice = Notice::EndingSoon {
                term: sub.term.clone(),
            };
            self.deliver(&sub.user_id, &notice, &live).await?;
        }

        // Every row in the group is marked, dropped listings included — a
        // listing that vanished mid-window would otherwise be retried every
        // tick until cleanup.
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        self.store.set_items_sent_final(&ids).await
    }

    async fn deliver(&self, recipient: &str, notice: &Notice, items: &[Item]) -> Result<()> {
        for (i, batch) in chunk(items, MAX_ITEMS_PER_MESSAGE).iter().enumerate() {
            if i > 0 {
                sleep(Duration::from_secs(CHUNK_DELAY_SECS)).await;
            }
            self.notifier.notify_batch(recipient, notice, batch).await?;
        }
        Ok(())
    }
}
