use crate::error::{AppError, Result};

pub const GW_API_URL: &str = "https://buyerapi.shopgoodwill.com";
pub const DISCORD_API_URL: &str = "https://discord.com/api/v10";

/// Canonical listing detail page, keyed by the marketplace's item id.
pub const ITEM_URL_BASE: &str = "https://www.shopgoodwill.com/item";

/// New-item discovery interval (seconds).
pub const TICK_DISCOVERY_SECS: u64 = 300;

/// Ending-soon reminder interval (seconds).
pub const TICK_ENDING_SECS: u64 = 60;

/// Expired-item cleanup interval (seconds).
pub const TICK_CLEANUP_SECS: u64 = 3600;

/// Delay between subscriptions (or item groups) within one tick. The
/// marketplace rate-limits aggressively; processing is sequential on purpose.
pub const UNIT_DELAY_SECS: u64 = 2;

/// Delay between message chunks delivered to the same recipient.
pub const CHUNK_DELAY_SECS: u64 = 2;

/// Discord allows at most 10 embeds per message.
pub const MAX_ITEMS_PER_MESSAGE: usize = 10;

/// Per-user subscription cap.
pub const MAX_SUBSCRIPTIONS_PER_USER: i64 = 25;

/// Ending-soon window default when a subscription doesn't set one (minutes).
pub const DEFAULT_NOTIFY_MINUTES: i64 = 10;

/// A subscription is due for discovery once it has never been notified or
/// its last notification is at least this old (seconds).
pub const NOTIFY_COOLDOWN_SECS: i64 = 300;

/// Item rows are deleted once ends_at is this far in the past (seconds).
pub const ITEM_RETENTION_SECS: i64 = 86_400;

/// Default search page size requested from the marketplace.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Upper price sentinel used for the full-catalog default query.
pub const PRICE_SENTINEL: i64 = 999_999;

#[derive(Debug, Clone)]
pub struct Config {
    /// Bot token for the Discord REST API (DISCORD_TOKEN, required).
    pub discord_token: String,
    pub gw_api_url: String,
    pub db_path: String,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            discord_token: std::env::var("DISCORD_TOKEN")
                .map_err(|_| AppError::Config("DISCORD_TOKEN must be set".to_string()))?,
            gw_api_url: std::env::var("GW_API_URL").unwrap_or_else(|_| GW_API_URL.to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "gw-watcher.db".to_string()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }
}
