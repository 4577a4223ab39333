use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::America::Los_Angeles;
use serde::Deserialize;
use tracing::warn;

use crate::config::ITEM_URL_BASE;

/// A single marketplace listing, normalized from the search or item-detail
/// payloads. Timestamps are UTC; the API serves naive Pacific-time strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "RawItem")]
pub struct Item {
    pub item_id: i64,
    pub category_id: i64,
    pub category_name: String,
    pub category_full_name: String,
    pub title: String,
    pub current_price: f64,
    pub num_bids: i64,
    pub buy_now_price: f64,
    pub image_url: String,
    pub listing_type: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// The wire shape. Search results carry `imageUrl` and `categoryName`
/// directly; the item-detail endpoint instead splits the image into
/// `imageServer` + a semicolon-delimited `imageUrlString` and flattens the
/// category into a pipe-delimited alternating id/name `categoryParentList`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawItem {
    #[serde(default)]
    item_id: i64,
    #[serde(default)]
    category_id: i64,
    #[serde(default)]
    category_name: String,
    #[serde(default)]
    cat_full_name: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    current_price: f64,
    #[serde(default)]
    num_bids: i64,
    #[serde(default)]
    buy_now_price: f64,
    #[serde(default)]
    image_url: String,
    #[serde(default)]
    listing_type: i64,
    #[serde(default)]
    start_time: String,
    #[serde(default)]
    end_time: String,
    #[serde(default)]
    image_server: String,
    #[serde(default)]
    image_url_string: String,
    #[serde(default)]
    category_parent_list: String,
}

impl From<RawItem> for Item {
    fn from(raw: RawItem) -> Self {
        let mut image_url = raw.image_url;
        if image_url.is_empty() && !raw.image_server.is_empty() {
            if let Some(first) = raw.image_url_string.split(';').next() {
                if !first.is_empty() {
                    image_url = format!("{}{}", raw.image_server, first);
                }
            }
        }

        let mut category_name = raw.category_name;
        let mut category_full_name = raw.cat_full_name;
        if category_name.is_empty() && !raw.category_parent_list.is_empty() {
            // Alternating id|name|id|name... — names are the odd positions.
            let names: Vec<&str> = raw
                .category_parent_list
                .split('|')
                .skip(1)
                .step_by(2)
                .collect();
            if let Some(last) = names.last() {
                category_name = (*last).to_string();
                category_full_name = names.join(" > ");
            }
        }

        Self {
            item_id: raw.item_id,
            category_id: raw.category_id,
            category_name,
            category_full_name,
            title: raw.title,
            current_price: raw.current_price,
            num_bids: raw.num_bids,
            buy_now_price: raw.buy_now_price,
            image_url,
            listing_type: raw.listing_type,
            start_time: infer_time(&raw.start_time),
            end_time: infer_time(&raw.end_time),
        }
    }
}

impl Item {
    pub fn url(&self) -> String {
        format!("{}/{}", ITEM_URL_BASE, self.item_id)
    }

    pub fn has_auction(&self) -> bool {
        self.listing_type == 0 || self.listing_type == 2
    }

    pub fn has_buy_now(&self) -> bool {
        self.listing_type == 1 || self.listing_type == 2
    }

    pub fn kind(&self) -> String {
        let mut kinds = Vec::new();
        if self.has_auction() {
            kinds.push("Auction");
        }
        if self.has_buy_now() {
            kinds.push("Buy It Now");
        }
        kinds.join("/")
    }

    pub fn ended(&self) -> bool {
        self.ended_at(Utc::now())
    }

    /// Equality counts as ended — a zero (failed-parse) end time reads as
    /// already over rather than live forever.
    pub fn ended_at(&self, now: DateTime<Utc>) -> bool {
        self.end_time <= now
    }

    pub fn relative_end_time(&self) -> String {
        self.relative_end_time_at(Utc::now())
    }

    /// Largest unit first among days/hours/minutes/seconds, zero-valued
    /// units omitted, space-joined. `"Ended"` once remaining time is <= 0.
    pub fn relative_end_time_at(&self, now: DateTime<Utc>) -> String {
        let secs = (self.end_time - now).num_seconds();
        if secs <= 0 {
            return "Ended".to_string();
        }

        let days = secs / 86_400;
        let hours = (secs / 3600) % 24;
        let minutes = (secs / 60) % 60;
        let seconds = secs % 60;

        let mut parts = Vec::new();
        if days > 0 {
            parts.push(format!("{days}d"));
        }
        if hours > 0 {
            parts.push(format!("{hours}h"));
        }
        if minutes > 0 {
            parts.push(format!("{minutes}m"));
        }
        if seconds > 0 {
            parts.push(format!("{seconds}s"));
        }

        parts.join(" ")
    }
}

/// Parse a naive marketplace timestamp (Pacific time) into UTC. Failures
/// degrade to the zero timestamp so a bad payload can't take down a loop.
fn infer_time(raw: &str) -> DateTime<Utc> {
    let naive = match NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        Ok(n) => n,
        Err(err) => {
            warn!(raw, %err, "failed to parse listing time");
            return DateTime::UNIX_EPOCH;
        }
    };

    match Los_Angeles.from_local_datetime(&naive).earliest() {
        Some(local) => local.with_timezone(&Utc),
        None => {
            warn!(raw, "listing time does not exist in Pacific time");
            DateTime::UNIX_EPOCH
        }
    }
}
