use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::error;

use crate::config::DISCORD_API_URL;
use crate::error::{AppError, Result};
use crate::gw::Item;
use crate::notify::{Notice, Notifier};

/// Delivers batches as Discord DMs, one embed per item. Talks straight to
/// the Discord REST API: resolve the recipient's DM channel, then post a
/// single message for the batch.
pub struct DiscordNotifier {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl DiscordNotifier {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        Self::with_base_url(token, DISCORD_API_URL)
    }

    pub fn with_base_url(token: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            token: token.into(),
        })
    }

    async fn dm_channel(&self, recipient: &str) -> Result<String> {
        let url = format!("{}/users/@me/channels", self.base_url);
        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bot {}", self.token))
            .json(&json!({ "recipient_id": recipient }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!(recipient, status = status.as_u16(), body, "failed to open DM channel");
            return Err(AppError::UnexpectedStatus {
                status: status.as_u16(),
                url,
            });
        }

        let body: Value = resp.json().await?;
        body.get("id")
            .and_then(|id| id.as_str())
            .map(str::to_string)
            .ok_or_else(|| AppError::NotFound(format!("DM channel for {recipient}")))
    }

    fn header(notice: &Notice) -> String {
        match notice {
            Notice::NewItems { term } => format!("\u{1f514} New items for {term:?}!"),
            Notice::EndingSoon { term } => format!("\u{23f0} Items ending soon for {term:?}!"),
        }
    }

    fn item_embed(item: &Item) -> Value {
        let mut embed = json!({
            "title": &item.title,
            "url": item.url(),
            "fields": [
                { "name": "Current Price", "value": format!("${:.2}", item.current_price), "inline": true },
                { "name": "Ends", "value": item.relative_end_time(), "inline": true },
                { "name": "Bids", "value": item.num_bids.to_string(), "inline": true },
                { "name": "Category", "value": &item.category_name, "inline": true },
                { "name": "Kind", "value": item.kind(), "inline": true },
            ],
        });

        if !item.image_url.is_empty() {
            embed["image"] = json!({ "url": &item.image_url });
        }

        embed
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn notify_batch(&self, recipient: &str, notice: &Notice, items: &[Item]) -> Result<()> {
        let channel = self.dm_channel(recipient).await?;

        let embeds: Vec<Value> = items.iter().map(Self::item_embed).collect();
        let url = format!("{}/channels/{}/messages", self.base_url, channel);
        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bot {}", self.token))
            .json(&json!({
                "content": Self::header(notice),
                "embeds": embeds,
            }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!(recipient, status = status.as_u16(), body, "failed to send notification");
            return Err(AppError::UnexpectedStatus {
                status: status.as_u16(),
                url,
            });
        }

        Ok(())
    }
}
