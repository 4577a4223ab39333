use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::error;

use crate::error::{AppError, Result};
use crate::gw::item::Item;
use crate::gw::search::{SearchOption, SearchQuery};

/// Executes searches against the marketplace and resolves single listings.
/// The poll loops depend on this seam, not on the HTTP client, so they can
/// be driven by a scripted provider in tests.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Provider-native result order; empty when nothing matches.
    async fn search(&self, term: &str, opts: &[SearchOption]) -> Result<Vec<Item>>;

    /// `NotFound` once the listing no longer exists.
    async fn find_item(&self, goodwill_id: i64) -> Result<Item>;
}

pub struct GwClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    search_results: SearchResults,
}

#[derive(Debug, Deserialize)]
struct SearchResults {
    #[serde(default)]
    items: Vec<Item>,
}

impl GwClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("gw-watcher (https://github.com/gw-watcher)")
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl SearchProvider for GwClient {
    async fn search(&self, term: &str, opts: &[SearchOption]) -> Result<Vec<Item>> {
        let url = format!("{}/api/Search/ItemListing", self.base_url);
        let query = SearchQuery::new(term, opts);

        let resp = self.client.post(&url).json(&query).send().await?;
        let status = resp.status();
        if !status.is_success() {
            log_request_error(&url, status, resp).await;
            return Err(AppError::UnexpectedStatus {
                status: status.as_u16(),
                url,
            });
        }

        let body: SearchResponse = resp.json().await?;
        Ok(body.search_results.items)
    }

    async fn find_item(&self, goodwill_id: i64) -> Result<Item> {
        let url = format!(
            "{}/api/ItemDetail/GetItemDetailModelByItemId/{}",
            self.base_url, goodwill_id
        );

        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("listing {goodwill_id}")));
        }
        if !status.is_success() {
            log_request_error(&url, status, resp).await;
            return Err(AppError::UnexpectedStatus {
                status: status.as_u16(),
                url,
            });
        }

        Ok(resp.json().await?)
    }
}

async fn log_request_error(url: &str, status: reqwest::StatusCode, resp: reqwest::Response) {
    let body = resp.text().await.unwrap_or_default();
    error!(url, status = status.as_u16(), body, "unexpected status code");
}
