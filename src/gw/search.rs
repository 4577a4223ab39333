use chrono::Utc;
use serde::Serialize;

use crate::config::{DEFAULT_PAGE_SIZE, PRICE_SENTINEL};
use crate::store::SubscriptionRow;

/// One typed filter applied over the default query. Options are independent
/// and last-write-wins per field, so applying the same option twice is the
/// same as applying it once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchOption {
    MinPrice(i64),
    MaxPrice(i64),
    Descending(bool),
    PageSize(u32),
}

impl SearchOption {
    fn apply(self, query: &mut SearchQuery) {
        match self {
            SearchOption::MinPrice(min) => query.low_price = min.to_string(),
            SearchOption::MaxPrice(max) => query.high_price = max.to_string(),
            SearchOption::Descending(desc) => query.sort_descending = desc.to_string(),
            SearchOption::PageSize(size) => query.page_size = size.to_string(),
        }
    }
}

/// Price-bound options carried by a subscription. Sort direction is chosen
/// per query: descending for newest-first discovery, ascending for
/// soonest-ending-first.
pub fn options_from_subscription(sub: &SubscriptionRow) -> Vec<SearchOption> {
    let mut opts = Vec::new();
    if let Some(min) = sub.min_price {
        opts.push(SearchOption::MinPrice(min));
    }
    if let Some(max) = sub.max_price {
        opts.push(SearchOption::MaxPrice(max));
    }
    opts
}

/// The marketplace search POST body. The API expects this full field map on
/// every request, stringly-typed booleans included; only the handful of
/// fields backed by [`SearchOption`] ever vary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub search_text: String,
    pub low_price: String,
    pub high_price: String,
    pub sort_descending: String,
    pub page_size: String,
    pub sort_column: String,
    pub page: String,
    is_size: bool,
    #[serde(rename = "isWeddingCatagory")]
    is_wedding_category: String,
    is_multiple_category_ids: bool,
    is_from_header_menu_tab: bool,
    layout: String,
    is_from_home_page: bool,
    selected_group: String,
    selected_category_ids: String,
    selected_seller_ids: String,
    search_buy_now_only: String,
    search_pickup_only: String,
    search_no_pickup_only: String,
    search_one_cent_shipping_only: String,
    search_descriptions: String,
    search_closed_auctions: String,
    closed_auction_ending_date: String,
    closed_auction_days_back: String,
    search_canada_shipping: String,
    search_international_shipping_only: String,
    saved_search_id: i64,
    use_buyer_prefs: String,
    #[serde(rename = "searchUSOnlyShipping")]
    search_us_only_shipping: String,
    category_level_no: String,
    category_level: i64,
    category_id: i64,
    part_number: String,
    cat_ids: String,
}

impl SearchQuery {
    pub fn new(term: &str, opts: &[SearchOption]) -> Self {
        let mut query = Self::default_for(term);
        for opt in opts {
            opt.apply(&mut query);
        }
        query
    }

    fn default_for(term: &str) -> Self {
        Self {
            search_text: term.to_string(),
            low_price: "0".to_string(),
            high_price: PRICE_SENTINEL.to_string(),
            sort_descending: "true".to_string(),
            page_size: DEFAULT_PAGE_SIZE.to_string(),
            sort_column: "1".to_string(),
            page: "1".to_string(),
            is_size: false,
            is_wedding_category: "false".to_string(),
            is_multiple_category_ids: false,
            is_from_header_menu_tab: false,
            layout: String::new(),
            is_from_home_page: false,
            selected_group: String::new(),
            selected_category_ids: String::new(),
            selected_seller_ids: String::new(),
            search_buy_now_only: String::new(),
            search_pickup_only: "false".to_string(),
            search_no_pickup_only: "false".to_string(),
            search_one_cent_shipping_only: "false".to_string(),
            search_descriptions: "false".to_string(),
            search_closed_auctions: "false".to_string(),
            closed_auction_ending_date: Utc::now().format("%-m/%-d/%Y").to_string(),
            closed_auction_days_back: "7".to_string(),
            search_canada_shipping: "false".to_string(),
            search_international_shipping_only: "false".to_string(),
            saved_search_id: 0,
            use_buyer_prefs: "true".to_string(),
            search_us_only_shipping: "true".to_string(),
            category_level_no: "1".to_string(),
            category_level: 1,
            category_id: 0,
            part_number: String::new(),
            cat_ids: String::new(),
        }
    }
}
