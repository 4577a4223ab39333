pub mod client;
pub mod item;
pub mod search;

pub use client::{GwClient, SearchProvider};
pub use item::Item;
pub use search::{options_from_subscription, SearchOption, SearchQuery};
