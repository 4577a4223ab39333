pub mod discord;

use async_trait::async_trait;

use crate::error::Result;
use crate::gw::Item;

pub use discord::DiscordNotifier;

/// What a batch announces; carries the search term for the message header.
#[derive(Debug, Clone)]
pub enum Notice {
    NewItems { term: String },
    EndingSoon { term: String },
}

/// Delivers one batch of items to a recipient. Callers chunk to the
/// per-message cap and pace successive calls; one call is one message.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_batch(&self, recipient: &str, notice: &Notice, items: &[Item]) -> Result<()>;
}

/// Splits `items` into order-preserving chunks of at most `max` each. The
/// delivery channel enforces a hard per-message embed limit, so an
/// arbitrarily long result list has to go out as several messages.
pub fn chunk<T: Clone>(items: &[T], max: usize) -> Vec<Vec<T>> {
    items.chunks(max).map(|c| c.to_vec()).collect()
}
