use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use gw_watcher::config::Config;
use gw_watcher::error::Result;
use gw_watcher::gw::{GwClient, SearchProvider};
use gw_watcher::notify::{DiscordNotifier, Notifier};
use gw_watcher::poller::Poller;
use gw_watcher::store::{sqlite, SqliteStore, Store};

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    let pool = sqlite::connect(&cfg.db_path).await?;
    info!("Database ready at {}", cfg.db_path);

    let store: Arc<dyn Store> = Arc::new(SqliteStore::new(pool));
    let provider: Arc<dyn SearchProvider> = Arc::new(GwClient::new(cfg.gw_api_url.clone())?);
    let notifier: Arc<dyn Notifier> = Arc::new(DiscordNotifier::new(cfg.discord_token.clone())?);

    let poller = Arc::new(Poller::new(store, provider, notifier));
    let token = CancellationToken::new();

    let discovery = {
        let poller = Arc::clone(&poller);
        let token = token.clone();
        tokio::spawn(async move { poller.run_discovery(token).await })
    };
    let ending_soon = {
        let poller = Arc::clone(&poller);
        let token = token.clone();
        tokio::spawn(async move { poller.run_ending_soon(token).await })
    };
    let cleanup = {
        let poller = Arc::clone(&poller);
        let token = token.clone();
        tokio::spawn(async move { poller.run_cleanup(token).await })
    };

    info!("gw-watcher is running");

    tokio::signal::ctrl_c().await?;
    warn!("received shutdown signal, stopping loops");
    token.cancel();

    let _ = tokio::join!(discovery, ending_soon, cleanup);
    Ok(())
}
