use anyhow::{Context, Result, bail};
use dotenv::dotenv;
use extensions::{file_store::FileStore, subgraph::SubgraphClient};
use proposalsapp_governance::{PendingCache, ProposalFeed, Reconciler};
use tasks::poll_proposals::run_periodic_proposals_poll;
use tracing::{error, info};
use utils::{
    errors::{CACHE_DIR_CREATE_FAILED, SUBGRAPH_URL_NOT_SET},
    tracing::run_with_tracing,
};

mod config;
mod extensions;
mod tasks;

#[tokio::main]
async fn main() {
    dotenv().ok();
    run_with_tracing(run).await;
}

async fn run() -> Result<()> {
    info!("Application starting up");

    config::load().context("Failed to load terminal config")?;
    let config = config::get_config()?;
    if config.subgraph_url.is_empty() {
        bail!(SUBGRAPH_URL_NOT_SET);
    }

    let store = FileStore::new(&config.cache_dir).context(CACHE_DIR_CREATE_FAILED)?;
    let client = SubgraphClient::new_with_endpoint(config.subgraph_url.clone());
    let feed = ProposalFeed::new(client.clone(), client, Reconciler::new(PendingCache::new(store)));

    let poll_handle = tokio::spawn(async move {
        if let Err(e) = run_periodic_proposals_poll(feed, config).await {
            error!("Error in periodic proposals poll task: {:?}", e);
        }
    });

    tokio::select! {
        result = poll_handle => {
            error!("Proposals poll task completed unexpectedly: {:?}", result);
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully");
        }
    }

    info!("Application shutting down");
    Ok(())
}
