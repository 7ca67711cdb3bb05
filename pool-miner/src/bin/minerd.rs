//! Pool daemon.
//!
//! Runs the pool against the in-memory development chain: useful for
//! exercising miners and tooling without a full node.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use pool_miner::config::PoolConfig;
use pool_miner::devnet::DevChain;
use pool_miner::pool::Pool;
use pool_miner::server::{Server, ServerOptions};
use pool_miner::tracing::{self, prelude::*};
use pool_miner::{api, types::Difficulty};

const DEV_DIFFICULTY: u64 = 100_000;
const DEV_REWARD: u64 = 17_592_186_044_415;
const DEV_PREMINED_BLOCKS: u64 = 8;

fn main() -> Result<()> {
    tracing::init();

    let config = PoolConfig::from_env()?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .max_blocking_threads(config.worker_threads)
        .build()?;
    runtime.block_on(run(config))
}

async fn run(config: PoolConfig) -> Result<()> {
    if config.credentials_file.is_none() {
        bail!("POOL_CREDENTIALS_FILE must point at a credential file");
    }

    let chain = Arc::new(DevChain::new(Difficulty::from(DEV_DIFFICULTY), DEV_REWARD));
    chain.mine_blocks(DEV_PREMINED_BLOCKS);

    let pool = Arc::new(Pool::from_config(&config, chain.clone(), chain.clone())?);

    let shutdown = CancellationToken::new();

    let refresher = pool.refresher(chain.tip_notifications(), config.template_refresh);
    let refresher = tokio::spawn(refresher.run(shutdown.clone()));

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("binding pool listener on {}", config.bind))?;
    let server = Server::new(
        Arc::clone(&pool),
        ServerOptions {
            request_timeout: config.request_timeout,
            shutdown_grace: config.shutdown_grace,
        },
    );
    let server = tokio::spawn(server.run(listener, shutdown.clone()));
    let api = tokio::spawn(api::serve(config.api_bind, Arc::clone(&pool), shutdown.clone()));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
        _ = shutdown.cancelled() => warn!("Pool stopped itself, shutting down"),
    }
    shutdown.cancel();

    refresher.await?;
    server.await??;
    if let Err(e) = api.await? {
        error!(error = %e, "API server exited with error");
    }
    info!("Exiting");
    Ok(())
}
