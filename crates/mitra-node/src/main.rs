use std::sync::Arc;

use clap::Parser;
use mitra_node::config::{Args, NodeConfig, StoreKind};
use mitra_node::{api, init_tracing, Node};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let config = match NodeConfig::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(path) = &args.write_config {
        config.save_to_file(path)?;
        println!("Wrote effective configuration to {}", path.display());
        return Ok(());
    }

    init_tracing(&config);

    info!("======================================");
    info!("  Mitra - scheme ledger node v{}", env!("CARGO_PKG_VERSION"));
    info!("======================================");
    info!(store = ?config.store, data_dir = %config.data_dir.display(), "storage");
    info!(
        welcome_balance = config.welcome_balance,
        scheme_reward = config.scheme_reward,
        max_commit_attempts = config.max_commit_attempts,
        "ledger policy"
    );
    if config.store == StoreKind::Memory {
        warn!("memory store selected: balances and history are lost on exit");
    }

    let node = Arc::new(Node::build(&config)?);
    let routes = api::routes(node.state.clone());

    let bind = config.bind_addr();
    let shutdown_node = node.clone();
    let (addr, server) = warp::serve(routes).try_bind_with_graceful_shutdown(bind, async move {
        shutdown_signal().await;
        info!("shutdown signal received, draining requests");
        shutdown_node.flush();
    })?;

    info!(
        %addr,
        rate_limit_rps = config.rate_limit_rps,
        rate_limit_burst = config.rate_limit_burst,
        "API server listening"
    );
    server.await;

    node.flush();
    info!("clean shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "cannot install SIGTERM handler, falling back to Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = tokio::signal::ctrl_c() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
