//! # Blacklist Node
//!
//! Entry point for the ledger-backed blacklist gateway.
//!
//! ## Startup Sequence
//!
//! 1. Parse flags and `BLG_*` environment variables
//! 2. Initialize logging
//! 3. Resolve port (flag, env, prompt or default) and bind address
//! 4. Start the gateway and its refresh scheduler
//! 5. Run until SIGINT/SIGTERM, then drain and stop

use std::sync::Arc;

use anyhow::{Context, Result};
use blacklist_gateway::{BlacklistGatewayService, GatewayConfig, InMemoryLedger};
use blacklist_node::{build_config, logging, net, prompt, shutdown, Args};
use clap::Parser;
use tracing::info;

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.log_json).context("failed to initialize logging")?;

    // Resolved before the runtime starts: the prompt blocks on stdin
    let config = build_config(&args, prompt::port_from_stdin, net::local_ip);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?
        .block_on(run(config))
}

async fn run(config: GatewayConfig) -> Result<()> {
    info!("===========================================");
    info!("  Blacklist Gateway v{}", blacklist_gateway::VERSION);
    info!("===========================================");
    info!(
        addr = %config.http_addr(),
        interval_secs = config.refresh.interval_secs,
        "Starting server"
    );

    let token = shutdown::create_shutdown_token();
    let ledger = Arc::new(InMemoryLedger::new());

    let service = BlacklistGatewayService::new(config, ledger, token)
        .context("invalid gateway configuration")?;

    info!("Server is running. Press Ctrl+C to stop.");
    service.start().await.context("gateway stopped with an error")?;

    info!("Shutdown complete");
    Ok(())
}
