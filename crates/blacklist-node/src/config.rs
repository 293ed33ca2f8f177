//! Command line and environment configuration.
//!
//! Every flag can also be supplied through a `BLG_*` environment variable;
//! an explicit flag wins over the environment.

use blacklist_gateway::domain::config::DEFAULT_PORT;
use blacklist_gateway::GatewayConfig;
use clap::Parser;
use std::net::IpAddr;
use tracing::{info, warn};

/// Blacklist gateway node
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "blacklist-node", version, about = "Ledger-backed IP blacklist gateway")]
pub struct Args {
    /// Port to listen on (prompted for when omitted and stdin is a terminal)
    #[arg(short, long, env = "BLG_PORT")]
    pub port: Option<u16>,

    /// Address to bind (defaults to the local outbound address)
    #[arg(long, env = "BLG_HOST")]
    pub host: Option<IpAddr>,

    /// Initial auto update interval in seconds
    #[arg(short, long, env = "BLG_REFRESH_INTERVAL")]
    pub interval: Option<u64>,

    /// Never prompt for a port
    #[arg(long)]
    pub no_prompt: bool,

    /// Emit logs as JSON
    #[arg(long, env = "BLG_LOG_JSON")]
    pub log_json: bool,
}

/// Build the gateway configuration from parsed arguments.
///
/// `prompt` is consulted only when no port was given; `discover` only when
/// no host was given. Port 0 is treated like an invalid prompt answer and
/// falls back to the default port.
pub fn build_config(
    args: &Args,
    prompt: impl FnOnce() -> Option<u16>,
    discover: impl FnOnce() -> IpAddr,
) -> GatewayConfig {
    let mut config = GatewayConfig::default();

    config.server.port = match args.port {
        Some(0) => {
            warn!(default = DEFAULT_PORT, "Port 0 is not allowed, using default port");
            DEFAULT_PORT
        }
        Some(port) => port,
        None if args.no_prompt => DEFAULT_PORT,
        None => prompt().unwrap_or(DEFAULT_PORT),
    };

    config.server.host = match args.host {
        Some(host) => host,
        None => {
            let host = discover();
            info!(host = %host, "Using discovered local address");
            host
        }
    };

    if let Some(interval) = args.interval {
        config.refresh.interval_secs = interval;
    }

    config
}
