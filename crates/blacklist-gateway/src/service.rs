//! Blacklist gateway service - main entry point.
//!
//! Owns the shared cache and interval control, builds the HTTP router with
//! its middleware stack, and runs the accept loop alongside the refresh
//! scheduler until the shutdown token is cancelled.

use crate::cache::BlacklistCache;
use crate::domain::config::GatewayConfig;
use crate::domain::error::GatewayError;
use crate::middleware::{AccessGate, AccessGateLayer, TracingLayer, TrustedProxyConfig};
use crate::ports::outbound::LedgerGateway;
use crate::router::{command_routes, AppState};
use crate::scheduler::{join_bounded, IntervalControl, RefreshScheduler};
use axum::{extract::DefaultBodyLimit, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tracing::{error, info};

/// Blacklist gateway service state
pub struct BlacklistGatewayService {
    config: GatewayConfig,
    ledger: Arc<dyn LedgerGateway>,
    cache: Arc<BlacklistCache>,
    interval: IntervalControl,
    shutdown: CancellationToken,
}

impl BlacklistGatewayService {
    /// Create a new service. Nothing runs until [`start`](Self::start) or
    /// [`serve`](Self::serve) is called.
    pub fn new(
        config: GatewayConfig,
        ledger: Arc<dyn LedgerGateway>,
        shutdown: CancellationToken,
    ) -> Result<Self, GatewayError> {
        config
            .validate()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        let interval = IntervalControl::new(config.refresh.interval_secs);

        Ok(Self {
            config,
            ledger,
            cache: Arc::new(BlacklistCache::new()),
            interval,
            shutdown,
        })
    }

    /// Handle for reading and changing the refresh interval
    pub fn interval(&self) -> IntervalControl {
        self.interval.clone()
    }

    /// Shared blacklist cache
    pub fn cache(&self) -> Arc<BlacklistCache> {
        Arc::clone(&self.cache)
    }

    /// Token that stops the service when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Request shutdown
    pub fn shutdown(&self) {
        info!("Shutdown requested");
        self.shutdown.cancel();
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn start(&self) -> Result<(), GatewayError> {
        let addr = self.config.http_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::Bind(format!("{}: {}", addr, e)))?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until shutdown.
    ///
    /// The refresh scheduler is started first and joined (bounded by
    /// `refresh.shutdown_join_timeout`) after the accept loop has drained.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GatewayError> {
        let local_addr = listener
            .local_addr()
            .map_err(|e| GatewayError::Bind(e.to_string()))?;

        let scheduler = RefreshScheduler::new(
            Arc::clone(&self.ledger),
            Arc::clone(&self.cache),
            &self.interval,
            self.shutdown.clone(),
        );
        let stats = scheduler.stats();
        let scheduler_handle = scheduler.spawn();

        info!(
            addr = %local_addr,
            interval_secs = self.interval.current(),
            "Blacklist gateway listening"
        );

        let token = self.shutdown.clone();
        let result = axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await;

        if let Err(e) = &result {
            error!(error = %e, "HTTP server terminated");
        }

        // Stop the scheduler even if the server exited on its own
        self.shutdown.cancel();
        join_bounded(scheduler_handle, self.config.refresh.shutdown_join_timeout).await;

        info!(
            refresh_cycles = stats.cycles(),
            refresh_failures = stats.failures(),
            "Blacklist gateway stopped"
        );

        result.map_err(|e| GatewayError::Serve(e.to_string()))
    }

    /// Build the HTTP router with the full middleware stack
    pub fn router(&self) -> Router {
        let state = AppState {
            ledger: Arc::clone(&self.ledger),
            cache: Arc::clone(&self.cache),
            interval: self.interval.clone(),
        };

        let gate = AccessGate::new(
            Arc::clone(&self.cache),
            Arc::clone(&self.ledger),
            TrustedProxyConfig::from(&self.config.security),
        );

        let middleware = ServiceBuilder::new()
            .layer(TracingLayer::new())
            .layer(AccessGateLayer::new(gate));

        command_routes()
            .layer(DefaultBodyLimit::max(self.config.limits.max_request_size))
            .layer(middleware)
            .with_state(state)
    }
}
