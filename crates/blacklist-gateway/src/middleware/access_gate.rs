//! Access gate middleware.
//!
//! Runs in front of every route, including the not-found fallback. For each
//! request it refreshes the blacklist cache from the ledger, resolves the
//! caller's IP and rejects blacklisted callers with 403 before any handler
//! runs. A failed refresh is logged and the previous snapshot still gates
//! the request.
//!
//! The caller IP is the direct peer address unless the peer is a trusted
//! proxy, in which case it is read from the forwarded header. IPv4-mapped
//! IPv6 addresses are compared in their IPv4 form.

use crate::cache::BlacklistCache;
use crate::domain::config::SecurityConfig;
use crate::domain::error::ApiError;
use crate::ports::outbound::LedgerGateway;
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::Request,
    response::{IntoResponse, Response},
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tower::{Layer, Service};
use tracing::{debug, warn};

/// Resolved caller address, stored in request extensions for handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

/// Trusted proxy configuration
#[derive(Clone, Debug, Default)]
pub struct TrustedProxyConfig {
    /// Peers allowed to set the forwarded header
    pub trusted_proxies: Vec<IpAddr>,
    /// Header to use for real IP (X-Forwarded-For, X-Real-IP, etc.)
    pub real_ip_header: String,
    /// Number of trusted proxies in chain (for X-Forwarded-For)
    pub proxy_count: usize,
}

impl From<&SecurityConfig> for TrustedProxyConfig {
    fn from(config: &SecurityConfig) -> Self {
        Self {
            trusted_proxies: config.trusted_proxies.clone(),
            real_ip_header: config.real_ip_header.clone(),
            proxy_count: config.proxy_count,
        }
    }
}

/// Per-request blacklist check against the shared cache
pub struct AccessGate {
    cache: Arc<BlacklistCache>,
    ledger: Arc<dyn LedgerGateway>,
    proxies: TrustedProxyConfig,
}

impl AccessGate {
    pub fn new(
        cache: Arc<BlacklistCache>,
        ledger: Arc<dyn LedgerGateway>,
        proxies: TrustedProxyConfig,
    ) -> Self {
        Self {
            cache,
            ledger,
            proxies,
        }
    }

    /// Pure lookup against the current snapshot
    pub fn is_blocked(&self, client_ip: &IpAddr) -> bool {
        self.cache.contains(&client_ip.to_canonical())
    }

    /// Refresh on the caller's behalf, then check.
    pub async fn admit(&self, client_ip: IpAddr) -> Result<(), ApiError> {
        if let Err(e) = self.cache.refresh(self.ledger.as_ref()).await {
            warn!(error = %e, "Blacklist refresh failed, gating on previous snapshot");
        }

        if self.is_blocked(&client_ip) {
            return Err(ApiError::access_denied());
        }
        Ok(())
    }
}

/// Access gate layer
#[derive(Clone)]
pub struct AccessGateLayer {
    gate: Arc<AccessGate>,
}

impl AccessGateLayer {
    pub fn new(gate: AccessGate) -> Self {
        Self {
            gate: Arc::new(gate),
        }
    }
}

impl<S> Layer<S> for AccessGateLayer {
    type Service = AccessGateService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AccessGateService {
            inner,
            gate: Arc::clone(&self.gate),
        }
    }
}

/// Access gate service
#[derive(Clone)]
pub struct AccessGateService<S> {
    inner: S,
    gate: Arc<AccessGate>,
}

impl<S> Service<Request<Body>> for AccessGateService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let gate = Arc::clone(&self.gate);
        // Take the service that was driven to readiness, leave a fresh clone behind
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let direct_ip = req
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ci| ci.0.ip().to_canonical())
                .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));

            let client_ip = determine_real_ip(&req, direct_ip, &gate.proxies).to_canonical();

            if let Err(denied) = gate.admit(client_ip).await {
                warn!(
                    client_ip = %client_ip,
                    method = %req.method(),
                    path = req.uri().path(),
                    "Rejected request from blacklisted IP"
                );
                return Ok(denied.into_response());
            }

            req.extensions_mut().insert(ClientIp(client_ip));
            inner.call(req).await
        })
    }
}

/// Determine the real client IP based on trusted proxy configuration
fn determine_real_ip(
    req: &Request<Body>,
    direct_ip: IpAddr,
    config: &TrustedProxyConfig,
) -> IpAddr {
    if !config.trusted_proxies.contains(&direct_ip) || config.real_ip_header.is_empty() {
        if req.headers().contains_key("x-forwarded-for") && !config.trusted_proxies.is_empty() {
            warn!(
                direct_ip = %direct_ip,
                "Ignoring X-Forwarded-For from untrusted source"
            );
        }
        return direct_ip;
    }

    let Some(value) = req
        .headers()
        .get(config.real_ip_header.as_str())
        .and_then(|v| v.to_str().ok())
    else {
        return direct_ip;
    };

    let candidate = if config.real_ip_header.eq_ignore_ascii_case("x-forwarded-for") {
        // client, proxy1, proxy2: take the Nth from the right
        let ips: Vec<&str> = value.split(',').map(|s| s.trim()).collect();
        let index = ips.len().saturating_sub(config.proxy_count + 1);
        ips.get(index).copied()
    } else {
        Some(value.trim())
    };

    match candidate.and_then(|s| s.parse::<IpAddr>().ok()) {
        Some(ip) => {
            debug!(
                header = config.real_ip_header,
                value = value,
                extracted_ip = %ip,
                "Extracted client IP from header"
            );
            ip
        }
        None => direct_ip,
    }
}
