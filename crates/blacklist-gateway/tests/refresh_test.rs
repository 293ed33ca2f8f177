//! Refresh ordering and scheduler timing tests.
//!
//! Scheduler tests run on a paused clock so interval spacing can be
//! observed exactly.

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::connect_info::MockConnectInfo,
    http::{header, Request, StatusCode},
};
use blacklist_gateway::{
    AttackRecord, BlacklistCache, BlacklistGatewayService, GatewayConfig, InMemoryLedger,
    IntervalControl, LedgerError, LedgerGateway, RefreshOutcome, RefreshScheduler,
    SchedulerState,
};
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

/// First `list` call blocks until released and returns the old view;
/// later calls return the new view immediately.
struct GatedLedger {
    calls: AtomicUsize,
    release: Notify,
}

#[async_trait]
impl LedgerGateway for GatedLedger {
    async fn list(&self) -> Result<Vec<AttackRecord>, LedgerError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            self.release.notified().await;
            Ok(vec![AttackRecord::new("8.8.8.8", "DoS", 0)])
        } else {
            Ok(vec![AttackRecord::new("9.9.9.9", "DoS", 0)])
        }
    }
    async fn append(&self, _: &str, _: &str) -> Result<(), LedgerError> {
        Err(LedgerError::Rejected("read only".into()))
    }
    async fn refresh_from_source(&self) -> Result<(), LedgerError> {
        Ok(())
    }
    async fn clear_all(&self) -> Result<(), LedgerError> {
        Err(LedgerError::Rejected("read only".into()))
    }
    async fn delete(&self, _: u64) -> Result<bool, LedgerError> {
        Err(LedgerError::Rejected("read only".into()))
    }
}

#[tokio::test]
async fn test_late_stale_refresh_never_overwrites_newer() {
    // Arrange: refresh A starts first and stalls inside the ledger read
    let ledger = Arc::new(GatedLedger {
        calls: AtomicUsize::new(0),
        release: Notify::new(),
    });
    let cache = Arc::new(BlacklistCache::new());

    let stale = {
        let cache = Arc::clone(&cache);
        let ledger = Arc::clone(&ledger);
        tokio::spawn(async move { cache.refresh(ledger.as_ref()).await })
    };
    while ledger.calls.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }

    // Act: refresh B starts later and completes first
    let fresh = cache.refresh(ledger.as_ref()).await.unwrap();
    ledger.release.notify_one();
    let stale = stale.await.unwrap().unwrap();

    // Assert
    assert_eq!(fresh, RefreshOutcome::Installed(1));
    assert_eq!(stale, RefreshOutcome::Superseded);
    assert!(cache.contains(&ip("9.9.9.9")));
    assert!(!cache.contains(&ip("8.8.8.8")));
}

fn start(
    ledger: &Arc<InMemoryLedger>,
    control: &IntervalControl,
    token: &CancellationToken,
) -> (tokio::task::JoinHandle<()>, Arc<blacklist_gateway::SchedulerStats>) {
    let scheduler = RefreshScheduler::new(
        ledger.clone(),
        Arc::new(BlacklistCache::new()),
        control,
        token.clone(),
    );
    let stats = scheduler.stats();
    (scheduler.spawn(), stats)
}

#[tokio::test(start_paused = true)]
async fn test_new_interval_changes_refresh_spacing() {
    let ledger = Arc::new(InMemoryLedger::new());
    let control = IntervalControl::new(10);
    let token = CancellationToken::new();
    let (handle, _stats) = start(&ledger, &control, &token);

    // First cycle runs immediately, the next one 10s later
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(ledger.resync_count(), 1);
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(ledger.resync_count(), 2);

    // Switch to 3s while waiting: subsequent cycles are 3s apart
    control.set(3).unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(ledger.resync_count(), 3);
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(ledger.resync_count(), 4);

    token.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_interval_change_does_not_force_a_cycle() {
    let ledger = Arc::new(InMemoryLedger::new());
    let control = IntervalControl::new(30);
    let token = CancellationToken::new();
    let (handle, _stats) = start(&ledger, &control, &token);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(ledger.resync_count(), 1);

    // Lengthening the wait keeps the original start point
    control.set(60).unwrap();
    tokio::time::sleep(Duration::from_secs(40)).await;
    assert_eq!(ledger.resync_count(), 1);
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(ledger.resync_count(), 2);

    token.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_already_elapsed_interval_runs_next_cycle_at_once() {
    let ledger = Arc::new(InMemoryLedger::new());
    let control = IntervalControl::new(60);
    let token = CancellationToken::new();
    let (handle, _stats) = start(&ledger, &control, &token);

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(ledger.resync_count(), 1);

    control.set(10).unwrap();
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(ledger.resync_count(), 2);

    token.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_scheduler() {
    let ledger = Arc::new(InMemoryLedger::new());
    let control = IntervalControl::new(30);
    let token = CancellationToken::new();
    let (handle, stats) = start(&ledger, &control, &token);

    tokio::time::sleep(Duration::from_secs(1)).await;
    token.cancel();
    handle.await.unwrap();

    assert_eq!(stats.state(), SchedulerState::Stopped);
    let cycles = stats.cycles();

    // No further cycles once stopped
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(stats.cycles(), cycles);
    assert_eq!(ledger.resync_count(), 1);
}

/// Ledger whose first `refresh_from_source` calls fail
struct FailingResync {
    inner: InMemoryLedger,
    failures_left: AtomicUsize,
}

#[async_trait]
impl LedgerGateway for FailingResync {
    async fn list(&self) -> Result<Vec<AttackRecord>, LedgerError> {
        self.inner.list().await
    }
    async fn append(&self, ip: &str, attack_type: &str) -> Result<(), LedgerError> {
        self.inner.append(ip, attack_type).await
    }
    async fn refresh_from_source(&self) -> Result<(), LedgerError> {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(LedgerError::Unavailable("node offline".into()));
        }
        self.inner.refresh_from_source().await
    }
    async fn clear_all(&self) -> Result<(), LedgerError> {
        self.inner.clear_all().await
    }
    async fn delete(&self, index: u64) -> Result<bool, LedgerError> {
        self.inner.delete(index).await
    }
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_keeps_running_after_failed_cycle() {
    // Arrange: the first resync fails, later ones succeed
    let ledger = Arc::new(FailingResync {
        inner: InMemoryLedger::with_records([("6.6.6.6", "DoS")]),
        failures_left: AtomicUsize::new(1),
    });
    let cache = Arc::new(BlacklistCache::new());
    let control = IntervalControl::new(5);
    let token = CancellationToken::new();
    let scheduler = RefreshScheduler::new(ledger.clone(), Arc::clone(&cache), &control, token.clone());
    let stats = scheduler.stats();
    let handle = scheduler.spawn();

    // Act / Assert: first cycle fails and leaves the cache untouched
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(stats.cycles(), 1);
    assert_eq!(stats.failures(), 1);
    assert!(cache.is_empty());
    assert_eq!(stats.state(), SchedulerState::Waiting);

    // Later cycles run on schedule and populate the cache
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(stats.cycles(), 3);
    assert_eq!(stats.failures(), 1);
    assert_eq!(ledger.inner.resync_count(), 2);
    assert!(cache.contains(&ip("6.6.6.6")));

    token.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_huge_interval_over_http_leaves_scheduler_running() {
    // Arrange: a scheduler sharing the service's interval and cache
    let ledger = Arc::new(InMemoryLedger::new());
    let token = CancellationToken::new();
    let service =
        BlacklistGatewayService::new(GatewayConfig::default(), ledger.clone(), token.clone())
            .unwrap();
    let scheduler = RefreshScheduler::new(
        ledger.clone(),
        service.cache(),
        &service.interval(),
        token.clone(),
    );
    let stats = scheduler.stats();
    let handle = scheduler.spawn();
    let app = service
        .router()
        .layer(MockConnectInfo(SocketAddr::from(([10, 0, 0, 1], 40000))));

    let set_interval = |body: String| {
        Request::builder()
            .method("POST")
            .uri("/blacklist/set-interval")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    };

    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(ledger.resync_count(), 1);

    // Act
    let response = app
        .clone()
        .oneshot(set_interval(format!(r#"{{"interval": {}}}"#, i64::MAX)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(service.interval().current(), 30);

    let response = app
        .oneshot(set_interval(r#"{"interval": 1}"#.to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    tokio::time::sleep(Duration::from_secs(5)).await;

    // Assert
    assert!(ledger.resync_count() >= 5);
    assert_eq!(stats.failures(), 0);
    assert!(!handle.is_finished());

    token.cancel();
    handle.await.unwrap();
}
