//! Command routing: maps each endpoint onto ledger and interval operations.
//!
//! Handlers own no state beyond request validation. Bodies are taken as raw
//! bytes and parsed here so every malformed input maps onto an `ApiError`
//! with the offending field named.

use crate::cache::BlacklistCache;
use crate::domain::error::{ApiError, ApiResult};
use crate::domain::types::{NewAttack, TEST_ATTACKS};
use crate::middleware::ClientIp;
use crate::ports::outbound::{LedgerError, LedgerGateway};
use crate::scheduler::IntervalControl;
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, Path, State},
    response::Html,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use serde_json::{json, Value};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Embedded front-end document served at `/`
const FRONTEND_HTML: &str = include_str!("../assets/frontend.html");

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<dyn LedgerGateway>,
    pub cache: Arc<BlacklistCache>,
    pub interval: IntervalControl,
}

/// All command routes. A known path hit with the wrong verb is treated like
/// an unknown path.
pub fn command_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(frontend).fallback(endpoint_not_found))
        .route("/blacklist", get(fetch_blacklist).fallback(endpoint_not_found))
        .route("/blacklist/log", post(log_attack).fallback(endpoint_not_found))
        .route("/blacklist/update", post(update_blacklist).fallback(endpoint_not_found))
        .route("/blacklist/clear", post(clear_blacklist).fallback(endpoint_not_found))
        .route("/blacklist/set-interval", post(set_interval).fallback(endpoint_not_found))
        .route("/blacklist/addTestAttacks", post(add_test_attacks).fallback(endpoint_not_found))
        .route("/blacklist/delete/:index", delete(delete_attack).fallback(endpoint_not_found))
        .fallback(endpoint_not_found)
}

async fn frontend() -> Html<&'static str> {
    Html(FRONTEND_HTML)
}

async fn endpoint_not_found() -> ApiError {
    ApiError::endpoint_not_found()
}

async fn fetch_blacklist(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let attacks = state.ledger.list().await.map_err(ledger_failure("list"))?;
    Ok(Json(json!({
        "status": "Blacklist fetched",
        "attacks": attacks,
    })))
}

async fn log_attack(
    State(state): State<AppState>,
    reporter: Option<Extension<ClientIp>>,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<Json<Value>> {
    let attack = parse_new_attack(&read_body(body)?)?;
    let ip = attack.ip.to_string();

    state
        .ledger
        .append(&ip, &attack.attack_type)
        .await
        .map_err(ledger_failure("append"))?;

    info!(
        ip = %ip,
        attack_type = %attack.attack_type,
        reporter = ?reporter.map(|Extension(ClientIp(addr))| addr),
        "Attack logged"
    );
    Ok(Json(json!({ "status": format!("Attack from IP {} logged", ip) })))
}

async fn update_blacklist(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state
        .ledger
        .refresh_from_source()
        .await
        .map_err(ledger_failure("refresh"))?;

    if let Err(e) = state.cache.refresh(state.ledger.as_ref()).await {
        warn!(error = %e, "Cache refresh after manual update failed");
    }

    let attacks = state.ledger.list().await.map_err(ledger_failure("list"))?;
    info!(records = attacks.len(), "Blacklist updated on request");
    Ok(Json(json!({
        "status": "Blacklist updated",
        "attacks": attacks,
    })))
}

async fn clear_blacklist(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state
        .ledger
        .clear_all()
        .await
        .map_err(ledger_failure("clear"))?;

    info!("Blacklist cleared");
    Ok(Json(json!({ "status": "Blacklist cleared" })))
}

async fn set_interval(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<Json<Value>> {
    let requested = parse_interval(&read_body(body)?)?;
    let new_interval = state.interval.set(requested)?;
    Ok(Json(json!({
        "status": "success",
        "new_interval": new_interval,
    })))
}

async fn add_test_attacks(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    for (ip, attack_type) in TEST_ATTACKS {
        state
            .ledger
            .append(ip, attack_type)
            .await
            .map_err(ledger_failure("append"))?;
    }

    info!(count = TEST_ATTACKS.len(), "Test attacks added");
    Ok(Json(json!({ "message": "Test attacks added successfully" })))
}

async fn delete_attack(
    State(state): State<AppState>,
    Path(raw_index): Path<String>,
) -> ApiResult<Json<Value>> {
    let index = parse_index(&raw_index)?;

    let removed = state
        .ledger
        .delete(index)
        .await
        .map_err(ledger_failure("delete"))?;

    if !removed {
        return Err(ApiError::record_not_found(index));
    }

    info!(index = index, "Attack deleted");
    Ok(Json(json!({ "message": format!("Attack at index {} deleted", index) })))
}

/// Map a ledger error onto the generic caller error, logging the detail
fn ledger_failure(operation: &'static str) -> impl FnOnce(LedgerError) -> ApiError {
    move |e| {
        error!(operation = operation, error = %e, "Ledger operation failed");
        ApiError::ledger_failure()
    }
}

fn read_body(body: Result<Bytes, BytesRejection>) -> ApiResult<Bytes> {
    body.map_err(|rejection| ApiError::invalid_field("body", rejection.body_text()))
}

/// Parse a JSON object body; an empty body is reported as such.
fn parse_object(body: &[u8]) -> ApiResult<serde_json::Map<String, Value>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::empty_body());
    }
    match serde_json::from_slice::<Value>(body)? {
        Value::Object(map) => Ok(map),
        _ => Err(ApiError::invalid_field("body", "expected a JSON object")),
    }
}

fn required_string<'a>(
    map: &'a serde_json::Map<String, Value>,
    field: &str,
) -> ApiResult<&'a str> {
    match map.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim()),
        _ => Err(ApiError::missing_field(field)),
    }
}

fn parse_new_attack(body: &[u8]) -> ApiResult<NewAttack> {
    let map = parse_object(body)?;
    let ip = required_string(&map, "ip")?;
    let attack_type = required_string(&map, "attack_type")?;

    let ip: IpAddr = ip
        .parse()
        .map_err(|_| ApiError::invalid_field("ip", format!("'{}' is not an IP address", ip)))?;

    Ok(NewAttack {
        ip: ip.to_canonical(),
        attack_type: attack_type.to_string(),
    })
}

/// `interval` may be a JSON integer or a string holding one.
fn parse_interval(body: &[u8]) -> ApiResult<i64> {
    let map = parse_object(body)?;
    let not_integer = || ApiError::invalid_field("interval", "must be an integer");

    match map.get("interval") {
        None | Some(Value::Null) => Err(ApiError::missing_field("interval")),
        Some(Value::Number(n)) => n.as_i64().ok_or_else(not_integer),
        Some(Value::String(s)) => s.trim().parse::<i64>().map_err(|_| not_integer()),
        Some(_) => Err(not_integer()),
    }
}

/// Negative indices are well-formed integers that can never exist.
fn parse_index(raw: &str) -> ApiResult<u64> {
    let raw = raw.trim();
    if let Ok(index) = raw.parse::<u64>() {
        return Ok(index);
    }
    match raw.parse::<i64>() {
        Ok(negative) => Err(ApiError::record_not_found(negative)),
        Err(_) => Err(ApiError::invalid_index()),
    }
}
