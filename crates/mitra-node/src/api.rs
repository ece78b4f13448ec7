// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MITRA - REST API
//
// warp routes over the TransactionCoordinator. Every /api route resolves
// the caller through the AuthGate first; core calls run on the blocking
// pool so a dropped connection never interrupts a commit.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::convert::Infallible;
use std::sync::Arc;

use mitra_core::{
    ApplyOutcome, LedgerError, ProfileUpdate, Receipt, RewardAction, TransactionCoordinator,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, warn};
use warp::http::StatusCode;
use warp::reply::{Json, WithStatus};
use warp::Filter;

use crate::auth::{filters::authenticated, AuthGate, Identity};
use crate::metrics::MitraMetrics;
use crate::rate_limiter::{self, RateLimiter};

/// Largest accepted JSON body.
const MAX_BODY_BYTES: u64 = 16 * 1024;

/// Core error carried through warp's rejection machinery.
#[derive(Debug)]
pub struct ApiRejection(pub LedgerError);

impl warp::reject::Reject for ApiRejection {}

/// Everything the routes share.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: TransactionCoordinator,
    pub gate: Arc<dyn AuthGate>,
    pub metrics: Arc<MitraMetrics>,
    pub limiter: RateLimiter,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ApplySchemeRequest {
    pub scheme_id: String,
    pub scheme_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RedeemRequest {
    pub perk_id: String,
    pub price: u64,
}

/// Either a named action (`{action}`) or a free-form grant (`{amount, reason}`).
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RewardRequest {
    pub action: Option<String>,
    pub amount: Option<u64>,
    pub reason: Option<String>,
}

/// Create a JSON API reply whose HTTP status follows the body's `code`.
///
/// - `"code": N` → N
/// - `"status": "error"` without code → 400
/// - otherwise → 200
fn api_json(body: Value) -> WithStatus<Json> {
    let code = body
        .get("code")
        .and_then(|c| c.as_u64())
        .map(|c| c as u16)
        .unwrap_or_else(|| {
            if body.get("status").and_then(|s| s.as_str()) == Some("error") {
                400
            } else {
                200
            }
        });
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    warp::reply::with_status(warp::reply::json(&body), status)
}

pub fn status_for(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        LedgerError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        LedgerError::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
        LedgerError::Contention { .. } => StatusCode::CONFLICT,
        LedgerError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn error_body(code: StatusCode, kind: &str, msg: impl Into<String>) -> Value {
    json!({
        "status": "error",
        "code": code.as_u16(),
        "error": kind,
        "msg": msg.into(),
    })
}

fn error_reply(err: &LedgerError) -> WithStatus<Json> {
    let status = status_for(err);
    match err {
        LedgerError::StoreUnavailable(_) => error!(error = %err, "store failure"),
        LedgerError::Contention { .. } => warn!(error = %err, "request gave up under contention"),
        _ => debug!(error = %err, "request rejected"),
    }
    let mut body = error_body(status, err.kind(), err.to_string());
    match err {
        LedgerError::InsufficientFunds { balance, requested } => {
            body["balance"] = json!(balance);
            body["requested"] = json!(requested);
        }
        LedgerError::Contention { .. } => body["retryable"] = json!(true),
        _ => {}
    }
    api_json(body)
}

/// Run a core call on the blocking pool.
async fn run_blocking<T, F>(f: F) -> Result<T, LedgerError>
where
    F: FnOnce() -> Result<T, LedgerError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| LedgerError::store(format!("worker task failed: {}", e)))?
}

fn respond<T>(
    state: &AppState,
    result: Result<Receipt<T>, LedgerError>,
    render: impl FnOnce(Receipt<T>) -> Value,
) -> WithStatus<Json> {
    match result {
        Ok(receipt) => {
            state.metrics.record_conflicts(receipt.conflicts());
            api_json(render(receipt))
        }
        Err(e) => {
            state.metrics.record_failure(&e);
            error_reply(&e)
        }
    }
}

fn with_state<T: Clone + Send>(
    state: T,
) -> impl Filter<Extract = (T,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn json_body<T: serde::de::DeserializeOwned + Send>(
) -> impl Filter<Extract = (T,), Error = warp::Rejection> + Clone {
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

// ─────────────────────────────────────────────────────────────────
// HANDLERS
// ─────────────────────────────────────────────────────────────────

async fn get_account(identity: Identity, state: AppState) -> Result<WithStatus<Json>, Infallible> {
    let coord = state.coordinator.clone();
    let result = run_blocking(move || coord.account(identity.subject())).await;
    Ok(respond(&state, result, |r| {
        json!({ "status": "success", "account": r.account.view() })
    }))
}

async fn update_profile(
    identity: Identity,
    state: AppState,
    update: ProfileUpdate,
) -> Result<WithStatus<Json>, Infallible> {
    let coord = state.coordinator.clone();
    let result = run_blocking(move || coord.update_profile(identity.subject(), &update)).await;
    Ok(respond(&state, result, |r| {
        json!({ "status": "success", "changed": r.outcome, "account": r.account.view() })
    }))
}

async fn verify_account(
    identity: Identity,
    state: AppState,
) -> Result<WithStatus<Json>, Infallible> {
    let coord = state.coordinator.clone();
    let result = run_blocking(move || coord.verify_account(identity.subject())).await;
    Ok(respond(&state, result, |r| {
        json!({ "status": "success", "verification": r.outcome })
    }))
}

async fn apply_scheme(
    identity: Identity,
    state: AppState,
    req: ApplySchemeRequest,
) -> Result<WithStatus<Json>, Infallible> {
    let coord = state.coordinator.clone();
    let result = run_blocking(move || {
        coord.apply_scheme(identity.subject(), &req.scheme_id, &req.scheme_name)
    })
    .await;

    let metrics = state.metrics.clone();
    Ok(respond(&state, result, |r| {
        match &r.outcome {
            ApplyOutcome::Applied { reward, .. } => {
                metrics.schemes_applied_total.inc();
                metrics.tokens_rewarded_total.inc_by(*reward);
            }
            ApplyOutcome::AlreadyApplied => metrics.schemes_duplicate_total.inc(),
        }
        json!({ "status": "success", "outcome": r.outcome, "account": r.account.view() })
    }))
}

async fn reward_tokens(
    identity: Identity,
    state: AppState,
    req: RewardRequest,
) -> Result<WithStatus<Json>, Infallible> {
    let coord = state.coordinator.clone();
    let result = run_blocking(move || match (req.action, req.amount, req.reason) {
        (Some(action), None, None) => {
            let action: RewardAction = action.parse()?;
            coord.reward_action(identity.subject(), action)
        }
        (None, Some(amount), Some(reason)) => {
            coord.reward_tokens(identity.subject(), amount, &reason)
        }
        _ => Err(LedgerError::invalid(
            "expected either {action} or {amount, reason}",
        )),
    })
    .await;

    let metrics = state.metrics.clone();
    Ok(respond(&state, result, |r| {
        metrics.rewards_total.inc();
        metrics.tokens_rewarded_total.inc_by(r.outcome.amount);
        json!({ "status": "success", "reward": r.outcome, "account": r.account.view() })
    }))
}

async fn redeem_perk(
    identity: Identity,
    state: AppState,
    req: RedeemRequest,
) -> Result<WithStatus<Json>, Infallible> {
    let coord = state.coordinator.clone();
    let result =
        run_blocking(move || coord.redeem_perk(identity.subject(), &req.perk_id, req.price)).await;

    let metrics = state.metrics.clone();
    Ok(respond(&state, result, |r| {
        if r.outcome.price > 0 {
            metrics.perks_redeemed_total.inc();
            metrics.tokens_redeemed_total.inc_by(r.outcome.price);
        }
        json!({ "status": "success", "redemption": r.outcome, "account": r.account.view() })
    }))
}

async fn health(state: AppState) -> Result<WithStatus<Json>, Infallible> {
    let store = state.coordinator.store().clone();
    let body = match run_blocking(move || store.account_count()).await {
        Ok(accounts) => json!({
            "status": "ok",
            "service": "mitra-node",
            "version": env!("CARGO_PKG_VERSION"),
            "accounts": accounts,
        }),
        Err(e) => error_body(StatusCode::SERVICE_UNAVAILABLE, e.kind(), e.to_string()),
    };
    Ok(api_json(body))
}

async fn export_metrics(state: AppState) -> Result<impl warp::Reply, Infallible> {
    let store = state.coordinator.store().clone();
    if let Ok(count) = run_blocking(move || store.account_count()).await {
        state.metrics.accounts.set(count as i64);
    }
    let reply = match state.metrics.export() {
        Ok(output) => warp::reply::with_header(output, "Content-Type", "text/plain; version=0.0.4"),
        Err(e) => warp::reply::with_header(
            format!("# Error exporting metrics: {}", e),
            "Content-Type",
            "text/plain",
        ),
    };
    Ok(reply)
}

// ─────────────────────────────────────────────────────────────────
// ROUTES
// ─────────────────────────────────────────────────────────────────

/// Full route tree: rate limit, routes, rejection handling, CORS, request log.
pub fn routes(
    state: AppState,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let authed = authenticated(state.gate.clone());

    let health_route = warp::path!("health")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(health);

    let account_route = warp::path!("api" / "account")
        .and(warp::get())
        .and(authed.clone())
        .and(with_state(state.clone()))
        .and_then(get_account);

    let profile_route = warp::path!("api" / "account" / "profile")
        .and(warp::put())
        .and(authed.clone())
        .and(with_state(state.clone()))
        .and(json_body::<ProfileUpdate>())
        .and_then(update_profile);

    let verify_route = warp::path!("api" / "account" / "verify")
        .and(warp::get())
        .and(authed.clone())
        .and(with_state(state.clone()))
        .and_then(verify_account);

    let apply_route = warp::path!("api" / "schemes" / "apply")
        .and(warp::post())
        .and(authed.clone())
        .and(with_state(state.clone()))
        .and(json_body::<ApplySchemeRequest>())
        .and_then(apply_scheme);

    let reward_route = warp::path!("api" / "tokens" / "reward")
        .and(warp::post())
        .and(authed.clone())
        .and(with_state(state.clone()))
        .and(json_body::<RewardRequest>())
        .and_then(reward_tokens);

    let redeem_route = warp::path!("api" / "perks" / "redeem")
        .and(warp::post())
        .and(authed)
        .and(with_state(state.clone()))
        .and(json_body::<RedeemRequest>())
        .and_then(redeem_perk);

    let metrics_route = warp::path!("metrics")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(export_metrics);

    let api = health_route
        .or(account_route)
        .or(profile_route)
        .or(verify_route)
        .or(apply_route)
        .or(reward_route)
        .or(redeem_route)
        .or(metrics_route);

    let cors = if state.cors_origins.is_empty() {
        warp::cors().allow_any_origin()
    } else {
        warp::cors().allow_origins(state.cors_origins.iter().map(String::as_str))
    }
    .allow_methods(vec!["GET", "POST", "PUT", "OPTIONS"])
    .allow_headers(vec!["Content-Type", "Authorization", "Accept"]);

    let request_metrics = state.metrics.clone();
    let request_log = warp::log::custom(move |info| {
        request_metrics.api_requests_total.inc();
        request_metrics
            .api_request_duration_seconds
            .observe(info.elapsed().as_secs_f64());
        debug!(
            method = %info.method(),
            path = info.path(),
            status = info.status().as_u16(),
            elapsed_ms = info.elapsed().as_millis() as u64,
            "request"
        );
    });

    let rejection_metrics = state.metrics.clone();
    rate_limiter::filters::rate_limit(state.limiter.clone())
        .and(api)
        .recover(move |err: warp::Rejection| handle_rejection(err, rejection_metrics.clone()))
        .with(cors)
        .with(request_log)
}

async fn handle_rejection(
    err: warp::Rejection,
    metrics: Arc<MitraMetrics>,
) -> Result<WithStatus<Json>, Infallible> {
    if let Some(ApiRejection(e)) = err.find() {
        metrics.api_errors_total.inc();
        return Ok(error_reply(e));
    }

    metrics.api_errors_total.inc();
    let body = if let Some(rate_limiter::filters::RateLimitExceeded { ip }) = err.find() {
        metrics.rate_limit_rejections_total.inc();
        let mut body = error_body(
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limited",
            "Rate limit exceeded. Please slow down your requests.",
        );
        body["ip"] = json!(ip.to_string());
        body
    } else if err.is_not_found() {
        error_body(StatusCode::NOT_FOUND, "not_found", "Endpoint not found")
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        error_body(
            StatusCode::BAD_REQUEST,
            "invalid_argument",
            format!("Invalid request body: {}", e),
        )
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        error_body(
            StatusCode::PAYLOAD_TOO_LARGE,
            "invalid_argument",
            "Request body too large",
        )
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        error_body(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "invalid_argument",
            "Expected application/json",
        )
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        error_body(
            StatusCode::METHOD_NOT_ALLOWED,
            "method_not_allowed",
            "Method not allowed",
        )
    } else {
        warn!(rejection = ?err, "unhandled rejection");
        error_body(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            "Internal server error",
        )
    };
    Ok(api_json(body))
}
