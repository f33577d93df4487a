use std::net::IpAddr;

use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Request, State},
    http::{header::CONTENT_TYPE, HeaderMap},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use tracing::info;

use crate::{
    access::{decide, Decision},
    client_ip::ClientIp,
    error::ApiError,
    AppState,
};

// ── Health ────────────────────────────────────────────────────────────────────

pub async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

// ── Who am I ──────────────────────────────────────────────────────────────────

pub async fn whoami(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
) -> Result<Decision, ApiError> {
    info!(ip = %ip, "serving IP address");

    let allowed = state
        .store
        .list()
        .await
        .map_err(ApiError::backend("Internal server error"))?;

    let decision = decide(&ip, allowed);
    if !decision.is_granted() {
        info!(ip = %ip, "access denied");
    }
    Ok(decision)
}

// ── List ──────────────────────────────────────────────────────────────────────

pub async fn list_ips(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    let ips = state
        .store
        .list()
        .await
        .map_err(ApiError::backend("Internal server error"))?;
    info!(count = ips.len(), backend = state.store.backend(), "audit: allowlist.list");
    Ok(Json(ips))
}

// ── Add ───────────────────────────────────────────────────────────────────────

/// `ip` comes from the body first (urlencoded or multipart), then the query
/// string. A body that fails to parse is ignored rather than rejected.
pub async fn add_ip(State(state): State<AppState>, request: Request) -> Result<String, ApiError> {
    let query = request.uri().query().map(str::to_owned);

    let from_body = if is_multipart(request.headers()) {
        multipart_value(request, &state).await
    } else {
        Bytes::from_request(request, &state)
            .await
            .ok()
            .and_then(|body| form_value(&body).ok().flatten())
    };
    let from_query = || {
        query
            .as_deref()
            .and_then(|q| form_value(q.as_bytes()).ok().flatten())
    };
    let ip = validate_ip(from_body.or_else(from_query).unwrap_or_default())?;

    state
        .store
        .add(&ip)
        .await
        .map_err(ApiError::backend("Failed to add IP address"))?;

    info!(ip = %ip, backend = state.store.backend(), "audit: allowlist.add");
    Ok(format!("IP address {ip} added successfully"))
}

// ── Remove ────────────────────────────────────────────────────────────────────

/// The body is decoded by hand: DELETE bodies carry the form, and a
/// malformed one is a 400 rather than an empty field.
pub async fn remove_ip(State(state): State<AppState>, body: Bytes) -> Result<String, ApiError> {
    let field = form_value(&body).map_err(|_| ApiError::MalformedBody)?;
    let ip = validate_ip(field.unwrap_or_default())?;

    state
        .store
        .remove(&ip)
        .await
        .map_err(ApiError::backend("Failed to remove IP address"))?;

    info!(ip = %ip, backend = state.store.backend(), "audit: allowlist.remove");
    Ok(format!("IP address {ip} removed successfully"))
}

// ── Fallback ──────────────────────────────────────────────────────────────────

pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

// ── Helpers ───────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct MalformedForm;

/// First `ip` value of an `application/x-www-form-urlencoded` payload.
pub fn form_value(raw: &[u8]) -> Result<Option<String>, MalformedForm> {
    if has_bad_escape(raw) {
        return Err(MalformedForm);
    }
    let pairs: Vec<(String, String)> =
        serde_urlencoded::from_bytes(raw).map_err(|_| MalformedForm)?;
    Ok(pairs.into_iter().find(|(k, _)| k == "ip").map(|(_, v)| v))
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.to_ascii_lowercase().starts_with("multipart/form-data"))
}

/// Text of the first `ip` part of a `multipart/form-data` body.
async fn multipart_value(request: Request, state: &AppState) -> Option<String> {
    let mut multipart = Multipart::from_request(request, state).await.ok()?;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("ip") {
            return field.text().await.ok();
        }
    }
    None
}

/// `%` must be followed by two hex digits.
fn has_bad_escape(raw: &[u8]) -> bool {
    raw.iter().enumerate().any(|(i, &b)| {
        b == b'%'
            && !matches!(
                (raw.get(i + 1), raw.get(i + 2)),
                (Some(h), Some(l)) if h.is_ascii_hexdigit() && l.is_ascii_hexdigit()
            )
    })
}

fn validate_ip(ip: String) -> Result<String, ApiError> {
    if ip.is_empty() {
        return Err(ApiError::MissingIp);
    }
    if ip.parse::<IpAddr>().is_err() {
        return Err(ApiError::InvalidIp);
    }
    Ok(ip)
}
