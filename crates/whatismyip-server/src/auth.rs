use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use constant_time_eq::constant_time_eq;

use crate::{error::ApiError, AppState};

/// Validate an `Authorization: Basic <base64(user:pass)>` header against the
/// configured `user:pass` string. The decoded credential is compared whole;
/// it is never split into user and password.
pub fn check_basic(authorization: Option<&str>, expected: &str) -> bool {
    let Some(encoded) = authorization.and_then(|v| v.strip_prefix("Basic ")) else {
        return false;
    };
    match STANDARD.decode(encoded) {
        Ok(decoded) => constant_time_eq(&decoded, expected.as_bytes()),
        Err(_) => false,
    }
}

/// Axum middleware guarding the allowlist management routes.
/// With no `BASIC_AUTH` configured every request is refused.
pub async fn require_basic_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.basic_auth.as_deref() else {
        return ApiError::Unauthorized.into_response();
    };

    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    if check_basic(header, expected) {
        next.run(request).await
    } else {
        ApiError::Unauthorized.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic(creds: &str) -> String {
        format!("Basic {}", STANDARD.encode(creds))
    }

    #[test]
    fn accepts_matching_credentials() {
        assert!(check_basic(Some(&basic("admin:s3cret")), "admin:s3cret"));
    }

    #[test]
    fn rejects_wrong_password() {
        assert!(!check_basic(Some(&basic("admin:nope")), "admin:s3cret"));
    }

    #[test]
    fn compares_whole_decoded_string() {
        // No user/password split: a credential without a colon still works.
        assert!(check_basic(Some(&basic("token-only")), "token-only"));
        assert!(!check_basic(Some(&basic("admin")), "admin:s3cret"));
    }

    #[test]
    fn rejects_missing_header() {
        assert!(!check_basic(None, "admin:s3cret"));
    }

    #[test]
    fn rejects_other_schemes() {
        assert!(!check_basic(Some("Bearer admin:s3cret"), "admin:s3cret"));
        assert!(!check_basic(Some("basic YWRtaW46czNjcmV0"), "admin:s3cret"));
    }

    #[test]
    fn rejects_undecodable_payload() {
        assert!(!check_basic(Some("Basic %%%not-base64%%%"), "admin:s3cret"));
    }
}
