use axum::{
    http::{header::WWW_AUTHENTICATE, StatusCode},
    response::{IntoResponse, Response},
};

use crate::store::StoreError;

pub const BASIC_CHALLENGE: &str = r#"Basic realm="Restricted""#;

/// Per-request failures. Bodies are plain text; backend detail is logged,
/// never returned.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("IP address is required")]
    MissingIp,

    #[error("Invalid IP address format")]
    InvalidIp,

    #[error("Failed to parse body data")]
    MalformedBody,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{message}")]
    Backend {
        message: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("Method not allowed")]
    MethodNotAllowed,
}

impl ApiError {
    pub fn backend(message: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| ApiError::Backend { message, source }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingIp | ApiError::InvalidIp | ApiError::MalformedBody => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Backend { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Unauthorized => {
                return (
                    self.status(),
                    [(WWW_AUTHENTICATE, BASIC_CHALLENGE)],
                    self.to_string(),
                )
                    .into_response();
            }
            ApiError::Backend { source, .. } => {
                tracing::error!(error = %source, "internal error");
            }
            _ => {}
        }
        (self.status(), self.to_string()).into_response()
    }
}
