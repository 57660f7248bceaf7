//! HTTP mapping for domain errors.
//!
//! Every failure leaves the server as a JSON [`ErrorRes`] body. Blocked
//! operations carry their human-readable reason; token-state failures
//! carry only the status word, the same for a token that never existed
//! and one that was purged.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};

use api_shared::dto::ErrorRes;
use care_core::portal::TokenStatus;
use care_core::CareError;

#[derive(Debug)]
pub enum ApiError {
    /// Missing or unrecognised bearer credential.
    Unauthorized,
    /// Capability or consent precondition failed; carries the reason.
    Blocked(String),
    /// Unknown case.
    NotFound,
    /// Malformed request input.
    BadRequest(String),
    /// Token is not usable; says which way, nothing more.
    TokenState(TokenStatus),
    /// Caller exceeded its request budget.
    RateLimited {
        retry_after_secs: i64,
        reset_at: DateTime<Utc>,
    },
    /// Store or audit failure. Details stay in the log.
    Internal,
}

impl From<CareError> for ApiError {
    fn from(err: CareError) -> Self {
        match err {
            CareError::Blocked(reason) => ApiError::Blocked(reason),
            CareError::CaseNotFound(_) => ApiError::NotFound,
            CareError::TokenInvalid => ApiError::TokenState(TokenStatus::Invalid),
            CareError::TokenExpired => ApiError::TokenState(TokenStatus::Expired),
            CareError::TokenRevoked => ApiError::TokenState(TokenStatus::Revoked),
            CareError::InvalidInput(msg) => ApiError::BadRequest(msg),
            CareError::Store(_) | CareError::AuditAppend(_) => {
                tracing::error!("internal error: {err}");
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(ErrorRes::new("unauthorized")),
            )
                .into_response(),
            ApiError::Blocked(reason) => (
                StatusCode::FORBIDDEN,
                Json(ErrorRes::with_reason("blocked", reason)),
            )
                .into_response(),
            ApiError::NotFound => {
                (StatusCode::NOT_FOUND, Json(ErrorRes::new("not_found"))).into_response()
            }
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                Json(ErrorRes::with_reason("invalid_request", msg)),
            )
                .into_response(),
            ApiError::TokenState(status) => {
                let code = match status {
                    TokenStatus::Invalid => StatusCode::NOT_FOUND,
                    _ => StatusCode::GONE,
                };
                (code, Json(ErrorRes::new(status.as_wire()))).into_response()
            }
            ApiError::RateLimited {
                retry_after_secs,
                reset_at,
            } => (
                StatusCode::TOO_MANY_REQUESTS,
                [
                    (header::RETRY_AFTER, retry_after_secs.to_string()),
                    (
                        header::HeaderName::from_static("x-ratelimit-reset"),
                        reset_at.timestamp().to_string(),
                    ),
                ],
                Json(ErrorRes::with_reason("rate_limited", "Too many requests")),
            )
                .into_response(),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorRes::new("internal")),
            )
                .into_response(),
        }
    }
}
