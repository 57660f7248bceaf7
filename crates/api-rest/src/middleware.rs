//! Request middleware: bearer authentication, then rate limiting.
//!
//! Authentication runs first so the rate limiter can key on the
//! authenticated actor rather than a spoofable header; callers that fail
//! authentication never reach a handler. The limit decision is surfaced
//! as 429 with `Retry-After` and `X-RateLimit-Reset` headers.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use care_core::access::Role;

use crate::error::ApiError;
use crate::AppState;

/// Who this request is from, attached as an extension after
/// authentication.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub actor: String,
    pub role: Role,
}

pub async fn require_bearer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let bearer = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    let Some(credential) = bearer.and_then(|b| state.registry.authenticate(b)) else {
        return ApiError::Unauthorized.into_response();
    };

    req.extensions_mut().insert(AuthContext {
        actor: credential.actor.clone(),
        role: credential.role,
    });
    next.run(req).await
}

pub async fn rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let identifier = req
        .extensions()
        .get::<AuthContext>()
        .map(|ctx| ctx.actor.clone())
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|info| info.0.ip().to_string())
        })
        .unwrap_or_else(|| "unidentified".to_owned());

    let decision = state.limiter.check(&identifier, state.quota);
    if decision.is_limited {
        tracing::warn!(identifier, "request rate limited");
        return ApiError::RateLimited {
            retry_after_secs: decision.retry_after_secs(state.clock.now()),
            reset_at: decision.reset_at,
        }
        .into_response();
    }
    next.run(req).await
}
