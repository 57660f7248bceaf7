//! # API REST
//!
//! REST surface for the care-gate portal.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - Bearer authentication and rate limiting as middleware
//! - OpenAPI/Swagger documentation
//!
//! Uses `api-shared` for DTOs and the credential registry, `care-core`
//! for every access decision.

#![warn(rust_2018_idioms)]

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use api_shared::auth::CredentialRegistry;
use api_shared::dto;
use care_core::clock::Clock;
use care_core::portal::{PortalService, PortalStore};
use care_core::ratelimit::{RateLimiter, RateQuota};
use care_core::CoreConfig;

pub mod error;
pub mod handlers;
pub mod middleware;

/// Shared state for every request handler and middleware layer.
#[derive(Clone)]
pub struct AppState {
    pub portal: Arc<PortalService>,
    pub store: Arc<dyn PortalStore>,
    pub registry: Arc<CredentialRegistry>,
    pub limiter: Arc<RateLimiter>,
    pub quota: RateQuota,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(
        config: CoreConfig,
        clock: Arc<dyn Clock>,
        store: Arc<dyn PortalStore>,
        registry: Arc<CredentialRegistry>,
    ) -> Self {
        let quota = config.rate_quota();
        let limiter = Arc::new(RateLimiter::new(clock.clone()));
        let portal = Arc::new(PortalService::new(config, clock.clone(), store.clone()));
        Self {
            portal,
            store,
            registry,
            limiter,
            quota,
            clock,
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::share,
        handlers::validate,
        handlers::view,
        handlers::revoke,
        handlers::consent_revoke,
        handlers::fax,
        handlers::audit,
        handlers::provider_note,
    ),
    components(schemas(
        dto::HealthRes,
        dto::ShareReq,
        dto::ShareRes,
        dto::ScopeDto,
        dto::ValidateRes,
        dto::ViewRes,
        dto::RevokeReq,
        dto::OkRes,
        dto::ConsentRevokeReq,
        dto::ConsentRevokeRes,
        dto::FaxReq,
        dto::FaxRes,
        dto::ProviderNoteReq,
        dto::AuditEventDto,
        dto::AuditRes,
        dto::ErrorRes,
    ))
)]
pub struct ApiDoc;

/// Build the full application router.
///
/// `/health` and the Swagger UI are open; everything under `/api` goes
/// through bearer authentication and then the rate limiter, keyed by the
/// authenticated actor.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/api/portal/share", post(handlers::share))
        .route("/api/portal/validate", get(handlers::validate))
        .route("/api/portal/view", get(handlers::view))
        .route("/api/portal/revoke", post(handlers::revoke))
        .route("/api/consent/revoke", post(handlers::consent_revoke))
        .route("/api/portal/fax", post(handlers::fax))
        .route("/api/portal/audit", get(handlers::audit))
        .route("/api/portal/provider-note", post(handlers::provider_note))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_bearer,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(api)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
