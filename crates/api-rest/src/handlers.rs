//! Handlers for the portal endpoints.
//!
//! Handlers validate identifiers, call into `care-core` and translate
//! domain results to wire DTOs. No access decision lives here.

use axum::extract::{Extension, Query, State};
use axum::response::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::IntoParams;

use api_shared::dto::{
    AuditEventDto, AuditRes, ConsentRevokeReq, ConsentRevokeRes, FaxReq, FaxRes, HealthRes, OkRes,
    ProviderNoteReq, RevokeReq, ScopeDto, ShareReq, ShareRes, ValidateRes, ViewRes,
};
use api_shared::HealthService;
use care_core::audit::{AuditAction, AuditQuery};
use care_types::{CaseId, FaxNumber, IdError, ProviderId};

use crate::error::ApiError;
use crate::middleware::AuthContext;
use crate::AppState;

fn bad_id(field: &str) -> impl Fn(IdError) -> ApiError + '_ {
    move |err| ApiError::BadRequest(format!("{field}: {err}"))
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint, open to load balancers and monitors.
#[axum::debug_handler]
pub async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    post,
    path = "/api/portal/share",
    request_body = ShareReq,
    responses(
        (status = 200, description = "Share token issued", body = ShareRes),
        (status = 400, description = "Malformed identifiers"),
        (status = 403, description = "Caller role or client consent blocks sharing"),
        (status = 404, description = "Unknown case"),
        (status = 429, description = "Too many requests")
    )
)]
/// Issue a time-boxed share token for an external provider.
///
/// The returned URL is relative and carries only the opaque token.
#[axum::debug_handler]
pub async fn share(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<ShareReq>,
) -> Result<Json<ShareRes>, ApiError> {
    let case_id: CaseId = req.case_id.parse().map_err(bad_id("caseId"))?;
    let provider_id: ProviderId = req.provider_id.parse().map_err(bad_id("providerId"))?;

    let grant = state.portal.create_share(
        &auth.actor,
        auth.role,
        &case_id,
        &provider_id,
        req.ttl_hours,
        req.redacted,
    )?;
    Ok(Json(ShareRes {
        ok: true,
        token: grant.token,
        expires_at: grant.expires_at,
        url: grant.url,
    }))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct TokenParams {
    /// The opaque share token.
    pub token: String,
}

#[utoipa::path(
    get,
    path = "/api/portal/validate",
    params(TokenParams),
    responses(
        (status = 200, description = "Token status", body = ValidateRes),
        (status = 429, description = "Too many requests")
    )
)]
/// Resolve a token to ACTIVE, EXPIRED, REVOKED or INVALID.
#[axum::debug_handler]
pub async fn validate(
    State(state): State<AppState>,
    Query(params): Query<TokenParams>,
) -> Result<Json<ValidateRes>, ApiError> {
    let validation = state.portal.validate(&params.token)?;
    Ok(Json(ValidateRes {
        ok: true,
        status: validation.status.as_wire().to_owned(),
        expires_at: validation.expires_at,
        scope: validation.scope.map(|scope| ScopeDto {
            redacted: scope.redacted,
        }),
    }))
}

#[utoipa::path(
    get,
    path = "/api/portal/view",
    params(TokenParams),
    responses(
        (status = 200, description = "Frozen share payload", body = ViewRes),
        (status = 404, description = "Unknown token"),
        (status = 410, description = "Token expired or revoked"),
        (status = 429, description = "Too many requests")
    )
)]
/// Return the payload frozen into an active token at issuance.
#[axum::debug_handler]
pub async fn view(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(params): Query<TokenParams>,
) -> Result<Json<ViewRes>, ApiError> {
    let payload = state.portal.view(&auth.actor, &params.token)?;
    Ok(Json(ViewRes {
        ok: true,
        case_id: payload.case_id.to_string(),
        client_label: payload.client_label,
        redacted: payload.redacted,
        summary: payload.summary,
        attachments: payload.attachments,
    }))
}

#[utoipa::path(
    post,
    path = "/api/portal/revoke",
    request_body = RevokeReq,
    responses(
        (status = 200, description = "Token revoked (idempotent)", body = OkRes),
        (status = 404, description = "Unknown token"),
        (status = 429, description = "Too many requests")
    )
)]
/// Revoke a single token. Safe to repeat.
#[axum::debug_handler]
pub async fn revoke(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<RevokeReq>,
) -> Result<Json<OkRes>, ApiError> {
    state.portal.revoke(&auth.actor, &req.token, &req.reason)?;
    Ok(Json(OkRes { ok: true }))
}

#[utoipa::path(
    post,
    path = "/api/consent/revoke",
    request_body = ConsentRevokeReq,
    responses(
        (status = 200, description = "Consent revoked, tokens cascaded", body = ConsentRevokeRes),
        (status = 400, description = "Malformed case id"),
        (status = 404, description = "Unknown case"),
        (status = 429, description = "Too many requests")
    )
)]
/// Withdraw consent for a case: revokes every outstanding token and
/// moves the case into its hold state, atomically.
#[axum::debug_handler]
pub async fn consent_revoke(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<ConsentRevokeReq>,
) -> Result<Json<ConsentRevokeRes>, ApiError> {
    let case_id: CaseId = req.case_id.parse().map_err(bad_id("caseId"))?;
    let cascade = state
        .portal
        .revoke_all_for_case(&auth.actor, &case_id, &req.reason)?;
    Ok(Json(ConsentRevokeRes {
        ok: true,
        case_status: cascade.case_status.as_wire().to_owned(),
        revoked_tokens: cascade.revoked_tokens,
    }))
}

#[utoipa::path(
    post,
    path = "/api/portal/fax",
    request_body = FaxReq,
    responses(
        (status = 200, description = "Fax job queued", body = FaxRes),
        (status = 400, description = "Malformed identifiers or fax number"),
        (status = 403, description = "Caller role or client consent blocks sharing"),
        (status = 404, description = "Unknown case"),
        (status = 429, description = "Too many requests")
    )
)]
/// Queue a stored document for fax delivery to a provider.
#[axum::debug_handler]
pub async fn fax(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<FaxReq>,
) -> Result<Json<FaxRes>, ApiError> {
    let case_id: CaseId = req.case_id.parse().map_err(bad_id("caseId"))?;
    let provider_id: ProviderId = req.provider_id.parse().map_err(bad_id("providerId"))?;
    let fax_number =
        FaxNumber::new(&req.fax_number).map_err(|err| bad_id("faxNumber")(err))?;

    let job = state.portal.send_fax(
        &auth.actor,
        auth.role,
        &case_id,
        &provider_id,
        &fax_number,
        &req.document_id,
    )?;
    Ok(Json(FaxRes {
        ok: true,
        job_id: job.job_id,
    }))
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct AuditParams {
    pub case_id: Option<String>,
    pub action: Option<String>,
    /// Inclusive lower bound, RFC 3339.
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound, RFC 3339.
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

#[utoipa::path(
    get,
    path = "/api/portal/audit",
    params(AuditParams),
    responses(
        (status = 200, description = "Matching audit events, newest first", body = AuditRes),
        (status = 400, description = "Malformed filter"),
        (status = 429, description = "Too many requests")
    )
)]
/// Query the audit log by case, action and time range.
#[axum::debug_handler]
pub async fn audit(
    State(state): State<AppState>,
    Query(params): Query<AuditParams>,
) -> Result<Json<AuditRes>, ApiError> {
    let case_id = params
        .case_id
        .map(|raw| raw.parse::<CaseId>())
        .transpose()
        .map_err(bad_id("caseId"))?;
    let action = params
        .action
        .map(|raw| raw.parse::<AuditAction>())
        .transpose()
        .map_err(|err| ApiError::BadRequest(err.to_string()))?;

    let events = state.store.query(&AuditQuery {
        case_id,
        action,
        from: params.from,
        to: params.to,
        limit: params.limit,
    })?;
    Ok(Json(AuditRes {
        ok: true,
        events: events.into_iter().map(AuditEventDto::from).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/portal/provider-note",
    request_body = ProviderNoteReq,
    responses(
        (status = 200, description = "Note recorded", body = OkRes),
        (status = 400, description = "Empty or oversized note"),
        (status = 404, description = "Unknown token"),
        (status = 410, description = "Token expired or revoked"),
        (status = 429, description = "Too many requests")
    )
)]
/// Record a note from an external provider against a still-active token.
#[axum::debug_handler]
pub async fn provider_note(
    State(state): State<AppState>,
    Json(req): Json<ProviderNoteReq>,
) -> Result<Json<OkRes>, ApiError> {
    state.portal.add_provider_note(&req.token, &req.note)?;
    Ok(Json(OkRes { ok: true }))
}
