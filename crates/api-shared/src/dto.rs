//! Wire DTOs for the portal HTTP surface.
//!
//! Field names are camelCase on the wire. Identifier fields travel as
//! plain strings and are validated into `care-types` newtypes at the
//! handler boundary, so a bad id becomes a 400 with a reason rather than
//! a deserialization failure.

use care_core::audit::AuditEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShareReq {
    pub case_id: String,
    pub provider_id: String,
    /// Hours until the link expires; clamped server-side.
    #[serde(default)]
    pub ttl_hours: Option<i64>,
    /// A sensitive case is shared redacted regardless of this flag.
    #[serde(default)]
    pub redacted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShareRes {
    pub ok: bool,
    pub token: String,
    #[schema(value_type = String)]
    pub expires_at: DateTime<Utc>,
    /// Relative URL carrying only the token.
    pub url: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct ScopeDto {
    pub redacted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRes {
    pub ok: bool,
    /// `ACTIVE`, `EXPIRED`, `REVOKED` or `INVALID`.
    pub status: String,
    #[schema(value_type = Option<String>)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<ScopeDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ViewRes {
    pub ok: bool,
    pub case_id: String,
    /// Masked label such as initials; never a real name.
    pub client_label: String,
    pub redacted: bool,
    pub summary: String,
    pub attachments: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RevokeReq {
    pub token: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OkRes {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConsentRevokeReq {
    pub case_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConsentRevokeRes {
    pub ok: bool,
    pub case_status: String,
    pub revoked_tokens: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FaxReq {
    pub case_id: String,
    pub provider_id: String,
    pub fax_number: String,
    pub document_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FaxRes {
    pub ok: bool,
    pub job_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProviderNoteReq {
    pub token: String,
    pub note: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditEventDto {
    pub id: String,
    pub action: String,
    pub actor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[schema(value_type = String)]
    pub at: DateTime<Utc>,
    #[schema(value_type = Object)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl From<AuditEvent> for AuditEventDto {
    fn from(event: AuditEvent) -> Self {
        Self {
            id: event.id.to_string(),
            action: event.action.as_wire().to_owned(),
            actor: event.actor,
            case_id: event.case_id.map(|id| id.to_string()),
            token: event.token,
            at: event.at,
            metadata: event.metadata,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditRes {
    pub ok: bool,
    pub events: Vec<AuditEventDto>,
}

/// Error body shared by every failure response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub ok: bool,
    /// Stable machine-readable error word.
    pub error: String,
    /// Human-readable reason, present for blocked operations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ErrorRes {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: error.into(),
            reason: None,
        }
    }

    pub fn with_reason(error: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: error.into(),
            reason: Some(reason.into()),
        }
    }
}
