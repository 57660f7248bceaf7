//! Share-token issuance, validation and revocation.
//!
//! A share token is the only credential an external provider ever holds:
//! an opaque random string bound to a case, a provider and an expiry, with
//! the viewable payload frozen at issuance. Case ids, client names and
//! clinical text never appear in a share URL; the token stands in for all
//! of them.

use std::sync::Arc;

use care_types::{CaseId, FaxNumber, ProviderId};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::{Role, SEND_ALLOWED};
use crate::audit::{AuditAction, AuditEvent, AuditSink};
use crate::case::CaseRecord;
use crate::clock::Clock;
use crate::config::CoreConfig;
use crate::constants::{MAX_NOTE_CHARS, SHARE_LINK_BASE, TOKEN_ALPHABET};
use crate::filter::{filter_sensitive_for_export, FilteredDisclosures};
use crate::store::{RevokeOutcome, ShareStore};
use crate::{CareError, CareResult};

/// Everything the portal service needs from persistence.
pub trait PortalStore: ShareStore + AuditSink {
    fn as_share_store(&self) -> &dyn ShareStore;
}

impl<T: ShareStore + AuditSink> PortalStore for T {
    fn as_share_store(&self) -> &dyn ShareStore {
        self
    }
}

/// Lifecycle state of a share token as seen by a validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenStatus {
    Active,
    Expired,
    Revoked,
    Invalid,
}

impl TokenStatus {
    pub fn as_wire(&self) -> &'static str {
        match self {
            TokenStatus::Active => "ACTIVE",
            TokenStatus::Expired => "EXPIRED",
            TokenStatus::Revoked => "REVOKED",
            TokenStatus::Invalid => "INVALID",
        }
    }
}

/// What a token grants, reported alongside validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenScope {
    pub redacted: bool,
}

/// Result of validating a token string. Carries nothing beyond the
/// status, expiry and scope; in particular it does not distinguish a
/// token that never existed from one long since purged.
#[derive(Debug, Clone)]
pub struct TokenValidation {
    pub status: TokenStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub scope: Option<TokenScope>,
}

/// The payload frozen into a token at issuance.
///
/// Later edits to the case cannot change what an already-issued link
/// shows; a fresh share is the only way to publish fresh content. The
/// client label is always the masked form, redacted or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharePayload {
    pub case_id: CaseId,
    pub client_label: String,
    pub summary: String,
    pub redacted: bool,
    pub attachments: Vec<String>,
}

/// A stored share token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareToken {
    pub token: String,
    pub case_id: CaseId,
    pub provider_id: ProviderId,
    pub redacted: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Set exactly once; revocation is one-way.
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoke_reason: Option<String>,
    pub payload: SharePayload,
}

impl ShareToken {
    /// Lifecycle state at `now`. The expiry interval is half-open: a
    /// token is expired at the exact instant of `expires_at`.
    pub fn status_at(&self, now: DateTime<Utc>) -> TokenStatus {
        if now >= self.expires_at {
            TokenStatus::Expired
        } else if self.revoked_at.is_some() {
            TokenStatus::Revoked
        } else {
            TokenStatus::Active
        }
    }
}

/// A successfully created share.
#[derive(Debug, Clone)]
pub struct ShareGrant {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    /// Relative link for the provider. Carries the token and nothing
    /// else.
    pub url: String,
}

/// Receipt for a dispatched fax job. Transmission itself is handled by
/// an external integration.
#[derive(Debug, Clone)]
pub struct FaxJob {
    pub job_id: String,
}

/// A note left by an external provider through the portal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderNote {
    pub id: Uuid,
    pub case_id: CaseId,
    pub provider_id: ProviderId,
    /// The token the note arrived through.
    pub token: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Actor recorded on audit events for token-authenticated reads, where
/// no staff credential is present.
pub const PORTAL_ACTOR: &str = "provider-portal";

/// Token issuance, validation, viewing and revocation.
///
/// All time comes from the injected clock, so a single operation can
/// never judge a token against two notions of "now".
pub struct PortalService {
    config: CoreConfig,
    clock: Arc<dyn Clock>,
    store: Arc<dyn PortalStore>,
}

impl PortalService {
    pub fn new(config: CoreConfig, clock: Arc<dyn Clock>, store: Arc<dyn PortalStore>) -> Self {
        Self {
            config,
            clock,
            store,
        }
    }

    /// Issue a share token for `case_id` addressed to `provider_id`.
    ///
    /// Preconditions, checked before any token is minted: the caller's
    /// role must be in the send allow-list and the client's consent must
    /// authorise provider sharing. A failed precondition is audited as
    /// `SHARE_BLOCKED` and surfaced as [`CareError::Blocked`] with the
    /// human-readable reason.
    ///
    /// Issuance is all-or-nothing: if the audit append fails, the stored
    /// token is removed and the share is reported as failed.
    pub fn create_share(
        &self,
        actor: &str,
        role: Role,
        case_id: &CaseId,
        provider_id: &ProviderId,
        ttl_hours: Option<i64>,
        redacted: bool,
    ) -> CareResult<ShareGrant> {
        let now = self.clock.now();
        let case = self
            .store
            .case(case_id)?
            .ok_or_else(|| CareError::CaseNotFound(case_id.to_string()))?;

        if let Err(reason) = self.share_precondition(role, &case) {
            self.store.append(
                AuditEvent::new(AuditAction::ShareBlocked, actor, now)
                    .for_case(case_id)
                    .with_meta("reason", reason.as_str())
                    .with_meta("role", role.as_wire()),
            )?;
            tracing::warn!(case_id = %case_id, %role, "share blocked");
            return Err(CareError::Blocked(reason));
        }

        // Mint-time hygiene; correctness never depends on it.
        self.store.purge_expired_tokens(now)?;

        // A sensitive case is always shared redacted, whatever the
        // caller asked for.
        let redacted = redacted || case.sensitive;
        let ttl_hours = self.config.clamp_ttl_hours(ttl_hours);
        let expires_at = now + Duration::hours(ttl_hours);
        let token = mint_token(self.config.token_length());

        let filtered = filter_sensitive_for_export(
            self.store.as_share_store(),
            case_id,
            Role::ClinicalStaffExternal,
        )?;
        let payload = snapshot_payload(&case, &filtered, redacted);

        self.store.insert_token(ShareToken {
            token: token.clone(),
            case_id: case_id.clone(),
            provider_id: provider_id.clone(),
            redacted,
            created_at: now,
            expires_at,
            revoked_at: None,
            revoke_reason: None,
            payload,
        })?;

        let audited = self.store.append(
            AuditEvent::new(AuditAction::ProviderSharePortal, actor, now)
                .for_case(case_id)
                .for_token(&token)
                .with_meta("provider_id", provider_id.as_str())
                .with_meta("ttl_hours", ttl_hours)
                .with_meta("redacted", redacted),
        );
        if let Err(err) = audited {
            self.store.remove_token(&token)?;
            return Err(err);
        }

        tracing::info!(
            case_id = %case_id,
            provider_id = %provider_id,
            ttl_hours,
            redacted,
            "share token issued"
        );

        Ok(ShareGrant {
            url: format!("{SHARE_LINK_BASE}?token={token}"),
            token,
            expires_at,
        })
    }

    /// Resolve a token string to its lifecycle status.
    ///
    /// Unknown tokens come back `Invalid` rather than as an error, so the
    /// response shape leaks nothing about whether the token ever existed.
    pub fn validate(&self, token: &str) -> CareResult<TokenValidation> {
        let now = self.clock.now();
        let Some(record) = self.store.token(token)? else {
            return Ok(TokenValidation {
                status: TokenStatus::Invalid,
                expires_at: None,
                scope: None,
            });
        };

        Ok(TokenValidation {
            status: record.status_at(now),
            expires_at: Some(record.expires_at),
            scope: Some(TokenScope {
                redacted: record.redacted,
            }),
        })
    }

    /// Return the frozen payload behind an active token.
    ///
    /// Never re-queries live case data. Every successful read, including
    /// repeats, appends a `PORTAL_VIEW` event; a read whose audit append
    /// fails is reported as failed.
    pub fn view(&self, actor: &str, token: &str) -> CareResult<SharePayload> {
        let now = self.clock.now();
        let record = self.active_token(token, now)?;

        self.store.append(
            AuditEvent::new(AuditAction::PortalView, actor, now)
                .for_case(&record.case_id)
                .for_token(token),
        )?;

        Ok(record.payload)
    }

    /// Revoke a single token. Idempotent: the first call transitions the
    /// token and appends the one `TOKEN_REVOKED` event; later calls
    /// succeed without touching the audit log.
    pub fn revoke(&self, actor: &str, token: &str, reason: &str) -> CareResult<()> {
        let now = self.clock.now();
        match self.store.revoke_token(token, now, reason)? {
            RevokeOutcome::NotFound => Err(CareError::TokenInvalid),
            RevokeOutcome::AlreadyRevoked => Ok(()),
            RevokeOutcome::NewlyRevoked(record) => {
                self.store.append(
                    AuditEvent::new(AuditAction::TokenRevoked, actor, now)
                        .for_case(&record.case_id)
                        .for_token(token)
                        .with_meta("reason", reason),
                )?;
                tracing::info!(case_id = %record.case_id, "share token revoked");
                Ok(())
            }
        }
    }

    /// Consent-withdrawal cascade: revoke every live token for the case,
    /// clear the sharing scope and move the case to `HoldSensitive`, all
    /// in one store transaction. Returns the new case status and the
    /// number of tokens revoked.
    pub fn revoke_all_for_case(
        &self,
        actor: &str,
        case_id: &CaseId,
        reason: &str,
    ) -> CareResult<crate::store::ConsentCascade> {
        let now = self.clock.now();
        let cascade = self.store.revoke_consent_cascade(case_id, now, reason)?;

        self.store.append(
            AuditEvent::new(AuditAction::ConsentRevoked, actor, now)
                .for_case(case_id)
                .with_meta("reason", reason)
                .with_meta("revoked_tokens", cascade.revoked_tokens),
        )?;
        tracing::info!(
            case_id = %case_id,
            revoked_tokens = cascade.revoked_tokens,
            "consent revoked, tokens cascaded"
        );

        Ok(cascade)
    }

    /// Queue a fax of a stored document to a provider. Same role and
    /// consent preconditions as [`PortalService::create_share`].
    pub fn send_fax(
        &self,
        actor: &str,
        role: Role,
        case_id: &CaseId,
        provider_id: &ProviderId,
        fax_number: &FaxNumber,
        document_id: &str,
    ) -> CareResult<FaxJob> {
        let now = self.clock.now();
        let case = self
            .store
            .case(case_id)?
            .ok_or_else(|| CareError::CaseNotFound(case_id.to_string()))?;

        if let Err(reason) = self.share_precondition(role, &case) {
            self.store.append(
                AuditEvent::new(AuditAction::ShareBlocked, actor, now)
                    .for_case(case_id)
                    .with_meta("reason", reason.as_str())
                    .with_meta("role", role.as_wire())
                    .with_meta("channel", "fax"),
            )?;
            return Err(CareError::Blocked(reason));
        }

        let job_id = format!("FAX-{}", now.timestamp_millis());
        self.store.append(
            AuditEvent::new(AuditAction::FaxSent, actor, now)
                .for_case(case_id)
                .with_meta("provider_id", provider_id.as_str())
                .with_meta("fax_number", fax_number.as_str())
                .with_meta("document_id", document_id)
                .with_meta("job_id", job_id.as_str()),
        )?;
        tracing::info!(case_id = %case_id, provider_id = %provider_id, job_id, "fax queued");

        Ok(FaxJob { job_id })
    }

    /// Record a note from an external provider. Requires a still-active
    /// token; the audit event carries the note's length, never its text.
    pub fn add_provider_note(&self, token: &str, note: &str) -> CareResult<()> {
        let now = self.clock.now();
        let trimmed = note.trim();
        if trimmed.is_empty() {
            return Err(CareError::InvalidInput("note cannot be empty".into()));
        }
        if trimmed.chars().count() > MAX_NOTE_CHARS {
            return Err(CareError::InvalidInput(format!(
                "note exceeds {MAX_NOTE_CHARS} characters"
            )));
        }

        let record = self.active_token(token, now)?;
        self.store.add_provider_note(ProviderNote {
            id: Uuid::new_v4(),
            case_id: record.case_id.clone(),
            provider_id: record.provider_id.clone(),
            token: token.to_owned(),
            body: trimmed.to_owned(),
            created_at: now,
        })?;

        self.store.append(
            AuditEvent::new(AuditAction::ProviderNote, PORTAL_ACTOR, now)
                .for_case(&record.case_id)
                .for_token(token)
                .with_meta("note_chars", trimmed.chars().count()),
        )?;
        Ok(())
    }

    /// Drop expired token records. Hygiene only.
    pub fn purge_expired(&self) -> CareResult<usize> {
        self.store.purge_expired_tokens(self.clock.now())
    }

    /// The create/fax precondition: allow-listed role plus provider-share
    /// consent in force. Returns the block reason on failure.
    fn share_precondition(&self, role: Role, case: &CaseRecord) -> Result<(), String> {
        if !SEND_ALLOWED.contains(&role) {
            return Err(format!(
                "Role {role} is not authorized to share with providers"
            ));
        }
        if !case.consent.in_force() {
            return Err(if case.consent.revoked {
                "Client consent has been revoked".to_owned()
            } else {
                "Client consent is not signed".to_owned()
            });
        }
        if !case.consent.scope.share_with_providers {
            return Err("Client consent does not authorize provider sharing".to_owned());
        }
        Ok(())
    }

    /// Fetch a token and require it to be active at `now`. The store read
    /// is a single atomic snapshot, so a concurrent revocation is either
    /// fully visible or not at all.
    fn active_token(&self, token: &str, now: DateTime<Utc>) -> CareResult<ShareToken> {
        let record = self.store.token(token)?.ok_or(CareError::TokenInvalid)?;
        match record.status_at(now) {
            TokenStatus::Active => Ok(record),
            TokenStatus::Expired => Err(CareError::TokenExpired),
            TokenStatus::Revoked => Err(CareError::TokenRevoked),
            TokenStatus::Invalid => Err(CareError::TokenInvalid),
        }
    }
}

/// Freeze the viewable payload for a share.
///
/// The client label is always the masked form. A redacted payload carries
/// the shareable summary alone; an unredacted one adds attachment labels
/// and any alert lines the disclosure filter released for external
/// viewers. Internal-scoped alerts never enter a payload either way.
fn snapshot_payload(
    case: &CaseRecord,
    filtered: &FilteredDisclosures,
    redacted: bool,
) -> SharePayload {
    let mut summary = case.summary.clone();
    let attachments = if redacted {
        Vec::new()
    } else {
        for alert in &filtered.alerts {
            summary.push_str("\nAlert: ");
            summary.push_str(&alert.message);
        }
        case.attachments.clone()
    };

    SharePayload {
        case_id: case.id.clone(),
        client_label: case.client_label(),
        summary,
        redacted,
        attachments,
    }
}

/// Mint an unguessable token: uniform over a 62-symbol alphabet, drawn
/// from the thread-local CSPRNG. At the default length of 40 symbols the
/// keyspace is ~2^238.
fn mint_token(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| TOKEN_ALPHABET[rng.gen_range(0..TOKEN_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::{CaseStatus, ClientIdentity, Consent, ConsentScope};
    use crate::clock::ManualClock;
    use crate::disclosure::{AlertSeverity, CaseAlert, DisclosureScope};
    use crate::store::MemoryStore;

    use crate::audit::AuditQuery;

    fn consented_case(case_id: &CaseId) -> CaseRecord {
        CaseRecord {
            id: case_id.clone(),
            status: CaseStatus::InProgress,
            consent: Consent {
                signed: true,
                signed_at: Some(Utc::now()),
                revoked: false,
                revoked_at: None,
                scope: ConsentScope {
                    share_with_attorney: true,
                    share_with_providers: true,
                },
            },
            sensitive: false,
            summary: "Conservative care in progress.".into(),
            client: ClientIdentity {
                full_name: "Alice Barnes".into(),
                masked_label: Some("A.B.".into()),
                date_of_birth: None,
            },
            attachments: vec!["intake-summary.pdf".into()],
        }
    }

    struct Harness {
        clock: Arc<ManualClock>,
        store: Arc<MemoryStore>,
        portal: PortalService,
        case_id: CaseId,
        provider_id: ProviderId,
    }

    fn harness() -> Harness {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = Arc::new(MemoryStore::new());
        let case_id: CaseId = "CASE-0042".parse().unwrap();
        store.upsert_case(consented_case(&case_id));

        let portal = PortalService::new(CoreConfig::default(), clock.clone(), store.clone());
        Harness {
            clock,
            store,
            portal,
            case_id,
            provider_id: "prov-9".parse().unwrap(),
        }
    }

    fn events(store: &MemoryStore, action: AuditAction) -> Vec<AuditEvent> {
        store
            .query(&AuditQuery {
                action: Some(action),
                ..AuditQuery::default()
            })
            .unwrap()
    }

    #[test]
    fn test_create_then_validate_is_active_with_requested_ttl() {
        let h = harness();
        let grant = h
            .portal
            .create_share("rn-1", Role::RnCm, &h.case_id, &h.provider_id, Some(48), true)
            .unwrap();
        assert_eq!(grant.expires_at, h.clock.now() + Duration::hours(48));

        let validation = h.portal.validate(&grant.token).unwrap();
        assert_eq!(validation.status, TokenStatus::Active);
        assert_eq!(validation.expires_at, Some(grant.expires_at));
        assert_eq!(validation.scope, Some(TokenScope { redacted: true }));
    }

    #[test]
    fn test_minted_tokens_are_long_and_url_safe() {
        let h = harness();
        let grant = h
            .portal
            .create_share("rn-1", Role::RnCm, &h.case_id, &h.provider_id, None, true)
            .unwrap();
        assert_eq!(grant.token.len(), 40);
        assert!(grant
            .token
            .bytes()
            .all(|b| TOKEN_ALPHABET.contains(&b)));
    }

    #[test]
    fn test_share_url_carries_the_token_and_nothing_identifying() {
        let h = harness();
        let grant = h
            .portal
            .create_share("rn-1", Role::RnCm, &h.case_id, &h.provider_id, None, false)
            .unwrap();
        assert_eq!(grant.url, format!("/provider/preview?token={}", grant.token));
        assert!(!grant.url.contains(h.case_id.as_str()));
        assert!(!grant.url.contains("Alice"));
        assert!(!grant.url.contains("Barnes"));
    }

    #[test]
    fn test_ttl_is_clamped_into_the_supported_range() {
        let h = harness();
        let short = h
            .portal
            .create_share("rn-1", Role::RnCm, &h.case_id, &h.provider_id, Some(1), true)
            .unwrap();
        assert_eq!(short.expires_at, h.clock.now() + Duration::hours(4));

        let long = h
            .portal
            .create_share("rn-1", Role::RnCm, &h.case_id, &h.provider_id, Some(5_000), true)
            .unwrap();
        assert_eq!(long.expires_at, h.clock.now() + Duration::hours(168));
    }

    #[test]
    fn test_disallowed_role_is_blocked_before_any_token_exists() {
        let h = harness();
        for role in [Role::Attorney, Role::Client, Role::Staff, Role::Compliance] {
            let err = h
                .portal
                .create_share("user-1", role, &h.case_id, &h.provider_id, None, true)
                .unwrap_err();
            assert!(matches!(err, CareError::Blocked(_)), "{role} not blocked");
        }
        assert_eq!(h.store.token_count(), 0);
        assert_eq!(events(&h.store, AuditAction::ShareBlocked).len(), 4);
    }

    #[test]
    fn test_missing_provider_consent_blocks_with_reason() {
        let h = harness();
        let mut case = consented_case(&h.case_id);
        case.consent.scope.share_with_providers = false;
        h.store.upsert_case(case);

        let err = h
            .portal
            .create_share("rn-1", Role::RnCm, &h.case_id, &h.provider_id, None, true)
            .unwrap_err();
        match err {
            CareError::Blocked(reason) => {
                assert_eq!(reason, "Client consent does not authorize provider sharing")
            }
            other => panic!("expected Blocked, got {other:?}"),
        }
    }

    #[test]
    fn test_sensitive_case_forces_redaction_on() {
        let h = harness();
        let mut case = consented_case(&h.case_id);
        case.sensitive = true;
        h.store.upsert_case(case);

        let grant = h
            .portal
            .create_share("rn-1", Role::RnCm, &h.case_id, &h.provider_id, None, false)
            .unwrap();
        let payload = h.portal.view(PORTAL_ACTOR, &grant.token).unwrap();
        assert!(payload.redacted);
        assert!(payload.attachments.is_empty());
    }

    #[test]
    fn test_payload_is_frozen_against_later_case_edits() {
        let h = harness();
        let grant = h
            .portal
            .create_share("rn-1", Role::RnCm, &h.case_id, &h.provider_id, None, false)
            .unwrap();

        let mut edited = consented_case(&h.case_id);
        edited.summary = "Surgery scheduled, prognosis guarded.".into();
        edited.attachments.push("surgical-consult.pdf".into());
        h.store.upsert_case(edited);

        let payload = h.portal.view(PORTAL_ACTOR, &grant.token).unwrap();
        assert_eq!(payload.summary, "Conservative care in progress.");
        assert_eq!(payload.attachments, vec!["intake-summary.pdf".to_owned()]);
    }

    #[test]
    fn test_payload_shows_masked_label_never_the_full_name() {
        let h = harness();
        let grant = h
            .portal
            .create_share("rn-1", Role::RnCm, &h.case_id, &h.provider_id, None, false)
            .unwrap();
        let payload = h.portal.view(PORTAL_ACTOR, &grant.token).unwrap();
        assert_eq!(payload.client_label, "A.B.");
        let serialized = serde_json::to_string(&payload).unwrap();
        assert!(!serialized.contains("Alice"));
        assert!(!serialized.contains("Barnes"));
    }

    #[test]
    fn test_unredacted_payload_includes_shareable_alerts_only() {
        let h = harness();
        h.store.replace_alerts(
            &h.case_id,
            vec![
                CaseAlert {
                    severity: AlertSeverity::High,
                    message: "Safety assessment needed.".into(),
                    disclosure_scope: DisclosureScope::Minimal,
                    created_at: h.clock.now(),
                },
                CaseAlert {
                    severity: AlertSeverity::Critical,
                    message: "Immediate RN CM review required.".into(),
                    disclosure_scope: DisclosureScope::Internal,
                    created_at: h.clock.now(),
                },
            ],
        );

        let open = h
            .portal
            .create_share("rn-1", Role::RnCm, &h.case_id, &h.provider_id, None, false)
            .unwrap();
        let payload = h.portal.view(PORTAL_ACTOR, &open.token).unwrap();
        assert!(payload.summary.contains("Safety assessment needed."));
        assert!(!payload.summary.contains("Immediate RN CM review required."));

        let redacted = h
            .portal
            .create_share("rn-1", Role::RnCm, &h.case_id, &h.provider_id, None, true)
            .unwrap();
        let payload = h.portal.view(PORTAL_ACTOR, &redacted.token).unwrap();
        assert!(!payload.summary.contains("Safety assessment needed."));
    }

    #[test]
    fn test_every_view_appends_an_audit_event() {
        let h = harness();
        let grant = h
            .portal
            .create_share("rn-1", Role::RnCm, &h.case_id, &h.provider_id, None, true)
            .unwrap();

        for _ in 0..3 {
            h.portal.view(PORTAL_ACTOR, &grant.token).unwrap();
        }
        let views = events(&h.store, AuditAction::PortalView);
        assert_eq!(views.len(), 3);
        assert!(views.iter().all(|e| e.actor == PORTAL_ACTOR));
        assert!(views.iter().all(|e| e.token.as_deref() == Some(grant.token.as_str())));
    }

    #[test]
    fn test_validate_at_exactly_expires_at_is_expired() {
        let h = harness();
        let grant = h
            .portal
            .create_share("rn-1", Role::RnCm, &h.case_id, &h.provider_id, Some(24), true)
            .unwrap();

        h.clock.set(grant.expires_at);
        assert_eq!(
            h.portal.validate(&grant.token).unwrap().status,
            TokenStatus::Expired
        );
        assert!(matches!(
            h.portal.view(PORTAL_ACTOR, &grant.token),
            Err(CareError::TokenExpired)
        ));
    }

    #[test]
    fn test_unknown_token_validates_invalid_without_error() {
        let h = harness();
        let validation = h.portal.validate("never-issued").unwrap();
        assert_eq!(validation.status, TokenStatus::Invalid);
        assert!(validation.expires_at.is_none());
        assert!(validation.scope.is_none());
        assert!(matches!(
            h.portal.view(PORTAL_ACTOR, "never-issued"),
            Err(CareError::TokenInvalid)
        ));
    }

    #[test]
    fn test_double_revoke_is_idempotent_with_one_audit_event() {
        let h = harness();
        let grant = h
            .portal
            .create_share("rn-1", Role::RnCm, &h.case_id, &h.provider_id, None, true)
            .unwrap();

        h.portal.revoke("rn-1", &grant.token, "sent in error").unwrap();
        h.portal.revoke("rn-1", &grant.token, "sent in error").unwrap();

        assert_eq!(
            h.portal.validate(&grant.token).unwrap().status,
            TokenStatus::Revoked
        );
        assert!(matches!(
            h.portal.view(PORTAL_ACTOR, &grant.token),
            Err(CareError::TokenRevoked)
        ));
        assert_eq!(events(&h.store, AuditAction::TokenRevoked).len(), 1);
    }

    #[test]
    fn test_consent_cascade_revokes_every_active_token() {
        let h = harness();
        let first = h
            .portal
            .create_share("rn-1", Role::RnCm, &h.case_id, &h.provider_id, Some(24), true)
            .unwrap();
        let second = h
            .portal
            .create_share("rn-1", Role::RnCm, &h.case_id, &h.provider_id, Some(48), true)
            .unwrap();

        let cascade = h
            .portal
            .revoke_all_for_case("client-1", &h.case_id, "Client withdrew consent")
            .unwrap();
        assert_eq!(cascade.case_status, CaseStatus::HoldSensitive);
        assert_eq!(cascade.revoked_tokens, 2);

        for token in [&first.token, &second.token] {
            assert_eq!(
                h.portal.validate(token).unwrap().status,
                TokenStatus::Revoked
            );
            assert!(h.portal.view(PORTAL_ACTOR, token).is_err());
        }

        let revoked = events(&h.store, AuditAction::ConsentRevoked);
        assert_eq!(revoked.len(), 1);
        assert_eq!(revoked[0].metadata.get("revoked_tokens").unwrap(), 2);

        // And the case now blocks fresh shares.
        assert!(matches!(
            h.portal
                .create_share("rn-1", Role::RnCm, &h.case_id, &h.provider_id, None, true),
            Err(CareError::Blocked(_))
        ));
    }

    #[test]
    fn test_redacted_48h_share_of_sensitive_case_expires_at_49h() {
        let h = harness();
        let mut case = consented_case(&h.case_id);
        case.sensitive = true;
        h.store.upsert_case(case);
        h.store.replace_disclosures(
            &h.case_id,
            vec![{
                let mut item = crate::disclosure::SensitiveDisclosure::new(
                    crate::disclosure::DisclosureCategory::SafetyTrauma,
                    "dv_ipv",
                );
                item.free_text = Some("pattern of threats at home".into());
                item
            }],
        );

        let grant = h
            .portal
            .create_share("rn-1", Role::RnCm, &h.case_id, &h.provider_id, Some(48), true)
            .unwrap();

        let payload = h.portal.view(PORTAL_ACTOR, &grant.token).unwrap();
        assert_eq!(payload.summary, "Conservative care in progress.");
        assert!(!payload.summary.contains("threats"));
        assert!(payload.attachments.is_empty());

        h.clock.advance(Duration::hours(49));
        assert_eq!(
            h.portal.validate(&grant.token).unwrap().status,
            TokenStatus::Expired
        );
    }

    #[test]
    fn test_fax_requires_the_share_precondition_and_audits() {
        let h = harness();
        let fax: FaxNumber = FaxNumber::new("+1 (555) 010-2291").unwrap();

        let job = h
            .portal
            .send_fax("rn-1", Role::RnCm, &h.case_id, &h.provider_id, &fax, "doc-17")
            .unwrap();
        assert!(job.job_id.starts_with("FAX-"));
        assert_eq!(events(&h.store, AuditAction::FaxSent).len(), 1);

        let err = h
            .portal
            .send_fax("att-1", Role::Attorney, &h.case_id, &h.provider_id, &fax, "doc-17")
            .unwrap_err();
        assert!(matches!(err, CareError::Blocked(_)));
    }

    #[test]
    fn test_provider_note_requires_an_active_token() {
        let h = harness();
        let grant = h
            .portal
            .create_share("rn-1", Role::RnCm, &h.case_id, &h.provider_id, None, true)
            .unwrap();

        h.portal
            .add_provider_note(&grant.token, "Initial evaluation scheduled.")
            .unwrap();
        let notes = h.store.notes_for_case(&h.case_id);
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].body, "Initial evaluation scheduled.");

        let note_events = events(&h.store, AuditAction::ProviderNote);
        assert_eq!(note_events.len(), 1);
        // Length only, never the text.
        assert!(note_events[0].metadata.contains_key("note_chars"));
        assert!(serde_json::to_string(&note_events[0])
            .unwrap()
            .contains("note_chars"));
        assert!(!serde_json::to_string(&note_events[0])
            .unwrap()
            .contains("evaluation"));

        h.portal.revoke("rn-1", &grant.token, "done").unwrap();
        assert!(matches!(
            h.portal.add_provider_note(&grant.token, "late note"),
            Err(CareError::TokenRevoked)
        ));
    }

    #[test]
    fn test_provider_note_rejects_empty_and_oversized_bodies() {
        let h = harness();
        let grant = h
            .portal
            .create_share("rn-1", Role::RnCm, &h.case_id, &h.provider_id, None, true)
            .unwrap();

        assert!(matches!(
            h.portal.add_provider_note(&grant.token, "   "),
            Err(CareError::InvalidInput(_))
        ));
        let oversized = "x".repeat(MAX_NOTE_CHARS + 1);
        assert!(matches!(
            h.portal.add_provider_note(&grant.token, &oversized),
            Err(CareError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_failed_audit_append_backs_out_the_minted_token() {
        struct FailingAppend {
            inner: MemoryStore,
        }

        impl ShareStore for FailingAppend {
            fn case(&self, case_id: &CaseId) -> CareResult<Option<CaseRecord>> {
                self.inner.case(case_id)
            }
            fn alerts_for_case(&self, case_id: &CaseId) -> CareResult<Vec<CaseAlert>> {
                self.inner.alerts_for_case(case_id)
            }
            fn disclosures_for_case(
                &self,
                case_id: &CaseId,
            ) -> CareResult<Vec<crate::disclosure::SensitiveDisclosure>> {
                self.inner.disclosures_for_case(case_id)
            }
            fn insert_token(&self, token: ShareToken) -> CareResult<()> {
                self.inner.insert_token(token)
            }
            fn token(&self, token: &str) -> CareResult<Option<ShareToken>> {
                self.inner.token(token)
            }
            fn remove_token(&self, token: &str) -> CareResult<()> {
                self.inner.remove_token(token)
            }
            fn revoke_token(
                &self,
                token: &str,
                at: DateTime<Utc>,
                reason: &str,
            ) -> CareResult<RevokeOutcome> {
                self.inner.revoke_token(token, at, reason)
            }
            fn revoke_consent_cascade(
                &self,
                case_id: &CaseId,
                at: DateTime<Utc>,
                reason: &str,
            ) -> CareResult<crate::store::ConsentCascade> {
                self.inner.revoke_consent_cascade(case_id, at, reason)
            }
            fn purge_expired_tokens(&self, now: DateTime<Utc>) -> CareResult<usize> {
                self.inner.purge_expired_tokens(now)
            }
            fn add_provider_note(&self, note: ProviderNote) -> CareResult<()> {
                self.inner.add_provider_note(note)
            }
        }

        impl AuditSink for FailingAppend {
            fn append(&self, _event: AuditEvent) -> CareResult<()> {
                Err(CareError::AuditAppend("sink unavailable".into()))
            }
            fn query(&self, query: &AuditQuery) -> CareResult<Vec<AuditEvent>> {
                self.inner.query(query)
            }
        }

        let case_id: CaseId = "CASE-0042".parse().unwrap();
        let inner = MemoryStore::new();
        inner.upsert_case(consented_case(&case_id));
        let store = Arc::new(FailingAppend { inner });
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let portal = PortalService::new(CoreConfig::default(), clock, store.clone());

        let err = portal
            .create_share(
                "rn-1",
                Role::RnCm,
                &case_id,
                &"prov-9".parse().unwrap(),
                None,
                true,
            )
            .unwrap_err();
        assert!(matches!(err, CareError::AuditAppend(_)));
        // The half-issued token must not survive.
        assert_eq!(store.inner.token_count(), 0);
    }
}
