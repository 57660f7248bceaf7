//! Case, token, note and audit persistence.
//!
//! [`ShareStore`] is the seam between the portal service and whatever holds
//! case state; [`MemoryStore`] is the in-process implementation used by the
//! server and by tests. All state sits behind a single lock so compound
//! transitions, notably the consent revocation cascade, are atomic: no
//! reader can observe revoked consent alongside a still-active token.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use care_types::CaseId;
use chrono::{DateTime, Utc};

use crate::audit::{AuditEvent, AuditQuery, AuditSink};
use crate::case::{CaseRecord, CaseStatus};
use crate::constants::DEFAULT_AUDIT_QUERY_LIMIT;
use crate::disclosure::{
    normalize_item_code, risk_level_for_item, safety_alert_for, CaseAlert, SensitiveDisclosure,
};
use crate::portal::{ProviderNote, ShareToken};
use crate::{CareError, CareResult};

/// Outcome of a single-token revocation.
#[derive(Debug, Clone)]
pub enum RevokeOutcome {
    /// The token is not in the store.
    NotFound,
    /// This call performed the revocation. Carries the token as revoked.
    NewlyRevoked(ShareToken),
    /// The token was already revoked; nothing changed.
    AlreadyRevoked,
}

/// Result of a consent revocation cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsentCascade {
    /// Case status after the cascade, always `HoldSensitive`.
    pub case_status: CaseStatus,
    /// Number of tokens this cascade moved to revoked.
    pub revoked_tokens: usize,
}

/// Case, token and note storage as the portal service sees it.
///
/// Reads return owned snapshots. `revoke_token` and
/// `revoke_consent_cascade` are state transitions that must be atomic with
/// respect to concurrent reads: a `token` read observes a token either
/// before or after a transition, never mid-way.
pub trait ShareStore: Send + Sync {
    fn case(&self, case_id: &CaseId) -> CareResult<Option<CaseRecord>>;
    fn alerts_for_case(&self, case_id: &CaseId) -> CareResult<Vec<CaseAlert>>;
    fn disclosures_for_case(&self, case_id: &CaseId) -> CareResult<Vec<SensitiveDisclosure>>;

    /// Persists a freshly minted token. Fails if the token string is
    /// already present.
    fn insert_token(&self, token: ShareToken) -> CareResult<()>;

    fn token(&self, token: &str) -> CareResult<Option<ShareToken>>;

    /// Removes a token outright. Used to back out a share whose audit
    /// append failed; revocation is the normal invalidation path.
    fn remove_token(&self, token: &str) -> CareResult<()>;

    fn revoke_token(
        &self,
        token: &str,
        at: DateTime<Utc>,
        reason: &str,
    ) -> CareResult<RevokeOutcome>;

    /// Marks the case's consent revoked, clears its sharing scope, moves
    /// the case to `HoldSensitive` and revokes every active token for the
    /// case, all under one lock acquisition.
    fn revoke_consent_cascade(
        &self,
        case_id: &CaseId,
        at: DateTime<Utc>,
        reason: &str,
    ) -> CareResult<ConsentCascade>;

    /// Drops tokens whose expiry has passed. Store hygiene only; expiry
    /// decisions never depend on a purge having run.
    fn purge_expired_tokens(&self, now: DateTime<Utc>) -> CareResult<usize>;

    fn add_provider_note(&self, note: ProviderNote) -> CareResult<()>;
}

/// Case fixtures loaded into a [`MemoryStore`] at startup. The dev
/// server reads this shape from a JSON file; tests build it directly.
#[derive(Debug, Default, serde::Deserialize)]
pub struct SeedData {
    pub cases: Vec<CaseRecord>,
    #[serde(default)]
    pub alerts: HashMap<CaseId, Vec<CaseAlert>>,
    #[serde(default)]
    pub disclosures: HashMap<CaseId, Vec<SensitiveDisclosure>>,
}

#[derive(Default)]
struct MemoryState {
    cases: HashMap<CaseId, CaseRecord>,
    alerts: HashMap<CaseId, Vec<CaseAlert>>,
    disclosures: HashMap<CaseId, Vec<SensitiveDisclosure>>,
    tokens: HashMap<String, ShareToken>,
    notes: HashMap<CaseId, Vec<ProviderNote>>,
    events: Vec<AuditEvent>,
}

/// In-memory [`ShareStore`] and [`AuditSink`].
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, MemoryState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemoryState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Inserts or replaces a case record.
    pub fn upsert_case(&self, case: CaseRecord) {
        self.write().cases.insert(case.id.clone(), case);
    }

    pub fn replace_alerts(&self, case_id: &CaseId, alerts: Vec<CaseAlert>) {
        self.write().alerts.insert(case_id.clone(), alerts);
    }

    pub fn replace_disclosures(&self, case_id: &CaseId, disclosures: Vec<SensitiveDisclosure>) {
        self.write().disclosures.insert(case_id.clone(), disclosures);
    }

    /// Notes recorded against a case, oldest first.
    pub fn notes_for_case(&self, case_id: &CaseId) -> Vec<ProviderNote> {
        self.read().notes.get(case_id).cloned().unwrap_or_default()
    }

    /// Number of token records currently held, swept or not.
    pub fn token_count(&self) -> usize {
        self.read().tokens.len()
    }

    /// Load startup fixtures. Returns the number of cases loaded.
    ///
    /// Seeded disclosures go through the same intake normalisation as live
    /// ones: item codes are canonicalised, risk levels recomputed, and
    /// red/orange items raise internal safety alerts on top of whatever
    /// alerts the fixture already carries.
    pub fn apply_seed(&self, seed: SeedData, now: DateTime<Utc>) -> usize {
        let mut state = self.write();
        let count = seed.cases.len();
        for case in seed.cases {
            state.cases.insert(case.id.clone(), case);
        }
        for (case_id, alerts) in seed.alerts {
            state.alerts.insert(case_id, alerts);
        }
        for (case_id, mut disclosures) in seed.disclosures {
            for item in &mut disclosures {
                item.item_code = normalize_item_code(&item.item_code);
                item.risk_level = risk_level_for_item(&item.item_code);
                if !item.selected {
                    continue;
                }
                if let Some(alert) = safety_alert_for(&item.item_code, now) {
                    state.alerts.entry(case_id.clone()).or_default().push(alert);
                }
            }
            state.disclosures.insert(case_id, disclosures);
        }
        count
    }
}

impl ShareStore for MemoryStore {
    fn case(&self, case_id: &CaseId) -> CareResult<Option<CaseRecord>> {
        Ok(self.read().cases.get(case_id).cloned())
    }

    fn alerts_for_case(&self, case_id: &CaseId) -> CareResult<Vec<CaseAlert>> {
        Ok(self.read().alerts.get(case_id).cloned().unwrap_or_default())
    }

    fn disclosures_for_case(&self, case_id: &CaseId) -> CareResult<Vec<SensitiveDisclosure>> {
        Ok(self
            .read()
            .disclosures
            .get(case_id)
            .cloned()
            .unwrap_or_default())
    }

    fn insert_token(&self, token: ShareToken) -> CareResult<()> {
        let mut state = self.write();
        if state.tokens.contains_key(&token.token) {
            return Err(CareError::Store(
                "generated share token collides with an existing one".into(),
            ));
        }
        state.tokens.insert(token.token.clone(), token);
        Ok(())
    }

    fn token(&self, token: &str) -> CareResult<Option<ShareToken>> {
        Ok(self.read().tokens.get(token).cloned())
    }

    fn remove_token(&self, token: &str) -> CareResult<()> {
        self.write().tokens.remove(token);
        Ok(())
    }

    fn revoke_token(
        &self,
        token: &str,
        at: DateTime<Utc>,
        reason: &str,
    ) -> CareResult<RevokeOutcome> {
        let mut state = self.write();
        match state.tokens.get_mut(token) {
            None => Ok(RevokeOutcome::NotFound),
            Some(record) if record.revoked_at.is_some() => Ok(RevokeOutcome::AlreadyRevoked),
            Some(record) => {
                record.revoked_at = Some(at);
                record.revoke_reason = Some(reason.to_owned());
                Ok(RevokeOutcome::NewlyRevoked(record.clone()))
            }
        }
    }

    fn revoke_consent_cascade(
        &self,
        case_id: &CaseId,
        at: DateTime<Utc>,
        reason: &str,
    ) -> CareResult<ConsentCascade> {
        let mut state = self.write();
        let case = state
            .cases
            .get_mut(case_id)
            .ok_or_else(|| CareError::CaseNotFound(case_id.to_string()))?;

        case.consent.revoked = true;
        case.consent.revoked_at = Some(at);
        case.consent.scope.share_with_attorney = false;
        case.consent.scope.share_with_providers = false;
        case.status = CaseStatus::HoldSensitive;
        let case_status = case.status;

        let mut revoked_tokens = 0;
        for record in state.tokens.values_mut() {
            let active =
                record.case_id == *case_id && record.revoked_at.is_none() && at < record.expires_at;
            if active {
                record.revoked_at = Some(at);
                record.revoke_reason = Some(reason.to_owned());
                revoked_tokens += 1;
            }
        }

        Ok(ConsentCascade {
            case_status,
            revoked_tokens,
        })
    }

    fn purge_expired_tokens(&self, now: DateTime<Utc>) -> CareResult<usize> {
        let mut state = self.write();
        let before = state.tokens.len();
        state.tokens.retain(|_, record| record.expires_at > now);
        Ok(before - state.tokens.len())
    }

    fn add_provider_note(&self, note: ProviderNote) -> CareResult<()> {
        self.write()
            .notes
            .entry(note.case_id.clone())
            .or_default()
            .push(note);
        Ok(())
    }
}

impl AuditSink for MemoryStore {
    fn append(&self, event: AuditEvent) -> CareResult<()> {
        self.write().events.push(event);
        Ok(())
    }

    fn query(&self, query: &AuditQuery) -> CareResult<Vec<AuditEvent>> {
        let limit = query
            .limit
            .unwrap_or(DEFAULT_AUDIT_QUERY_LIMIT)
            .min(DEFAULT_AUDIT_QUERY_LIMIT);

        let state = self.read();
        let mut matches: Vec<AuditEvent> = state
            .events
            .iter()
            .rev()
            .filter(|event| query.matches(event))
            .cloned()
            .collect();
        // Stable sort on the reversed log keeps same-instant events in
        // reverse append order.
        matches.sort_by(|a, b| b.at.cmp(&a.at));
        matches.truncate(limit);
        Ok(matches)
    }
}
