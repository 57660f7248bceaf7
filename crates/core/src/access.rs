//! Role and capability resolution.
//!
//! Pure functions of (role, case state): no I/O, no side effects, so the
//! same checks can run in render paths, export code and request handlers.
//! Every unknown or malformed input resolves to the most restrictive
//! outcome.

use serde::{Deserialize, Serialize};

use crate::case::{CaseRecord, CaseStatus};
use crate::{CareError, CareResult};

/// The closed set of roles the system recognises.
///
/// Roles arrive as strings from the credential registry; parsing rejects
/// anything outside this table rather than pattern-matching on substrings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Client,
    Attorney,
    /// Internal nurse case manager.
    RnCm,
    /// Director overseeing nurse case managers.
    RnCmDirector,
    /// Internal clinical supervisors and managers.
    ClinicalMgmt,
    /// Clinical staff employed by an external firm.
    ClinicalStaffExternal,
    Compliance,
    /// Firm staff (external, non-clinical).
    Staff,
    /// Internal operations staff (administrative).
    OpsStaff,
    SuperUser,
    SuperAdmin,
}

pub const ALL_ROLES: [Role; 11] = [
    Role::Client,
    Role::Attorney,
    Role::RnCm,
    Role::RnCmDirector,
    Role::ClinicalMgmt,
    Role::ClinicalStaffExternal,
    Role::Compliance,
    Role::Staff,
    Role::OpsStaff,
    Role::SuperUser,
    Role::SuperAdmin,
];

/// Roles permitted to create portal shares and dispatch faxes.
pub const SEND_ALLOWED: [Role; 4] = [
    Role::RnCm,
    Role::ClinicalMgmt,
    Role::SuperUser,
    Role::SuperAdmin,
];

impl Role {
    pub fn as_wire(&self) -> &'static str {
        match self {
            Role::Client => "CLIENT",
            Role::Attorney => "ATTORNEY",
            Role::RnCm => "RN_CM",
            Role::RnCmDirector => "RN_CM_DIRECTOR",
            Role::ClinicalMgmt => "CLINICAL_MGMT",
            Role::ClinicalStaffExternal => "CLINICAL_STAFF_EXTERNAL",
            Role::Compliance => "COMPLIANCE",
            Role::Staff => "STAFF",
            Role::OpsStaff => "OPS_STAFF",
            Role::SuperUser => "SUPER_USER",
            Role::SuperAdmin => "SUPER_ADMIN",
        }
    }

    /// True for roles operating under treatment-relationship or oversight
    /// authority. These are never consent-gated at the capability level,
    /// though the disclosure filter still applies per-item rules.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Role::RnCm
                | Role::RnCmDirector
                | Role::ClinicalMgmt
                | Role::Compliance
                | Role::OpsStaff
                | Role::SuperUser
                | Role::SuperAdmin
        )
    }
}

impl std::str::FromStr for Role {
    type Err = CareError;

    fn from_str(s: &str) -> CareResult<Self> {
        ALL_ROLES
            .into_iter()
            .find(|role| role.as_wire() == s)
            .ok_or_else(|| CareError::InvalidInput(format!("unknown role: {s}")))
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// The closed set of gated capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Feature {
    ViewIdentity,
    ViewClinical,
    ViewSensitive,
    Export,
    RouteProvider,
}

/// Outcome of an attorney-side block check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockStatus {
    pub blocked: bool,
    pub reason: Option<String>,
}

impl BlockStatus {
    fn clear() -> Self {
        Self {
            blocked: false,
            reason: None,
        }
    }

    fn because(reason: &str) -> Self {
        Self {
            blocked: true,
            reason: Some(reason.to_owned()),
        }
    }
}

/// Decide whether an attorney-side viewer is blocked from a case entirely.
///
/// Applies to `Attorney`, firm `Staff` and internal `OpsStaff`; all other
/// roles are out of scope for this check and come back unblocked. The
/// returned reason names the first failing condition, checked in a fixed
/// order: consent signature, consent withdrawal, sensitivity hold, then
/// role-specific scope.
pub fn is_blocked_for_attorney(role: Role, case: &CaseRecord) -> BlockStatus {
    if !matches!(role, Role::Attorney | Role::Staff | Role::OpsStaff) {
        return BlockStatus::clear();
    }

    let consent = &case.consent;
    if !consent.signed {
        return BlockStatus::because("Client consent is not signed");
    }
    if consent.revoked {
        return BlockStatus::because("Client consent has been revoked");
    }
    if case.status == CaseStatus::HoldSensitive {
        return BlockStatus::because("Case is under sensitivity hold");
    }
    if role == Role::Attorney && !consent.scope.share_with_attorney {
        return BlockStatus::because("Client consent does not authorize sharing with attorneys");
    }
    if role == Role::OpsStaff && !consent.scope.share_with_providers {
        return BlockStatus::because("Client consent does not authorize provider sharing");
    }
    BlockStatus::clear()
}

/// Decide whether `role` may use `feature` on `case`.
///
/// Internal clinical and oversight roles act under treatment authority and
/// are not consent-gated here; attorney-side roles are gated by
/// [`is_blocked_for_attorney`] plus per-feature scope. `OpsStaff` is
/// internal but administrative and is deliberately not a backdoor to
/// consent-gated material.
pub fn can_access(role: Role, case: &CaseRecord, feature: Feature) -> bool {
    let providers_consented = case.consent.in_force() && case.consent.scope.share_with_providers;

    match role {
        Role::SuperUser | Role::SuperAdmin => true,
        Role::ClinicalMgmt | Role::RnCmDirector => true,
        Role::Compliance => feature != Feature::RouteProvider,
        Role::RnCm => feature != Feature::Export,
        Role::ClinicalStaffExternal => {
            providers_consented
                && case.status != CaseStatus::HoldSensitive
                && matches!(
                    feature,
                    Feature::ViewIdentity
                        | Feature::ViewClinical
                        | Feature::ViewSensitive
                        | Feature::RouteProvider
                )
        }
        Role::OpsStaff => {
            !is_blocked_for_attorney(role, case).blocked
                && matches!(
                    feature,
                    Feature::ViewIdentity
                        | Feature::ViewClinical
                        | Feature::RouteProvider
                        | Feature::Export
                )
        }
        Role::Attorney => {
            if is_blocked_for_attorney(role, case).blocked {
                return false;
            }
            match feature {
                Feature::RouteProvider => case.consent.scope.share_with_providers,
                Feature::ViewIdentity
                | Feature::ViewClinical
                | Feature::ViewSensitive
                | Feature::Export => true,
            }
        }
        Role::Staff => {
            if is_blocked_for_attorney(role, case).blocked {
                return false;
            }
            match feature {
                Feature::ViewIdentity | Feature::Export => false,
                Feature::ViewClinical | Feature::ViewSensitive | Feature::RouteProvider => {
                    providers_consented
                }
            }
        }
        Role::Client => false,
    }
}

/// The client name a viewer is allowed to see: the full name with identity
/// access, a masked form otherwise.
///
/// Resolver surface for staff-facing case rendering. The portal never
/// calls this; its payloads carry only the masked label.
pub fn display_name(role: Role, case: &CaseRecord) -> String {
    if can_access(role, case, Feature::ViewIdentity) {
        return case.client.full_name.clone();
    }
    let masked = case.client.portal_label();
    if masked.is_empty() {
        "Restricted".to_owned()
    } else {
        masked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::{ClientIdentity, Consent, ConsentScope};

    fn case_with(signed: bool, attorney: bool, providers: bool, status: CaseStatus) -> CaseRecord {
        CaseRecord {
            id: "CASE-01234".parse().unwrap(),
            status,
            consent: Consent {
                signed,
                signed_at: None,
                revoked: false,
                revoked_at: None,
                scope: ConsentScope {
                    share_with_attorney: attorney,
                    share_with_providers: providers,
                },
            },
            sensitive: false,
            summary: "Conservative care in progress.".into(),
            client: ClientIdentity {
                full_name: "Alice Barnes".into(),
                masked_label: Some("A.B.".into()),
                date_of_birth: None,
            },
            attachments: vec![],
        }
    }

    #[test]
    fn test_attorney_side_roles_blocked_whenever_consent_unsigned() {
        // Unsigned consent blocks regardless of scope flags or status.
        for role in [Role::Attorney, Role::Staff, Role::OpsStaff] {
            for status in [CaseStatus::New, CaseStatus::InProgress, CaseStatus::Routed] {
                let case = case_with(false, true, true, status);
                let block = is_blocked_for_attorney(role, &case);
                assert!(block.blocked, "{role} not blocked on unsigned consent");
                assert_eq!(block.reason.as_deref(), Some("Client consent is not signed"));
            }
        }
    }

    #[test]
    fn test_hold_sensitive_blocks_attorney_even_with_signed_consent() {
        let case = case_with(true, true, true, CaseStatus::HoldSensitive);
        let block = is_blocked_for_attorney(Role::Attorney, &case);
        assert!(block.blocked);
        assert!(block.reason.unwrap().contains("sensitivity hold"));
    }

    #[test]
    fn test_revoked_consent_blocks_attorney_side() {
        let mut case = case_with(true, true, true, CaseStatus::InProgress);
        case.consent.revoked = true;
        let block = is_blocked_for_attorney(Role::Attorney, &case);
        assert!(block.blocked);
        assert_eq!(
            block.reason.as_deref(),
            Some("Client consent has been revoked")
        );
    }

    #[test]
    fn test_attorney_blocked_without_attorney_scope() {
        let case = case_with(true, false, true, CaseStatus::InProgress);
        let block = is_blocked_for_attorney(Role::Attorney, &case);
        assert!(block.blocked);
        assert_eq!(
            block.reason.as_deref(),
            Some("Client consent does not authorize sharing with attorneys")
        );
        // Staff has no attorney-scope requirement.
        assert!(!is_blocked_for_attorney(Role::Staff, &case).blocked);
    }

    #[test]
    fn test_internal_clinical_roles_never_blocked_by_consent() {
        let case = case_with(false, false, false, CaseStatus::HoldSensitive);
        for role in [
            Role::RnCm,
            Role::RnCmDirector,
            Role::ClinicalMgmt,
            Role::Compliance,
            Role::SuperUser,
            Role::SuperAdmin,
        ] {
            assert!(!is_blocked_for_attorney(role, &case).blocked);
            assert!(
                can_access(role, &case, Feature::ViewClinical),
                "{role} denied clinical access"
            );
        }
    }

    #[test]
    fn test_identity_and_clinical_gates_are_orthogonal() {
        let case = case_with(true, true, true, CaseStatus::InProgress);
        // Firm staff may see clinical detail but never identity.
        assert!(can_access(Role::Staff, &case, Feature::ViewClinical));
        assert!(!can_access(Role::Staff, &case, Feature::ViewIdentity));
        // RN CM sees both but cannot export.
        assert!(can_access(Role::RnCm, &case, Feature::ViewIdentity));
        assert!(can_access(Role::RnCm, &case, Feature::ViewClinical));
        assert!(!can_access(Role::RnCm, &case, Feature::Export));
    }

    #[test]
    fn test_ops_staff_is_not_a_backdoor() {
        let unconsented = case_with(true, true, false, CaseStatus::InProgress);
        for feature in [
            Feature::ViewIdentity,
            Feature::ViewClinical,
            Feature::RouteProvider,
            Feature::Export,
        ] {
            assert!(!can_access(Role::OpsStaff, &unconsented, feature));
        }
        let consented = case_with(true, true, true, CaseStatus::InProgress);
        assert!(can_access(Role::OpsStaff, &consented, Feature::ViewClinical));
        assert!(!can_access(Role::OpsStaff, &consented, Feature::ViewSensitive));
    }

    #[test]
    fn test_client_role_resolves_to_deny_for_every_feature() {
        let case = case_with(true, true, true, CaseStatus::InProgress);
        for feature in [
            Feature::ViewIdentity,
            Feature::ViewClinical,
            Feature::ViewSensitive,
            Feature::Export,
            Feature::RouteProvider,
        ] {
            assert!(!can_access(Role::Client, &case, feature));
        }
    }

    #[test]
    fn test_unknown_role_strings_fail_to_parse() {
        assert!("RN".parse::<Role>().is_err());
        assert!("attorney".parse::<Role>().is_err());
        assert!("".parse::<Role>().is_err());
        assert_eq!("ATTORNEY".parse::<Role>().unwrap(), Role::Attorney);
    }

    #[test]
    fn test_display_name_masks_without_identity_access() {
        let case = case_with(true, true, true, CaseStatus::InProgress);
        assert_eq!(display_name(Role::RnCm, &case), "Alice Barnes");
        assert_eq!(display_name(Role::Staff, &case), "A.B.");
        assert_eq!(display_name(Role::Client, &case), "A.B.");
    }
}
