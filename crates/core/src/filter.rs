//! Disclosure filtering for exports and external views.
//!
//! Narrows a case's alerts and sensitive disclosures to what a given
//! viewer may see. Alert visibility follows the alert's disclosure scope;
//! disclosure visibility follows the client's per-item consent, failing
//! closed wherever consent is unset.

use care_types::CaseId;

use crate::access::Role;
use crate::disclosure::{CaseAlert, ConsentChoice, DisclosureScope, SensitiveDisclosure};
use crate::store::ShareStore;
use crate::{CareError, CareResult};

/// Placed wherever a free-text note exists but may not be shown.
pub const REDACTION_PLACEHOLDER: &str = "[REDACTED]";

/// Compatibility string rendered by export tooling when sensitive content
/// is withheld entirely. Other tooling matches on it; do not reword.
pub const SENSITIVE_EXPORT_NOTICE: &str =
    "Sensitive information is not available in this export due to access restrictions.";

/// Coarse trust classification of a viewer for filtering purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerClass {
    /// Internal clinical, oversight and operations roles.
    Internal,
    /// Authorized external viewers on the legal side.
    ExternalAttorney,
    /// Everyone else; sees no sensitive material.
    OtherExternal,
}

pub fn classify_viewer(role: Role) -> ViewerClass {
    if role.is_internal() {
        return ViewerClass::Internal;
    }
    match role {
        Role::Attorney | Role::Staff | Role::ClinicalStaffExternal => ViewerClass::ExternalAttorney,
        _ => ViewerClass::OtherExternal,
    }
}

/// The slice of sensitive material a viewer may see.
#[derive(Debug, Clone)]
pub struct FilteredDisclosures {
    pub alerts: Vec<CaseAlert>,
    pub disclosures: Vec<SensitiveDisclosure>,
    pub can_view_sensitive: bool,
}

/// Narrow a case's alerts and disclosures for `viewer_role`.
///
/// A case with no sensitive material returns empty vectors with
/// `can_view_sensitive` reflecting the role alone; an unknown case id is
/// an error. Callers rendering exports must print
/// [`SENSITIVE_EXPORT_NOTICE`] when `can_view_sensitive` is false.
pub fn filter_sensitive_for_export(
    store: &dyn ShareStore,
    case_id: &CaseId,
    viewer_role: Role,
) -> CareResult<FilteredDisclosures> {
    store
        .case(case_id)?
        .ok_or_else(|| CareError::CaseNotFound(case_id.to_string()))?;

    let class = classify_viewer(viewer_role);
    let alerts = filter_alerts(store.alerts_for_case(case_id)?, class);
    let disclosures = filter_disclosures(store.disclosures_for_case(case_id)?, class);

    Ok(FilteredDisclosures {
        alerts,
        disclosures,
        can_view_sensitive: class != ViewerClass::OtherExternal,
    })
}

fn filter_alerts(alerts: Vec<CaseAlert>, class: ViewerClass) -> Vec<CaseAlert> {
    match class {
        ViewerClass::Internal => alerts,
        ViewerClass::ExternalAttorney => alerts
            .into_iter()
            .filter(|alert| {
                matches!(
                    alert.disclosure_scope,
                    DisclosureScope::Minimal | DisclosureScope::Full
                )
            })
            .collect(),
        ViewerClass::OtherExternal => Vec::new(),
    }
}

fn filter_disclosures(
    disclosures: Vec<SensitiveDisclosure>,
    class: ViewerClass,
) -> Vec<SensitiveDisclosure> {
    let candidates = disclosures.into_iter().filter(|item| item.selected);

    match class {
        // Internal viewers see every selected item with its note intact.
        ViewerClass::Internal => candidates.collect(),
        ViewerClass::ExternalAttorney => candidates
            .filter(|item| item.consent_attorney == ConsentChoice::Share)
            .map(gate_free_text)
            .collect(),
        ViewerClass::OtherExternal => Vec::new(),
    }
}

/// Release or redact an item's free-text note.
///
/// The note is gated independently of the item itself: an item the client
/// consented to share still has its note replaced with the placeholder
/// unless the note was also consented. An absent note stays absent.
fn gate_free_text(mut item: SensitiveDisclosure) -> SensitiveDisclosure {
    if item.consent_attorney_note != ConsentChoice::Share {
        item.free_text = item
            .free_text
            .map(|_| REDACTION_PLACEHOLDER.to_owned());
    }
    item
}
