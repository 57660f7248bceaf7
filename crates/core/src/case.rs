//! Case, consent and client-identity model.
//!
//! Cases are owned by the external case-management store; this crate reads
//! them to make access decisions. The single write path is the consent
//! revocation cascade, which moves a case into `HoldSensitive`.

use care_types::CaseId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseStatus {
    New,
    AwaitingConsent,
    Routed,
    InProgress,
    HoldSensitive,
    Closed,
}

impl CaseStatus {
    /// Wire name used in JSON responses and audit metadata.
    pub fn as_wire(&self) -> &'static str {
        match self {
            CaseStatus::New => "NEW",
            CaseStatus::AwaitingConsent => "AWAITING_CONSENT",
            CaseStatus::Routed => "ROUTED",
            CaseStatus::InProgress => "IN_PROGRESS",
            CaseStatus::HoldSensitive => "HOLD_SENSITIVE",
            CaseStatus::Closed => "CLOSED",
        }
    }
}

/// What the client has consented to share, and with whom.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentScope {
    pub share_with_attorney: bool,
    pub share_with_providers: bool,
}

/// Per-case consent record.
///
/// `revoked` is one-way within this subsystem; re-consent is an intake
/// workflow that produces a fresh record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Consent {
    pub signed: bool,
    pub signed_at: Option<DateTime<Utc>>,
    pub revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub scope: ConsentScope,
}

impl Consent {
    /// True when consent is signed and has not been withdrawn.
    pub fn in_force(&self) -> bool {
        self.signed && !self.revoked
    }
}

/// Directly identifying client fields.
///
/// `Debug` prints masked values so identity cannot leak through error or
/// log formatting. Anything that leaves the process must go through
/// [`ClientIdentity::portal_label`] or [`mask_name`].
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientIdentity {
    pub full_name: String,
    pub masked_label: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
}

impl ClientIdentity {
    /// The label shown to external viewers: the stored masked label when
    /// present, otherwise initials derived from the full name.
    pub fn portal_label(&self) -> String {
        match &self.masked_label {
            Some(label) if !label.trim().is_empty() => label.clone(),
            _ => {
                let initials = initials_label(&self.full_name);
                if initials.is_empty() {
                    "Restricted".to_owned()
                } else {
                    initials
                }
            }
        }
    }
}

impl std::fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("full_name", &mask_name(&self.full_name))
            .field("masked_label", &self.masked_label)
            .field(
                "date_of_birth",
                &self.date_of_birth.as_ref().map(|_| "<withheld>"),
            )
            .finish()
    }
}

/// A case as read from the case-management store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseRecord {
    pub id: CaseId,
    pub status: CaseStatus,
    pub consent: Consent,
    /// Risk/sensitivity flag. Forces redaction on any share of this case.
    pub sensitive: bool,
    /// Short non-identifying care summary, written to be shareable.
    pub summary: String,
    pub client: ClientIdentity,
    /// Attachment labels only; content stays in the document store.
    pub attachments: Vec<String>,
}

impl CaseRecord {
    /// Masked client label for external payloads. Never the full name.
    pub fn client_label(&self) -> String {
        self.client.portal_label()
    }
}

/// Mask a full name for display, keeping only each part's first letter:
/// `"Alice Barnes"` becomes `"A**** B*****"`.
pub fn mask_name(full_name: &str) -> String {
    full_name
        .split_whitespace()
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => {
                    let rest = chars.count();
                    format!("{first}{}", "*".repeat(rest))
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Initials label for external payloads: `"Alice Barnes"` becomes `"A.B."`.
pub fn initials_label(full_name: &str) -> String {
    full_name
        .split_whitespace()
        .filter_map(|part| part.chars().next())
        .map(|first| format!("{}.", first.to_uppercase()))
        .collect()
}
