//! Sensitive disclosures and case alerts.
//!
//! Disclosures are created during client intake and are read-only here;
//! this module carries the types plus the risk classification applied at
//! intake time. The filtering rules that decide who sees what live in
//! [`crate::filter`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The client's per-item, per-audience sharing choice.
///
/// `Unset` always fails closed: an item without an explicit `Share` is
/// treated as not shared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentChoice {
    Share,
    NoShare,
    #[default]
    Unset,
}

/// Intake category of a sensitive disclosure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisclosureCategory {
    SubstanceUse,
    SafetyTrauma,
    Stressors,
}

/// Risk classification assigned at intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Yellow,
    Orange,
    Red,
}

const RED_FLAGS: &[&str] = &["self_harm", "suicide_thoughts", "suicidal_ideation"];

const ORANGE_FLAGS: &[&str] = &[
    "dv_ipv",
    "intimate_partner_violence",
    "domestic_violence",
    "sexual_assault",
    "sexual_exploitation",
    "stalking",
    "harassment",
    "active_substance_misuse",
    "substance_withdrawal",
    "current_abuse",
];

/// Classify an item code into a risk level. Items outside the known flag
/// sets carry no automatic risk level.
pub fn risk_level_for_item(item_code: &str) -> Option<RiskLevel> {
    if RED_FLAGS.contains(&item_code) {
        return Some(RiskLevel::Red);
    }
    if ORANGE_FLAGS.contains(&item_code) {
        return Some(RiskLevel::Orange);
    }
    None
}

/// Normalise free-form item text into an item code:
/// lowercase, runs of non-alphanumerics collapsed to `_`, trimmed.
pub fn normalize_item_code(item_text: &str) -> String {
    let mut code = String::with_capacity(item_text.len());
    let mut last_was_separator = false;
    for ch in item_text.chars() {
        if ch.is_ascii_alphanumeric() {
            code.push(ch.to_ascii_lowercase());
            last_was_separator = false;
        } else if !last_was_separator && !code.is_empty() {
            code.push('_');
            last_was_separator = true;
        }
    }
    if code.ends_with('_') {
        code.pop();
    }
    code
}

/// A single sensitive item the client chose (or declined) to disclose.
///
/// Sharing the item and sharing its free-text note are consented
/// separately: `consent_attorney` admits the item into attorney-facing
/// output at all, `consent_attorney_note` additionally releases the note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitiveDisclosure {
    pub category: DisclosureCategory,
    pub item_code: String,
    pub risk_level: Option<RiskLevel>,
    pub free_text: Option<String>,
    pub consent_attorney: ConsentChoice,
    pub consent_attorney_note: ConsentChoice,
    pub consent_provider: ConsentChoice,
    /// Whether the client chose to disclose this item at all.
    pub selected: bool,
}

impl SensitiveDisclosure {
    /// A selected disclosure with consent flags unset (the intake default).
    pub fn new(category: DisclosureCategory, item_code: impl Into<String>) -> Self {
        let item_code = item_code.into();
        Self {
            risk_level: risk_level_for_item(&item_code),
            category,
            item_code,
            free_text: None,
            consent_attorney: ConsentChoice::Unset,
            consent_attorney_note: ConsentChoice::Unset,
            consent_provider: ConsentChoice::Unset,
            selected: true,
        }
    }
}

/// How broadly an alert may be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisclosureScope {
    Internal,
    Minimal,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// A safety alert raised against a case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseAlert {
    pub severity: AlertSeverity,
    pub message: String,
    pub disclosure_scope: DisclosureScope,
    pub created_at: DateTime<Utc>,
}

/// Build the internal safety alert raised when a red or orange item is
/// disclosed at intake. Returns `None` for items without a risk level.
pub fn safety_alert_for(item_code: &str, created_at: DateTime<Utc>) -> Option<CaseAlert> {
    let risk = risk_level_for_item(item_code)?;
    let severity = match risk {
        RiskLevel::Red => AlertSeverity::Critical,
        _ => AlertSeverity::High,
    };
    let message = match item_code {
        "self_harm" => "Client disclosed self-harm. Immediate RN CM review required.".to_owned(),
        "suicide_thoughts" | "suicidal_ideation" => {
            "Client disclosed suicidal thoughts. Immediate RN CM review required.".to_owned()
        }
        "dv_ipv" | "intimate_partner_violence" | "domestic_violence" => {
            "Client disclosed domestic/intimate partner violence. Safety assessment needed."
                .to_owned()
        }
        "sexual_assault" => "Client disclosed sexual assault. Trauma-informed care needed.".into(),
        "stalking" | "harassment" => {
            "Client disclosed stalking/harassment. Safety planning needed.".to_owned()
        }
        "active_substance_misuse" => {
            "Client disclosed active substance misuse. Assessment needed.".to_owned()
        }
        other => format!("Safety concern: {other}"),
    };
    Some(CaseAlert {
        severity,
        message,
        // Safety alerts are for the care team; they never default to a
        // shareable scope.
        disclosure_scope: DisclosureScope::Internal,
        created_at,
    })
}
