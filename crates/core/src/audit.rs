//! Append-only audit log.
//!
//! Every state-changing sharing operation, and every successful external
//! read, appends exactly one event. Nothing in this subsystem updates or
//! deletes an event. Event metadata carries counts, flags and opaque ids
//! only; client names, dates of birth and clinical free text never enter
//! the log.

use care_types::CaseId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{CareError, CareResult};

/// Audited action names, stable wire strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    ProviderSharePortal,
    PortalView,
    TokenRevoked,
    ConsentRevoked,
    FaxSent,
    ProviderNote,
    ShareBlocked,
}

pub const ALL_ACTIONS: [AuditAction; 7] = [
    AuditAction::ProviderSharePortal,
    AuditAction::PortalView,
    AuditAction::TokenRevoked,
    AuditAction::ConsentRevoked,
    AuditAction::FaxSent,
    AuditAction::ProviderNote,
    AuditAction::ShareBlocked,
];

impl AuditAction {
    pub fn as_wire(&self) -> &'static str {
        match self {
            AuditAction::ProviderSharePortal => "PROVIDER_SHARE_PORTAL",
            AuditAction::PortalView => "PORTAL_VIEW",
            AuditAction::TokenRevoked => "TOKEN_REVOKED",
            AuditAction::ConsentRevoked => "CONSENT_REVOKED",
            AuditAction::FaxSent => "FAX_SENT",
            AuditAction::ProviderNote => "PROVIDER_NOTE",
            AuditAction::ShareBlocked => "SHARE_BLOCKED",
        }
    }
}

impl std::str::FromStr for AuditAction {
    type Err = CareError;

    fn from_str(s: &str) -> CareResult<Self> {
        ALL_ACTIONS
            .into_iter()
            .find(|action| action.as_wire() == s)
            .ok_or_else(|| CareError::InvalidInput(format!("unknown audit action: {s}")))
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// One audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub action: AuditAction,
    /// Credential id of whoever acted; `"provider-portal"` for
    /// token-authenticated reads.
    pub actor: String,
    pub case_id: Option<CaseId>,
    /// The share token this event concerns, when applicable. The token
    /// string is the token's identity; audit access is itself privileged.
    pub token: Option<String>,
    pub at: DateTime<Utc>,
    pub metadata: Map<String, Value>,
}

impl AuditEvent {
    pub fn new(action: AuditAction, actor: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            action,
            actor: actor.into(),
            case_id: None,
            token: None,
            at,
            metadata: Map::new(),
        }
    }

    pub fn for_case(mut self, case_id: &CaseId) -> Self {
        self.case_id = Some(case_id.clone());
        self
    }

    pub fn for_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_owned());
        self
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_owned(), value.into());
        self
    }
}

/// Filters for an audit query. All filters are optional and conjunctive;
/// `from`/`to` are inclusive bounds on the event timestamp.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub case_id: Option<CaseId>,
    pub action: Option<AuditAction>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl AuditQuery {
    pub fn matches(&self, event: &AuditEvent) -> bool {
        if let Some(case_id) = &self.case_id {
            if event.case_id.as_ref() != Some(case_id) {
                return false;
            }
        }
        if let Some(action) = self.action {
            if event.action != action {
                return false;
            }
        }
        if let Some(from) = self.from {
            if event.at < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if event.at > to {
                return false;
            }
        }
        true
    }
}

/// Append-only sink for audit events.
///
/// `append` must either durably record the event or fail; callers treat a
/// failed append as a failed operation. `query` returns matching events
/// newest-first, bounded by the query's `limit` (or the store default).
pub trait AuditSink: Send + Sync {
    fn append(&self, event: AuditEvent) -> CareResult<()>;
    fn query(&self, query: &AuditQuery) -> CareResult<Vec<AuditEvent>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_AUDIT_QUERY_LIMIT;
    use crate::store::MemoryStore;
    use chrono::Duration;

    #[test]
    fn test_action_wire_names_round_trip() {
        for action in ALL_ACTIONS {
            let parsed: AuditAction = action.as_wire().parse().unwrap();
            assert_eq!(parsed, action);
            let json = serde_json::to_string(&action).unwrap();
            assert_eq!(json, format!("\"{}\"", action.as_wire()));
        }
        assert!("NOT_AN_ACTION".parse::<AuditAction>().is_err());
    }

    #[test]
    fn test_query_returns_newest_first_with_limit() {
        let sink = MemoryStore::new();
        let case_id: CaseId = "CASE-7".parse().unwrap();
        let base = Utc::now();
        for i in 0..5 {
            sink.append(
                AuditEvent::new(AuditAction::PortalView, "rn-1", base + Duration::seconds(i))
                    .for_case(&case_id),
            )
            .unwrap();
        }

        let events = sink
            .query(&AuditQuery {
                limit: Some(3),
                ..AuditQuery::default()
            })
            .unwrap();
        assert_eq!(events.len(), 3);
        assert!(events.windows(2).all(|pair| pair[0].at >= pair[1].at));
        assert_eq!(events[0].at, base + Duration::seconds(4));
    }

    #[test]
    fn test_query_is_capped_even_when_no_limit_is_given() {
        let sink = MemoryStore::new();
        let base = Utc::now();
        for i in 0..(DEFAULT_AUDIT_QUERY_LIMIT as i64 + 5) {
            sink.append(AuditEvent::new(
                AuditAction::PortalView,
                "rn-1",
                base + Duration::seconds(i),
            ))
            .unwrap();
        }

        let unbounded = sink.query(&AuditQuery::default()).unwrap();
        assert_eq!(unbounded.len(), DEFAULT_AUDIT_QUERY_LIMIT);

        let oversized = sink
            .query(&AuditQuery {
                limit: Some(DEFAULT_AUDIT_QUERY_LIMIT * 4),
                ..AuditQuery::default()
            })
            .unwrap();
        assert_eq!(oversized.len(), DEFAULT_AUDIT_QUERY_LIMIT);
    }

    #[test]
    fn test_query_filters_by_case_action_and_time_range() {
        let sink = MemoryStore::new();
        let case_a: CaseId = "CASE-A".parse().unwrap();
        let case_b: CaseId = "CASE-B".parse().unwrap();
        let base = Utc::now();

        sink.append(
            AuditEvent::new(AuditAction::ProviderSharePortal, "rn-1", base).for_case(&case_a),
        )
        .unwrap();
        sink.append(
            AuditEvent::new(
                AuditAction::TokenRevoked,
                "rn-1",
                base + Duration::minutes(5),
            )
            .for_case(&case_a),
        )
        .unwrap();
        sink.append(
            AuditEvent::new(
                AuditAction::PortalView,
                "provider-portal",
                base + Duration::minutes(10),
            )
            .for_case(&case_b),
        )
        .unwrap();

        let for_case_a = sink
            .query(&AuditQuery {
                case_id: Some(case_a.clone()),
                ..AuditQuery::default()
            })
            .unwrap();
        assert_eq!(for_case_a.len(), 2);

        let revocations = sink
            .query(&AuditQuery {
                action: Some(AuditAction::TokenRevoked),
                ..AuditQuery::default()
            })
            .unwrap();
        assert_eq!(revocations.len(), 1);

        let windowed = sink
            .query(&AuditQuery {
                from: Some(base + Duration::minutes(1)),
                to: Some(base + Duration::minutes(6)),
                ..AuditQuery::default()
            })
            .unwrap();
        assert_eq!(windowed.len(), 1);
        assert_eq!(windowed[0].action, AuditAction::TokenRevoked);
    }
}
