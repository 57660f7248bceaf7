//! Bearer-credential authentication.
//!
//! Credentials are opaque strings handed to staff tooling out of band and
//! resolved here to an actor id and a role. The registry is parsed once at
//! startup from `CARE_API_CREDENTIALS`; request handling never reads the
//! environment.

use std::collections::HashMap;

use care_core::access::Role;

/// Errors raised while parsing the credential registry.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("CARE_API_CREDENTIALS is not set or empty")]
    MissingCredentials,
    #[error("malformed credential entry (expected credential:actor:ROLE): {0}")]
    MalformedEntry(String),
    #[error("unknown role in credential entry for actor {0}")]
    UnknownRole(String),
    #[error("duplicate credential for actor {0}")]
    DuplicateCredential(String),
}

/// Who a bearer credential resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub actor: String,
    pub role: Role,
}

/// Lookup table from bearer credential to actor and role.
#[derive(Debug, Default)]
pub struct CredentialRegistry {
    entries: HashMap<String, Credential>,
}

impl CredentialRegistry {
    /// Parse a registry from the `CARE_API_CREDENTIALS` value: a
    /// comma-separated list of `credential:actor:ROLE` entries, e.g.
    /// `s3cr3t-1:rn-1:RN_CM,s3cr3t-2:att-1:ATTORNEY`.
    pub fn from_env_value(value: Option<String>) -> Result<Self, AuthError> {
        let value = value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(AuthError::MissingCredentials)?;

        let mut entries = HashMap::new();
        for entry in value.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let mut parts = entry.splitn(3, ':');
            let (credential, actor, role) = match (parts.next(), parts.next(), parts.next()) {
                (Some(c), Some(a), Some(r)) if !c.is_empty() && !a.is_empty() => (c, a, r),
                _ => return Err(AuthError::MalformedEntry(redact_entry(entry))),
            };
            let role: Role = role
                .parse()
                .map_err(|_| AuthError::UnknownRole(actor.to_owned()))?;
            let previous = entries.insert(
                credential.to_owned(),
                Credential {
                    actor: actor.to_owned(),
                    role,
                },
            );
            if previous.is_some() {
                return Err(AuthError::DuplicateCredential(actor.to_owned()));
            }
        }
        if entries.is_empty() {
            return Err(AuthError::MissingCredentials);
        }
        Ok(Self { entries })
    }

    /// Resolve a presented bearer credential. `None` means 401.
    pub fn authenticate(&self, bearer: &str) -> Option<&Credential> {
        self.entries.get(bearer)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Entry text safe to put in an error message: the credential part is the
/// secret, so only the shape survives.
fn redact_entry(entry: &str) -> String {
    let colons = entry.matches(':').count();
    format!("<entry with {colons} separators>")
}
