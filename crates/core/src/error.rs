#[derive(Debug, thiserror::Error)]
pub enum CareError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("{0}")]
    Blocked(String),
    #[error("case not found: {0}")]
    CaseNotFound(String),
    #[error("share token is not recognised")]
    TokenInvalid,
    #[error("share token has expired")]
    TokenExpired,
    #[error("share token has been revoked")]
    TokenRevoked,
    #[error("store operation failed: {0}")]
    Store(String),
    #[error("failed to append audit event: {0}")]
    AuditAppend(String),
}

impl From<care_types::IdError> for CareError {
    fn from(err: care_types::IdError) -> Self {
        CareError::InvalidInput(err.to_string())
    }
}

pub type CareResult<T> = std::result::Result<T, CareError>;
