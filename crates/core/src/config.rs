//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. The intent is to avoid reading process-wide environment variables
//! during request handling, which can lead to inconsistent behaviour in multi-threaded runtimes
//! and test harnesses.

use crate::constants::{
    DEFAULT_RATE_MAX_REQUESTS, DEFAULT_RATE_WINDOW_SECS, DEFAULT_TOKEN_LENGTH, DEFAULT_TTL_HOURS,
    MIN_TOKEN_LENGTH, TTL_MAX_HOURS, TTL_MIN_HOURS,
};
use crate::ratelimit::RateQuota;
use crate::{CareError, CareResult};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    token_length: usize,
    default_ttl_hours: i64,
    rate_quota: RateQuota,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    pub fn new(
        token_length: usize,
        default_ttl_hours: i64,
        rate_quota: RateQuota,
    ) -> CareResult<Self> {
        if token_length < MIN_TOKEN_LENGTH {
            return Err(CareError::InvalidInput(format!(
                "token length must be at least {MIN_TOKEN_LENGTH}"
            )));
        }
        if !(TTL_MIN_HOURS..=TTL_MAX_HOURS).contains(&default_ttl_hours) {
            return Err(CareError::InvalidInput(format!(
                "default ttl must be within {TTL_MIN_HOURS}..={TTL_MAX_HOURS} hours"
            )));
        }
        if rate_quota.max_requests == 0 {
            return Err(CareError::InvalidInput(
                "rate limit must allow at least one request per window".into(),
            ));
        }
        if rate_quota.window <= chrono::Duration::zero() {
            return Err(CareError::InvalidInput(
                "rate limit window must be positive".into(),
            ));
        }

        Ok(Self {
            token_length,
            default_ttl_hours,
            rate_quota,
        })
    }

    pub fn token_length(&self) -> usize {
        self.token_length
    }

    pub fn default_ttl_hours(&self) -> i64 {
        self.default_ttl_hours
    }

    pub fn rate_quota(&self) -> RateQuota {
        self.rate_quota
    }

    /// Clamp a requested share-link lifetime into the supported range.
    /// A missing value falls back to the configured default.
    pub fn clamp_ttl_hours(&self, requested: Option<i64>) -> i64 {
        requested
            .unwrap_or(self.default_ttl_hours)
            .clamp(TTL_MIN_HOURS, TTL_MAX_HOURS)
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            token_length: DEFAULT_TOKEN_LENGTH,
            default_ttl_hours: DEFAULT_TTL_HOURS,
            rate_quota: RateQuota {
                window: chrono::Duration::seconds(DEFAULT_RATE_WINDOW_SECS),
                max_requests: DEFAULT_RATE_MAX_REQUESTS,
            },
        }
    }
}

/// Parse the share-token length from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns the default length.
pub fn token_length_from_env_value(value: Option<String>) -> CareResult<usize> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    let parsed = value
        .map(|v| {
            v.parse::<usize>().map_err(|_| {
                CareError::InvalidInput("CARE_TOKEN_LENGTH must be a positive integer".into())
            })
        })
        .transpose()?;

    Ok(parsed.unwrap_or(DEFAULT_TOKEN_LENGTH))
}

/// Parse the default share-link TTL (hours) from an optional string value.
pub fn default_ttl_from_env_value(value: Option<String>) -> CareResult<i64> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    let parsed = value
        .map(|v| {
            v.parse::<i64>().map_err(|_| {
                CareError::InvalidInput("CARE_DEFAULT_TTL_HOURS must be an integer".into())
            })
        })
        .transpose()?;

    Ok(parsed.unwrap_or(DEFAULT_TTL_HOURS))
}

/// Parse the rate-limit quota from optional window/request string values.
pub fn rate_quota_from_env_values(
    window_secs: Option<String>,
    max_requests: Option<String>,
) -> CareResult<RateQuota> {
    let window_secs = window_secs
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(|v| {
            v.parse::<i64>().map_err(|_| {
                CareError::InvalidInput("CARE_RATE_WINDOW_SECS must be an integer".into())
            })
        })
        .transpose()?
        .unwrap_or(DEFAULT_RATE_WINDOW_SECS);

    let max_requests = max_requests
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(|v| {
            v.parse::<u32>().map_err(|_| {
                CareError::InvalidInput("CARE_RATE_MAX_REQUESTS must be a positive integer".into())
            })
        })
        .transpose()?
        .unwrap_or(DEFAULT_RATE_MAX_REQUESTS);

    Ok(RateQuota {
        window: chrono::Duration::seconds(window_secs),
        max_requests,
    })
}
