//! # Care Core
//!
//! Consent-scoped disclosure control and secure external sharing for the
//! care-gate case-management system:
//! - Role/capability resolution (pure, synchronous, fail-closed)
//! - Disclosure filtering by viewer class and per-item consent
//! - Share-token issuance, validation, viewing and revocation
//! - An append-only audit sink and a fixed-window rate limiter
//!
//! **No API concerns**: authentication, HTTP servers and wire DTOs belong
//! in `api-rest` and `api-shared`. This crate reads case state through the
//! injected [`store::ShareStore`] seam and never performs network I/O.

pub mod access;
pub mod audit;
pub mod case;
pub mod clock;
pub mod config;
pub mod constants;
pub mod disclosure;
mod error;
pub mod filter;
pub mod portal;
pub mod ratelimit;
pub mod store;

pub use config::CoreConfig;
pub use error::{CareError, CareResult};
