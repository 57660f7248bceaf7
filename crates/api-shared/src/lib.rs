//! # API Shared
//!
//! Shared pieces of the care-gate HTTP surface:
//! - Wire DTOs (`dto` module, serde + OpenAPI schemas)
//! - Bearer-credential authentication (`auth` module)
//! - The shared `HealthService`
//!
//! Used by `api-rest` and the `care-gate` server binary.

pub mod auth;
pub mod dto;
pub mod health;

pub use health::HealthService;
