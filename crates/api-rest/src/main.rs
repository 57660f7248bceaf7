//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the portal REST server on its own.
//!
//! ## Intended use
//! Useful for development and debugging when you only want the REST
//! surface (with OpenAPI/Swagger UI). The workspace's main `care-gate`
//! binary is the deployment entry point.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{router, AppState};
use api_shared::auth::CredentialRegistry;
use care_core::clock::{Clock, SystemClock};
use care_core::config::{
    default_ttl_from_env_value, rate_quota_from_env_values, token_length_from_env_value,
};
use care_core::store::{MemoryStore, SeedData};
use care_core::CoreConfig;

/// Main entry point for the standalone REST server.
///
/// # Environment Variables
/// - `CARE_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `CARE_API_CREDENTIALS`: Comma-separated `credential:actor:ROLE` entries
/// - `CARE_TOKEN_LENGTH`, `CARE_DEFAULT_TTL_HOURS`: Token issuance knobs
/// - `CARE_RATE_WINDOW_SECS`, `CARE_RATE_MAX_REQUESTS`: Rate limit quota
/// - `CARE_SEED_FILE`: Optional JSON fixture loaded into the in-memory store
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the credential registry or configuration cannot be parsed,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("CARE_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    tracing::info!("-- Starting portal REST API on {}", addr);

    let registry = CredentialRegistry::from_env_value(std::env::var("CARE_API_CREDENTIALS").ok())?;

    let token_length = token_length_from_env_value(std::env::var("CARE_TOKEN_LENGTH").ok())?;
    let default_ttl = default_ttl_from_env_value(std::env::var("CARE_DEFAULT_TTL_HOURS").ok())?;
    let quota = rate_quota_from_env_values(
        std::env::var("CARE_RATE_WINDOW_SECS").ok(),
        std::env::var("CARE_RATE_MAX_REQUESTS").ok(),
    )?;
    let config = CoreConfig::new(token_length, default_ttl, quota)?;

    let clock = Arc::new(SystemClock);
    let store = Arc::new(MemoryStore::new());
    if let Ok(seed_path) = std::env::var("CARE_SEED_FILE") {
        let raw = std::fs::read_to_string(&seed_path)?;
        let seed: SeedData = serde_json::from_str(&raw)?;
        let cases = store.apply_seed(seed, clock.now());
        tracing::info!("loaded {} seed cases from {}", cases, seed_path);
    }

    let state = AppState::new(config, clock, store, Arc::new(registry));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
