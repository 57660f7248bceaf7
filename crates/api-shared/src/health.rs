use crate::dto::HealthRes;

/// Simple health service shared by the REST surface and the server binary.
#[derive(Clone)]
pub struct HealthService;

impl HealthService {
    /// Creates a new instance of HealthService.
    pub fn new() -> Self {
        Self
    }

    /// Static health check; preferred, as it needs no instance.
    pub fn check_health() -> HealthRes {
        HealthRes {
            ok: true,
            message: "care-gate is alive".into(),
        }
    }
}

impl Default for HealthService {
    fn default() -> Self {
        Self::new()
    }
}
