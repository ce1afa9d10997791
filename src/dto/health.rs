use serde::Serialize;
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Background jobs (judgements, illustrations, media runs) currently in flight.
    pub background_tasks: usize,
}

impl HealthResponse {
    /// The session store is reachable.
    pub fn ok(background_tasks: usize) -> Self {
        Self {
            status: "ok".to_string(),
            background_tasks,
        }
    }

    /// No session store is installed or it stopped answering.
    pub fn degraded(background_tasks: usize) -> Self {
        Self {
            status: "degraded".to_string(),
            background_tasks,
        }
    }
}
