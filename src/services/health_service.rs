use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Probe the session store and report whether the service can serve games.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_session_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "session store health check failed");
            }
        }
        Err(_) => warn!("session store unavailable (degraded mode)"),
    }

    let background_tasks = state.tasks().len();
    if state.is_degraded() {
        HealthResponse::degraded(background_tasks)
    } else {
        HealthResponse::ok(background_tasks)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        providers::Providers,
        state::AppState,
        test_support::{self, Scripted},
    };

    #[tokio::test]
    async fn reports_degraded_until_a_store_is_installed() {
        let config = AppConfig::default();
        let state = AppState::new(config.clone(), Providers::disabled(config.providers));
        assert_eq!(health_status(&state).await.status, "degraded");

        let (state, _clock) = test_support::state_with(Arc::new(Scripted::default())).await;
        let health = health_status(&state).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.background_tasks, 0);
    }
}
