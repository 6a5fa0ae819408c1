use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Check both stores; problems are logged and reported, never returned as errors.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let live_store = match state.live_store().ping().await {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, "live store ping failed");
            false
        }
    };

    let record_store = match state.record_store().await {
        Some(store) => match store.health_check().await {
            Ok(()) => !state.is_degraded().await,
            Err(err) => {
                warn!(error = %err, "record store health check failed");
                false
            }
        },
        None => {
            warn!("record store unavailable (degraded mode)");
            false
        }
    };

    HealthResponse::from_checks(live_store, record_store)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        chess::ShakmatyRules,
        config::AppConfig,
        dao::{live_store::memory::MemoryLiveStore, record_store::memory::MemoryRecordStore},
        state::AppState,
    };

    #[tokio::test]
    async fn degraded_without_record_store() {
        let state = AppState::new(
            AppConfig::default(),
            Arc::new(MemoryLiveStore::new()),
            Arc::new(ShakmatyRules),
        );
        let report = health_status(&state).await;
        assert_eq!(report.status, "degraded");
        assert!(report.live_store);
        assert!(!report.record_store);

        state
            .set_record_store(Arc::new(MemoryRecordStore::new()))
            .await;
        assert_eq!(health_status(&state).await.status, "ok");
    }
}
