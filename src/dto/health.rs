use serde::Serialize;
use utoipa::ToSchema;

/// Health report returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// "ok" when both stores answer, "degraded" otherwise.
    pub status: String,
    /// Whether the shared live store answered a ping.
    pub live_store: bool,
    /// Whether the record store is installed and healthy.
    pub record_store: bool,
}

impl HealthResponse {
    /// Build the report from the reachability of each store.
    pub fn from_checks(live_store: bool, record_store: bool) -> Self {
        let status = if live_store && record_store {
            "ok"
        } else {
            "degraded"
        };
        Self {
            status: status.to_string(),
            live_store,
            record_store,
        }
    }
}
