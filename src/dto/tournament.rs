use serde::Serialize;
use utoipa::ToSchema;

/// Subscription state of the caller after a subscribe or unsubscribe request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResponse {
    /// Tournament concerned.
    pub tournament_id: String,
    /// Caller.
    pub player: String,
    /// Subscription state after the request.
    pub subscribed: bool,
}
