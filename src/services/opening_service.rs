use serde::{Deserialize, Serialize};

use crate::{
    chess,
    dao::{live_store::keys::LiveKey, storage::StorageError},
    error::ServiceError,
    state::SharedState,
};

/// Reference opening stored in the opening table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opening {
    /// Opening name.
    pub name: String,
    /// ECO code.
    #[serde(default)]
    pub eco: Option<String>,
    /// Main line in SAN, when known.
    #[serde(default)]
    pub moves: Option<String>,
    /// Position the entry was keyed from, when stored.
    #[serde(default)]
    pub fen: Option<String>,
}

/// Look up the opening reached by `fen`, ignoring castling, en passant and clocks.
pub async fn resolve(state: &SharedState, fen: &str) -> Result<Option<Opening>, ServiceError> {
    let key = LiveKey::openings();
    let field = chess::normalize(fen);
    let Some(raw) = state.live_store().hash_get(key.clone(), field).await? else {
        return Ok(None);
    };

    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|err| StorageError::corrupted(key, err).into())
}
