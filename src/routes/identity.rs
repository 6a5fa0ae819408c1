use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;

/// Header carrying the caller identity, set by the upstream gateway.
pub const PLAYER_HEADER: &str = "x-player";

/// Authenticated player making the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerId(pub String);

impl<S: Send + Sync> FromRequestParts<S> for PlayerId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(PLAYER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| PlayerId(value.to_owned()))
            .ok_or_else(|| AppError::Unauthorized(format!("missing {PLAYER_HEADER} header")))
    }
}
