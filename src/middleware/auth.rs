use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::AppError;

/// Set by the upstream auth gateway once the session is verified.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The caller's user id. Requests without a well-formed `x-user-id` are
/// rejected with 401 before reaching the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| AppError::Unauthorized("authentication required".to_string()))?;

        Uuid::parse_str(raw)
            .map(AuthenticatedUser)
            .map_err(|_| AppError::Unauthorized("invalid user identity".to_string()))
    }
}
