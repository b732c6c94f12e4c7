//! Owner identity extraction.
//!
//! Authentication itself happens upstream (gateway middleware verifies the
//! token and forwards the resolved user id). Handlers only consume the
//! resolved identity; every data access is still ownership-checked against
//! it in the stores.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::errors::AppError;

pub const OWNER_HEADER: &str = "x-user-id";

/// The authenticated owner of the request.
#[derive(Debug, Clone, Copy)]
pub struct Owner(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for Owner
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(OWNER_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::Unauthorized)?;
        let id = Uuid::parse_str(raw).map_err(|_| AppError::Unauthorized)?;
        Ok(Owner(id))
    }
}
