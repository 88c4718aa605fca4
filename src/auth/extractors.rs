use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use super::{claims::Principal, jwt::JwtKeys};
use crate::error::AppError;

/// Guard for protected routes: validates the bearer token and yields the caller.
///
/// No store lookup happens here. A user deleted after issuance still passes
/// and is reported as not found by the operation itself.
pub struct AuthUser(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Expect "Bearer <token>"
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer ").or_else(|| h.strip_prefix("bearer ")))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AppError::Unauthenticated("Authentication required"))?;

        let keys = JwtKeys::from_ref(state);
        match keys.verify(token) {
            Ok(principal) => Ok(AuthUser(principal)),
            Err(_) => {
                warn!("invalid or expired token");
                Err(AppError::Unauthenticated("Invalid or expired token"))
            }
        }
    }
}
