use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AuthError;
use crate::services::auth::Identity;

/// Handler-side access to the identity the auth middleware attached.
///
/// The middleware must be mounted on the route. A missing identity is a wiring
/// bug, not a client error, so it rejects with 500.
#[derive(Debug, Clone)]
pub struct IdentityCtx(pub Identity);

impl<S> FromRequestParts<S> for IdentityCtx
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(IdentityCtx)
            .ok_or_else(|| {
                tracing::error!("IdentityCtx used on a route without the auth middleware");
                AuthError::Internal
            })
    }
}
