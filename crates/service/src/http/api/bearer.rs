use axum::async_trait;
use axum::extract::FromRequestParts;
use http::header::AUTHORIZATION;
use http::request::Parts;

use super::ApiError;
use crate::auth::{AuthError, Claims};
use crate::ServiceState;

/// The raw token from an `Authorization: Bearer <token>` header.
#[derive(Debug)]
pub struct Bearer(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for Bearer
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AuthError::Unauthorized)?;

        let (scheme, token) = value.split_once(' ').ok_or(AuthError::Unauthorized)?;
        let token = token.trim();
        if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
            return Err(AuthError::Unauthorized.into());
        }
        Ok(Bearer(token.to_string()))
    }
}

/// A bearer token that passed validation, with its claims.
#[derive(Debug)]
pub struct Authenticated {
    pub token: String,
    pub claims: Claims,
}

#[async_trait]
impl FromRequestParts<ServiceState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServiceState,
    ) -> Result<Self, Self::Rejection> {
        let Bearer(token) = Bearer::from_request_parts(parts, state).await?;
        let claims = state.auth().validate(&token).await?;
        Ok(Authenticated { token, claims })
    }
}
