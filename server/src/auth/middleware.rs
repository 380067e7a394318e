use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
};

use crate::auth::jwt::CredentialVerifier;
use crate::ws::UserId;

/// Authenticated caller extracted from `Authorization: Bearer`.
/// Implements axum's FromRequestParts for use as an extractor.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: UserId,
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(StatusCode::UNAUTHORIZED)?;

        // Verifier is placed in request extensions by the routes layer
        let verifier = parts
            .extensions
            .get::<Verifier>()
            .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;

        let user_id = verifier
            .0
            .verify(token)
            .map_err(|_| StatusCode::UNAUTHORIZED)?;

        Ok(AuthUser { user_id })
    }
}

/// Shared verifier stored in request extensions for the AuthUser extractor
#[derive(Clone)]
pub struct Verifier(pub Arc<dyn CredentialVerifier>);

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}
