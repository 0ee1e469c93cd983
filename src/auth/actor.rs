use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;

use super::{Action, AuthService, PermissionMatrix, Resource};
use crate::error::{AppError, AppResult};
use crate::model::User;

/// The account a request is made on behalf of, resolved from
/// `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct Actor(pub User);

impl Actor {
    pub fn user(&self) -> &User {
        &self.0
    }

    /// Identity written to the audit log
    pub fn name(&self) -> &str {
        &self.0.email
    }

    pub fn require(
        &self,
        matrix: &PermissionMatrix,
        resource: Resource,
        action: Action,
    ) -> AppResult<()> {
        if matrix.is_allowed(&self.0.role, resource, action) {
            return Ok(());
        }
        warn!(
            "Permission denied: {} (role {}) attempted {} on {}",
            self.0.email, self.0.role, action, resource
        );
        Err(AppError::PermissionDenied { resource, action })
    }
}

fn bearer_token(parts: &Parts) -> AppResult<&str> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or(AppError::AuthenticationRequired)?;
    let value = header
        .to_str()
        .map_err(|_| AppError::AuthenticationFailed("malformed Authorization header".to_string()))?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .ok_or_else(|| AppError::AuthenticationFailed("expected a Bearer token".to_string()))?;
    if token.is_empty() {
        return Err(AppError::AuthenticationRequired);
    }
    Ok(token)
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    Arc<AuthService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let auth = Arc::<AuthService>::from_ref(state);
        let user = auth.resolve_actor(token).await?;
        Ok(Actor(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/flights");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_missing_header_requires_authentication() {
        let err = bearer_token(&parts(None)).unwrap_err();
        assert!(matches!(err, AppError::AuthenticationRequired));
    }

    #[test]
    fn test_non_bearer_scheme_fails() {
        let err = bearer_token(&parts(Some("Basic dXNlcjpwYXNz"))).unwrap_err();
        assert!(matches!(err, AppError::AuthenticationFailed(_)));
    }

    #[test]
    fn test_bearer_token_extracted() {
        assert_eq!(bearer_token(&parts(Some("Bearer abc.def.ghi"))).unwrap(), "abc.def.ghi");
    }
}
