use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::auth::permissions::{Action, Resource};
use crate::store::StoreError;

/// Every failure a request can end in. Rendered as
/// `{"error": <category>, "detail": <message>}`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Same outcome for unknown email and wrong password.
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account is inactive")]
    AccountInactive,

    #[error("You do not have permission to {action} {resource}")]
    PermissionDenied { resource: Resource, action: Action },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} with key '{key}' already exists")]
    Conflict { entity: &'static str, key: String },

    #[error("{0}")]
    Validation(String),

    #[error("Upstream service error: {0}")]
    Upstream(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        AppError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn category(&self) -> &'static str {
        match self {
            AppError::AuthenticationRequired => "authentication_required",
            AppError::AuthenticationFailed(_) => "authentication_failed",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::AccountInactive => "account_inactive",
            AppError::PermissionDenied { .. } => "permission_denied",
            AppError::NotFound { .. } => "not_found",
            AppError::Conflict { .. } => "conflict",
            AppError::Validation(_) => "validation_error",
            AppError::Upstream(_) => "upstream_error",
            AppError::Configuration(_) => "configuration_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::AuthenticationRequired
            | AppError::AuthenticationFailed(_)
            | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::AccountInactive | AppError::PermissionDenied { .. } => StatusCode::FORBIDDEN,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Configuration(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { entity, key } => AppError::Conflict { entity, key },
            other => AppError::Internal(anyhow::Error::new(other)),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let detail = if let AppError::Internal(ref err) = self {
            error!("Unhandled backend error: {:#}", err);
            "Internal server error".to_string()
        } else {
            if status.is_server_error() {
                error!("Request failed: {}", self);
            }
            self.to_string()
        };

        let body = json!({
            "error": self.category(),
            "detail": detail,
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_failures_share_status() {
        assert_eq!(AppError::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::AccountInactive.status(), StatusCode::FORBIDDEN);
        assert_ne!(
            AppError::InvalidCredentials.category(),
            AppError::AccountInactive.category()
        );
    }

    #[test]
    fn test_permission_denied_message() {
        let err = AppError::PermissionDenied {
            resource: Resource::Users,
            action: Action::Read,
        };
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(err.to_string(), "You do not have permission to read users");
    }

    #[test]
    fn test_store_conflict_maps_to_conflict() {
        let err: AppError = StoreError::Conflict {
            entity: "hotel",
            key: "H1".to_string(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }
}
