mod actor;
mod auth_service;
pub mod permissions;

use anyhow::{Context, Result, anyhow};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::config::AuthSettings;
use crate::model::User;

pub use actor::Actor;
pub use auth_service::{AuthService, LoginResponse};
pub use permissions::{Action, PermissionMatrix, Resource};

/// JWT Claims structure that will be encoded in the token
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Role tag at the time the token was issued
    pub role: String,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
    /// Issuer
    pub iss: String,
}

/// Configuration for JWT tokens
pub struct JwtConfig {
    /// Secret key for signing tokens
    encoding_key: EncodingKey,
    /// Key for verifying token signatures
    decoding_key: DecodingKey,
    /// Token expiration time in seconds
    expiration: i64,
    /// Issuer claim value
    issuer: String,
}

impl JwtConfig {
    pub fn new(secret: &str, expiration: i64, issuer: impl Into<String>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiration,
            issuer: issuer.into(),
        }
    }

    /// Initialize JWT configuration from the `auth` settings section
    pub fn from_settings(settings: &AuthSettings) -> Result<Self> {
        let secret = settings
            .jwt_secret
            .as_deref()
            .filter(|secret| !secret.is_empty())
            .context("auth.jwt_secret must be set (TOURDESK__AUTH__JWT_SECRET)")?;
        if settings.token_ttl_seconds <= 0 {
            return Err(anyhow!("auth.token_ttl_seconds must be positive"));
        }
        Ok(Self::new(secret, settings.token_ttl_seconds, settings.issuer.clone()))
    }

    /// Generate a signed session token for a user
    pub fn generate_token(&self, user: &User) -> Result<String> {
        let now = OffsetDateTime::now_utc();
        let expiration = now + Duration::seconds(self.expiration);

        let claims = Claims {
            sub: user.id.to_string(),
            role: user.role.clone(),
            iat: now.unix_timestamp(),
            exp: expiration.unix_timestamp(),
            iss: self.issuer.clone(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow!("Failed to generate JWT token: {}", e))?;

        debug!("Generated JWT token for user_id: {}", user.id);
        Ok(token)
    }

    /// Validate a JWT token and extract the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| anyhow!("Failed to validate JWT token: {}", e))?;

        debug!("Validated JWT token for user_id: {}", token_data.claims.sub);
        Ok(token_data.claims)
    }

    pub fn expiration_seconds(&self) -> i64 {
        self.expiration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewUser, UserStatus};

    fn user() -> User {
        User::new(
            NewUser {
                name: "Token User".to_string(),
                email: "token@example.com".to_string(),
                password: "unused".to_string(),
                role: "operation".to_string(),
                status: UserStatus::Active,
                profile_picture: None,
            },
            "hash".to_string(),
        )
        .unwrap()
    }

    #[test]
    fn test_jwt_token_lifecycle() {
        let jwt_config =
            JwtConfig::new("test_secret_key_for_jwt_token_testing", 3600, "test_issuer");
        let user = user();

        let token = jwt_config.generate_token(&user).unwrap();
        assert!(!token.is_empty());

        let claims = jwt_config.validate_token(&token).unwrap();
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.role, "operation");
        assert_eq!(claims.iss, "test_issuer");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_token_from_other_secret_or_issuer_rejected() {
        let user = user();
        let token = JwtConfig::new("secret-a", 3600, "tourdesk").generate_token(&user).unwrap();

        assert!(JwtConfig::new("secret-b", 3600, "tourdesk").validate_token(&token).is_err());
        assert!(JwtConfig::new("secret-a", 3600, "elsewhere").validate_token(&token).is_err());
        assert!(JwtConfig::new("secret-a", 3600, "tourdesk").validate_token("not.a.jwt").is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        // Past the default 60s leeway
        let config = JwtConfig::new("secret", -120, "tourdesk");
        let token = config.generate_token(&user()).unwrap();
        assert!(config.validate_token(&token).is_err());
    }

    #[test]
    fn test_missing_secret_is_an_error() {
        let settings = AuthSettings {
            jwt_secret: None,
            token_ttl_seconds: 60,
            issuer: "tourdesk".to_string(),
        };
        assert!(JwtConfig::from_settings(&settings).is_err());
    }
}
