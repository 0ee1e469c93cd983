use std::sync::Arc;

use anyhow::{Result, anyhow};
use argon2::{
    Argon2,
    password_hash::{
        Error as PasswordHashError, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
        rand_core::OsRng,
    },
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::{JwtConfig, PermissionMatrix};
use crate::audit::AuditLogger;
use crate::config::BootstrapSettings;
use crate::error::{AppError, AppResult};
use crate::model::user::{check_password, normalize_email};
use crate::model::{AuditAction, NewUser, User, UserPatch, UserStatus};
use crate::store::{Record, Repository};

/// Successful login: the public profile plus a bearer token
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: User,
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

/// Authentication service: password hashing, login, token resolution and
/// account management.
pub struct AuthService {
    users: Arc<dyn Repository<User>>,
    audit: AuditLogger,
    permissions: Arc<PermissionMatrix>,
    /// JWT configuration
    pub jwt_config: JwtConfig,
    /// Verified against when the email is unknown so both failure paths cost the same
    dummy_hash: String,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn Repository<User>>,
        audit: AuditLogger,
        permissions: Arc<PermissionMatrix>,
        jwt_config: JwtConfig,
    ) -> Result<Self> {
        Ok(Self {
            users,
            audit,
            permissions,
            jwt_config,
            dummy_hash: Self::hash_password("tourdesk-timing-equalizer")?,
        })
    }

    /// Hash a password using Argon2
    pub fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow!("Password hashing error: {}", e))?
            .to_string();
        Ok(password_hash)
    }

    /// Verify a password against a hash using Argon2
    pub fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(password_hash)
            .map_err(|e| anyhow!("Password hash parsing error: {}", e))?;
        match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(PasswordHashError::Password) => Ok(false),
            Err(e) => Err(anyhow!("Password verification error: {}", e)),
        }
    }

    /// Authenticate a user with email and password. Every attempt is audited.
    pub async fn login(&self, email: &str, password: &str) -> AppResult<LoginResponse> {
        let email = normalize_email(email);

        let Some(user) = self.users.find_by_key(&email).await? else {
            // Burn the same time as a real verification
            let _ = Self::verify_password(password, &self.dummy_hash);
            warn!("Login failed for unknown email: {}", email);
            self.audit
                .record(&email, AuditAction::LoginFailed, User::KIND, &email, "Invalid credentials")
                .await;
            return Err(AppError::InvalidCredentials);
        };

        if !Self::verify_password(password, &user.password_hash)? {
            warn!("Password verification failed for user: {}", email);
            self.audit
                .record(
                    &email,
                    AuditAction::LoginFailed,
                    User::KIND,
                    &user.id.to_string(),
                    "Invalid credentials",
                )
                .await;
            return Err(AppError::InvalidCredentials);
        }

        if !user.is_active() {
            warn!("Login refused for inactive user: {}", email);
            self.audit
                .record(
                    &email,
                    AuditAction::LoginFailed,
                    User::KIND,
                    &user.id.to_string(),
                    "Account inactive",
                )
                .await;
            return Err(AppError::AccountInactive);
        }

        let token = self.jwt_config.generate_token(&user)?;
        self.audit
            .record(
                &email,
                AuditAction::Login,
                User::KIND,
                &user.id.to_string(),
                "Login successful",
            )
            .await;

        info!("User authenticated successfully: {}", email);
        Ok(LoginResponse {
            user,
            token,
            token_type: "Bearer",
            expires_in: self.jwt_config.expiration_seconds(),
        })
    }

    /// Resolve a bearer token to a current, active account.
    pub async fn resolve_actor(&self, token: &str) -> AppResult<User> {
        let claims = self
            .jwt_config
            .validate_token(token)
            .map_err(|_| AppError::AuthenticationFailed("invalid or expired token".to_string()))?;

        let id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::AuthenticationFailed("malformed token subject".to_string()))?;

        let user = self
            .users
            .get(id)
            .await?
            .ok_or_else(|| AppError::AuthenticationFailed("account no longer exists".to_string()))?;

        if !user.is_active() {
            return Err(AppError::AuthenticationFailed("account is inactive".to_string()));
        }
        Ok(user)
    }

    fn check_role(&self, role: &str) -> AppResult<()> {
        if !self.permissions.knows_role(role) {
            return Err(AppError::validation(format!("unknown role '{role}'")));
        }
        Ok(())
    }

    /// Register a new user
    pub async fn register_user(&self, actor: &str, input: NewUser) -> AppResult<User> {
        self.check_role(&input.role)?;
        check_password(&input.password)?;

        let password_hash = Self::hash_password(&input.password)?;
        let user = User::new(input, password_hash)?;
        self.users.insert(&user).await?;

        self.audit
            .record(
                actor,
                AuditAction::Create,
                User::KIND,
                &user.id.to_string(),
                format!("Created user {} ({})", user.email, user.role),
            )
            .await;
        info!("New user registered: {}", user.email);
        Ok(user)
    }

    /// Merge a patch into an account, re-hashing a supplied password.
    pub async fn update_user(
        &self,
        actor: &str,
        id: Uuid,
        mut patch: UserPatch,
    ) -> AppResult<User> {
        let mut user = self
            .users
            .get(id)
            .await?
            .ok_or_else(|| AppError::not_found(User::ENTITY, id))?;

        if let Some(role) = &patch.role {
            self.check_role(role)?;
        }
        let password_changed = match patch.password.take() {
            Some(password) => {
                check_password(&password)?;
                user.password_hash = Self::hash_password(&password)?;
                true
            }
            None => false,
        };
        user.apply(patch)?;

        if !self.users.update(&user).await? {
            return Err(AppError::not_found(User::ENTITY, id));
        }

        let details = if password_changed {
            format!("Updated user {} (password changed)", user.email)
        } else {
            format!("Updated user {}", user.email)
        };
        self.audit
            .record(actor, AuditAction::Update, User::KIND, &id.to_string(), details)
            .await;
        Ok(user)
    }

    pub async fn delete_user(&self, actor: &User, id: Uuid) -> AppResult<()> {
        if actor.id == id {
            return Err(AppError::validation("you cannot delete your own account"));
        }
        let user = self
            .users
            .get(id)
            .await?
            .ok_or_else(|| AppError::not_found(User::ENTITY, id))?;

        if !self.users.delete(id).await? {
            return Err(AppError::not_found(User::ENTITY, id));
        }
        self.audit
            .record(
                &actor.email,
                AuditAction::Delete,
                User::KIND,
                &id.to_string(),
                format!("Deleted user {}", user.email),
            )
            .await;
        Ok(())
    }

    /// Create the first administrator when no accounts exist yet.
    pub async fn bootstrap_admin(&self, settings: &BootstrapSettings) -> Result<Option<User>> {
        if self.users.count().await? > 0 {
            return Ok(None);
        }

        let (Some(email), Some(password)) = (&settings.admin_email, &settings.admin_password) else {
            warn!("No users exist and no bootstrap admin is configured (TOURDESK__BOOTSTRAP__ADMIN_EMAIL)");
            return Ok(None);
        };

        let input = NewUser {
            name: settings.admin_name.clone().unwrap_or_else(|| "Administrator".to_string()),
            email: email.clone(),
            password: password.clone(),
            role: "admin".to_string(),
            status: UserStatus::Active,
            profile_picture: None,
        };
        check_password(&input.password).map_err(|e| anyhow!("bootstrap admin: {}", e))?;
        if !self.permissions.knows_role(&input.role) {
            return Err(anyhow!("bootstrap admin: permission matrix has no 'admin' role"));
        }

        let password_hash = Self::hash_password(&input.password)?;
        let admin = User::new(input, password_hash).map_err(|e| anyhow!("bootstrap admin: {}", e))?;
        self.users.insert(&admin).await?;

        self.audit
            .record(
                "system",
                AuditAction::Bootstrap,
                User::KIND,
                &admin.id.to_string(),
                format!("Bootstrapped administrator {}", admin.email),
            )
            .await;
        info!("Created bootstrap administrator: {}", admin.email);
        Ok(Some(admin))
    }
}
