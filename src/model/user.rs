use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{UnknownVariant, merge, require};
use crate::error::{AppError, AppResult};
use crate::store::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
        }
    }
}

impl TryFrom<String> for UserStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "active" => Ok(UserStatus::Active),
            "inactive" => Ok(UserStatus::Inactive),
            _ => Err(UnknownVariant { kind: "user status", value }),
        }
    }
}

/// Staff account. Serializes to the public profile: the hash never leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: String,
    #[sqlx(try_from = "String")]
    pub status: UserStatus,
    pub profile_picture: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
    #[serde(default)]
    pub status: UserStatus,
    #[serde(default)]
    pub profile_picture: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub status: Option<UserStatus>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub profile_picture: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserFilter {
    pub role: Option<String>,
    pub status: Option<UserStatus>,
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn check_email(email: &str) -> AppResult<()> {
    require("email", email)?;
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(AppError::validation(format!("'{email}' is not a valid email address"))),
    }
}

pub(crate) fn check_password(password: &str) -> AppResult<()> {
    if password.chars().count() < 6 {
        return Err(AppError::validation("password must be at least 6 characters"));
    }
    Ok(())
}

impl User {
    /// Build a new account from validated input and an already computed hash
    pub fn new(input: NewUser, password_hash: String) -> AppResult<Self> {
        require("name", &input.name)?;
        require("role", &input.role)?;
        let email = normalize_email(&input.email);
        check_email(&email)?;

        let now = OffsetDateTime::now_utc();
        Ok(Self {
            id: Uuid::new_v4(),
            name: input.name.trim().to_string(),
            email,
            password_hash,
            role: input.role,
            status: input.status,
            profile_picture: input.profile_picture,
            created_at: now,
            updated_at: now,
        })
    }

    /// Merge a patch. Passwords are handled by the caller, which hashes them.
    pub fn apply(&mut self, patch: UserPatch) -> AppResult<()> {
        if let Some(ref name) = patch.name {
            require("name", name)?;
        }
        if let Some(email) = patch.email {
            let email = normalize_email(&email);
            check_email(&email)?;
            self.email = email;
        }
        merge!(self, patch; name, role, status, profile_picture);
        self.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

impl Record for User {
    type Filter = UserFilter;
    const ENTITY: &'static str = "user";
    const KIND: &'static str = "users";

    fn id(&self) -> Uuid {
        self.id
    }

    fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    fn unique_key(&self) -> Option<String> {
        Some(self.email.clone())
    }

    fn matches(&self, filter: &UserFilter) -> bool {
        filter.role.as_ref().is_none_or(|role| &self.role == role)
            && filter.status.is_none_or(|status| self.status == status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Ayse Demir".to_string(),
            email: email.to_string(),
            password: "secret123".to_string(),
            role: "reservation".to_string(),
            status: UserStatus::Active,
            profile_picture: None,
        }
    }

    #[test]
    fn test_email_is_normalized() {
        let user = User::new(new_user("  Ayse@Example.COM "), "hash".to_string()).unwrap();
        assert_eq!(user.email, "ayse@example.com");
        assert_eq!(user.unique_key().as_deref(), Some("ayse@example.com"));
    }

    #[test]
    fn test_invalid_email_rejected() {
        assert!(User::new(new_user("not-an-email"), "hash".to_string()).is_err());
    }

    #[test]
    fn test_public_profile_has_no_password() {
        let user = User::new(new_user("ayse@example.com"), "argon-hash".to_string()).unwrap();
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert!(!json.to_string().contains("argon-hash"));
        assert_eq!(json["status"], "active");
    }

    #[test]
    fn test_patch_can_clear_profile_picture() {
        let mut input = new_user("ayse@example.com");
        input.profile_picture = Some("data:image/png;base64,AAA".to_string());
        let mut user = User::new(input, "hash".to_string()).unwrap();

        let patch: UserPatch = serde_json::from_str(r#"{"profilePicture": null}"#).unwrap();
        user.apply(patch).unwrap();
        assert!(user.profile_picture.is_none());
    }
}
