use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use super::UnknownVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Import,
    Login,
    LoginFailed,
    Bootstrap,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "create",
            AuditAction::Update => "update",
            AuditAction::Delete => "delete",
            AuditAction::Import => "import",
            AuditAction::Login => "login",
            AuditAction::LoginFailed => "login_failed",
            AuditAction::Bootstrap => "bootstrap",
        }
    }
}

impl TryFrom<String> for AuditAction {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "create" => Ok(AuditAction::Create),
            "update" => Ok(AuditAction::Update),
            "delete" => Ok(AuditAction::Delete),
            "import" => Ok(AuditAction::Import),
            "login" => Ok(AuditAction::Login),
            "login_failed" => Ok(AuditAction::LoginFailed),
            "bootstrap" => Ok(AuditAction::Bootstrap),
            _ => Err(UnknownVariant { kind: "audit action", value }),
        }
    }
}

/// Write-once record of a mutation or login attempt
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: Uuid,
    pub actor: String,
    #[sqlx(try_from = "String")]
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: String,
    pub details: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl AuditEntry {
    pub fn new(
        actor: impl Into<String>,
        action: AuditAction,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor: actor.into(),
            action,
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            details: details.into(),
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditFilter {
    pub entity_type: Option<String>,
    pub actor: Option<String>,
}

impl AuditFilter {
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        self.entity_type.as_ref().is_none_or(|kind| &entry.entity_type == kind)
            && self.actor.as_ref().is_none_or(|actor| &entry.actor == actor)
    }
}
