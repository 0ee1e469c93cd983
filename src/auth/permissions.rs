use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Built-in role matrix, used when no override file is configured.
const DEFAULT_MATRIX: &str = include_str!("../../config/permissions.json");

/// Category of entity subject to permission checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Flights,
    Reservations,
    Operations,
    Hotels,
    Users,
    Logs,
    Management,
}

/// Kind of operation checked against the matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
    Upload,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Flights => "flights",
            Resource::Reservations => "reservations",
            Resource::Operations => "operations",
            Resource::Hotels => "hotels",
            Resource::Users => "users",
            Resource::Logs => "logs",
            Resource::Management => "management",
        }
    }
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Upload => "upload",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type RoleGrants = HashMap<Resource, HashSet<Action>>;

/// Static role → resource → action matrix.
///
/// Loaded once at startup and shared read-only; a role missing from the
/// matrix, or a resource missing from a role, grants nothing.
#[derive(Debug, Clone)]
pub struct PermissionMatrix {
    roles: HashMap<String, RoleGrants>,
}

impl PermissionMatrix {
    /// Parse a matrix from its JSON representation
    pub fn from_json(raw: &str) -> Result<Self> {
        let roles: HashMap<String, RoleGrants> =
            serde_json::from_str(raw).context("permission matrix is not valid JSON")?;
        Ok(Self { roles })
    }

    /// The matrix shipped with the binary
    pub fn builtin() -> Result<Self> {
        Self::from_json(DEFAULT_MATRIX)
    }

    /// Load the override file if one is configured, otherwise the built-in matrix
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let matrix = match path {
            Some(path) => {
                let raw = fs::read_to_string(path).with_context(|| {
                    format!("failed to read permission matrix {}", path.display())
                })?;
                Self::from_json(&raw)?
            }
            None => Self::builtin()?,
        };

        info!("Loaded permission matrix with {} roles", matrix.roles.len());
        Ok(matrix)
    }

    /// Admit or deny `action` on `resource` for `role`. Fails closed.
    pub fn is_allowed(&self, role: &str, resource: Resource, action: Action) -> bool {
        self.roles
            .get(role)
            .and_then(|grants| grants.get(&resource))
            .is_some_and(|actions| actions.contains(&action))
    }

    pub fn knows_role(&self, role: &str) -> bool {
        self.roles.contains_key(role)
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.roles.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_RESOURCES: [Resource; 7] = [
        Resource::Flights,
        Resource::Reservations,
        Resource::Operations,
        Resource::Hotels,
        Resource::Users,
        Resource::Logs,
        Resource::Management,
    ];

    const ALL_ACTIONS: [Action; 5] = [
        Action::Read,
        Action::Create,
        Action::Update,
        Action::Delete,
        Action::Upload,
    ];

    #[test]
    fn test_builtin_matrix_parses() {
        let matrix = PermissionMatrix::builtin().unwrap();
        for role in ["admin", "flight", "reservation", "operation", "management"] {
            assert!(matrix.knows_role(role), "missing role {role}");
        }
    }

    #[test]
    fn test_operation_role_cannot_read_users() {
        let matrix = PermissionMatrix::builtin().unwrap();
        assert!(!matrix.is_allowed("operation", Resource::Users, Action::Read));
        assert!(matrix.is_allowed("admin", Resource::Users, Action::Read));
    }

    #[test]
    fn test_builtin_matrix_grants_exactly_the_default_table() {
        use Resource::*;
        const ALL: &[Action] = &ALL_ACTIONS;
        const R: &[Action] = &[Action::Read];
        const CRUD: &[Action] = &[Action::Read, Action::Create, Action::Update, Action::Delete];
        const NONE: &[Action] = &[];

        let table: [(&str, [&[Action]; 7]); 5] = [
            // flights, reservations, operations, hotels, users, logs, management
            ("admin", [ALL, ALL, ALL, ALL, CRUD, R, R]),
            ("flight", [ALL, R, R, NONE, NONE, NONE, R]),
            ("reservation", [R, ALL, R, ALL, NONE, NONE, R]),
            ("operation", [R, R, ALL, NONE, NONE, NONE, R]),
            ("management", [R, R, R, NONE, NONE, NONE, R]),
        ];
        let resources = [Flights, Reservations, Operations, Hotels, Users, Logs, Management];

        let matrix = PermissionMatrix::builtin().unwrap();
        assert_eq!(matrix.roles().count(), table.len());
        for (role, grants) in table {
            for (resource, granted) in resources.into_iter().zip(grants) {
                for action in ALL_ACTIONS {
                    assert_eq!(
                        matrix.is_allowed(role, resource, action),
                        granted.contains(&action),
                        "{role} {resource} {action}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_unknown_role_is_denied_everything() {
        let matrix = PermissionMatrix::builtin().unwrap();
        for resource in ALL_RESOURCES {
            for action in ALL_ACTIONS {
                assert!(!matrix.is_allowed("intern", resource, action));
            }
        }
    }

    #[test]
    fn test_decisions_match_grants_exactly() {
        let raw = r#"{
            "auditor": { "logs": ["read"], "flights": [] },
            "clerk": { "hotels": ["read", "upload"] }
        }"#;
        let matrix = PermissionMatrix::from_json(raw).unwrap();

        let granted: HashSet<(&str, Resource, Action)> = [
            ("auditor", Resource::Logs, Action::Read),
            ("clerk", Resource::Hotels, Action::Read),
            ("clerk", Resource::Hotels, Action::Upload),
        ]
        .into_iter()
        .collect();

        for role in ["auditor", "clerk"] {
            for resource in ALL_RESOURCES {
                for action in ALL_ACTIONS {
                    assert_eq!(
                        matrix.is_allowed(role, resource, action),
                        granted.contains(&(role, resource, action)),
                        "{role} {resource} {action}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_unknown_resource_is_rejected() {
        let raw = r#"{ "admin": { "spaceships": ["read"] } }"#;
        assert!(PermissionMatrix::from_json(raw).is_err());
    }
}
