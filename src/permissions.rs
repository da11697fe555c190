use crate::{auth::AuthUser, error::CategoryError, models::User};
use uuid::Uuid;

/// Role names as stored in `profiles.role`.
pub const ROLE_SUPERUSER: &str = "superuser";
pub const ROLE_ADMINISTRATOR: &str = "admin";
pub const ROLE_PROJECT_MANAGER: &str = "project_manager";
pub const ROLE_DEFAULT_USER: &str = "default_user";

/// Role
///
/// Typed view of the RBAC string carried by `AuthUser`. Unknown strings are the
/// least privileged role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    SuperUser,
    Administrator,
    ProjectManager,
    DefaultUser,
}

impl Role {
    pub fn parse(role: &str) -> Self {
        match role {
            ROLE_SUPERUSER => Role::SuperUser,
            ROLE_ADMINISTRATOR => Role::Administrator,
            ROLE_PROJECT_MANAGER => Role::ProjectManager,
            _ => Role::DefaultUser,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperUser => ROLE_SUPERUSER,
            Role::Administrator => ROLE_ADMINISTRATOR,
            Role::ProjectManager => ROLE_PROJECT_MANAGER,
            Role::DefaultUser => ROLE_DEFAULT_USER,
        }
    }
}

/// Superusers and administrators may act on any user's records.
pub fn has_full_access(user: &AuthUser) -> bool {
    matches!(
        Role::parse(&user.role),
        Role::SuperUser | Role::Administrator
    )
}

/// ensure_owner
///
/// Without full access, a caller may only create or alter records owned by themselves.
pub fn ensure_owner(user: &AuthUser, owner_id: Uuid) -> Result<(), CategoryError> {
    if has_full_access(user) || owner_id == user.id {
        return Ok(());
    }
    tracing::info!(owner = %owner_id, user = %user.id, "rejected write on behalf of another owner");
    Err(CategoryError::Forbidden)
}

/// visible_users
///
/// Filters `all` down to the users `viewer` may list: everybody for full access,
/// otherwise only the viewer's own record.
pub fn visible_users(viewer: &AuthUser, all: Vec<User>) -> Vec<User> {
    if has_full_access(viewer) {
        return all;
    }
    all.into_iter().filter(|u| u.id == viewer.id).collect()
}
