//! Role-based permission checks
//!
//! Roles are compared directly; there is no policy engine. Sales reps and
//! service technicians may only modify records they own.

use crate::{EntityId, PermissionError, Role};
use std::fmt;

/// Operations guarded by a role check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
    Import,
    ManageContracts,
    ViewAudit,
    ManageUsers,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Import => "import",
            Action::ManageContracts => "manage contracts",
            Action::ViewAudit => "view audit",
            Action::ManageUsers => "manage users",
        };
        f.write_str(s)
    }
}

impl Role {
    /// Whether the role may perform `action` on some record.
    pub fn can(&self, action: Action) -> bool {
        use Action::*;
        match self {
            Role::Admin => true,
            Role::Manager => !matches!(action, ManageUsers),
            Role::SalesRep => matches!(action, Read | Create | Update | Delete | Import),
            Role::ServiceTech => matches!(action, Read | Create | Update | ManageContracts),
            Role::Viewer => matches!(action, Read),
        }
    }

    /// Whether the role may modify records owned by someone else.
    pub fn can_modify_any(&self) -> bool {
        matches!(self, Role::Admin | Role::Manager)
    }
}

/// Check a role against an action.
pub fn authorize(role: Role, action: Action) -> Result<(), PermissionError> {
    if role.can(action) {
        Ok(())
    } else {
        Err(PermissionError::Forbidden {
            role,
            action: action.to_string(),
        })
    }
}

/// Check a role against an action on a specific record. Records with no
/// owner may be modified by anyone allowed to perform the action.
pub fn authorize_owned(
    role: Role,
    actor_id: Option<EntityId>,
    owner_id: Option<EntityId>,
    action: Action,
) -> Result<(), PermissionError> {
    authorize(role, action)?;
    if matches!(action, Action::Read) || role.can_modify_any() {
        return Ok(());
    }
    match owner_id {
        None => Ok(()),
        Some(owner) if actor_id == Some(owner) => Ok(()),
        Some(_) => Err(PermissionError::NotOwner {
            role,
            action: action.to_string(),
        }),
    }
}
