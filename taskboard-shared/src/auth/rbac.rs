/// Role-based access control
///
/// Permission checks are a capability-set lookup over (role, action) pairs,
/// not role inheritance. Ownership checks (creator/assignee) are evaluated
/// alongside the table for the per-task rules.
///
/// # Permission Model
///
/// | Action        | Admin | Manager | Member |
/// |---------------|-------|---------|--------|
/// | TaskUpdateAny | yes   | yes     | no     |
/// | TaskDeleteAny | yes   | yes     | no     |
/// | UserRoleEdit  | yes   | no      | no     |
///
/// Members can still update tasks they created or are assigned to, and
/// delete tasks they created; see [`can_update_task`] and
/// [`can_delete_task`].

use uuid::Uuid;

use crate::models::task::Task;
use crate::models::user::UserRole;

/// Actions governed by the role capability table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Update any task regardless of ownership
    TaskUpdateAny,

    /// Delete any task regardless of ownership
    TaskDeleteAny,

    /// Change another user's role
    UserRoleEdit,
}

/// Looks up (role, action) in the capability table
pub fn role_allows(role: UserRole, action: Action) -> bool {
    match (role, action) {
        (UserRole::Admin, _) => true,
        (UserRole::Manager, Action::TaskUpdateAny | Action::TaskDeleteAny) => true,
        (UserRole::Manager, Action::UserRoleEdit) => false,
        (UserRole::Member, _) => false,
    }
}

/// Whether the acting user may update the task
///
/// Allowed for roles with `TaskUpdateAny`, the task's creator, and the
/// task's assignee.
pub fn can_update_task(user_id: Uuid, role: UserRole, task: &Task) -> bool {
    role_allows(role, Action::TaskUpdateAny)
        || task.created_by == user_id
        || task.assignee_id == Some(user_id)
}

/// Whether the acting user may delete the task
///
/// Allowed for roles with `TaskDeleteAny` and the task's creator.
pub fn can_delete_task(user_id: Uuid, role: UserRole, task: &Task) -> bool {
    role_allows(role, Action::TaskDeleteAny) || task.created_by == user_id
}
