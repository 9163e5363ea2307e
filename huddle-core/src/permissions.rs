//! Role → capability matrix. Pure functions, no storage access.
//!
//! Callers pass the actor's membership role as an `Option`: a non-member is
//! `None` and gets level 0 (no capabilities), never an error.

use uuid::Uuid;

use crate::models::{Role, Task};

/// Numeric level over the role order member(1) < admin(2) < owner(3).
/// Non-members are level 0.
pub fn level(role: Option<Role>) -> u8 {
    match role {
        None => 0,
        Some(Role::Member) => 1,
        Some(Role::Admin) => 2,
        Some(Role::Owner) => 3,
    }
}

pub fn has_minimum_role(role: Option<Role>, required: Role) -> bool {
    level(role) >= level(Some(required))
}

pub fn can_invite_members(role: Option<Role>) -> bool {
    has_minimum_role(role, Role::Admin)
}

/// An inviter or role-changer may not grant a role above their own.
pub fn can_grant_role(actor: Role, granted: Role) -> bool {
    level(Some(granted)) <= level(Some(actor))
}

pub fn can_change_roles(role: Option<Role>) -> bool {
    has_minimum_role(role, Role::Admin)
}

/// An actor may not remove a peer or superior role unless they are an
/// owner. Self-removal is handled by the caller, not here.
pub fn can_remove_member(actor_role: Option<Role>, target_role: Role) -> bool {
    match actor_role {
        Some(Role::Owner) => true,
        Some(Role::Admin) => target_role == Role::Member,
        _ => false,
    }
}

pub fn can_create_task(role: Option<Role>) -> bool {
    has_minimum_role(role, Role::Member)
}

pub fn can_edit_any_task(role: Option<Role>) -> bool {
    has_minimum_role(role, Role::Admin)
}

/// A plain member may edit tasks assigned to themselves.
pub fn can_edit_task(role: Option<Role>, task: &Task, actor_id: Uuid) -> bool {
    can_edit_any_task(role) || (role.is_some() && task.assigned_to == Some(actor_id))
}

pub fn can_delete_task(role: Option<Role>) -> bool {
    has_minimum_role(role, Role::Admin)
}

pub fn can_assign_tasks(role: Option<Role>) -> bool {
    has_minimum_role(role, Role::Member)
}

/// A plain member may update status only on tasks assigned to themselves;
/// admins and owners may update any.
pub fn can_update_task_status(role: Option<Role>, task: &Task, actor_id: Uuid) -> bool {
    can_edit_any_task(role) || (role.is_some() && task.assigned_to == Some(actor_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn task_assigned_to(user: Option<Uuid>) -> Task {
        Task {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            title: "t".into(),
            description: None,
            status: crate::models::TaskStatus::Todo,
            priority: crate::models::TaskPriority::Medium,
            assigned_to: user,
            assignee_name: None,
            due_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn non_member_has_no_capabilities() {
        assert_eq!(level(None), 0);
        assert!(!can_invite_members(None));
        assert!(!can_create_task(None));
        assert!(!can_remove_member(None, Role::Member));
    }

    #[test]
    fn role_order_is_member_admin_owner() {
        assert!(has_minimum_role(Some(Role::Owner), Role::Admin));
        assert!(has_minimum_role(Some(Role::Admin), Role::Member));
        assert!(!has_minimum_role(Some(Role::Member), Role::Admin));
    }

    #[test]
    fn admin_cannot_remove_peer_or_owner() {
        assert!(can_remove_member(Some(Role::Admin), Role::Member));
        assert!(!can_remove_member(Some(Role::Admin), Role::Admin));
        assert!(!can_remove_member(Some(Role::Admin), Role::Owner));
        assert!(can_remove_member(Some(Role::Owner), Role::Admin));
    }

    #[test]
    fn member_updates_status_only_on_own_tasks() {
        let me = Uuid::new_v4();
        let mine = task_assigned_to(Some(me));
        let other = task_assigned_to(Some(Uuid::new_v4()));

        assert!(can_update_task_status(Some(Role::Member), &mine, me));
        assert!(!can_update_task_status(Some(Role::Member), &other, me));
        assert!(can_update_task_status(Some(Role::Admin), &other, me));
    }

    #[test]
    fn granted_role_is_capped_at_actor_role() {
        assert!(can_grant_role(Role::Admin, Role::Member));
        assert!(can_grant_role(Role::Admin, Role::Admin));
        assert!(!can_grant_role(Role::Admin, Role::Owner));
        assert!(can_grant_role(Role::Owner, Role::Owner));
    }
}
