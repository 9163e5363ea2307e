//! Project records and the (project, user) membership relation.
//!
//! Owns the "every project keeps at least one owner" invariant: any role
//! change or removal that would leave a project ownerless fails atomically
//! with no partial effect.

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

use crate::db::Database;
use crate::error::{Conflict, DomainError, DomainResult};
use crate::models::{
    ActivityKind, CreateProjectInput, MemberProfile, Membership, Project, ProjectStatus, Role,
    UpdateProjectInput,
};
use crate::permissions;
use crate::services::{datetime_col, enum_col, uuid_col};

use super::activity;

pub struct ProjectService {
    db: Database,
}

impl ProjectService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a project and make the actor its owner, atomically.
    /// Audit-log only; intentionally no notification.
    pub fn create(&self, actor_id: Uuid, input: CreateProjectInput) -> DomainResult<Project> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::Validation("project name must not be empty".into()));
        }
        let key = input.key.trim().to_uppercase();
        if key.is_empty() || key.len() > 10 || !key.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(DomainError::Validation(
                "project key must be 1-10 alphanumeric characters".into(),
            ));
        }

        self.db.with_transaction(|conn| {
            if crate::directory::find_by_id(conn, actor_id)?.is_none() {
                return Err(DomainError::NotFound("user"));
            }
            let project = Project {
                id: Uuid::new_v4(),
                name,
                key,
                description: input.description,
                status: ProjectStatus::Active,
                created_at: chrono::Utc::now(),
            };
            conn.execute(
                "INSERT INTO projects (id, name, key, description, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    project.id.to_string(),
                    project.name,
                    project.key,
                    project.description,
                    project.status.as_str(),
                    project.created_at.to_rfc3339(),
                ],
            )?;
            insert_membership(conn, project.id, actor_id, Role::Owner)?;
            activity::record(
                conn,
                project.id,
                actor_id,
                ActivityKind::ProjectCreated,
                json!({ "name": &project.name, "key": &project.key }),
            )?;
            tracing::info!(project_id = %project.id, "created project");
            Ok(project)
        })
    }

    /// Projects the actor belongs to.
    pub fn list_for_user(&self, actor_id: Uuid) -> DomainResult<Vec<Project>> {
        self.db.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.id, p.name, p.key, p.description, p.status, p.created_at
                 FROM projects p
                 JOIN memberships m ON m.project_id = p.id
                 WHERE m.user_id = ?1
                 ORDER BY p.created_at DESC",
            )?;
            let projects = stmt
                .query_map(params![actor_id.to_string()], project_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(projects)
        })
    }

    pub fn get(&self, actor_id: Uuid, project_id: Uuid) -> DomainResult<Project> {
        self.db.with_connection(|conn| {
            let project = project_by_id(conn, project_id)?.ok_or(DomainError::NotFound("project"))?;
            if membership_role(conn, project_id, actor_id)?.is_none() {
                return Err(DomainError::Forbidden("not a member of this project"));
            }
            Ok(project)
        })
    }

    pub fn update(
        &self,
        actor_id: Uuid,
        project_id: Uuid,
        input: UpdateProjectInput,
    ) -> DomainResult<Project> {
        self.db.with_transaction(|conn| {
            require_owner(conn, project_id, actor_id)?;
            if let Some(ref name) = input.name {
                if name.trim().is_empty() {
                    return Err(DomainError::Validation("project name must not be empty".into()));
                }
                conn.execute(
                    "UPDATE projects SET name = ?1 WHERE id = ?2",
                    params![name.trim(), project_id.to_string()],
                )?;
            }
            if let Some(ref description) = input.description {
                conn.execute(
                    "UPDATE projects SET description = ?1 WHERE id = ?2",
                    params![description, project_id.to_string()],
                )?;
            }
            activity::record(conn, project_id, actor_id, ActivityKind::ProjectUpdated, json!({}))?;
            project_by_id(conn, project_id)?.ok_or(DomainError::NotFound("project"))
        })
    }

    pub fn archive(&self, actor_id: Uuid, project_id: Uuid) -> DomainResult<Project> {
        self.db.with_transaction(|conn| {
            require_owner(conn, project_id, actor_id)?;
            conn.execute(
                "UPDATE projects SET status = 'archived' WHERE id = ?1",
                params![project_id.to_string()],
            )?;
            activity::record(conn, project_id, actor_id, ActivityKind::ProjectArchived, json!({}))?;
            project_by_id(conn, project_id)?.ok_or(DomainError::NotFound("project"))
        })
    }

    /// Delete a project. Cascades to its tasks, memberships, invitations,
    /// and activity. Notifications keep their (now dangling) links.
    pub fn delete(&self, actor_id: Uuid, project_id: Uuid) -> DomainResult<()> {
        self.db.with_transaction(|conn| {
            require_owner(conn, project_id, actor_id)?;
            conn.execute("DELETE FROM projects WHERE id = ?1", params![project_id.to_string()])?;
            tracing::info!(project_id = %project_id, "deleted project");
            Ok(())
        })
    }

    /// Add an existing user directly to a project.
    pub fn add_member(
        &self,
        actor_id: Uuid,
        project_id: Uuid,
        user_id: Uuid,
        role: Role,
    ) -> DomainResult<Membership> {
        self.db.with_transaction(|conn| {
            project_by_id(conn, project_id)?.ok_or(DomainError::NotFound("project"))?;
            let actor_role = membership_role(conn, project_id, actor_id)?;
            if !permissions::can_invite_members(actor_role) {
                return Err(DomainError::Forbidden("cannot add members"));
            }
            // actor_role is at least Admin here
            if !actor_role.is_some_and(|r| permissions::can_grant_role(r, role)) {
                return Err(DomainError::Forbidden("cannot grant a role above your own"));
            }
            if crate::directory::find_by_id(conn, user_id)?.is_none() {
                return Err(DomainError::NotFound("user"));
            }
            let membership = insert_membership(conn, project_id, user_id, role)?;
            activity::record(
                conn,
                project_id,
                actor_id,
                ActivityKind::MemberAdded,
                json!({ "user_id": user_id, "role": role.as_str() }),
            )?;
            Ok(membership)
        })
    }

    pub fn change_role(
        &self,
        actor_id: Uuid,
        project_id: Uuid,
        user_id: Uuid,
        new_role: Role,
    ) -> DomainResult<Membership> {
        self.db.with_transaction(|conn| {
            let actor_role = match membership_role(conn, project_id, actor_id)? {
                Some(role) if permissions::can_change_roles(Some(role)) => role,
                _ => return Err(DomainError::Forbidden("cannot change roles")),
            };
            let current = membership_role(conn, project_id, user_id)?
                .ok_or(DomainError::NotFound("membership"))?;
            if !permissions::can_grant_role(actor_role, new_role)
                || !permissions::can_grant_role(actor_role, current)
            {
                return Err(DomainError::Forbidden("cannot change a role above your own"));
            }
            if current == Role::Owner && new_role != Role::Owner && owner_count(conn, project_id)? <= 1 {
                return Err(Conflict::LastOwnerViolation.into());
            }
            conn.execute(
                "UPDATE memberships SET role = ?1 WHERE project_id = ?2 AND user_id = ?3",
                params![new_role.as_str(), project_id.to_string(), user_id.to_string()],
            )?;
            activity::record(
                conn,
                project_id,
                actor_id,
                ActivityKind::MemberRoleChanged,
                json!({ "user_id": user_id, "from": current.as_str(), "to": new_role.as_str() }),
            )?;
            membership(conn, project_id, user_id)?.ok_or(DomainError::NotFound("membership"))
        })
    }

    /// Remove a member. A user may always remove themselves (leave); both
    /// paths are guarded by the last-owner invariant.
    pub fn remove_member(
        &self,
        actor_id: Uuid,
        project_id: Uuid,
        user_id: Uuid,
    ) -> DomainResult<()> {
        self.db.with_transaction(|conn| {
            let target_role = membership_role(conn, project_id, user_id)?
                .ok_or(DomainError::NotFound("membership"))?;
            if actor_id != user_id {
                let actor_role = membership_role(conn, project_id, actor_id)?;
                if !permissions::can_remove_member(actor_role, target_role) {
                    return Err(DomainError::Forbidden("cannot remove this member"));
                }
            }
            if target_role == Role::Owner && owner_count(conn, project_id)? <= 1 {
                return Err(Conflict::LastOwnerViolation.into());
            }
            conn.execute(
                "DELETE FROM memberships WHERE project_id = ?1 AND user_id = ?2",
                params![project_id.to_string(), user_id.to_string()],
            )?;
            activity::record(
                conn,
                project_id,
                actor_id,
                ActivityKind::MemberRemoved,
                json!({ "user_id": user_id }),
            )?;
            Ok(())
        })
    }

    pub fn list_members(&self, actor_id: Uuid, project_id: Uuid) -> DomainResult<Vec<MemberProfile>> {
        self.db.with_connection(|conn| {
            if membership_role(conn, project_id, actor_id)?.is_none() {
                return Err(DomainError::Forbidden("not a member of this project"));
            }
            let mut stmt = conn.prepare(
                "SELECT m.user_id, u.name, u.email, m.role, m.joined_at
                 FROM memberships m
                 JOIN users u ON u.id = m.user_id
                 WHERE m.project_id = ?1
                 ORDER BY m.joined_at",
            )?;
            let members = stmt
                .query_map(params![project_id.to_string()], |row| {
                    Ok(MemberProfile {
                        user_id: uuid_col(row, 0)?,
                        name: row.get(1)?,
                        email: row.get(2)?,
                        role: enum_col(row, 3, Role::from_str)?,
                        joined_at: datetime_col(row, 4)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(members)
        })
    }
}

fn project_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: uuid_col(row, 0)?,
        name: row.get(1)?,
        key: row.get(2)?,
        description: row.get(3)?,
        status: enum_col(row, 4, ProjectStatus::from_str)?,
        created_at: datetime_col(row, 5)?,
    })
}

pub(crate) fn project_by_id(conn: &Connection, id: Uuid) -> rusqlite::Result<Option<Project>> {
    conn.query_row(
        "SELECT id, name, key, description, status, created_at FROM projects WHERE id = ?1",
        params![id.to_string()],
        project_from_row,
    )
    .optional()
}

pub(crate) fn membership_role(
    conn: &Connection,
    project_id: Uuid,
    user_id: Uuid,
) -> rusqlite::Result<Option<Role>> {
    conn.query_row(
        "SELECT role FROM memberships WHERE project_id = ?1 AND user_id = ?2",
        params![project_id.to_string(), user_id.to_string()],
        |row| enum_col(row, 0, Role::from_str),
    )
    .optional()
}

pub(crate) fn membership(
    conn: &Connection,
    project_id: Uuid,
    user_id: Uuid,
) -> rusqlite::Result<Option<Membership>> {
    conn.query_row(
        "SELECT project_id, user_id, role, joined_at FROM memberships
         WHERE project_id = ?1 AND user_id = ?2",
        params![project_id.to_string(), user_id.to_string()],
        |row| {
            Ok(Membership {
                project_id: uuid_col(row, 0)?,
                user_id: uuid_col(row, 1)?,
                role: enum_col(row, 2, Role::from_str)?,
                joined_at: datetime_col(row, 3)?,
            })
        },
    )
    .optional()
}

pub(crate) fn owner_count(conn: &Connection, project_id: Uuid) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT COUNT(*) FROM memberships WHERE project_id = ?1 AND role = 'owner'",
        params![project_id.to_string()],
        |row| row.get(0),
    )
}

/// Owners and admins of a project, the audience for membership events.
pub(crate) fn managers(conn: &Connection, project_id: Uuid) -> rusqlite::Result<Vec<Uuid>> {
    let mut stmt = conn.prepare(
        "SELECT user_id FROM memberships
         WHERE project_id = ?1 AND role IN ('owner', 'admin')",
    )?;
    let ids = stmt
        .query_map(params![project_id.to_string()], |row| uuid_col(row, 0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids)
}

pub(crate) fn insert_membership(
    conn: &Connection,
    project_id: Uuid,
    user_id: Uuid,
    role: Role,
) -> DomainResult<Membership> {
    if membership_role(conn, project_id, user_id)?.is_some() {
        return Err(Conflict::AlreadyMember.into());
    }
    let membership = Membership {
        project_id,
        user_id,
        role,
        joined_at: chrono::Utc::now(),
    };
    conn.execute(
        "INSERT INTO memberships (project_id, user_id, role, joined_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            membership.project_id.to_string(),
            membership.user_id.to_string(),
            membership.role.as_str(),
            membership.joined_at.to_rfc3339(),
        ],
    )?;
    Ok(membership)
}

fn require_owner(conn: &Connection, project_id: Uuid, actor_id: Uuid) -> DomainResult<()> {
    project_by_id(conn, project_id)?.ok_or(DomainError::NotFound("project"))?;
    match membership_role(conn, project_id, actor_id)? {
        Some(Role::Owner) => Ok(()),
        _ => Err(DomainError::Forbidden("owner role required")),
    }
}
