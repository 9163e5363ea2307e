//! Task store. Status and assignment changes are tracked separately from
//! field edits: both diff the old value before mutating, and both feed the
//! notification dispatcher.

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

use crate::db::Database;
use crate::error::{DomainError, DomainResult};
use crate::models::{
    ActivityKind, CreateTaskInput, Task, TaskPriority, TaskStatus, UpdateTaskInput,
};
use crate::permissions;
use crate::services::{datetime_col, enum_col, opt_datetime_col, opt_uuid_col, uuid_col};

use super::{activity, notifications, projects};

pub struct TaskService {
    db: Database,
}

impl TaskService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn create(
        &self,
        actor_id: Uuid,
        project_id: Uuid,
        input: CreateTaskInput,
    ) -> DomainResult<Task> {
        let title = input.title.trim().to_string();
        if title.is_empty() {
            return Err(DomainError::Validation("task title must not be empty".into()));
        }

        self.db.with_transaction(|conn| {
            let project = projects::project_by_id(conn, project_id)?
                .ok_or(DomainError::NotFound("project"))?;
            let actor_role = projects::membership_role(conn, project_id, actor_id)?;
            if !permissions::can_create_task(actor_role) {
                return Err(DomainError::Forbidden("cannot create tasks"));
            }

            let assignee_name = match input.assigned_to {
                Some(user_id) => Some(resolve_assignee(conn, project_id, user_id)?),
                None => None,
            };

            let now = chrono::Utc::now();
            let task = Task {
                id: Uuid::new_v4(),
                project_id,
                title,
                description: input.description,
                status: TaskStatus::Todo,
                priority: input.priority.unwrap_or(TaskPriority::Medium),
                assigned_to: input.assigned_to,
                assignee_name,
                due_date: input.due_date,
                created_at: now,
                updated_at: now,
            };
            conn.execute(
                "INSERT INTO tasks
                 (id, project_id, title, description, status, priority,
                  assigned_to, assignee_name, due_date, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    task.id.to_string(),
                    task.project_id.to_string(),
                    task.title,
                    task.description,
                    task.status.as_str(),
                    task.priority.as_str(),
                    task.assigned_to.map(|id| id.to_string()),
                    task.assignee_name,
                    task.due_date.map(|d| d.to_rfc3339()),
                    task.created_at.to_rfc3339(),
                    task.updated_at.to_rfc3339(),
                ],
            )?;
            activity::record(
                conn,
                project_id,
                actor_id,
                ActivityKind::TaskCreated,
                json!({ "task_id": task.id, "title": &task.title }),
            )?;
            if let Some(assignee) = task.assigned_to {
                notifications::dispatch(
                    conn,
                    &notifications::Event::TaskAssigned {
                        project: &project,
                        task: &task,
                        actor_id,
                        assignee,
                    },
                )?;
            }
            Ok(task)
        })
    }

    /// Edit task fields. Status and assignment have their own operations.
    pub fn update(&self, actor_id: Uuid, task_id: Uuid, input: UpdateTaskInput) -> DomainResult<Task> {
        self.db.with_transaction(|conn| {
            let task = task_by_id(conn, task_id)?.ok_or(DomainError::NotFound("task"))?;
            let actor_role = projects::membership_role(conn, task.project_id, actor_id)?;
            if !permissions::can_edit_task(actor_role, &task, actor_id) {
                return Err(DomainError::Forbidden("cannot edit this task"));
            }

            let mut sets: Vec<&str> = Vec::new();
            let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
            if let Some(ref title) = input.title {
                if title.trim().is_empty() {
                    return Err(DomainError::Validation("task title must not be empty".into()));
                }
                sets.push("title = ?");
                values.push(Box::new(title.trim().to_string()));
            }
            if let Some(ref description) = input.description {
                sets.push("description = ?");
                values.push(Box::new(description.clone()));
            }
            if let Some(priority) = input.priority {
                sets.push("priority = ?");
                values.push(Box::new(priority.as_str().to_string()));
            }
            if let Some(due_date) = input.due_date {
                sets.push("due_date = ?");
                values.push(Box::new(due_date.to_rfc3339()));
            }
            if sets.is_empty() {
                return Ok(task);
            }
            sets.push("updated_at = ?");
            values.push(Box::new(chrono::Utc::now().to_rfc3339()));
            values.push(Box::new(task_id.to_string()));

            let sql = format!("UPDATE tasks SET {} WHERE id = ?", sets.join(", "));
            let params_ref: Vec<&dyn rusqlite::types::ToSql> =
                values.iter().map(AsRef::as_ref).collect();
            conn.execute(&sql, params_ref.as_slice())?;

            activity::record(
                conn,
                task.project_id,
                actor_id,
                ActivityKind::TaskUpdated,
                json!({ "task_id": task.id }),
            )?;
            task_by_id(conn, task_id)?.ok_or(DomainError::NotFound("task"))
        })
    }

    /// Change a task's status. Setting the current status again is a
    /// complete no-op: no activity entry, no notification.
    pub fn set_status(&self, actor_id: Uuid, task_id: Uuid, status: TaskStatus) -> DomainResult<Task> {
        self.db.with_transaction(|conn| {
            let task = task_by_id(conn, task_id)?.ok_or(DomainError::NotFound("task"))?;
            let actor_role = projects::membership_role(conn, task.project_id, actor_id)?;
            if !permissions::can_update_task_status(actor_role, &task, actor_id) {
                return Err(DomainError::Forbidden("cannot update this task's status"));
            }
            if task.status == status {
                return Ok(task);
            }

            conn.execute(
                "UPDATE tasks SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![
                    status.as_str(),
                    chrono::Utc::now().to_rfc3339(),
                    task_id.to_string(),
                ],
            )?;
            activity::record(
                conn,
                task.project_id,
                actor_id,
                ActivityKind::TaskStatusChanged,
                json!({
                    "task_id": task.id,
                    "from_status": task.status.as_str(),
                    "to_status": status.as_str(),
                }),
            )?;

            let project = projects::project_by_id(conn, task.project_id)?
                .ok_or(DomainError::NotFound("project"))?;
            let updated = Task { status, ..task.clone() };
            notifications::dispatch(
                conn,
                &notifications::Event::TaskStatusChanged {
                    project: &project,
                    task: &updated,
                    actor_id,
                    from: task.status,
                    to: status,
                },
            )?;
            Ok(updated)
        })
    }

    /// Assign or unassign a task. The assignee's display name is snapshotted
    /// onto the row at assignment time.
    pub fn assign(&self, actor_id: Uuid, task_id: Uuid, assignee: Option<Uuid>) -> DomainResult<Task> {
        self.db.with_transaction(|conn| {
            let task = task_by_id(conn, task_id)?.ok_or(DomainError::NotFound("task"))?;
            let actor_role = projects::membership_role(conn, task.project_id, actor_id)?;
            if !permissions::can_assign_tasks(actor_role) {
                return Err(DomainError::Forbidden("cannot assign tasks"));
            }
            if task.assigned_to == assignee {
                return Ok(task);
            }

            let assignee_name = match assignee {
                Some(user_id) => Some(resolve_assignee(conn, task.project_id, user_id)?),
                None => None,
            };
            conn.execute(
                "UPDATE tasks SET assigned_to = ?1, assignee_name = ?2, updated_at = ?3 WHERE id = ?4",
                params![
                    assignee.map(|id| id.to_string()),
                    assignee_name,
                    chrono::Utc::now().to_rfc3339(),
                    task_id.to_string(),
                ],
            )?;

            let kind = if assignee.is_some() {
                ActivityKind::TaskAssigned
            } else {
                ActivityKind::TaskUnassigned
            };
            activity::record(
                conn,
                task.project_id,
                actor_id,
                kind,
                json!({ "task_id": task.id, "assignee": assignee }),
            )?;

            let updated = Task {
                assigned_to: assignee,
                assignee_name,
                ..task
            };
            if let Some(assignee) = assignee {
                let project = projects::project_by_id(conn, updated.project_id)?
                    .ok_or(DomainError::NotFound("project"))?;
                notifications::dispatch(
                    conn,
                    &notifications::Event::TaskAssigned {
                        project: &project,
                        task: &updated,
                        actor_id,
                        assignee,
                    },
                )?;
            }
            Ok(updated)
        })
    }

    pub fn delete(&self, actor_id: Uuid, task_id: Uuid) -> DomainResult<()> {
        self.db.with_transaction(|conn| {
            let task = task_by_id(conn, task_id)?.ok_or(DomainError::NotFound("task"))?;
            let actor_role = projects::membership_role(conn, task.project_id, actor_id)?;
            if !permissions::can_delete_task(actor_role) {
                return Err(DomainError::Forbidden("cannot delete tasks"));
            }
            conn.execute("DELETE FROM tasks WHERE id = ?1", params![task_id.to_string()])?;
            activity::record(
                conn,
                task.project_id,
                actor_id,
                ActivityKind::TaskDeleted,
                json!({ "task_id": task.id, "title": task.title }),
            )?;
            Ok(())
        })
    }

    pub fn get(&self, actor_id: Uuid, task_id: Uuid) -> DomainResult<Task> {
        self.db.with_connection(|conn| {
            let task = task_by_id(conn, task_id)?.ok_or(DomainError::NotFound("task"))?;
            if projects::membership_role(conn, task.project_id, actor_id)?.is_none() {
                return Err(DomainError::Forbidden("not a member of this project"));
            }
            Ok(task)
        })
    }

    pub fn list_by_project(&self, actor_id: Uuid, project_id: Uuid) -> DomainResult<Vec<Task>> {
        self.db.with_connection(|conn| {
            if projects::membership_role(conn, project_id, actor_id)?.is_none() {
                return Err(DomainError::Forbidden("not a member of this project"));
            }
            let mut stmt = conn.prepare(
                "SELECT id, project_id, title, description, status, priority,
                        assigned_to, assignee_name, due_date, created_at, updated_at
                 FROM tasks WHERE project_id = ?1
                 ORDER BY created_at DESC",
            )?;
            let tasks = stmt
                .query_map(params![project_id.to_string()], task_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(tasks)
        })
    }
}

/// An assignee must be an existing member of the task's project. Returns
/// the display name to snapshot.
fn resolve_assignee(conn: &Connection, project_id: Uuid, user_id: Uuid) -> DomainResult<String> {
    let user = crate::directory::find_by_id(conn, user_id)?
        .ok_or_else(|| DomainError::Validation("assignee does not exist".into()))?;
    if projects::membership_role(conn, project_id, user_id)?.is_none() {
        return Err(DomainError::Validation(
            "assignee is not a member of the project".into(),
        ));
    }
    Ok(user.name)
}

fn task_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: uuid_col(row, 0)?,
        project_id: uuid_col(row, 1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        status: enum_col(row, 4, TaskStatus::from_str)?,
        priority: enum_col(row, 5, TaskPriority::from_str)?,
        assigned_to: opt_uuid_col(row, 6)?,
        assignee_name: row.get(7)?,
        due_date: opt_datetime_col(row, 8)?,
        created_at: datetime_col(row, 9)?,
        updated_at: datetime_col(row, 10)?,
    })
}

pub(crate) fn task_by_id(conn: &Connection, id: Uuid) -> rusqlite::Result<Option<Task>> {
    conn.query_row(
        "SELECT id, project_id, title, description, status, priority,
                assigned_to, assignee_name, due_date, created_at, updated_at
         FROM tasks WHERE id = ?1",
        params![id.to_string()],
        task_from_row,
    )
    .optional()
}
