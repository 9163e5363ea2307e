//! Notification dispatch and read access.
//!
//! All fan-out flows through [`dispatch`], which applies the one
//! non-negotiable rule in a single place: a notification is never created
//! for the user whose action caused it. Dispatch runs inside the triggering
//! mutation's transaction, so a notification that cannot be persisted rolls
//! the mutation back with it.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::Database;
use crate::error::{DomainError, DomainResult};
use crate::models::{
    DayBucket, Invitation, Notification, NotificationKind, NotificationPage, NotificationQuery,
    NotificationTab, Project, Task, TaskStatus,
};
use crate::services::{datetime_col, enum_col, opt_uuid_col, uuid_col};

use super::{projects, tasks};

/// A domain event with notification consequences. Project creation is
/// deliberately absent: it is audit-log only.
pub(crate) enum Event<'a> {
    InviteReceived {
        project: &'a Project,
        invitation: &'a Invitation,
        inviter_name: &'a str,
        recipient: Uuid,
    },
    InviteAccepted {
        project: &'a Project,
        acceptor_id: Uuid,
        acceptor_name: &'a str,
    },
    TaskAssigned {
        project: &'a Project,
        task: &'a Task,
        actor_id: Uuid,
        assignee: Uuid,
    },
    TaskStatusChanged {
        project: &'a Project,
        task: &'a Task,
        actor_id: Uuid,
        from: TaskStatus,
        to: TaskStatus,
    },
    CommentAdded {
        project: &'a Project,
        task: &'a Task,
        commenter_id: Uuid,
        commenter_name: &'a str,
    },
}

impl Event<'_> {
    /// The user whose action caused the event; never a recipient.
    fn actor_id(&self) -> Uuid {
        match self {
            Event::InviteReceived { invitation, .. } => invitation.invited_by,
            Event::InviteAccepted { acceptor_id, .. } => *acceptor_id,
            Event::TaskAssigned { actor_id, .. } => *actor_id,
            Event::TaskStatusChanged { actor_id, .. } => *actor_id,
            Event::CommentAdded { commenter_id, .. } => *commenter_id,
        }
    }
}

struct Draft {
    recipient: Uuid,
    kind: NotificationKind,
    tab: NotificationTab,
    title: String,
    message: String,
    link: String,
    project_id: Uuid,
    task_id: Option<Uuid>,
}

/// Create the notification records an event calls for. Returns the number
/// of records written after self-action suppression.
pub(crate) fn dispatch(conn: &Connection, event: &Event<'_>) -> DomainResult<usize> {
    let mut drafts: Vec<Draft> = Vec::new();

    match event {
        Event::InviteReceived {
            project,
            invitation,
            inviter_name,
            recipient,
        } => {
            drafts.push(Draft {
                recipient: *recipient,
                kind: NotificationKind::InviteReceived,
                tab: NotificationTab::Direct,
                title: format!("You've been invited to {}", project.name),
                message: format!(
                    "{} invited you to join {} as {}",
                    inviter_name,
                    project.name,
                    invitation.role.as_str()
                ),
                link: format!("/invitations/{}", invitation.id),
                project_id: project.id,
                task_id: None,
            });
        }
        Event::InviteAccepted {
            project,
            acceptor_name,
            ..
        } => {
            for manager in projects::managers(conn, project.id)? {
                drafts.push(Draft {
                    recipient: manager,
                    kind: NotificationKind::InviteAccepted,
                    tab: NotificationTab::Watching,
                    title: format!("{} joined {}", acceptor_name, project.name),
                    message: format!(
                        "{} accepted their invitation to {}",
                        acceptor_name, project.name
                    ),
                    link: format!("/projects/{}/members", project.id),
                    project_id: project.id,
                    task_id: None,
                });
            }
        }
        Event::TaskAssigned {
            project,
            task,
            assignee,
            ..
        } => {
            drafts.push(Draft {
                recipient: *assignee,
                kind: NotificationKind::TaskAssigned,
                tab: NotificationTab::Direct,
                title: format!("You've been assigned: {}", task.title),
                message: format!("You are now the assignee of \"{}\" in {}", task.title, project.name),
                link: format!("/projects/{}/tasks/{}", project.id, task.id),
                project_id: project.id,
                task_id: Some(task.id),
            });
        }
        Event::TaskStatusChanged {
            project,
            task,
            from,
            to,
            ..
        } => {
            if let Some(assignee) = task.assigned_to {
                drafts.push(Draft {
                    recipient: assignee,
                    kind: NotificationKind::TaskStatusChanged,
                    tab: NotificationTab::Direct,
                    title: format!("Task status changed: {}", task.title),
                    message: format!(
                        "\"{}\" moved from {} to {}",
                        task.title,
                        from.as_str(),
                        to.as_str()
                    ),
                    link: format!("/projects/{}/tasks/{}", project.id, task.id),
                    project_id: project.id,
                    task_id: Some(task.id),
                });
            }
        }
        Event::CommentAdded {
            project,
            task,
            commenter_name,
            ..
        } => {
            if let Some(assignee) = task.assigned_to {
                drafts.push(Draft {
                    recipient: assignee,
                    kind: NotificationKind::CommentAdded,
                    tab: NotificationTab::Direct,
                    title: format!("New comment on {}", task.title),
                    message: format!("{} commented on \"{}\"", commenter_name, task.title),
                    link: format!("/projects/{}/tasks/{}", project.id, task.id),
                    project_id: project.id,
                    task_id: Some(task.id),
                });
            }
        }
    }

    // Self-action suppression: never notify the acting user.
    let actor = event.actor_id();
    drafts.retain(|d| d.recipient != actor);

    let count = drafts.len();
    for draft in drafts {
        conn.execute(
            "INSERT INTO notifications
             (id, user_id, kind, title, message, link, project_id, task_id, tab, read, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, ?10)",
            params![
                Uuid::new_v4().to_string(),
                draft.recipient.to_string(),
                draft.kind.as_str(),
                draft.title,
                draft.message,
                draft.link,
                draft.project_id.to_string(),
                draft.task_id.map(|id| id.to_string()),
                draft.tab.as_str(),
                Utc::now().to_rfc3339(),
            ],
        )?;
    }
    if count > 0 {
        tracing::debug!(count, "dispatched notifications");
    }
    Ok(count)
}

pub struct NotificationService {
    db: Database,
}

impl NotificationService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// The recipient's feed: filtered by tab, optionally unread-only,
    /// newest first, sliced `[offset, offset + limit)`.
    pub fn list(&self, user_id: Uuid, query: NotificationQuery) -> DomainResult<NotificationPage> {
        self.db.with_connection(|conn| {
            let unread_clause = if query.unread_only { " AND read = 0" } else { "" };
            let count_sql = format!(
                "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND tab = ?2{unread_clause}"
            );
            let total: u32 = conn.query_row(
                &count_sql,
                params![user_id.to_string(), query.tab.as_str()],
                |row| row.get(0),
            )?;

            let data_sql = format!(
                "SELECT id, user_id, kind, title, message, link, project_id, task_id, tab, read, created_at
                 FROM notifications WHERE user_id = ?1 AND tab = ?2{unread_clause}
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?3 OFFSET ?4"
            );
            let mut stmt = conn.prepare(&data_sql)?;
            let items = stmt
                .query_map(
                    params![user_id.to_string(), query.tab.as_str(), query.limit, query.offset],
                    notification_from_row,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let has_more = query.offset + query.limit < total;
            Ok(NotificationPage {
                items,
                total,
                has_more,
                next_offset: has_more.then(|| query.offset + query.limit),
            })
        })
    }

    /// Idempotent: re-marking an already-read notification is a no-op.
    pub fn mark_read(&self, user_id: Uuid, id: Uuid) -> DomainResult<()> {
        self.db.with_transaction(|conn| {
            let updated = conn.execute(
                "UPDATE notifications SET read = 1 WHERE id = ?1 AND user_id = ?2",
                params![id.to_string(), user_id.to_string()],
            )?;
            if updated == 0 {
                return Err(DomainError::NotFound("notification"));
            }
            Ok(())
        })
    }

    /// Idempotent. Returns the number of notifications newly marked.
    pub fn mark_all_read(&self, user_id: Uuid) -> DomainResult<u32> {
        self.db.with_transaction(|conn| {
            let updated = conn.execute(
                "UPDATE notifications SET read = 1 WHERE user_id = ?1 AND read = 0",
                params![user_id.to_string()],
            )?;
            Ok(updated as u32)
        })
    }

    /// Recipients may delete their own notifications.
    pub fn delete(&self, user_id: Uuid, id: Uuid) -> DomainResult<()> {
        self.db.with_transaction(|conn| {
            let deleted = conn.execute(
                "DELETE FROM notifications WHERE id = ?1 AND user_id = ?2",
                params![id.to_string(), user_id.to_string()],
            )?;
            if deleted == 0 {
                return Err(DomainError::NotFound("notification"));
            }
            Ok(())
        })
    }

    /// Entry point for the external comment collaborator: notify a task's
    /// assignee that someone commented.
    pub fn comment_added(&self, commenter_id: Uuid, task_id: Uuid) -> DomainResult<()> {
        self.db.with_transaction(|conn| {
            let task = tasks::task_by_id(conn, task_id)?.ok_or(DomainError::NotFound("task"))?;
            let project = projects::project_by_id(conn, task.project_id)?
                .ok_or(DomainError::NotFound("project"))?;
            if projects::membership_role(conn, project.id, commenter_id)?.is_none() {
                return Err(DomainError::Forbidden("not a member of this project"));
            }
            let commenter = crate::directory::find_by_id(conn, commenter_id)?
                .ok_or(DomainError::NotFound("user"))?;
            dispatch(
                conn,
                &Event::CommentAdded {
                    project: &project,
                    task: &task,
                    commenter_id,
                    commenter_name: &commenter.name,
                },
            )?;
            Ok(())
        })
    }
}

/// Bucket a calendar date against "today". Display-time only, never stored.
pub fn day_bucket(date: NaiveDate, today: NaiveDate) -> DayBucket {
    if date == today {
        DayBucket::Today
    } else if date == today.pred_opt().unwrap_or(today) {
        DayBucket::Yesterday
    } else {
        DayBucket::Older
    }
}

/// Group a newest-first notification list into Today / Yesterday / Older by
/// the local calendar date of each `created_at`. Order within a bucket is
/// preserved.
pub fn group_by_day(
    items: Vec<Notification>,
    today: NaiveDate,
) -> Vec<(DayBucket, Vec<Notification>)> {
    let mut groups: Vec<(DayBucket, Vec<Notification>)> = Vec::new();
    for item in items {
        let bucket = day_bucket(local_date(item.created_at), today);
        match groups.last_mut() {
            Some((last, list)) if *last == bucket => list.push(item),
            _ => groups.push((bucket, vec![item])),
        }
    }
    groups
}

fn local_date(at: DateTime<Utc>) -> NaiveDate {
    at.with_timezone(&chrono::Local).date_naive()
}

fn notification_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: uuid_col(row, 0)?,
        user_id: uuid_col(row, 1)?,
        kind: enum_col(row, 2, NotificationKind::from_str)?,
        title: row.get(3)?,
        message: row.get(4)?,
        link: row.get(5)?,
        project_id: uuid_col(row, 6)?,
        task_id: opt_uuid_col(row, 7)?,
        tab: enum_col(row, 8, NotificationTab::from_str)?,
        read: row.get(9)?,
        created_at: datetime_col(row, 10)?,
    })
}
