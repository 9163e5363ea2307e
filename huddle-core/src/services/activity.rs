//! Append-only activity log. Every mutating operation in the other services
//! records exactly one entry here, inside the same transaction.

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::Database;
use crate::error::{DomainError, DomainResult};
use crate::models::{ActivityEvent, ActivityKind};
use crate::services::{datetime_col, enum_col, uuid_col};

use super::projects;

pub struct ActivityLog {
    db: Database,
}

impl ActivityLog {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Project activity, newest first. Readable by project members only.
    pub fn query(
        &self,
        actor_id: Uuid,
        project_id: Uuid,
        limit: u32,
        offset: u32,
    ) -> DomainResult<Vec<ActivityEvent>> {
        self.db.with_connection(|conn| {
            if projects::membership_role(conn, project_id, actor_id)?.is_none() {
                return Err(DomainError::Forbidden("not a member of this project"));
            }
            Ok(list(conn, project_id, limit, offset)?)
        })
    }
}

/// Append one entry. O(1); the only failure mode is storage unavailability.
pub(crate) fn record(
    conn: &Connection,
    project_id: Uuid,
    actor_id: Uuid,
    kind: ActivityKind,
    meta: serde_json::Value,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO activity_events (id, project_id, actor_id, kind, meta, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            Uuid::new_v4().to_string(),
            project_id.to_string(),
            actor_id.to_string(),
            kind.as_str(),
            meta.to_string(),
            chrono::Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub(crate) fn list(
    conn: &Connection,
    project_id: Uuid,
    limit: u32,
    offset: u32,
) -> rusqlite::Result<Vec<ActivityEvent>> {
    let mut stmt = conn.prepare(
        "SELECT id, project_id, actor_id, kind, meta, created_at
         FROM activity_events WHERE project_id = ?1
         ORDER BY created_at DESC, rowid DESC
         LIMIT ?2 OFFSET ?3",
    )?;
    let events = stmt
        .query_map(params![project_id.to_string(), limit, offset], |row| {
            let meta_json: String = row.get(4)?;
            Ok(ActivityEvent {
                id: uuid_col(row, 0)?,
                project_id: uuid_col(row, 1)?,
                actor_id: uuid_col(row, 2)?,
                kind: enum_col(row, 3, ActivityKind::from_str)?,
                meta: serde_json::from_str(&meta_json).unwrap_or_default(),
                created_at: datetime_col(row, 5)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(events)
}
