//! Collaboration services: the operations callers invoke, each validating
//! permissions, performing the state change, appending activity, and fanning
//! out notifications inside one transaction.

pub mod activity;
pub mod invitations;
pub mod notifications;
pub mod projects;
pub mod tasks;

pub use activity::ActivityLog;
pub use invitations::InvitationService;
pub use notifications::NotificationService;
pub use projects::ProjectService;
pub use tasks::TaskService;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::Row;
use uuid::Uuid;

// Row-decoding helpers shared by the services. Ids and timestamps are
// stored as TEXT (uuid / RFC 3339).

fn bad_column(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, msg.into())
}

pub(crate) fn uuid_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let s: String = row.get(idx)?;
    Uuid::parse_str(&s).map_err(|e| bad_column(idx, e.to_string()))
}

pub(crate) fn opt_uuid_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    let s: Option<String> = row.get(idx)?;
    s.map(|s| Uuid::parse_str(&s).map_err(|e| bad_column(idx, e.to_string())))
        .transpose()
}

pub(crate) fn datetime_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let s: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| bad_column(idx, e.to_string()))
}

pub(crate) fn opt_datetime_col(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let s: Option<String> = row.get(idx)?;
    s.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| bad_column(idx, e.to_string()))
    })
    .transpose()
}

pub(crate) fn enum_col<T>(
    row: &Row<'_>,
    idx: usize,
    parse: fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    let s: String = row.get(idx)?;
    parse(&s).ok_or_else(|| bad_column(idx, format!("unexpected enum value: {s}")))
}
