//! User directory: read-only lookup of user records by id or email.
//!
//! Accounts are provisioned by the external identity provider through
//! [`Directory::register`]; the collaboration services only ever read them.

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::Database;
use crate::error::{Conflict, DomainError, DomainResult};
use crate::models::{RegisterUserInput, User};
use crate::services::{datetime_col, uuid_col};

pub struct Directory {
    db: Database,
}

impl Directory {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Provisioning hook for the identity provider. Emails are lowercased
    /// and unique.
    pub fn register(&self, input: RegisterUserInput) -> DomainResult<User> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::Validation("name must not be empty".into()));
        }
        let email = normalize_email(&input.email)?;

        self.db.with_transaction(|conn| {
            if find_by_email(conn, &email)?.is_some() {
                return Err(Conflict::DuplicateEmail.into());
            }
            let user = User {
                id: Uuid::new_v4(),
                name,
                email,
                created_at: chrono::Utc::now(),
            };
            conn.execute(
                "INSERT INTO users (id, name, email, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    user.id.to_string(),
                    user.name,
                    user.email,
                    user.created_at.to_rfc3339(),
                ],
            )?;
            tracing::info!(user_id = %user.id, "registered user");
            Ok(user)
        })
    }

    pub fn find_user_by_id(&self, id: Uuid) -> DomainResult<Option<User>> {
        self.db.with_connection(|conn| Ok(find_by_id(conn, id)?))
    }

    /// Case-insensitive email lookup.
    pub fn find_user_by_email(&self, email: &str) -> DomainResult<Option<User>> {
        let email = email.trim().to_lowercase();
        self.db.with_connection(|conn| Ok(find_by_email(conn, &email)?))
    }
}

/// Lowercase and sanity-check an email address.
pub(crate) fn normalize_email(raw: &str) -> DomainResult<String> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    };
    if !valid {
        return Err(DomainError::Validation(format!("invalid email: {raw}")));
    }
    Ok(email)
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: uuid_col(row, 0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        created_at: datetime_col(row, 3)?,
    })
}

pub(crate) fn find_by_id(conn: &Connection, id: Uuid) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        "SELECT id, name, email, created_at FROM users WHERE id = ?1",
        params![id.to_string()],
        user_from_row,
    )
    .optional()
}

/// Expects an already-lowercased email.
pub(crate) fn find_by_email(conn: &Connection, email: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        "SELECT id, name, email, created_at FROM users WHERE email = ?1",
        params![email],
        user_from_row,
    )
    .optional()
}
