//! Invitation workflow: a per-(project, email) state machine with a single
//! root state (`pending`) and terminal states `accepted`, `declined`,
//! `revoked`.
//!
//! Transitions are compare-and-set on the `pending` predicate: of two
//! concurrent transition attempts exactly one succeeds and the rest observe
//! `InvitationAlreadyProcessed`.

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

use crate::db::Database;
use crate::directory::{find_by_email, find_by_id, normalize_email};
use crate::error::{Conflict, DomainError, DomainResult};
use crate::models::{ActivityKind, CreateInvitationInput, Invitation, InvitationStatus, Role};
use crate::permissions;
use crate::services::{datetime_col, enum_col, uuid_col};

use super::{activity, notifications, projects};

pub struct InvitationService {
    db: Database,
}

impl InvitationService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn create(
        &self,
        actor_id: Uuid,
        project_id: Uuid,
        input: CreateInvitationInput,
    ) -> DomainResult<Invitation> {
        let email = normalize_email(&input.email)?;

        self.db.with_transaction(|conn| {
            let project = projects::project_by_id(conn, project_id)?
                .ok_or(DomainError::NotFound("project"))?;
            let actor_role = projects::membership_role(conn, project_id, actor_id)?;
            if !permissions::can_invite_members(actor_role) {
                return Err(DomainError::Forbidden("cannot invite members"));
            }
            if !actor_role.is_some_and(|r| permissions::can_grant_role(r, input.role)) {
                return Err(DomainError::Forbidden("cannot grant a role above your own"));
            }

            let invitee = find_by_email(conn, &email)?;
            if let Some(ref user) = invitee {
                if projects::membership_role(conn, project_id, user.id)?.is_some() {
                    return Err(Conflict::AlreadyMember.into());
                }
            }
            if pending_for(conn, project_id, &email)?.is_some() {
                return Err(Conflict::DuplicatePendingInvitation.into());
            }

            let invitation = Invitation {
                id: Uuid::new_v4(),
                project_id,
                email: email.clone(),
                invited_by: actor_id,
                role: input.role,
                status: InvitationStatus::Pending,
                created_at: chrono::Utc::now(),
            };
            conn.execute(
                "INSERT INTO invitations (id, project_id, email, invited_by, role, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    invitation.id.to_string(),
                    invitation.project_id.to_string(),
                    invitation.email,
                    invitation.invited_by.to_string(),
                    invitation.role.as_str(),
                    invitation.status.as_str(),
                    invitation.created_at.to_rfc3339(),
                ],
            )?;
            activity::record(
                conn,
                project_id,
                actor_id,
                ActivityKind::MemberInvited,
                json!({ "email": &invitation.email, "role": invitation.role.as_str() }),
            )?;

            // Notify only if the email already resolves to an account.
            if let Some(user) = invitee {
                let inviter =
                    find_by_id(conn, actor_id)?.ok_or(DomainError::NotFound("user"))?;
                notifications::dispatch(
                    conn,
                    &notifications::Event::InviteReceived {
                        project: &project,
                        invitation: &invitation,
                        inviter_name: &inviter.name,
                        recipient: user.id,
                    },
                )?;
            }
            tracing::info!(invitation_id = %invitation.id, project_id = %project_id, "created invitation");
            Ok(invitation)
        })
    }

    /// Accept a pending invitation. The acting user's email must match the
    /// invitation's. Transition, membership insert, audit entry, and
    /// notification fan-out land atomically.
    pub fn accept(&self, invitation_id: Uuid, actor_id: Uuid) -> DomainResult<Invitation> {
        self.db.with_transaction(|conn| {
            let invitation = invitation_by_id(conn, invitation_id)?
                .ok_or(DomainError::NotFound("invitation"))?;
            let user = find_by_id(conn, actor_id)?.ok_or(DomainError::NotFound("user"))?;
            if user.email != invitation.email {
                // Issued to a different address; indistinguishable from absent.
                return Err(DomainError::NotFound("invitation"));
            }

            transition(conn, invitation_id, InvitationStatus::Accepted)?;
            projects::insert_membership(conn, invitation.project_id, actor_id, invitation.role)?;
            activity::record(
                conn,
                invitation.project_id,
                actor_id,
                ActivityKind::InvitationAccepted,
                json!({ "email": &invitation.email, "role": invitation.role.as_str() }),
            )?;

            let project = projects::project_by_id(conn, invitation.project_id)?
                .ok_or(DomainError::NotFound("project"))?;
            notifications::dispatch(
                conn,
                &notifications::Event::InviteAccepted {
                    project: &project,
                    acceptor_id: actor_id,
                    acceptor_name: &user.name,
                },
            )?;
            tracing::info!(invitation_id = %invitation_id, "invitation accepted");
            Ok(Invitation {
                status: InvitationStatus::Accepted,
                ..invitation
            })
        })
    }

    /// Decline a pending invitation. Audit-log only, no notification.
    pub fn decline(&self, invitation_id: Uuid, actor_id: Uuid) -> DomainResult<Invitation> {
        self.db.with_transaction(|conn| {
            let invitation = invitation_by_id(conn, invitation_id)?
                .ok_or(DomainError::NotFound("invitation"))?;
            let user = find_by_id(conn, actor_id)?.ok_or(DomainError::NotFound("user"))?;
            if user.email != invitation.email {
                return Err(DomainError::NotFound("invitation"));
            }

            transition(conn, invitation_id, InvitationStatus::Declined)?;
            activity::record(
                conn,
                invitation.project_id,
                actor_id,
                ActivityKind::InvitationDeclined,
                json!({ "email": &invitation.email }),
            )?;
            Ok(Invitation {
                status: InvitationStatus::Declined,
                ..invitation
            })
        })
    }

    /// Revoke a pending invitation. Removes it from pending views.
    pub fn revoke(&self, actor_id: Uuid, invitation_id: Uuid) -> DomainResult<Invitation> {
        self.db.with_transaction(|conn| {
            let invitation = invitation_by_id(conn, invitation_id)?
                .ok_or(DomainError::NotFound("invitation"))?;
            let actor_role = projects::membership_role(conn, invitation.project_id, actor_id)?;
            if !permissions::can_invite_members(actor_role) {
                return Err(DomainError::Forbidden("cannot revoke invitations"));
            }

            transition(conn, invitation_id, InvitationStatus::Revoked)?;
            activity::record(
                conn,
                invitation.project_id,
                actor_id,
                ActivityKind::InvitationRevoked,
                json!({ "email": &invitation.email }),
            )?;
            Ok(Invitation {
                status: InvitationStatus::Revoked,
                ..invitation
            })
        })
    }

    pub fn list_pending(&self, actor_id: Uuid, project_id: Uuid) -> DomainResult<Vec<Invitation>> {
        self.db.with_connection(|conn| {
            if projects::membership_role(conn, project_id, actor_id)?.is_none() {
                return Err(DomainError::Forbidden("not a member of this project"));
            }
            let mut stmt = conn.prepare(
                "SELECT id, project_id, email, invited_by, role, status, created_at
                 FROM invitations WHERE project_id = ?1 AND status = 'pending'
                 ORDER BY created_at DESC",
            )?;
            let invitations = stmt
                .query_map(params![project_id.to_string()], invitation_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(invitations)
        })
    }

    /// Pending invitations addressed to an email, across projects. Backs
    /// the invited user's own "your invitations" view.
    pub fn list_pending_for_email(&self, email: &str) -> DomainResult<Vec<Invitation>> {
        let email = email.trim().to_lowercase();
        self.db.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, project_id, email, invited_by, role, status, created_at
                 FROM invitations WHERE email = ?1 AND status = 'pending'
                 ORDER BY created_at DESC",
            )?;
            let invitations = stmt
                .query_map(params![email], invitation_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(invitations)
        })
    }
}

/// Compare-and-set transition out of `pending`. Exactly one concurrent
/// caller wins; everyone else sees `InvitationAlreadyProcessed`.
fn transition(conn: &Connection, id: Uuid, to: InvitationStatus) -> DomainResult<()> {
    let updated = conn.execute(
        "UPDATE invitations SET status = ?1 WHERE id = ?2 AND status = 'pending'",
        params![to.as_str(), id.to_string()],
    )?;
    if updated == 0 {
        return match invitation_by_id(conn, id)? {
            Some(_) => Err(Conflict::InvitationAlreadyProcessed.into()),
            None => Err(DomainError::NotFound("invitation")),
        };
    }
    Ok(())
}

fn invitation_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Invitation> {
    Ok(Invitation {
        id: uuid_col(row, 0)?,
        project_id: uuid_col(row, 1)?,
        email: row.get(2)?,
        invited_by: uuid_col(row, 3)?,
        role: enum_col(row, 4, Role::from_str)?,
        status: enum_col(row, 5, InvitationStatus::from_str)?,
        created_at: datetime_col(row, 6)?,
    })
}

pub(crate) fn invitation_by_id(conn: &Connection, id: Uuid) -> rusqlite::Result<Option<Invitation>> {
    conn.query_row(
        "SELECT id, project_id, email, invited_by, role, status, created_at
         FROM invitations WHERE id = ?1",
        params![id.to_string()],
        invitation_from_row,
    )
    .optional()
}

fn pending_for(
    conn: &Connection,
    project_id: Uuid,
    email: &str,
) -> rusqlite::Result<Option<Invitation>> {
    conn.query_row(
        "SELECT id, project_id, email, invited_by, role, status, created_at
         FROM invitations WHERE project_id = ?1 AND email = ?2 AND status = 'pending'",
        params![project_id.to_string(), email],
        invitation_from_row,
    )
    .optional()
}
