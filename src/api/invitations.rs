use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

use huddle_core::db::Database;
use huddle_core::directory::Directory;
use huddle_core::models::{CreateInvitationInput, Invitation};
use huddle_core::services::InvitationService;
use huddle_core::DomainError;

use super::{Actor, ApiError};

pub async fn create(
    State(db): State<Database>,
    actor: Actor,
    Path(project_id): Path<Uuid>,
    Json(input): Json<CreateInvitationInput>,
) -> Result<Json<Invitation>, ApiError> {
    Ok(Json(InvitationService::new(db).create(actor.0, project_id, input)?))
}

pub async fn list_pending(
    State(db): State<Database>,
    actor: Actor,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Vec<Invitation>>, ApiError> {
    Ok(Json(InvitationService::new(db).list_pending(actor.0, project_id)?))
}

/// Pending invitations addressed to the calling user's own email.
pub async fn list_mine(
    State(db): State<Database>,
    actor: Actor,
) -> Result<Json<Vec<Invitation>>, ApiError> {
    let user = Directory::new(db.clone())
        .find_user_by_id(actor.0)?
        .ok_or(DomainError::NotFound("user"))?;
    Ok(Json(InvitationService::new(db).list_pending_for_email(&user.email)?))
}

pub async fn accept(
    State(db): State<Database>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Invitation>, ApiError> {
    Ok(Json(InvitationService::new(db).accept(id, actor.0)?))
}

pub async fn decline(
    State(db): State<Database>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Invitation>, ApiError> {
    Ok(Json(InvitationService::new(db).decline(id, actor.0)?))
}

pub async fn revoke(
    State(db): State<Database>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Invitation>, ApiError> {
    Ok(Json(InvitationService::new(db).revoke(actor.0, id)?))
}
