use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use huddle_core::db::Database;
use huddle_core::models::{
    ActivityEvent, CreateProjectInput, MemberProfile, Membership, Project, Role,
    UpdateProjectInput,
};
use huddle_core::services::{ActivityLog, ProjectService};

use super::{Actor, ApiError};

pub async fn create(
    State(db): State<Database>,
    actor: Actor,
    Json(input): Json<CreateProjectInput>,
) -> Result<Json<Project>, ApiError> {
    Ok(Json(ProjectService::new(db).create(actor.0, input)?))
}

pub async fn list(
    State(db): State<Database>,
    actor: Actor,
) -> Result<Json<Vec<Project>>, ApiError> {
    Ok(Json(ProjectService::new(db).list_for_user(actor.0)?))
}

pub async fn get(
    State(db): State<Database>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Project>, ApiError> {
    Ok(Json(ProjectService::new(db).get(actor.0, id)?))
}

pub async fn update(
    State(db): State<Database>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateProjectInput>,
) -> Result<Json<Project>, ApiError> {
    Ok(Json(ProjectService::new(db).update(actor.0, id, input)?))
}

pub async fn archive(
    State(db): State<Database>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Project>, ApiError> {
    Ok(Json(ProjectService::new(db).archive(actor.0, id)?))
}

pub async fn delete(
    State(db): State<Database>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    ProjectService::new(db).delete(actor.0, id)?;
    Ok(Json(json!({ "deleted": true })))
}

#[derive(Deserialize)]
pub struct AddMemberBody {
    pub user_id: Uuid,
    pub role: Role,
}

pub async fn add_member(
    State(db): State<Database>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<AddMemberBody>,
) -> Result<Json<Membership>, ApiError> {
    Ok(Json(ProjectService::new(db).add_member(actor.0, id, body.user_id, body.role)?))
}

#[derive(Deserialize)]
pub struct ChangeRoleBody {
    pub role: Role,
}

pub async fn change_role(
    State(db): State<Database>,
    actor: Actor,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<ChangeRoleBody>,
) -> Result<Json<Membership>, ApiError> {
    Ok(Json(ProjectService::new(db).change_role(actor.0, id, user_id, body.role)?))
}

pub async fn remove_member(
    State(db): State<Database>,
    actor: Actor,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, ApiError> {
    ProjectService::new(db).remove_member(actor.0, id, user_id)?;
    Ok(Json(json!({ "removed": true })))
}

pub async fn list_members(
    State(db): State<Database>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<MemberProfile>>, ApiError> {
    Ok(Json(ProjectService::new(db).list_members(actor.0, id)?))
}

#[derive(Deserialize)]
pub struct PageParams {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

pub async fn activity(
    State(db): State<Database>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Query(page): Query<PageParams>,
) -> Result<Json<Vec<ActivityEvent>>, ApiError> {
    let events = ActivityLog::new(db).query(
        actor.0,
        id,
        page.limit.unwrap_or(50),
        page.offset.unwrap_or(0),
    )?;
    Ok(Json(events))
}
