use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use huddle_core::db::Database;
use huddle_core::models::{CreateTaskInput, Task, TaskStatus, UpdateTaskInput};
use huddle_core::services::TaskService;

use super::{Actor, ApiError};

pub async fn create(
    State(db): State<Database>,
    actor: Actor,
    Path(project_id): Path<Uuid>,
    Json(input): Json<CreateTaskInput>,
) -> Result<Json<Task>, ApiError> {
    Ok(Json(TaskService::new(db).create(actor.0, project_id, input)?))
}

pub async fn list(
    State(db): State<Database>,
    actor: Actor,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Vec<Task>>, ApiError> {
    Ok(Json(TaskService::new(db).list_by_project(actor.0, project_id)?))
}

pub async fn get(
    State(db): State<Database>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Task>, ApiError> {
    Ok(Json(TaskService::new(db).get(actor.0, id)?))
}

pub async fn update(
    State(db): State<Database>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateTaskInput>,
) -> Result<Json<Task>, ApiError> {
    Ok(Json(TaskService::new(db).update(actor.0, id, input)?))
}

pub async fn delete(
    State(db): State<Database>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    TaskService::new(db).delete(actor.0, id)?;
    Ok(Json(json!({ "deleted": true })))
}

#[derive(Deserialize)]
pub struct SetStatusBody {
    /// Accepted as a string so legacy spellings ("completed", "TODO") can
    /// be normalized at the boundary.
    pub status: String,
}

pub async fn set_status(
    State(db): State<Database>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<SetStatusBody>,
) -> Result<Json<Task>, ApiError> {
    let status = TaskStatus::from_str(&body.status)
        .ok_or_else(|| ApiError::bad_request(format!("unknown task status: {}", body.status)))?;
    Ok(Json(TaskService::new(db).set_status(actor.0, id, status)?))
}

#[derive(Deserialize)]
pub struct AssignBody {
    pub assigned_to: Option<Uuid>,
}

pub async fn assign(
    State(db): State<Database>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<AssignBody>,
) -> Result<Json<Task>, ApiError> {
    Ok(Json(TaskService::new(db).assign(actor.0, id, body.assigned_to)?))
}
