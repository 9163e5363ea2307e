//! HTTP API. A thin transport: handlers parse the request, hand it to a
//! domain service with the actor identity from the `x-actor-id` header, and
//! map `DomainError` onto status codes. No authorization logic lives here.

use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use huddle_core::db::Database;
use huddle_core::directory::Directory;
use huddle_core::models::{RegisterUserInput, User};
use huddle_core::DomainError;

mod invitations;
mod notifications;
mod projects;
mod tasks;

pub fn create_router(db: Database) -> Router {
    Router::new()
        .route("/users", post(register_user))
        .route("/projects", post(projects::create).get(projects::list))
        .route(
            "/projects/{id}",
            get(projects::get).patch(projects::update).delete(projects::delete),
        )
        .route("/projects/{id}/archive", post(projects::archive))
        .route(
            "/projects/{id}/members",
            get(projects::list_members).post(projects::add_member),
        )
        .route(
            "/projects/{id}/members/{user_id}",
            axum::routing::patch(projects::change_role).delete(projects::remove_member),
        )
        .route(
            "/projects/{id}/invitations",
            post(invitations::create).get(invitations::list_pending),
        )
        .route("/invitations", get(invitations::list_mine))
        .route("/invitations/{id}/accept", post(invitations::accept))
        .route("/invitations/{id}/decline", post(invitations::decline))
        .route("/invitations/{id}/revoke", post(invitations::revoke))
        .route(
            "/projects/{id}/tasks",
            post(tasks::create).get(tasks::list),
        )
        .route(
            "/tasks/{id}",
            get(tasks::get).patch(tasks::update).delete(tasks::delete),
        )
        .route("/tasks/{id}/status", post(tasks::set_status))
        .route("/tasks/{id}/assign", post(tasks::assign))
        .route("/projects/{id}/activity", get(projects::activity))
        .route(
            "/notifications",
            get(notifications::list),
        )
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route(
            "/notifications/{id}",
            axum::routing::delete(notifications::delete),
        )
        .route("/notifications/{id}/read", post(notifications::mark_read))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(db)
}

/// The already-authenticated actor identity, supplied by the caller in the
/// `x-actor-id` header. Authentication itself happens upstream.
pub struct Actor(pub Uuid);

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("x-actor-id")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "missing x-actor-id header"))?;
        let id = Uuid::parse_str(header)
            .map_err(|_| ApiError::new(StatusCode::UNAUTHORIZED, "invalid x-actor-id header"))?;
        Ok(Actor(id))
    }
}

pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }
}

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        let status = match e {
            DomainError::NotFound(_) => StatusCode::NOT_FOUND,
            DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
            DomainError::Conflict(_) => StatusCode::CONFLICT,
            DomainError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DomainError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        Self::new(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

async fn register_user(
    State(db): State<Database>,
    Json(input): Json<RegisterUserInput>,
) -> Result<Json<User>, ApiError> {
    let user = Directory::new(db).register(input)?;
    Ok(Json(user))
}
