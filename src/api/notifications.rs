use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use huddle_core::db::Database;
use huddle_core::models::{NotificationQuery, NotificationTab};
use huddle_core::services::notifications::group_by_day;
use huddle_core::services::NotificationService;

use super::{Actor, ApiError};

#[derive(Deserialize)]
pub struct ListParams {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub unread_only: Option<bool>,
    pub tab: Option<String>,
    /// When set, the page's items are additionally grouped into
    /// Today / Yesterday / Older display buckets.
    pub grouped: Option<bool>,
}

pub async fn list(
    State(db): State<Database>,
    actor: Actor,
    Query(params): Query<ListParams>,
) -> Result<Response, ApiError> {
    let defaults = NotificationQuery::default();
    let tab = match params.tab.as_deref() {
        Some(raw) => NotificationTab::from_str(raw)
            .ok_or_else(|| ApiError::bad_request(format!("unknown tab: {raw}")))?,
        None => defaults.tab,
    };
    let query = NotificationQuery {
        limit: params.limit.unwrap_or(defaults.limit),
        offset: params.offset.unwrap_or(defaults.offset),
        unread_only: params.unread_only.unwrap_or(defaults.unread_only),
        tab,
    };

    let page = NotificationService::new(db).list(actor.0, query)?;
    if params.grouped.unwrap_or(false) {
        let today = chrono::Local::now().date_naive();
        let groups: Vec<Value> = group_by_day(page.items, today)
            .into_iter()
            .map(|(bucket, items)| json!({ "bucket": bucket, "items": items }))
            .collect();
        return Ok(Json(json!({
            "groups": groups,
            "total": page.total,
            "has_more": page.has_more,
            "next_offset": page.next_offset,
        }))
        .into_response());
    }
    Ok(Json(page).into_response())
}

pub async fn mark_read(
    State(db): State<Database>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    NotificationService::new(db).mark_read(actor.0, id)?;
    Ok(Json(json!({ "read": true })))
}

pub async fn mark_all_read(
    State(db): State<Database>,
    actor: Actor,
) -> Result<Json<Value>, ApiError> {
    let updated = NotificationService::new(db).mark_all_read(actor.0)?;
    Ok(Json(json!({ "updated": updated })))
}

pub async fn delete(
    State(db): State<Database>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    NotificationService::new(db).delete(actor.0, id)?;
    Ok(Json(json!({ "deleted": true })))
}
