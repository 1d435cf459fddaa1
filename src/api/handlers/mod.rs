use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::Database;
use crate::models::*;
use crate::tracking::select_fields;

// ============================================================
// Error Handling
// ============================================================

/// Log an internal error and return a sanitized response to the client.
///
/// Validation errors raised by the database layer are safe to expose and
/// come back as BAD_REQUEST; everything else is logged and hidden.
fn internal_error(e: impl std::fmt::Display) -> (StatusCode, String) {
    let msg = e.to_string();

    if msg.contains("must not be empty") {
        tracing::warn!("Validation error: {}", msg);
        return (StatusCode::BAD_REQUEST, msg);
    }

    tracing::error!("Internal error: {}", msg);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

fn work_item_not_found() -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, "Work item not found".to_string())
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Tracking records
// ============================================================

#[derive(Debug, Deserialize)]
pub struct FieldsQuery {
    /// Comma separated field names. Absent returns every field.
    pub fields: Option<String>,
}

pub async fn create_record(
    State(db): State<Database>,
    Json(input): Json<NewRecord>,
) -> Result<(StatusCode, Json<Record>), (StatusCode, String)> {
    db.create_record(input)
        .map(|r| (StatusCode::CREATED, Json(r)))
        .map_err(internal_error)
}

pub async fn list_records(
    State(db): State<Database>,
    Path(entity_type): Path<String>,
) -> Result<Json<Vec<Record>>, (StatusCode, String)> {
    db.get_records(&entity_type).map(Json).map_err(internal_error)
}

pub async fn get_record(
    State(db): State<Database>,
    Path((entity_type, code)): Path<(String, String)>,
    Query(query): Query<FieldsQuery>,
) -> Result<Json<Record>, (StatusCode, String)> {
    let fields: Vec<&str> = query
        .fields
        .as_deref()
        .map(|f| f.split(',').map(str::trim).filter(|f| !f.is_empty()).collect())
        .unwrap_or_default();

    db.find_record(&entity_type, &code)
        .map_err(internal_error)?
        .map(|record| Json(select_fields(record, &fields)))
        .ok_or((StatusCode::NOT_FOUND, "Record not found".to_string()))
}

pub async fn delete_record(
    State(db): State<Database>,
    Path((entity_type, id)): Path<(String, Uuid)>,
) -> Result<StatusCode, (StatusCode, String)> {
    if db.delete_record(&entity_type, id).map_err(internal_error)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, "Record not found".to_string()))
    }
}

// ============================================================
// Work items
// ============================================================

pub async fn list_work_items(
    State(db): State<Database>,
) -> Result<Json<Vec<WorkItem>>, (StatusCode, String)> {
    db.get_all_work_items().map(Json).map_err(internal_error)
}

pub async fn get_work_item(
    State(db): State<Database>,
    Path(name): Path<String>,
) -> Result<Json<WorkItemHistory>, (StatusCode, String)> {
    db.get_work_item_history(&name)
        .map_err(internal_error)?
        .map(Json)
        .ok_or_else(work_item_not_found)
}

pub async fn list_publishes(
    State(db): State<Database>,
    Path(name): Path<String>,
) -> Result<Json<Vec<Publish>>, (StatusCode, String)> {
    let item = db
        .get_work_item(&name)
        .map_err(internal_error)?
        .ok_or_else(work_item_not_found)?;
    db.get_publishes(item.id).map(Json).map_err(internal_error)
}

pub async fn list_snapshots(
    State(db): State<Database>,
    Path(name): Path<String>,
) -> Result<Json<Vec<Snapshot>>, (StatusCode, String)> {
    let item = db
        .get_work_item(&name)
        .map_err(internal_error)?
        .ok_or_else(work_item_not_found)?;
    db.get_snapshots(item.id).map(Json).map_err(internal_error)
}

pub async fn list_renders(
    State(db): State<Database>,
    Path(name): Path<String>,
) -> Result<Json<Vec<RenderOutput>>, (StatusCode, String)> {
    let item = db
        .get_work_item(&name)
        .map_err(internal_error)?
        .ok_or_else(work_item_not_found)?;
    db.get_render_outputs(item.id).map(Json).map_err(internal_error)
}
