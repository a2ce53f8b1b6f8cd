use crate::api::error::AppError;
use crate::entities::{notes, prelude::*};
use crate::utils::auth::Claims;
use axum::{
    Extension, Json,
    extract::{Path, State},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter, QueryOrder,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::types::NoteDto;

const CATEGORIES: [&str; 4] = ["technique", "advice", "resource", "general"];

#[utoipa::path(
    get,
    path = "/api/notes",
    responses(
        (status = 200, description = "The caller's notes, newest first"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("jwt" = [])
    )
)]
pub async fn list_notes(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<NoteDto>>, AppError> {
    let records = Notes::find()
        .filter(notes::Column::UserId.eq(&claims.sub))
        .order_by_desc(notes::Column::CreatedAt)
        .all(&state.db)
        .await?;

    Ok(Json(records.into_iter().map(Into::into).collect()))
}

#[derive(Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateNoteRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(min = 1))]
    pub content: String,
    pub link: Option<String>,
    pub category: Option<String>,
    pub conversation_id: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[utoipa::path(
    post,
    path = "/api/notes",
    request_body = CreateNoteRequest,
    responses(
        (status = 200, description = "Note created"),
        (status = 400, description = "Missing title/content or unknown category"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("jwt" = [])
    )
)]
pub async fn create_note(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateNoteRequest>,
) -> Result<Json<NoteDto>, AppError> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    // Manual notes default to "general"; anything explicit must be known.
    let category = req.category.unwrap_or_else(|| "general".to_string());
    if !CATEGORIES.contains(&category.as_str()) {
        return Err(AppError::BadRequest(format!(
            "Unknown category '{}'",
            category
        )));
    }

    let now = Utc::now();
    let active = notes::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        user_id: Set(claims.sub),
        conversation_id: Set(req.conversation_id),
        title: Set(req.title.trim().to_string()),
        content: Set(req.content.trim().to_string()),
        link: Set(req.link.filter(|l| !l.trim().is_empty())),
        note_type: Set("manual".to_string()),
        category: Set(category),
        tags: Set(serde_json::json!(req.tags.unwrap_or_default())),
        created_at: Set(now),
        updated_at: Set(now),
    };

    Ok(Json(active.insert(&state.db).await?.into()))
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNoteRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub link: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[utoipa::path(
    put,
    path = "/api/notes/{id}",
    params(
        ("id" = String, Path, description = "Note ID")
    ),
    request_body = UpdateNoteRequest,
    responses(
        (status = 200, description = "Note updated"),
        (status = 404, description = "Note not found"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("jwt" = [])
    )
)]
pub async fn update_note(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path(note_id): Path<String>,
    Json(req): Json<UpdateNoteRequest>,
) -> Result<Json<NoteDto>, AppError> {
    let note = Notes::find_by_id(note_id.clone())
        .filter(notes::Column::UserId.eq(&claims.sub))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Note not found".to_string()))?;

    if let Some(category) = &req.category {
        if !CATEGORIES.contains(&category.as_str()) {
            return Err(AppError::BadRequest(format!(
                "Unknown category '{}'",
                category
            )));
        }
    }

    let mut active: notes::ActiveModel = note.into();
    if let Some(title) = req.title.filter(|t| !t.trim().is_empty()) {
        active.title = Set(title.trim().to_string());
    }
    if let Some(content) = req.content.filter(|c| !c.trim().is_empty()) {
        active.content = Set(content.trim().to_string());
    }
    if let Some(link) = req.link {
        active.link = Set(Some(link).filter(|l| !l.trim().is_empty()));
    }
    if let Some(category) = req.category {
        active.category = Set(category);
    }
    if let Some(tags) = req.tags {
        active.tags = Set(serde_json::json!(tags));
    }
    active.updated_at = Set(Utc::now());

    Ok(Json(active.update(&state.db).await?.into()))
}

#[utoipa::path(
    delete,
    path = "/api/notes/{id}",
    params(
        ("id" = String, Path, description = "Note ID")
    ),
    responses(
        (status = 200, description = "Note deleted"),
        (status = 404, description = "Note not found"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("jwt" = [])
    )
)]
pub async fn delete_note(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path(note_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let note = Notes::find_by_id(note_id.clone())
        .filter(notes::Column::UserId.eq(&claims.sub))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Note not found".to_string()))?;

    Notes::delete_by_id(note.id.clone()).exec(&state.db).await?;

    Ok(Json(serde_json::json!({ "deleted": true })))
}
