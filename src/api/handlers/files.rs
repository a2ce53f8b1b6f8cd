use crate::api::error::AppError;
use crate::api::middleware::auth::OptionalClaims;
use crate::entities::{files, prelude::*};
use crate::utils::validation::{
    file_extension, sanitize_filename, validate_file_size, validate_magic_bytes,
    validate_mime_type,
};
use axum::{
    Extension, Json,
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{StatusCode, header},
    response::Response,
};
use bytes::Bytes;
use chrono::Utc;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use super::types::FileDto;

#[derive(serde::Serialize, ToSchema)]
pub struct UploadResponse {
    pub file: FileDto,
}

#[utoipa::path(
    post,
    path = "/api/upload",
    request_body(content = Multipart, description = "File upload with a sessionId field"),
    responses(
        (status = 200, description = "File stored", body = UploadResponse),
        (status = 400, description = "Missing file, missing session, or rejected type"),
        (status = 413, description = "File exceeds the size limit")
    )
)]
pub async fn upload_file(
    State(state): State<crate::AppState>,
    Extension(OptionalClaims(claims)): Extension<OptionalClaims>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut session_id: Option<String> = None;
    let mut upload: Option<(String, String, Bytes)> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        let err_msg = e.to_string();
        if err_msg.contains("length limit exceeded") {
            AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
        } else {
            AppError::BadRequest(err_msg)
        }
    })? {
        let name = field.name().unwrap_or_default().to_string();

        if name == "file" {
            let original_name = field.file_name().unwrap_or("unnamed").to_string();
            let content_type = field.content_type().unwrap_or_default().to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            upload = Some((original_name, content_type, data));
        } else if name == "sessionId" {
            let text = field.text().await.unwrap_or_default();
            if !text.trim().is_empty() {
                session_id = Some(text.trim().to_string());
            }
        }
    }

    let session_id =
        session_id.ok_or_else(|| AppError::BadRequest("sessionId is required".to_string()))?;
    let (original_name, content_type, data) =
        upload.ok_or_else(|| AppError::BadRequest("No file provided".to_string()))?;

    // All validation happens before any storage write.
    let original_name =
        sanitize_filename(&original_name).map_err(|e| AppError::BadRequest(e.to_string()))?;
    let mime_type = validate_mime_type(&content_type, &state.config)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    validate_file_size(data.len(), state.config.max_file_size).map_err(|e| {
        if e.to_string().contains("FILE_TOO_LARGE") {
            AppError::PayloadTooLarge(e.to_string())
        } else {
            AppError::BadRequest(e.to_string())
        }
    })?;
    validate_magic_bytes(&data, &state.config)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    // Server-generated storage key; never reused, never user-derived.
    let filename = match file_extension(&original_name) {
        Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
        None => Uuid::new_v4().to_string(),
    };
    let size = data.len() as i64;

    // Bytes must be durable before the metadata row exists, or a "real"
    // file could fail content-fetch.
    state
        .storage
        .put(&filename, data)
        .await
        .map_err(|e| AppError::Internal(format!("Storage write failed: {}", e)))?;

    let active = files::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        filename: Set(filename),
        original_name: Set(original_name),
        mime_type: Set(mime_type),
        size: Set(size),
        session_id: Set(session_id),
        user_id: Set(claims.map(|c| c.sub)),
        title: Set(None),
        created_at: Set(Utc::now()),
    };
    let file = active.insert(&state.db).await?;

    tracing::info!("📁 Stored file {} ({} bytes)", file.id, file.size);

    Ok(Json(UploadResponse { file: file.into() }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFilesQuery {
    pub session_id: String,
}

#[utoipa::path(
    get,
    path = "/api/files",
    params(
        ("sessionId" = String, Query, description = "Upload session ID")
    ),
    responses(
        (status = 200, description = "Files for the session, oldest first")
    )
)]
pub async fn list_files(
    State(state): State<crate::AppState>,
    Query(query): Query<ListFilesQuery>,
) -> Result<Json<Vec<FileDto>>, AppError> {
    let records = Files::find()
        .filter(files::Column::SessionId.eq(&query.session_id))
        .order_by_asc(files::Column::CreatedAt)
        .all(&state.db)
        .await?;

    Ok(Json(records.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/api/files/{id}/content",
    params(
        ("id" = String, Path, description = "File ID")
    ),
    responses(
        (status = 200, description = "Raw file bytes"),
        (status = 404, description = "File or its bytes not found")
    )
)]
pub async fn file_content(
    State(state): State<crate::AppState>,
    Path(file_id): Path<String>,
) -> Result<Response, AppError> {
    let file = Files::find_by_id(file_id.clone())
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

    let data = state.storage.fetch(&file.filename).await.map_err(|e| {
        if e.is_not_found() {
            AppError::NotFound("File content not found in storage".to_string())
        } else {
            AppError::Internal(format!("Storage read failed: {}", e))
        }
    })?;

    let encoded_filename = utf8_percent_encode(&file.original_name, NON_ALPHANUMERIC).to_string();
    let content_disposition = format!("inline; filename*=UTF-8''{}", encoded_filename);

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, file.mime_type)
        .header(header::CONTENT_DISPOSITION, content_disposition)
        .header(header::CACHE_CONTROL, "private, max-age=3600")
        .body(Body::from(data))
        .unwrap())
}

#[utoipa::path(
    delete,
    path = "/api/files/{id}",
    params(
        ("id" = String, Path, description = "File ID")
    ),
    responses(
        (status = 200, description = "File deleted"),
        (status = 404, description = "File not found")
    )
)]
pub async fn delete_file(
    State(state): State<crate::AppState>,
    Extension(OptionalClaims(claims)): Extension<OptionalClaims>,
    Path(file_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let file = Files::find_by_id(file_id.clone())
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

    // Owned files may only be deleted by their owner.
    if let Some(owner) = &file.user_id {
        let caller = claims.as_ref().map(|c| c.sub.as_str());
        if caller != Some(owner.as_str()) {
            return Err(AppError::NotFound("File not found".to_string()));
        }
    }

    let key = file.filename.clone();
    Files::delete_by_id(file.id.clone()).exec(&state.db).await?;

    // Blob removal is best-effort; the tiered store logs tier failures.
    if let Err(e) = state.storage.delete(&key).await {
        tracing::warn!("Blob cleanup failed for {}: {}", key, e);
    }

    Ok(Json(serde_json::json!({ "deleted": true })))
}
