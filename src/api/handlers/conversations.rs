use crate::api::error::AppError;
use crate::api::middleware::auth::OptionalClaims;
use crate::entities::{conversations, files, messages, prelude::*};
use crate::utils::auth::Claims;
use axum::{
    Extension, Json,
    extract::{Path, State},
};
use sea_orm::{ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use utoipa::ToSchema;

use super::types::{ConversationDto, FileDto, MessageDto};

#[derive(Serialize, ToSchema)]
pub struct ConversationViewResponse {
    pub conversation: Option<ConversationDto>,
    pub messages: Vec<MessageDto>,
}

#[utoipa::path(
    get,
    path = "/api/conversation/{session_id}",
    params(
        ("session_id" = String, Path, description = "Upload session ID")
    ),
    responses(
        (status = 200, description = "Conversation with messages (conversation is null when none exists)", body = ConversationViewResponse)
    )
)]
pub async fn get_conversation(
    State(state): State<crate::AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ConversationViewResponse>, AppError> {
    let conversation = Conversations::find()
        .filter(conversations::Column::SessionId.eq(&session_id))
        .one(&state.db)
        .await?;

    let Some(conversation) = conversation else {
        return Ok(Json(ConversationViewResponse {
            conversation: None,
            messages: Vec::new(),
        }));
    };

    let messages = Messages::find()
        .filter(messages::Column::ConversationId.eq(&conversation.id))
        .order_by_asc(messages::Column::CreatedAt)
        .all(&state.db)
        .await?;

    Ok(Json(ConversationViewResponse {
        conversation: Some(conversation.into()),
        messages: messages.into_iter().map(Into::into).collect(),
    }))
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub conversation: ConversationDto,
    pub file_count: u64,
    pub message_count: u64,
    pub files: Vec<FileDto>,
}

#[derive(Serialize, ToSchema)]
pub struct ConversationListResponse {
    pub conversations: Vec<ConversationSummary>,
}

#[utoipa::path(
    get,
    path = "/api/conversations",
    responses(
        (status = 200, description = "The caller's conversations, newest first", body = ConversationListResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("jwt" = [])
    )
)]
pub async fn list_conversations(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ConversationListResponse>, AppError> {
    let owned = Conversations::find()
        .filter(conversations::Column::UserId.eq(&claims.sub))
        .order_by_desc(conversations::Column::CreatedAt)
        .all(&state.db)
        .await?;

    let mut summaries = Vec::with_capacity(owned.len());
    for conversation in owned {
        let message_count = Messages::find()
            .filter(messages::Column::ConversationId.eq(&conversation.id))
            .count(&state.db)
            .await?;

        let session_files = Files::find()
            .filter(files::Column::SessionId.eq(&conversation.session_id))
            .order_by_asc(files::Column::CreatedAt)
            .all(&state.db)
            .await?;

        summaries.push(ConversationSummary {
            file_count: session_files.len() as u64,
            message_count,
            files: session_files.into_iter().map(Into::into).collect(),
            conversation: conversation.into(),
        });
    }

    Ok(Json(ConversationListResponse {
        conversations: summaries,
    }))
}

#[utoipa::path(
    delete,
    path = "/api/conversation/{session_id}",
    params(
        ("session_id" = String, Path, description = "Upload session ID")
    ),
    responses(
        (status = 200, description = "Conversation and its messages deleted"),
        (status = 404, description = "No conversation for this session")
    )
)]
pub async fn delete_conversation(
    State(state): State<crate::AppState>,
    Extension(OptionalClaims(claims)): Extension<OptionalClaims>,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let conversation = Conversations::find()
        .filter(conversations::Column::SessionId.eq(&session_id))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("No conversation for this session".to_string()))?;

    // Owned conversations may only be deleted by their owner; anonymous
    // ones are addressable by session id alone.
    if let Some(owner) = &conversation.user_id {
        let caller = claims.as_ref().map(|c| c.sub.as_str());
        if caller != Some(owner.as_str()) {
            return Err(AppError::NotFound(
                "No conversation for this session".to_string(),
            ));
        }
    }

    Messages::delete_many()
        .filter(messages::Column::ConversationId.eq(&conversation.id))
        .exec(&state.db)
        .await?;
    conversation.delete(&state.db).await?;

    Ok(Json(serde_json::json!({ "deleted": true })))
}
