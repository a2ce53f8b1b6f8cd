use crate::api::error::AppError;
use axum::{Json, extract::State};
use serde::Deserialize;
use utoipa::ToSchema;

use super::types::MessageDto;

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub session_id: String,
    pub message: String,
}

#[derive(serde::Serialize, ToSchema)]
pub struct ChatResponse {
    pub message: MessageDto,
}

#[utoipa::path(
    post,
    path = "/api/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Follow-up answered", body = ChatResponse),
        (status = 404, description = "No conversation exists for this session"),
        (status = 500, description = "Model failure")
    )
)]
pub async fn chat(
    State(state): State<crate::AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let message = state.analysis.chat(&req.session_id, &req.message).await?;

    Ok(Json(ChatResponse {
        message: message.into(),
    }))
}
