use crate::api::error::AppError;
use crate::api::middleware::auth::OptionalClaims;
use axum::{Extension, Json, extract::State};
use serde::Deserialize;
use utoipa::ToSchema;

use super::types::{ConversationDto, MessageDto};

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub session_id: String,
    pub context_prompt: String,
    pub media_type: String,
}

#[derive(serde::Serialize, ToSchema)]
pub struct AnalyzeResponse {
    pub conversation: ConversationDto,
    pub message: MessageDto,
}

#[utoipa::path(
    post,
    path = "/api/analyze",
    request_body = AnalyzeRequest,
    responses(
        (status = 200, description = "Analysis complete", body = AnalyzeResponse),
        (status = 400, description = "Missing fields or no files for the session"),
        (status = 403, description = "Monthly conversation quota reached"),
        (status = 500, description = "Model or storage failure")
    )
)]
pub async fn analyze(
    State(state): State<crate::AppState>,
    Extension(OptionalClaims(claims)): Extension<OptionalClaims>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let user_id = claims.as_ref().map(|c| c.sub.as_str());

    let outcome = state
        .analysis
        .analyze(
            &req.session_id,
            &req.context_prompt,
            &req.media_type,
            user_id,
        )
        .await?;

    Ok(Json(AnalyzeResponse {
        conversation: outcome.conversation.into(),
        message: outcome.message.into(),
    }))
}
