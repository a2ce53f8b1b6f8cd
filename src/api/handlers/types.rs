use crate::entities::{conversations, files, messages, notes};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

/// Wire representations use camelCase to match the UI contract; entity
/// models stay snake_case internally.

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDto {
    pub id: String,
    pub session_id: String,
    pub context_prompt: String,
    pub media_type: String,
    pub user_id: Option<String>,
    pub created_at: chrono::DateTime<Utc>,
}

impl From<conversations::Model> for ConversationDto {
    fn from(m: conversations::Model) -> Self {
        Self {
            id: m.id,
            session_id: m.session_id,
            context_prompt: m.context_prompt,
            media_type: m.media_type,
            user_id: m.user_id,
            created_at: m.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: String,
    pub conversation_id: String,
    pub role: String,
    pub content: String,
    pub created_at: chrono::DateTime<Utc>,
}

impl From<messages::Model> for MessageDto {
    fn from(m: messages::Model) -> Self {
        Self {
            id: m.id,
            conversation_id: m.conversation_id,
            role: m.role,
            content: m.content,
            created_at: m.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileDto {
    pub id: String,
    pub filename: String,
    pub original_name: String,
    pub mime_type: String,
    pub size: i64,
    pub session_id: String,
    pub user_id: Option<String>,
    pub title: Option<String>,
    pub created_at: chrono::DateTime<Utc>,
}

impl From<files::Model> for FileDto {
    fn from(m: files::Model) -> Self {
        Self {
            id: m.id,
            filename: m.filename,
            original_name: m.original_name,
            mime_type: m.mime_type,
            size: m.size,
            session_id: m.session_id,
            user_id: m.user_id,
            title: m.title,
            created_at: m.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NoteDto {
    pub id: String,
    pub user_id: String,
    pub conversation_id: Option<String>,
    pub title: String,
    pub content: String,
    pub link: Option<String>,
    #[serde(rename = "type")]
    pub note_type: String,
    pub category: String,
    pub tags: serde_json::Value,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: chrono::DateTime<Utc>,
}

impl From<notes::Model> for NoteDto {
    fn from(m: notes::Model) -> Self {
        Self {
            id: m.id,
            user_id: m.user_id,
            conversation_id: m.conversation_id,
            title: m.title,
            content: m.content,
            link: m.link,
            note_type: m.note_type,
            category: m.category,
            tags: m.tags,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}
