use crate::api::error::AppError;
use crate::config::AppConfig;
use crate::entities::{conversations, files, messages, prelude::*, users};
use crate::services::ai::{CompletionModel, ContentPart, GenerativeModel};
use crate::services::marshal::ContentMarshaler;
use crate::services::notes_extractor::NoteExtractor;
use crate::services::prompts::{ANALYSIS_INSTRUCTION, CHAT_INSTRUCTION, system_prompt};
use crate::services::storage::BlobStore;
use crate::services::titles::TitleGenerator;
use crate::services::usage::UsageLimiter;
use crate::utils::keyed_mutex::KeyedMutex;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder,
};
use std::sync::Arc;
use uuid::Uuid;

pub struct AnalysisOutcome {
    pub conversation: conversations::Model,
    pub message: messages::Model,
}

/// Orchestrates the analysis pipeline: quota, conversation
/// lookup-or-create, title pass, content marshaling, the model call, and
/// note extraction. Follow-up chat turns share the same collaborators.
pub struct AnalysisService {
    db: DatabaseConnection,
    model: Arc<dyn GenerativeModel>,
    marshaler: ContentMarshaler,
    titles: TitleGenerator,
    extractor: NoteExtractor,
    limiter: UsageLimiter,
    session_locks: KeyedMutex,
}

impl AnalysisService {
    pub fn new(
        db: DatabaseConnection,
        storage: Arc<dyn BlobStore>,
        analysis_model: Arc<dyn GenerativeModel>,
        title_model: Arc<dyn GenerativeModel>,
        extraction_model: Arc<dyn CompletionModel>,
        config: &AppConfig,
    ) -> Self {
        Self {
            marshaler: ContentMarshaler::new(storage.clone()),
            titles: TitleGenerator::new(db.clone(), storage, title_model),
            extractor: NoteExtractor::new(db.clone(), extraction_model),
            limiter: UsageLimiter::new(db.clone(), config.quotas.clone()),
            session_locks: KeyedMutex::new(),
            model: analysis_model,
            db,
        }
    }

    /// First analysis turn for a session. Creates the conversation when
    /// absent (consuming one quota unit exactly then), otherwise appends
    /// to the existing one without touching the counter.
    pub async fn analyze(
        &self,
        session_id: &str,
        context_prompt: &str,
        media_type: &str,
        user_id: Option<&str>,
    ) -> Result<AnalysisOutcome, AppError> {
        // 1. Required inputs
        if session_id.trim().is_empty()
            || context_prompt.trim().is_empty()
            || media_type.trim().is_empty()
        {
            return Err(AppError::BadRequest(
                "sessionId, contextPrompt, and mediaType are required".to_string(),
            ));
        }

        // 2. Quota check for authenticated callers, before any writes.
        let user = match user_id {
            Some(id) => {
                let user = Users::find_by_id(id)
                    .one(&self.db)
                    .await?
                    .ok_or_else(|| {
                        AppError::Unauthorized("User account no longer exists".to_string())
                    })?;

                let status = self.limiter.check_and_maybe_reset(&user).await?;
                if !status.allowed {
                    return Err(AppError::QuotaExceeded {
                        used: status.used,
                        limit: status.limit,
                    });
                }
                Some(user)
            }
            None => None,
        };

        // 3. Files must exist for the session.
        let files = self.session_files(session_id).await?;
        if files.is_empty() {
            return Err(AppError::BadRequest(
                "No files uploaded for this session".to_string(),
            ));
        }

        // 4. Lookup-or-create the conversation (serialized per session; the
        // unique index on session_id covers cross-process races).
        let conversation = self
            .find_or_create_conversation(
                session_id,
                context_prompt,
                media_type,
                user.as_ref(),
            )
            .await?;

        // 5. Best-effort title pass over untitled images.
        let titled = self.titles.ensure_titles(&files).await;
        if titled > 0 {
            tracing::debug!("Generated {} image titles for session {}", titled, session_id);
        }

        // 6. Re-load so marshaling sees fresh titles, then marshal bytes.
        let files = self.session_files(session_id).await?;
        let file_parts = self.marshaler.marshal(&files).await;
        if file_parts.is_empty() {
            // Every file failed to marshal; proceed with the text-only
            // prompt rather than hard-failing.
            tracing::warn!(
                "No file content could be marshaled for session {}; sending text-only prompt",
                session_id
            );
        }

        // 7. System prompt + user context + instruction, then file parts.
        // The conversation's media type governs every turn, including
        // repeat /analyze calls that submit a different one.
        let mut parts = Vec::with_capacity(file_parts.len() + 1);
        parts.push(ContentPart::text(format!(
            "{}\n\nThe creator says about this work: {}\n\n{}",
            system_prompt(&conversation.media_type),
            conversation.context_prompt.trim(),
            ANALYSIS_INSTRUCTION
        )));
        parts.extend(file_parts);

        // 8. The model call is the one fatal external step.
        let reply = self
            .model
            .generate(&parts)
            .await
            .map_err(|e| AppError::Model(e.to_string()))?;

        // 9. Persist the AI turn.
        let message = self.append_message(&conversation.id, "ai", &reply).await?;

        // 10. Note extraction never fails the request.
        self.extract_notes(&conversation, &reply).await;

        Ok(AnalysisOutcome {
            conversation,
            message,
        })
    }

    /// Follow-up turn on an existing conversation. No quota interaction.
    pub async fn chat(
        &self,
        session_id: &str,
        question: &str,
    ) -> Result<messages::Model, AppError> {
        if session_id.trim().is_empty() || question.trim().is_empty() {
            return Err(AppError::BadRequest(
                "sessionId and message are required".to_string(),
            ));
        }

        let conversation = Conversations::find()
            .filter(conversations::Column::SessionId.eq(session_id))
            .one(&self.db)
            .await?
            .ok_or_else(|| {
                AppError::NotFound("No conversation exists for this session".to_string())
            })?;

        // Persist the user's turn first so it survives a model failure.
        let user_message = self
            .append_message(&conversation.id, "user", question.trim())
            .await?;

        let transcript = self.transcript(&conversation.id, &user_message.id).await?;

        // The model keeps access to the original media, not just history.
        let files = self.session_files(session_id).await?;
        let file_parts = self.marshaler.marshal(&files).await;

        let mut parts = Vec::with_capacity(file_parts.len() + 1);
        parts.push(ContentPart::text(format!(
            "{}\n\nConversation so far:\n{}\n\nNew question from the creator: {}\n\n{}",
            system_prompt(&conversation.media_type),
            transcript,
            question.trim(),
            CHAT_INSTRUCTION
        )));
        parts.extend(file_parts);

        let reply = self
            .model
            .generate(&parts)
            .await
            .map_err(|e| AppError::Model(e.to_string()))?;

        let message = self.append_message(&conversation.id, "ai", &reply).await?;

        self.extract_notes(&conversation, &reply).await;

        Ok(message)
    }

    async fn session_files(&self, session_id: &str) -> Result<Vec<files::Model>, AppError> {
        Ok(Files::find()
            .filter(files::Column::SessionId.eq(session_id))
            .order_by_asc(files::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    async fn find_or_create_conversation(
        &self,
        session_id: &str,
        context_prompt: &str,
        media_type: &str,
        user: Option<&users::Model>,
    ) -> Result<conversations::Model, AppError> {
        let _guard = self.session_locks.lock(session_id).await;

        if let Some(existing) = Conversations::find()
            .filter(conversations::Column::SessionId.eq(session_id))
            .one(&self.db)
            .await?
        {
            return Ok(existing);
        }

        let active = conversations::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            session_id: Set(session_id.to_string()),
            context_prompt: Set(context_prompt.trim().to_string()),
            media_type: Set(media_type.to_string()),
            user_id: Set(user.map(|u| u.id.clone())),
            created_at: Set(Utc::now()),
        };

        let conversation = match active.insert(&self.db).await {
            Ok(conversation) => conversation,
            Err(e) => {
                // Unique-index conflict: another process created it between
                // our lookup and insert. Re-fetch instead of failing.
                if let Some(existing) = Conversations::find()
                    .filter(conversations::Column::SessionId.eq(session_id))
                    .one(&self.db)
                    .await?
                {
                    return Ok(existing);
                }
                return Err(e.into());
            }
        };

        // A new conversation consumes one quota unit, exactly once.
        if let Some(user) = user {
            self.limiter.record_conversation(&user.id).await?;
        }

        tracing::info!(
            "💬 Created conversation {} for session {} ({})",
            conversation.id,
            session_id,
            conversation.media_type
        );

        Ok(conversation)
    }

    async fn append_message(
        &self,
        conversation_id: &str,
        role: &str,
        content: &str,
    ) -> Result<messages::Model, AppError> {
        let active = messages::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            conversation_id: Set(conversation_id.to_string()),
            role: Set(role.to_string()),
            content: Set(content.to_string()),
            created_at: Set(Utc::now()),
        };
        Ok(active.insert(&self.db).await?)
    }

    /// Role-labeled transcript of every turn before the one identified by
    /// `exclude_id` (the just-persisted user message).
    async fn transcript(
        &self,
        conversation_id: &str,
        exclude_id: &str,
    ) -> Result<String, AppError> {
        let history = Messages::find()
            .filter(messages::Column::ConversationId.eq(conversation_id))
            .order_by_asc(messages::Column::CreatedAt)
            .all(&self.db)
            .await?;

        Ok(history
            .iter()
            .filter(|m| m.id != exclude_id)
            .map(|m| {
                let label = if m.role == "ai" { "AI" } else { "User" };
                format!("{}: {}", label, m.content)
            })
            .collect::<Vec<_>>()
            .join("\n\n"))
    }

    async fn extract_notes(&self, conversation: &conversations::Model, reply: &str) {
        let Some(user_id) = conversation.user_id.as_deref() else {
            return;
        };

        match self
            .extractor
            .extract(reply, &conversation.id, user_id)
            .await
        {
            Ok(count) if count > 0 => {
                tracing::info!(
                    "📝 Extracted {} notes from conversation {}",
                    count,
                    conversation.id
                );
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(
                    "Note extraction failed for conversation {}: {}",
                    conversation.id,
                    e
                );
            }
        }
    }
}
