use async_trait::async_trait;
use atelier_backend::config::AppConfig;
use atelier_backend::entities::{conversations, files, messages, prelude::*};
use atelier_backend::infrastructure::database;
use atelier_backend::services::ai::{AiError, CompletionModel, ContentPart, GenerativeModel};
use atelier_backend::services::analysis::AnalysisService;
use atelier_backend::services::storage::{BlobError, BlobStore};
use atelier_backend::{AppState, create_app};
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use bytes::Bytes;
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, Database, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryOrder,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use uuid::Uuid;

struct MockBlobStore {
    objects: Mutex<HashMap<String, Bytes>>,
}

#[async_trait]
impl BlobStore for MockBlobStore {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), BlobError> {
        self.objects.lock().unwrap().insert(key.to_string(), data);
        Ok(())
    }

    async fn fetch(&self, key: &str) -> Result<Bytes, BlobError> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }
}

struct ScriptedModel {
    reply: String,
    calls: Mutex<Vec<Vec<ContentPart>>>,
}

#[async_trait]
impl GenerativeModel for ScriptedModel {
    async fn generate(&self, parts: &[ContentPart]) -> Result<String, AiError> {
        self.calls.lock().unwrap().push(parts.to_vec());
        Ok(self.reply.clone())
    }
}

struct FailingCompletion;

#[async_trait]
impl CompletionModel for FailingCompletion {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, AiError> {
        Err(AiError::EmptyResponse)
    }
}

async fn setup() -> (axum::Router, DatabaseConnection, Arc<ScriptedModel>, Arc<MockBlobStore>) {
    unsafe {
        std::env::set_var("DATABASE_URL", "sqlite::memory:");
    }
    let db = Database::connect("sqlite::memory:").await.unwrap();
    database::run_migrations(&db).await.unwrap();

    let storage = Arc::new(MockBlobStore {
        objects: Mutex::new(HashMap::new()),
    });
    let model = Arc::new(ScriptedModel {
        reply: "The second verse drags; shorten the bridge.".to_string(),
        calls: Mutex::new(Vec::new()),
    });
    let title_model = Arc::new(ScriptedModel {
        reply: "Untitled".to_string(),
        calls: Mutex::new(Vec::new()),
    });

    let config = AppConfig::default();
    let analysis = Arc::new(AnalysisService::new(
        db.clone(),
        storage.clone() as Arc<dyn BlobStore>,
        model.clone(),
        title_model,
        Arc::new(FailingCompletion),
        &config,
    ));

    let app = create_app(AppState {
        db: db.clone(),
        storage: storage.clone(),
        analysis,
        config,
    });

    (app, db, model, storage)
}

async fn seed_conversation(
    db: &DatabaseConnection,
    session_id: &str,
    prior_ai_reply: &str,
) -> conversations::Model {
    let conversation = conversations::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        session_id: Set(session_id.to_string()),
        context_prompt: Set("A demo track for an EP".to_string()),
        media_type: Set("music".to_string()),
        user_id: Set(None),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .unwrap();

    messages::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        conversation_id: Set(conversation.id.clone()),
        role: Set("ai".to_string()),
        content: Set(prior_ai_reply.to_string()),
        created_at: Set(Utc::now() - Duration::seconds(30)),
    }
    .insert(db)
    .await
    .unwrap();

    conversation
}

fn chat_request(session_id: &str, message: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header("Content-Type", "application/json")
        .body(Body::from(format!(
            r#"{{"sessionId": "{}", "message": "{}"}}"#,
            session_id, message
        )))
        .unwrap()
}

#[tokio::test]
async fn chat_without_conversation_is_404_and_persists_nothing() {
    let (app, db, _model, _storage) = setup().await;

    let response = app
        .oneshot(chat_request("sess-none", "What about the chorus?"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(Messages::find().count(&db).await.unwrap(), 0);
}

#[tokio::test]
async fn chat_rebuilds_transcript_and_remarsals_files() {
    let (app, db, model, storage) = setup().await;
    let conversation =
        seed_conversation(&db, "sess-chat", "The mix buries the vocal under the pads.").await;

    storage
        .put("track.mp3", Bytes::from_static(b"mp3-bytes"))
        .await
        .unwrap();
    files::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        filename: Set("track.mp3".to_string()),
        original_name: Set("track.mp3".to_string()),
        mime_type: Set("audio/mpeg".to_string()),
        size: Set(9),
        session_id: Set("sess-chat".to_string()),
        user_id: Set(None),
        title: Set(None),
        created_at: Set(Utc::now()),
    }
    .insert(&db)
    .await
    .unwrap();

    let response = app
        .oneshot(chat_request("sess-chat", "How would you fix the vocal?"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["message"]["role"], "ai");
    assert_eq!(body["message"]["conversationId"], conversation.id.as_str());

    // One model call: transcript + new question first, then the audio again.
    let calls = model.calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 1);
    let parts = &calls[0];
    match &parts[0] {
        ContentPart::Text(text) => {
            assert!(text.contains("AI: The mix buries the vocal under the pads."));
            assert!(text.contains("How would you fix the vocal?"));
            // The transcript must not repeat the question as a prior turn.
            assert_eq!(text.matches("How would you fix the vocal?").count(), 1);
        }
        other => panic!("expected leading text part, got {:?}", other),
    }
    assert_eq!(
        parts[1],
        ContentPart::InlineData {
            mime_type: "audio/mpeg".to_string(),
            data: b"mp3-bytes".to_vec(),
        }
    );

    // Turn order on disk: prior ai, new user, new ai.
    let stored = Messages::find()
        .order_by_asc(messages::Column::CreatedAt)
        .all(&db)
        .await
        .unwrap();
    assert_eq!(stored.len(), 3);
    assert_eq!(stored[0].role, "ai");
    assert_eq!(stored[1].role, "user");
    assert_eq!(stored[1].content, "How would you fix the vocal?");
    assert_eq!(stored[2].role, "ai");
    assert!(stored[2].content.contains("bridge"));
}

#[tokio::test]
async fn chat_does_not_touch_the_quota_counter() {
    let (app, db, _model, _storage) = setup().await;
    seed_conversation(&db, "sess-q", "Prior feedback.").await;

    let user = atelier_backend::entities::users::ActiveModel {
        id: Set("user-q".to_string()),
        email: Set("q@example.com".to_string()),
        password_hash: Set(None),
        name: Set(None),
        subscription_plan: Set("free".to_string()),
        conversations_this_month: Set(3),
        billing_period_start: Set(Utc::now()),
        created_at: Set(Some(Utc::now())),
    }
    .insert(&db)
    .await
    .unwrap();

    let response = app
        .oneshot(chat_request("sess-q", "More detail please"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let user = Users::find_by_id(user.id.clone()).one(&db).await.unwrap().unwrap();
    assert_eq!(user.conversations_this_month, 3);
}
